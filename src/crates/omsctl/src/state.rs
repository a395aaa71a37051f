//! Local state files
//!
//! Two `KEY=VALUE` text files persist between invocations:
//! - the resource state (bucket name, topic ARN) written by `setup`
//! - the process record (backend and frontend PIDs) written by `start`
//!
//! Both are read with dotenv rules and rewritten whole. Keys omsctl does not
//! know are kept on rewrite.

use crate::error::{OmsError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const BUCKET_KEY: &str = "S3_BUCKET_NAME";
pub const TOPIC_KEY: &str = "SNS_TOPIC_ARN";
pub const REGION_KEY: &str = "AWS_REGION";
pub const TABLE_KEY: &str = "DYNAMODB_TABLE";

pub const BACKEND_PID_KEY: &str = "BACKEND_PID";
pub const FRONTEND_PID_KEY: &str = "FRONTEND_PID";
pub const STARTED_AT_KEY: &str = "STARTED_AT";

/// Ordered `KEY=VALUE` entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueFile {
    entries: Vec<(String, String)>,
}

impl KeyValueFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `path`; `Ok(None)` when it does not exist. Parsing follows
    /// dotenv rules, so quoting, `export` prefixes and comments are accepted.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let read_error =
            |e: dotenvy::Error| OmsError::State(format!("Failed to read {}: {}", path.display(), e));
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(e) if e.not_found() => return Ok(None),
            Err(e) => return Err(read_error(e)),
        };
        let mut file = Self::new();
        for item in iter {
            let (key, value) = item.map_err(read_error)?;
            file.set(key, value);
        }
        Ok(Some(file))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.render())
            .map_err(|e| OmsError::State(format!("Failed to write {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), entries = self.entries.len(), "Wrote state file");
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}\n", k, v))
            .collect()
    }
}

/// Identifiers of provisioned resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceState {
    pub bucket_name: Option<String>,
    pub topic_arn: Option<String>,
    pub region: Option<String>,
    pub table_name: Option<String>,
}

impl ResourceState {
    /// Load the state file; an absent file yields an empty state
    pub fn load(path: &Path) -> Result<Self> {
        let Some(file) = KeyValueFile::load(path)? else {
            return Ok(Self::default());
        };
        let field = |key: &str| {
            file.get(key)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Ok(Self {
            bucket_name: field(BUCKET_KEY),
            topic_arn: field(TOPIC_KEY),
            region: field(REGION_KEY),
            table_name: field(TABLE_KEY),
        })
    }

    /// Write known fields, keeping any other entries already in the file
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = KeyValueFile::load(path)?.unwrap_or_default();
        let fields = [
            (BUCKET_KEY, &self.bucket_name),
            (TOPIC_KEY, &self.topic_arn),
            (REGION_KEY, &self.region),
            (TABLE_KEY, &self.table_name),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                file.set(key, value.clone());
            }
        }
        file.save(path)
    }

    pub fn is_empty(&self) -> bool {
        self.bucket_name.is_none() && self.topic_arn.is_none()
    }
}

/// PIDs of the most recently started backend/frontend pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub backend_pid: Option<u32>,
    pub frontend_pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
}

impl ProcessRecord {
    /// Load the record; `Ok(None)` when nothing was started
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let Some(file) = KeyValueFile::load(path)? else {
            return Ok(None);
        };
        let record = Self {
            backend_pid: parse_pid(&file, BACKEND_PID_KEY)?,
            frontend_pid: parse_pid(&file, FRONTEND_PID_KEY)?,
            started_at: file
                .get(STARTED_AT_KEY)
                .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        };
        Ok(Some(record))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = KeyValueFile::new();
        if let Some(pid) = self.backend_pid {
            file.set(BACKEND_PID_KEY, pid.to_string());
        }
        if let Some(pid) = self.frontend_pid {
            file.set(FRONTEND_PID_KEY, pid.to_string());
        }
        if let Some(started_at) = self.started_at {
            file.set(STARTED_AT_KEY, started_at.to_rfc3339());
        }
        file.save(path)
    }

    /// Delete the record file; a missing file is not an error
    pub fn clear(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Recorded PIDs with their role, backend first
    pub fn pids(&self) -> Vec<(&'static str, u32)> {
        let mut pids = Vec::with_capacity(2);
        if let Some(pid) = self.backend_pid {
            pids.push(("backend", pid));
        }
        if let Some(pid) = self.frontend_pid {
            pids.push(("frontend", pid));
        }
        pids
    }
}

/// PIDs 0 and 1 would signal our own group or init, so they never come
/// from a record.
fn parse_pid(file: &KeyValueFile, key: &str) -> Result<Option<u32>> {
    let Some(value) = file.get(key).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    match value.parse::<u32>() {
        Ok(pid) if pid > 1 => Ok(Some(pid)),
        _ => Err(OmsError::State(format!("{} is not a process id: {:?}", key, value))),
    }
}
