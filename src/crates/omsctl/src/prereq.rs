//! Prerequisite check
//!
//! Verifies that required executables are on the search path before any
//! dependent step runs. Every missing tool is reported in one error.

use crate::error::{OmsError, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Resolves executable names
pub trait ToolLocator: Send + Sync {
    /// Full path of `tool`, or `None` when it is not installed
    fn locate(&self, tool: &str) -> Option<PathBuf>;
}

/// Looks tools up on `PATH` (honouring `PATHEXT` on Windows)
#[derive(Debug, Clone, Copy, Default)]
pub struct PathLocator;

impl ToolLocator for PathLocator {
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        which::which(tool).ok()
    }
}

/// Resolution result for one tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub path: Option<PathBuf>,
}

impl ToolStatus {
    pub fn is_installed(&self) -> bool {
        self.path.is_some()
    }
}

/// Resolve every tool without failing
pub fn survey(locator: &dyn ToolLocator, tools: &[String]) -> Vec<ToolStatus> {
    tools
        .iter()
        .map(|name| {
            let path = locator.locate(name);
            debug!(tool = %name, found = path.is_some(), "Resolved tool");
            ToolStatus {
                name: name.clone(),
                path,
            }
        })
        .collect()
}

/// Resolve every tool and fail with all missing names if any is absent
pub fn check_prerequisites(locator: &dyn ToolLocator, tools: &[String]) -> Result<Vec<ToolStatus>> {
    let statuses = survey(locator, tools);
    let missing: Vec<String> = statuses
        .iter()
        .filter(|status| !status.is_installed())
        .map(|status| status.name.clone())
        .collect();

    if missing.is_empty() {
        Ok(statuses)
    } else {
        warn!(missing = ?missing, "Prerequisite check failed");
        Err(OmsError::MissingTools(missing))
    }
}
