//! External command execution
//!
//! Every program omsctl drives (`aws`, `mvn`, `npm`, `eb`, `kill`) goes
//! through a [`ProcessRunner`]. [`SystemRunner`] talks to the operating
//! system; `crate::testing::ScriptedRunner` records calls instead.

mod system;

pub use system::SystemRunner;

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Value of an environment override, if set
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of a command that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Short description of how the command ended
    pub fn status_label(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs external programs
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, capturing stdout and stderr
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Run to completion with stdout and stderr written to `log`
    async fn run_logged(&self, spec: &CommandSpec, log: &Path) -> Result<CommandOutput>;

    /// Start in the background with output written to `log` and return the
    /// PID. The child outlives this process.
    async fn spawn_detached(&self, spec: &CommandSpec, log: &Path) -> Result<u32>;

    /// Whether `pid` still refers to a running process
    async fn is_alive(&self, pid: u32) -> bool;

    /// Terminate `pid` and the processes it started
    async fn terminate(&self, pid: u32) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_whitespace_args() {
        let spec = CommandSpec::new("aws")
            .args(["s3api", "put-bucket-cors"])
            .arg("{\"CORSRules\": []}");
        assert_eq!(
            spec.to_string(),
            "aws s3api put-bucket-cors \"{\\\"CORSRules\\\": []}\""
        );
    }

    #[test]
    fn test_env_value_last_wins() {
        let spec = CommandSpec::new("npm").env("PORT", "3000").env("PORT", "4000");
        assert_eq!(spec.env_value("PORT"), Some("4000"));
        assert_eq!(spec.env_value("CI"), None);
    }

    #[test]
    fn test_status_label() {
        assert_eq!(CommandOutput::failed(254, "").status_label(), "exit code 254");
        let signalled = CommandOutput {
            code: None,
            ..CommandOutput::default()
        };
        assert_eq!(signalled.status_label(), "terminated by signal");
    }
}
