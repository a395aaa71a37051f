//! Error types for omsctl
//!
//! Every fatal condition of a run is an `OmsError`. Conditions that only
//! deserve a warning (a resource that already exists, a process that already
//! exited) are reported as values by the operation that met them.

use thiserror::Error;

/// Result type alias for omsctl operations
pub type Result<T> = std::result::Result<T, OmsError>;

/// Main error type for omsctl operations
#[derive(Debug, Error)]
pub enum OmsError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more required executables are not on the search path
    #[error("Missing required tools: {}", .0.join(", "))]
    MissingTools(Vec<String>),

    /// Deployment credentials are not set
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),

    /// An external build, test or deploy step exited unsuccessfully
    #[error("{step} failed ({status})")]
    StepFailed { step: String, status: String },

    /// A provisioning call failed while running in strict mode
    #[error("Provisioning error: {0}")]
    Provision(String),

    /// A child process could not be launched or terminated
    #[error("Process error: {0}")]
    Process(String),

    /// The state or process record file is malformed
    #[error("State file error: {0}")]
    State(String),

    /// The run was interrupted by a signal
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl OmsError {
    /// Build a `StepFailed` error from a step label and an exit description
    pub fn step_failed(step: impl Into<String>, status: impl Into<String>) -> Self {
        Self::StepFailed {
            step: step.into(),
            status: status.into(),
        }
    }
}

impl From<toml::de::Error> for OmsError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("Failed to parse config: {}", err))
    }
}

impl From<String> for OmsError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}

impl From<&str> for OmsError {
    fn from(msg: &str) -> Self {
        Self::Other(msg.to_string())
    }
}
