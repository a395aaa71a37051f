//! Configuration management for omsctl
//!
//! Supports dual-location configuration:
//! - User-level: ~/.omsctl/omsctl.toml
//! - Project-level: ./omsctl.toml
//!
//! Project-level config overrides user-level config.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{AwsConfig, DeployConfig, LocalConfig, LoggingConfig, OmsConfig, ProjectConfig};

use crate::env::ProcessEnv;
use crate::Result;
use std::path::Path;

/// Load configuration for the project rooted at `root`, reading the process
/// environment for `${VAR}` references
pub async fn load_config(root: &Path) -> Result<OmsConfig> {
    ConfigLoader::new(root).load(&ProcessEnv).await
}
