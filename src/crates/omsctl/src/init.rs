//! Project initialization
//!
//! Writes a commented default `omsctl.toml` into the project root.

use crate::error::{OmsError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Configuration file name, at the project root and in the user directory
pub const CONFIG_FILE: &str = "omsctl.toml";

/// User-level configuration directory name (under the home directory)
pub const USER_CONFIG_DIR: &str = ".omsctl";

/// Write the default configuration into `root`.
///
/// # Errors
///
/// Returns an error if the file exists and `force` is false, or if the write
/// fails.
pub fn initialize(root: &Path, force: bool) -> Result<PathBuf> {
    let config_path = root.join(CONFIG_FILE);

    if config_path.exists() && !force {
        return Err(OmsError::Config(format!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        )));
    }

    fs::write(&config_path, DEFAULT_CONFIG)
        .map_err(|e| OmsError::Config(format!("Failed to write configuration: {}", e)))?;
    info!(path = %config_path.display(), "Wrote default configuration");

    Ok(config_path)
}

const DEFAULT_CONFIG: &str = r#"# omsctl configuration
#
# User-wide defaults can be placed in ~/.omsctl/omsctl.toml; this file wins.
# String values of the form "${VAR}" are read from the environment.

[project]
# Maven project of the order service
backend_dir = "order-service"
# npm project of the order UI
frontend_dir = "order-ui"
# Build and run logs
log_dir = "logs"
# Generated resource identifiers (bucket name, topic ARN)
state_file = ".aws-resources"
# PIDs of the last started backend/frontend pair
pid_file = ".oms-pids"

[aws]
region = "us-east-1"
table_name = "Orders"
table_key = "orderId"
bucket_prefix = "order-management-files"
topic_name = "order-notifications"
cors_origins = ["*"]
# Abort setup on failures other than "already exists"
strict = false

[local]
backend_port = 8080
frontend_port = 3000
# Seconds between starting the backend and starting the frontend
startup_delay_secs = 15
required_tools = ["java", "mvn", "node", "npm", "aws"]

[deploy]
# Backend deployment tool (Elastic Beanstalk CLI)
tool = "eb"
environment = "order-service-env"
# Bucket hosting the built UI; defaults to the provisioned bucket
# frontend_bucket = "${FRONTEND_BUCKET}"
frontend_build_dir = "build"

[logging]
# trace, debug, info, warn, error (RUST_LOG takes precedence)
level = "warn"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OmsConfig;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_parses_to_defaults() {
        let parsed: OmsConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        let defaults = OmsConfig::default();
        assert_eq!(parsed.project.backend_dir, defaults.project.backend_dir);
        assert_eq!(parsed.aws.bucket_prefix, defaults.aws.bucket_prefix);
        assert_eq!(parsed.local.required_tools, defaults.local.required_tools);
        assert_eq!(parsed.deploy.frontend_bucket, None);
        assert_eq!(parsed.logging.level, defaults.logging.level);
    }

    #[test]
    fn test_initialize_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = initialize(temp_dir.path(), false).unwrap();
        assert!(path.exists());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("[project]"));
        assert!(content.contains("[aws]"));
        assert!(content.contains("[local]"));
        assert!(content.contains("[deploy]"));
    }

    #[test]
    fn test_initialize_refuses_overwrite_without_force() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE), "# mine").unwrap();

        assert!(initialize(temp_dir.path(), false).is_err());
        assert_eq!(
            fs::read_to_string(temp_dir.path().join(CONFIG_FILE)).unwrap(),
            "# mine"
        );

        initialize(temp_dir.path(), true).unwrap();
        let content = fs::read_to_string(temp_dir.path().join(CONFIG_FILE)).unwrap();
        assert!(content.contains("[aws]"));
    }
}
