//! Configuration loader with dual-location support
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.omsctl/omsctl.toml
//! 3. Project-level config: ./omsctl.toml
//!
//! Files are merged key by key before deserializing, so a project file that
//! sets one `[aws]` key keeps the rest of the user's `[aws]` section. An
//! explicit `--config` path replaces both file locations and must exist.

use crate::config::schema::{merge_values, OmsConfig};
use crate::env::EnvSource;
use crate::error::{OmsError, Result};
use crate::init::{CONFIG_FILE, USER_CONFIG_DIR};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration loader that handles both user and project configs
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: PathBuf,
    explicit: bool,
}

impl ConfigLoader {
    /// Loader for the project rooted at `root`
    pub fn new(root: &Path) -> Self {
        Self {
            user_config_path: Self::default_user_config_path(),
            project_config_path: root.join(CONFIG_FILE),
            explicit: false,
        }
    }

    /// Loader reading a single, explicitly named file
    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        Self {
            user_config_path: None,
            project_config_path: path.into(),
            explicit: true,
        }
    }

    /// Override the user-level config location (`None` disables it)
    pub fn with_user_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.user_config_path = path;
        self
    }

    /// ~/.omsctl/omsctl.toml, when a home directory is known
    fn default_user_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(USER_CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load configuration from both locations with project taking precedence
    pub async fn load(&self, env: &dyn EnvSource) -> Result<OmsConfig> {
        if self.explicit && !self.project_config_path.exists() {
            return Err(OmsError::Config(format!(
                "Config file not found: {}",
                self.project_config_path.display()
            )));
        }

        let mut merged = toml::Value::Table(toml::Table::new());

        if let Some(ref user_path) = self.user_config_path {
            match Self::load_from_path(user_path).await? {
                Some(user_config) => {
                    debug!(path = %user_path.display(), "Loaded user-level config");
                    merge_values(&mut merged, user_config);
                }
                None => debug!(path = %user_path.display(), "No user-level config"),
            }
        }

        match Self::load_from_path(&self.project_config_path).await? {
            Some(project_config) => {
                debug!(path = %self.project_config_path.display(), "Loaded project-level config");
                merge_values(&mut merged, project_config);
            }
            None => debug!(path = %self.project_config_path.display(), "No project-level config"),
        }

        // Missing sections and keys take their defaults here
        let mut config: OmsConfig = merged
            .try_into()
            .map_err(|e: toml::de::Error| OmsError::Config(format!("Invalid configuration: {}", e)))?;

        config.resolve_env_vars(env);

        info!(region = %config.aws.region, "Configuration loaded");
        Ok(config)
    }

    /// Parse one file as a TOML table; `Ok(None)` when it does not exist
    async fn load_from_path(path: &Path) -> Result<Option<toml::Value>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            OmsError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let value: toml::Value = toml::from_str(&content).map_err(|e| {
            OmsError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        Ok(Some(value))
    }

    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    pub fn project_config_path(&self) -> &Path {
        &self.project_config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StaticEnv;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_returns_defaults_when_no_files() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new(temp_dir.path()).with_user_config_path(None);

        let config = loader.load(&StaticEnv::new()).await.unwrap();
        assert_eq!(config.aws.table_name, "Orders");
        assert_eq!(config.project.backend_dir, "order-service");
    }

    #[tokio::test]
    async fn test_project_overrides_user() {
        let temp_dir = TempDir::new().unwrap();
        let user_path = temp_dir.path().join("user.toml");
        fs::write(&user_path, "[aws]\nregion = \"eu-west-1\"\ntopic_name = \"user-topic\"\n")
            .await
            .unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE),
            "[aws]\nregion = \"eu-north-1\"\n",
        )
        .await
        .unwrap();

        let loader = ConfigLoader::new(temp_dir.path()).with_user_config_path(Some(user_path));
        let config = loader.load(&StaticEnv::new()).await.unwrap();

        // Same key: project wins. Other keys of the section survive.
        assert_eq!(config.aws.region, "eu-north-1");
        assert_eq!(config.aws.topic_name, "user-topic");
    }

    #[tokio::test]
    async fn test_user_and_project_sections_both_survive() {
        let temp_dir = TempDir::new().unwrap();
        let user_path = temp_dir.path().join("user.toml");
        fs::write(&user_path, "[local]\nstartup_delay_secs = 4\nbackend_port = 9090\n")
            .await
            .unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE),
            "[aws]\nregion = \"eu-north-1\"\nstrict = true\n",
        )
        .await
        .unwrap();

        let loader = ConfigLoader::new(temp_dir.path()).with_user_config_path(Some(user_path));
        let config = loader.load(&StaticEnv::new()).await.unwrap();

        assert_eq!(config.local.startup_delay_secs, 4);
        assert_eq!(config.local.backend_port, 9090);
        assert_eq!(config.aws.region, "eu-north-1");
        assert!(config.aws.strict);
        assert_eq!(config.aws.table_name, "Orders");
    }

    #[tokio::test]
    async fn test_wrong_value_type_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE), "[local]\nbackend_port = \"http\"\n")
            .await
            .unwrap();

        let loader = ConfigLoader::new(temp_dir.path()).with_user_config_path(None);
        let err = loader.load(&StaticEnv::new()).await.unwrap_err();
        assert!(matches!(err, OmsError::Config(_)));
    }

    #[tokio::test]
    async fn test_user_config_applies_without_project_config() {
        let temp_dir = TempDir::new().unwrap();
        let user_path = temp_dir.path().join("user.toml");
        fs::write(&user_path, "[local]\nstartup_delay_secs = 2\n").await.unwrap();

        let loader = ConfigLoader::new(temp_dir.path()).with_user_config_path(Some(user_path));
        let config = loader.load(&StaticEnv::new()).await.unwrap();
        assert_eq!(config.local.startup_delay_secs, 2);
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE), "[aws\nregion = ").await.unwrap();

        let loader = ConfigLoader::new(temp_dir.path()).with_user_config_path(None);
        let err = loader.load(&StaticEnv::new()).await.unwrap_err();
        assert!(matches!(err, OmsError::Config(_)));
    }

    #[tokio::test]
    async fn test_explicit_path_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::explicit(temp_dir.path().join("missing.toml"));
        let err = loader.load(&StaticEnv::new()).await.unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }

    #[tokio::test]
    async fn test_env_vars_resolved_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        fs::write(&path, "[aws]\nregion = \"${OMS_REGION}\"\n").await.unwrap();

        let env = StaticEnv::new().with("OMS_REGION", "sa-east-1");
        let config = ConfigLoader::explicit(path).load(&env).await.unwrap();
        assert_eq!(config.aws.region, "sa-east-1");
    }
}
