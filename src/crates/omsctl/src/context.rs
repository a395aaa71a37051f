//! Run context
//!
//! Bundles the loaded configuration, the project root and the seams every
//! command goes through (process runner, tool locator, environment).

use crate::config::{ConfigLoader, OmsConfig};
use crate::env::{EnvSource, ProcessEnv};
use crate::error::{OmsError, Result};
use crate::prereq::{PathLocator, ToolLocator};
use crate::process::{ProcessRunner, SystemRunner};
use crate::shutdown::ShutdownCoordinator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Everything a command needs
#[derive(Clone)]
pub struct Context {
    config: OmsConfig,
    root: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    locator: Arc<dyn ToolLocator>,
    env: Arc<dyn EnvSource>,
    shutdown: ShutdownCoordinator,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn config(&self) -> &OmsConfig {
        &self.config
    }

    /// Directory relative paths in the configuration resolve against
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runner(&self) -> &dyn ProcessRunner {
        self.runner.as_ref()
    }

    pub fn locator(&self) -> &dyn ToolLocator {
        self.locator.as_ref()
    }

    pub fn env(&self) -> &dyn EnvSource {
        self.env.as_ref()
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// `Err(Interrupted)` once Ctrl+C or SIGTERM has been received
    pub fn check_interrupted(&self, before: &str) -> Result<()> {
        if self.shutdown.is_shutdown_requested() {
            debug!(before, "Stopping after shutdown request");
            return Err(OmsError::Interrupted(format!("stopped before {}", before)));
        }
        Ok(())
    }

    /// Resolve a configured path against the project root
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn backend_dir(&self) -> PathBuf {
        self.resolve(&self.config.project.backend_dir)
    }

    pub fn frontend_dir(&self) -> PathBuf {
        self.resolve(&self.config.project.frontend_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.config.project.log_dir)
    }

    /// `<log_dir>/<name>.log`
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.log_dir().join(format!("{}.log", name))
    }

    pub fn state_path(&self) -> PathBuf {
        self.resolve(&self.config.project.state_file)
    }

    pub fn pid_path(&self) -> PathBuf {
        self.resolve(&self.config.project.pid_file)
    }

    /// Fail unless `dir` exists and is a directory
    pub fn require_dir(&self, what: &str, dir: &Path) -> Result<()> {
        if dir.is_dir() {
            Ok(())
        } else {
            Err(OmsError::Config(format!(
                "{} directory not found: {}",
                what,
                dir.display()
            )))
        }
    }
}

/// Builder for [`Context`]. Unset seams default to the real system.
#[derive(Default)]
pub struct ContextBuilder {
    config: Option<OmsConfig>,
    config_path: Option<PathBuf>,
    root: Option<PathBuf>,
    runner: Option<Arc<dyn ProcessRunner>>,
    locator: Option<Arc<dyn ToolLocator>>,
    env: Option<Arc<dyn EnvSource>>,
    shutdown: Option<ShutdownCoordinator>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this configuration instead of loading one
    pub fn with_config(mut self, config: OmsConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from exactly this file
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_locator(mut self, locator: Arc<dyn ToolLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn with_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownCoordinator) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Project root: the explicit root, else the directory holding an
    /// explicit config file, else the current directory
    pub fn root(&self) -> Result<PathBuf> {
        if let Some(ref root) = self.root {
            return Ok(root.clone());
        }
        if let Some(parent) = self.config_path.as_deref().and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                return Ok(parent.to_path_buf());
            }
        }
        std::env::current_dir()
            .map_err(|e| OmsError::Config(format!("Unable to determine project root: {}", e)))
    }

    /// The configuration `build` will use, loading it if none was given
    pub async fn load_config(&self) -> Result<OmsConfig> {
        if let Some(ref config) = self.config {
            return Ok(config.clone());
        }
        let loader = match self.config_path {
            Some(ref path) => ConfigLoader::explicit(path.clone()),
            None => ConfigLoader::new(&self.root()?),
        };
        let env = self.env.clone().unwrap_or_else(|| Arc::new(ProcessEnv));
        loader.load(env.as_ref()).await
    }

    pub async fn build(self) -> Result<Context> {
        let config = self.load_config().await?;
        let root = self.root()?;
        debug!(root = %root.display(), "Building run context");

        Ok(Context {
            config,
            root,
            runner: self.runner.unwrap_or_else(|| Arc::new(SystemRunner::new())),
            locator: self.locator.unwrap_or_else(|| Arc::new(PathLocator)),
            env: self.env.unwrap_or_else(|| Arc::new(ProcessEnv)),
            shutdown: self.shutdown.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_paths_resolve_against_root() {
        let ctx = ContextBuilder::new()
            .with_config(OmsConfig::default())
            .with_root("/srv/oms")
            .build()
            .await
            .unwrap();

        assert_eq!(ctx.backend_dir(), PathBuf::from("/srv/oms/order-service"));
        assert_eq!(ctx.frontend_dir(), PathBuf::from("/srv/oms/order-ui"));
        assert_eq!(ctx.log_path("backend"), PathBuf::from("/srv/oms/logs/backend.log"));
        assert_eq!(ctx.state_path(), PathBuf::from("/srv/oms/.aws-resources"));
        assert_eq!(ctx.pid_path(), PathBuf::from("/srv/oms/.oms-pids"));
    }

    #[tokio::test]
    async fn test_absolute_paths_kept() {
        let mut config = OmsConfig::default();
        config.project.log_dir = "/var/log/oms".to_string();
        let ctx = ContextBuilder::new()
            .with_config(config)
            .with_root("/srv/oms")
            .build()
            .await
            .unwrap();
        assert_eq!(ctx.log_dir(), PathBuf::from("/var/log/oms"));
    }

    #[test]
    fn test_root_defaults_to_config_parent() {
        let builder = ContextBuilder::new().with_config_path(Some(PathBuf::from("/etc/oms/omsctl.toml")));
        assert_eq!(builder.root().unwrap(), PathBuf::from("/etc/oms"));
    }

    #[tokio::test]
    async fn test_require_dir() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ContextBuilder::new()
            .with_config(OmsConfig::default())
            .with_root(temp_dir.path())
            .build()
            .await
            .unwrap();

        assert!(ctx.require_dir("Backend", temp_dir.path()).is_ok());
        let err = ctx.require_dir("Backend", &ctx.backend_dir()).unwrap_err();
        assert!(err.to_string().contains("Backend directory not found"));
    }
}
