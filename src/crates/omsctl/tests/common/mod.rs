//! Common test utilities and setup

#![allow(dead_code)]

use omsctl::testing::{FakeLocator, ScriptedRunner, StaticEnv};
use omsctl::{Context, ContextBuilder, OmsConfig};
use std::sync::Arc;
use tempfile::TempDir;

/// A project directory with both application folders and a runner that
/// records every call
pub struct TestProject {
    pub dir: TempDir,
    pub runner: Arc<ScriptedRunner>,
    pub config: OmsConfig,
    pub locator: FakeLocator,
    pub env: StaticEnv,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir_all(dir.path().join("order-service")).expect("Failed to create backend dir");
        std::fs::create_dir_all(dir.path().join("order-ui")).expect("Failed to create frontend dir");

        let mut config = OmsConfig::default();
        config.local.startup_delay_secs = 0;

        Self {
            dir,
            runner: Arc::new(ScriptedRunner::new()),
            config,
            locator: FakeLocator::all_default(),
            env: StaticEnv::new(),
        }
    }

    pub fn with_credentials(mut self) -> Self {
        self.env = self
            .env
            .with("AWS_ACCESS_KEY_ID", "AKIAEXAMPLE")
            .with("AWS_SECRET_ACCESS_KEY", "secret");
        self
    }

    pub fn builder(&self) -> ContextBuilder {
        ContextBuilder::new()
            .with_config(self.config.clone())
            .with_root(self.dir.path())
            .with_runner(self.runner.clone())
            .with_locator(Arc::new(self.locator.clone()))
            .with_env(Arc::new(self.env.clone()))
    }

    pub async fn context(&self) -> Context {
        self.builder().build().await.expect("Failed to build context")
    }
}
