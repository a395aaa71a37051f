//! # omsctl - Order Management System deployment tool
//!
//! Drives the operational lifecycle of the order management system: the
//! Maven backend (`order-service`) and the npm frontend (`order-ui`). The
//! applications themselves are not part of this crate; omsctl only calls out
//! to `aws`, `mvn`, `npm` and the deployment tool.
//!
//! ## Features
//!
//! - **Prerequisite check** - every missing tool reported at once
//! - **Provisioning** - DynamoDB table, S3 bucket with CORS, SNS topic
//! - **Local lifecycle** - build, test, start, stop and clean
//! - **Deployment** - backend to Elastic Beanstalk, frontend to S3
//! - **Dual-Location Config** - user-level and project-level `omsctl.toml`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use omsctl::{commands, ContextBuilder};
//!
//! # async fn example() -> omsctl::Result<()> {
//! let ctx = ContextBuilder::new().with_root("/srv/oms").build().await?;
//! commands::provision(&ctx).await?;
//! commands::start(&ctx).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod context;
pub mod env;
pub mod init;
pub mod logging;
pub mod prereq;
pub mod process;
pub mod shutdown;
pub mod state;
pub mod testing;
pub mod version;

// Error types and utilities
mod error;

pub use config::{ConfigLoader, OmsConfig, load_config};
pub use context::{Context, ContextBuilder};
pub use error::{OmsError, Result};
pub use process::{CommandOutput, CommandSpec, ProcessRunner, SystemRunner};
pub use shutdown::ShutdownCoordinator;
pub use state::{ProcessRecord, ResourceState};

// Re-export version utilities
pub use version::{full_version as version_info, VersionInfo};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert!(info.contains("omsctl"));
        assert!(info.contains(version::VERSION));
    }
}
