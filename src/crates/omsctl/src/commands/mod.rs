//! Command implementations
//!
//! Each operation takes a [`Context`] and returns `Err` only for conditions
//! that end the run.

pub mod deploy;
pub mod lifecycle;
pub mod provision;
pub mod status;

pub use deploy::deploy;
pub use lifecycle::{build, clean, start, stop, test};
pub use provision::{provision, ProvisionReport, Resource, StepOutcome};
pub use status::{status, StatusReport};

use crate::console;
use crate::context::Context;
use crate::error::Result;
use crate::prereq::check_prerequisites;

/// Check the locally required tools, stopping the run if any is missing
pub fn ensure_local_tools(ctx: &Context) -> Result<()> {
    let statuses = check_prerequisites(ctx.locator(), &ctx.config().local.required_tools)?;
    console::success(format!(
        "Found {}",
        statuses
            .iter()
            .map(|status| status.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    Ok(())
}

/// Provision, build, test and start in sequence, stopping at the first
/// fatal error or shutdown request
pub async fn all(ctx: &Context) -> Result<()> {
    ensure_local_tools(ctx)?;
    ctx.check_interrupted("provisioning")?;
    provision(ctx).await?;
    ctx.check_interrupted("the build")?;
    build(ctx).await?;
    ctx.check_interrupted("the tests")?;
    test(ctx).await?;
    ctx.check_interrupted("startup")?;
    start(ctx).await?;
    Ok(())
}
