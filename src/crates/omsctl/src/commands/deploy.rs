//! Cloud deployment (`omsctl deploy`)
//!
//! The backend goes to the hosting platform through its own CLI (`eb` by
//! default); the frontend bundle is synced to an S3 bucket.

use super::lifecycle::run_step;
use crate::console;
use crate::context::Context;
use crate::env::require_credentials;
use crate::error::{OmsError, Result};
use crate::prereq::check_prerequisites;
use crate::process::CommandSpec;
use crate::state::ResourceState;
use tracing::info;

/// Bucket the frontend bundle is synced to: `[deploy] frontend_bucket`, else
/// the provisioned bucket
pub fn frontend_bucket(ctx: &Context) -> Result<String> {
    if let Some(ref bucket) = ctx.config().deploy.frontend_bucket {
        if !bucket.trim().is_empty() {
            return Ok(bucket.clone());
        }
    }
    ResourceState::load(&ctx.state_path())?.bucket_name.ok_or_else(|| {
        OmsError::Config(
            "No frontend bucket: set [deploy] frontend_bucket or run `omsctl setup` first".to_string(),
        )
    })
}

/// Package and push both applications.
///
/// Credentials are checked before anything else runs, then the tool set
/// including the deployment tool. Every step is fatal on failure.
pub async fn deploy(ctx: &Context) -> Result<()> {
    require_credentials(ctx.env())?;
    check_prerequisites(ctx.locator(), &ctx.config().deploy_tools())?;

    let backend = ctx.backend_dir();
    let frontend = ctx.frontend_dir();
    ctx.require_dir("Backend", &backend)?;
    ctx.require_dir("Frontend", &frontend)?;
    let bucket = frontend_bucket(ctx)?;

    let deploy = &ctx.config().deploy;
    let region = &ctx.config().aws.region;
    info!(tool = %deploy.tool, environment = %deploy.environment, bucket = %bucket, "Deploying");

    console::header("Deploying backend");
    run_step(
        ctx,
        "backend-package",
        CommandSpec::new("mvn")
            .args(["clean", "package", "-DskipTests"])
            .current_dir(&backend),
    )
    .await?;
    run_step(
        ctx,
        "backend-deploy",
        CommandSpec::new(deploy.tool.as_str())
            .arg("deploy")
            .arg(&deploy.environment)
            .current_dir(&backend),
    )
    .await?;

    console::header("Deploying frontend");
    run_step(
        ctx,
        "frontend-package",
        CommandSpec::new("npm").args(["run", "build"]).current_dir(&frontend),
    )
    .await?;
    let build_dir = frontend.join(&deploy.frontend_build_dir);
    run_step(
        ctx,
        "frontend-deploy",
        CommandSpec::new("aws")
            .args(["s3", "sync"])
            .arg(build_dir.to_string_lossy())
            .arg(format!("s3://{}", bucket))
            .args(["--delete", "--region"])
            .arg(region)
            .current_dir(&frontend),
    )
    .await?;

    console::success(format!(
        "Deployed backend to {} and frontend to s3://{}",
        deploy.environment, bucket
    ));
    Ok(())
}
