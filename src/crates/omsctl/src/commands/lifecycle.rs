//! Local build, test and run orchestration
//!
//! Build and test steps run to completion with their output in
//! `<log_dir>/<step>.log`. `start` launches the backend and frontend as
//! detached processes and records their PIDs so `stop` can find them later.

use crate::console;
use crate::context::Context;
use crate::error::{OmsError, Result};
use crate::process::CommandSpec;
use crate::state::{ProcessRecord, ResourceState};
use chrono::Utc;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Log files written by build, test and run steps
pub const LOG_NAMES: [&str; 7] = [
    "backend-build",
    "frontend-install",
    "frontend-build",
    "backend-test",
    "frontend-test",
    "backend",
    "frontend",
];

/// Run one step to completion; a non-zero exit is fatal
pub(crate) async fn run_step(ctx: &Context, name: &str, spec: CommandSpec) -> Result<()> {
    ctx.check_interrupted(name)?;
    let log = ctx.log_path(name);
    console::info(format!("{} ({})", name, spec));
    debug!(step = name, log = %log.display(), "Running step");

    let output = ctx.runner().run_logged(&spec, &log).await?;
    if !output.success {
        // Ctrl+C reaches the foreground child too; report the interrupt
        ctx.check_interrupted("the next step")?;
        warn!(step = name, status = %output.status_label(), "Step failed");
        return Err(OmsError::step_failed(
            name,
            format!("{}, see {}", output.status_label(), log.display()),
        ));
    }

    console::success(format!("{} done", name));
    Ok(())
}

/// Package the backend and build the frontend bundle
pub async fn build(ctx: &Context) -> Result<()> {
    let backend = ctx.backend_dir();
    let frontend = ctx.frontend_dir();
    ctx.require_dir("Backend", &backend)?;
    ctx.require_dir("Frontend", &frontend)?;

    console::header("Building applications");
    run_step(
        ctx,
        "backend-build",
        CommandSpec::new("mvn")
            .args(["clean", "package", "-DskipTests"])
            .current_dir(&backend),
    )
    .await?;
    run_step(
        ctx,
        "frontend-install",
        CommandSpec::new("npm").arg("install").current_dir(&frontend),
    )
    .await?;
    run_step(
        ctx,
        "frontend-build",
        CommandSpec::new("npm").args(["run", "build"]).current_dir(&frontend),
    )
    .await?;

    info!("Build complete");
    Ok(())
}

/// Run both test suites
pub async fn test(ctx: &Context) -> Result<()> {
    let backend = ctx.backend_dir();
    let frontend = ctx.frontend_dir();
    ctx.require_dir("Backend", &backend)?;
    ctx.require_dir("Frontend", &frontend)?;

    console::header("Running tests");
    run_step(
        ctx,
        "backend-test",
        CommandSpec::new("mvn").arg("test").current_dir(&backend),
    )
    .await?;
    run_step(
        ctx,
        "frontend-test",
        CommandSpec::new("npm")
            .args(["test", "--", "--watchAll=false"])
            .env("CI", "true")
            .current_dir(&frontend),
    )
    .await?;

    info!("Tests passed");
    Ok(())
}

/// Launch the backend, wait for it to come up, then launch the frontend.
///
/// Any previously recorded pair is stopped first. The record is rewritten
/// after each launch so an interrupted run never leaves a process untracked.
pub async fn start(ctx: &Context) -> Result<ProcessRecord> {
    let backend = ctx.backend_dir();
    let frontend = ctx.frontend_dir();
    ctx.require_dir("Backend", &backend)?;
    ctx.require_dir("Frontend", &frontend)?;

    let pid_path = ctx.pid_path();
    if ProcessRecord::load(&pid_path)?.is_some() {
        console::info("Stopping previously started processes");
        stop(ctx).await?;
    }

    console::header("Starting applications");
    let local = &ctx.config().local;
    let resources = ResourceState::load(&ctx.state_path())?;
    if resources.is_empty() {
        console::warning("No provisioned resources recorded; run `omsctl setup` first");
    }

    let backend_spec = backend_command(ctx, &resources).current_dir(&backend);
    let backend_log = ctx.log_path("backend");
    ctx.check_interrupted("the backend was launched")?;
    let backend_pid = ctx.runner().spawn_detached(&backend_spec, &backend_log).await?;
    let mut record = ProcessRecord {
        backend_pid: Some(backend_pid),
        frontend_pid: None,
        started_at: Some(Utc::now()),
    };
    record.save(&pid_path)?;
    info!(pid = backend_pid, log = %backend_log.display(), "Backend started");
    console::success(format!(
        "Backend started (PID {}), logging to {}",
        backend_pid,
        backend_log.display()
    ));

    let delay = Duration::from_secs(local.startup_delay_secs);
    if !delay.is_zero() {
        console::info(format!("Waiting {}s for the backend to come up", local.startup_delay_secs));
    }
    if !ctx.shutdown().sleep(delay).await {
        warn!(pid = backend_pid, "Startup interrupted, terminating backend");
        if let Err(e) = ctx.runner().terminate(backend_pid).await {
            warn!(pid = backend_pid, error = %e, "Failed to terminate backend");
        }
        ProcessRecord::clear(&pid_path)?;
        return Err(OmsError::Interrupted("startup cancelled before the frontend was launched".to_string()));
    }

    let frontend_spec = CommandSpec::new("npm")
        .arg("start")
        .env("PORT", local.frontend_port.to_string())
        .env("BROWSER", "none")
        .env("REACT_APP_API_URL", format!("http://localhost:{}", local.backend_port))
        .current_dir(&frontend);
    let frontend_log = ctx.log_path("frontend");
    let frontend_pid = match ctx.runner().spawn_detached(&frontend_spec, &frontend_log).await {
        Ok(pid) => pid,
        Err(e) => {
            console::warning(format!("Frontend failed to start; backend (PID {}) is still running", backend_pid));
            return Err(e);
        }
    };
    record.frontend_pid = Some(frontend_pid);
    record.save(&pid_path)?;
    info!(pid = frontend_pid, log = %frontend_log.display(), "Frontend started");
    console::success(format!(
        "Frontend started (PID {}), logging to {}",
        frontend_pid,
        frontend_log.display()
    ));

    println!();
    println!("  Backend:   http://localhost:{}", local.backend_port);
    println!("  Frontend:  http://localhost:{}", local.frontend_port);
    println!("  Stop with: omsctl stop");
    Ok(record)
}

fn backend_command(ctx: &Context, resources: &ResourceState) -> CommandSpec {
    let config = ctx.config();
    let region = resources.region.clone().unwrap_or_else(|| config.aws.region.clone());
    let table = resources
        .table_name
        .clone()
        .unwrap_or_else(|| config.aws.table_name.clone());

    CommandSpec::new("mvn")
        .arg("spring-boot:run")
        .env("AWS_REGION", region)
        .env("DYNAMODB_TABLE_NAME", table)
        .env("S3_BUCKET_NAME", resources.bucket_name.clone().unwrap_or_default())
        .env("SNS_TOPIC_ARN", resources.topic_arn.clone().unwrap_or_default())
        .env("SERVER_PORT", config.local.backend_port.to_string())
}

/// Terminate the recorded processes and delete the record.
///
/// Nothing recorded is not an error. If a live process cannot be terminated
/// the record is kept so a later `stop` can retry.
pub async fn stop(ctx: &Context) -> Result<()> {
    let pid_path = ctx.pid_path();
    let Some(record) = ProcessRecord::load(&pid_path)? else {
        console::info("No running applications recorded");
        return Ok(());
    };

    console::header("Stopping applications");
    let mut failures = Vec::new();
    for (role, pid) in record.pids() {
        if !ctx.runner().is_alive(pid).await {
            debug!(role, pid, "Process already exited");
            console::info(format!("{} (PID {}) is not running", role, pid));
            continue;
        }
        match ctx.runner().terminate(pid).await {
            Ok(()) => {
                info!(role, pid, "Process terminated");
                console::success(format!("Stopped {} (PID {})", role, pid));
            }
            Err(e) => {
                warn!(role, pid, error = %e, "Failed to terminate process");
                failures.push(format!("{} (PID {}): {}", role, pid, e));
            }
        }
    }

    if failures.is_empty() {
        ProcessRecord::clear(&pid_path)?;
        Ok(())
    } else {
        Err(OmsError::Process(format!(
            "Failed to stop {}; record kept at {}",
            failures.join(", "),
            pid_path.display()
        )))
    }
}

/// Stop everything, then remove the step and run logs
pub async fn clean(ctx: &Context) -> Result<()> {
    stop(ctx).await?;

    console::header("Cleaning up");
    let log_dir = ctx.log_dir();
    let mut removed = 0;
    for name in LOG_NAMES {
        let path = ctx.log_path(name);
        if remove_if_present(&path)? {
            debug!(path = %path.display(), "Removed log");
            removed += 1;
        }
    }
    if log_dir != ctx.root() && is_empty_dir(&log_dir) {
        fs::remove_dir(&log_dir)?;
    }

    console::success(format!("Removed {} log file(s)", removed));
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
