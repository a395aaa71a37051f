//! Operating-system backed [`ProcessRunner`]

use super::{CommandOutput, CommandSpec, ProcessRunner};
use crate::error::{OmsError, Result};
use async_trait::async_trait;
#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{kill, killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Runs commands with `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    /// Build a std command. The program is resolved on the search path first
    /// so that `npm`/`mvn` wrappers (`npm.cmd`, `mvn.cmd`) launch on Windows.
    fn std_command(spec: &CommandSpec) -> std::process::Command {
        let program = which::which(&spec.program).unwrap_or_else(|_| PathBuf::from(&spec.program));
        let mut cmd = std::process::Command::new(program);
        cmd.args(&spec.args).stdin(Stdio::null());
        if let Some(ref dir) = spec.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd
    }

    /// Open `log` for writing and return it as stdout/stderr handles
    fn log_sink(log: &Path) -> Result<(Stdio, Stdio)> {
        if let Some(parent) = log.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let out = File::create(log).map_err(|e| {
            OmsError::Process(format!("Failed to create log file {}: {}", log.display(), e))
        })?;
        let err = out.try_clone()?;
        Ok((Stdio::from(out), Stdio::from(err)))
    }

    fn launch_error(spec: &CommandSpec, err: std::io::Error) -> OmsError {
        OmsError::Process(format!("Failed to launch {}: {}", spec.program, err))
    }

    #[cfg(unix)]
    fn pid(pid: u32) -> Option<Pid> {
        i32::try_from(pid).ok().filter(|raw| *raw > 1).map(Pid::from_raw)
    }

    /// Signal 0 delivers nothing; EPERM still means the process exists.
    #[cfg(unix)]
    async fn check_alive(pid: u32) -> bool {
        let Some(pid) = Self::pid(pid) else {
            return false;
        };
        match kill(pid, None) {
            Ok(()) | Err(Errno::EPERM) => true,
            Err(Errno::ESRCH) => false,
            Err(e) => {
                warn!(pid = pid.as_raw(), error = %e, "Unexpected liveness check error");
                false
            }
        }
    }

    /// SIGTERM the process group, falling back to the single process
    #[cfg(unix)]
    fn send_terminate(pid: u32) -> bool {
        let Some(pid) = Self::pid(pid) else {
            return false;
        };
        match killpg(pid, Signal::SIGTERM) {
            Ok(()) => true,
            Err(e) => {
                debug!(pid = pid.as_raw(), error = %e, "Group signal failed, signalling process");
                kill(pid, Signal::SIGTERM).is_ok()
            }
        }
    }

    #[cfg(windows)]
    async fn check_alive(pid: u32) -> bool {
        let filter = format!("PID eq {}", pid);
        match Command::new("tasklist")
            .args(["/FI", filter.as_str(), "/NH", "/FO", "CSV"])
            .output()
            .await
        {
            Ok(output) => String::from_utf8_lossy(&output.stdout).contains(&format!("\"{}\"", pid)),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %spec, "Running");
        let output = Command::from(Self::std_command(spec))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Self::launch_error(spec, e))?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_logged(&self, spec: &CommandSpec, log: &Path) -> Result<CommandOutput> {
        debug!(command = %spec, log = %log.display(), "Running with output to log");
        let (stdout, stderr) = Self::log_sink(log)?;
        let status = Command::from(Self::std_command(spec))
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .await
            .map_err(|e| Self::launch_error(spec, e))?;

        Ok(CommandOutput {
            success: status.success(),
            code: status.code(),
            ..CommandOutput::default()
        })
    }

    async fn spawn_detached(&self, spec: &CommandSpec, log: &Path) -> Result<u32> {
        let (stdout, stderr) = Self::log_sink(log)?;
        let mut cmd = Self::std_command(spec);
        cmd.stdout(stdout).stderr(stderr);

        // Own process group, so terminate() can reach the JVM or node server
        // that mvn/npm start underneath.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        let child = cmd.spawn().map_err(|e| Self::launch_error(spec, e))?;
        let pid = child.id();
        debug!(command = %spec, pid, log = %log.display(), "Spawned background process");
        Ok(pid)
    }

    async fn is_alive(&self, pid: u32) -> bool {
        Self::check_alive(pid).await
    }

    async fn terminate(&self, pid: u32) -> Result<()> {
        if pid <= 1 {
            return Err(OmsError::Process(format!("Refusing to terminate process {}", pid)));
        }
        #[cfg(unix)]
        {
            if Self::send_terminate(pid) {
                return Ok(());
            }
        }
        #[cfg(windows)]
        {
            let killed = Command::new("taskkill")
                .args(["/PID", pid.to_string().as_str(), "/T", "/F"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(|status| status.success())
                .unwrap_or(false);
            if killed {
                return Ok(());
            }
        }

        if self.is_alive(pid).await {
            warn!(pid, "Process survived termination request");
            Err(OmsError::Process(format!("Failed to terminate process {}", pid)))
        } else {
            Ok(())
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_captures_output() {
        let runner = SystemRunner::new();
        let output = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_run_logged_writes_log() {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("logs").join("step.log");
        let output = SystemRunner::new()
            .run_logged(&CommandSpec::new("sh").args(["-c", "echo building"]), &log)
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(std::fs::read_to_string(&log).unwrap().trim(), "building");
    }

    #[tokio::test]
    async fn test_missing_program_is_process_error() {
        let err = SystemRunner::new()
            .run(&CommandSpec::new("omsctl-definitely-not-installed"))
            .await
            .unwrap_err();
        assert!(matches!(err, OmsError::Process(_)));
    }

    #[tokio::test]
    async fn test_spawn_and_terminate() {
        let temp_dir = TempDir::new().unwrap();
        let runner = SystemRunner::new();
        let pid = runner
            .spawn_detached(
                &CommandSpec::new("sh").args(["-c", "sleep 30"]),
                &temp_dir.path().join("bg.log"),
            )
            .await
            .unwrap();
        assert!(runner.is_alive(pid).await);
        runner.terminate(pid).await.unwrap();
    }

    #[tokio::test]
    async fn test_liveness_of_current_and_reserved_pids() {
        let runner = SystemRunner::new();
        assert!(runner.is_alive(std::process::id()).await);
        // init exists but is never a recorded child
        assert!(!runner.is_alive(1).await);
        assert!(!runner.is_alive(0).await);
    }

    #[tokio::test]
    async fn test_terminate_refuses_reserved_pids() {
        let runner = SystemRunner::new();
        for pid in [0, 1] {
            assert!(matches!(runner.terminate(pid).await, Err(OmsError::Process(_))));
        }
    }

    #[tokio::test]
    async fn test_exited_process_is_not_alive() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!SystemRunner::new().is_alive(pid).await);
    }
}
