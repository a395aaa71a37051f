//! Test doubles for the process, tool and environment seams
//!
//! - [`ScriptedRunner`] records every invocation and answers from rules
//! - [`FakeLocator`] reports a fixed set of installed tools
//! - [`crate::env::StaticEnv`] (re-exported) provides fixed variables

use crate::error::{OmsError, Result};
use crate::process::{CommandOutput, CommandSpec, ProcessRunner};
use crate::prereq::ToolLocator;
use crate::shutdown::ShutdownCoordinator;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use crate::env::StaticEnv;

/// What a recorded call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Run(CommandSpec),
    RunLogged(CommandSpec, PathBuf),
    Spawn(CommandSpec, PathBuf, u32),
    Terminate(u32),
}

impl Call {
    /// The command line of run/spawn calls
    pub fn command_line(&self) -> Option<String> {
        match self {
            Self::Run(spec) | Self::RunLogged(spec, _) | Self::Spawn(spec, _, _) => {
                Some(spec.to_string())
            }
            Self::Terminate(_) => None,
        }
    }
}

struct Rule {
    pattern: String,
    output: CommandOutput,
    remaining: Option<usize>,
}

#[derive(Default)]
struct RunnerState {
    calls: Vec<Call>,
    rules: Vec<Rule>,
    alive: HashSet<u32>,
    next_pid: u32,
    launch_failures: Vec<String>,
    interrupts: Vec<(String, ShutdownCoordinator)>,
}

/// In-memory [`ProcessRunner`].
///
/// Commands succeed with empty output unless a rule matches. A rule matches
/// when the rendered command line contains its pattern; the most recently
/// added matching rule wins.
#[derive(Default)]
pub struct ScriptedRunner {
    state: Mutex<RunnerState>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        let runner = Self::default();
        runner.state.lock().next_pid = 1000;
        runner
    }

    /// Answer every matching command with `output`
    pub fn respond(&self, pattern: &str, output: CommandOutput) -> &Self {
        self.state.lock().rules.push(Rule {
            pattern: pattern.to_string(),
            output,
            remaining: None,
        });
        self
    }

    /// Answer the next matching command with `output`, then fall through
    pub fn respond_once(&self, pattern: &str, output: CommandOutput) -> &Self {
        self.state.lock().rules.push(Rule {
            pattern: pattern.to_string(),
            output,
            remaining: Some(1),
        });
        self
    }

    /// Make matching commands fail to launch at all
    pub fn fail_launch(&self, pattern: &str) -> &Self {
        self.state.lock().launch_failures.push(pattern.to_string());
        self
    }

    /// Request shutdown on `shutdown` while a matching command runs, as a
    /// Ctrl+C arriving mid-command would
    pub fn interrupt_on(&self, pattern: &str, shutdown: &ShutdownCoordinator) -> &Self {
        self.state
            .lock()
            .interrupts
            .push((pattern.to_string(), shutdown.clone()));
        self
    }

    /// Mark a previously alive process as gone without terminating it
    pub fn exit_process(&self, pid: u32) {
        self.state.lock().alive.remove(&pid);
    }

    /// Pretend `pid` is a running process that was not started by this runner
    pub fn adopt_process(&self, pid: u32) {
        self.state.lock().alive.insert(pid);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Rendered command lines of every run/spawn call, in order
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().filter_map(Call::command_line).collect()
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                Call::Terminate(pid) => Some(*pid),
                _ => None,
            })
            .collect()
    }

    pub fn spawned(&self) -> Vec<(CommandSpec, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Spawn(spec, _, pid) => Some((spec, pid)),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().calls.is_empty()
    }

    fn answer(state: &mut RunnerState, spec: &CommandSpec) -> Result<CommandOutput> {
        let line = spec.to_string();
        for (pattern, shutdown) in &state.interrupts {
            if line.contains(pattern.as_str()) {
                shutdown.request_shutdown();
            }
        }
        if state.launch_failures.iter().any(|p| line.contains(p.as_str())) {
            return Err(OmsError::Process(format!("Failed to launch {}: not found", spec.program)));
        }

        let rule = state
            .rules
            .iter_mut()
            .rev()
            .find(|rule| rule.remaining != Some(0) && line.contains(rule.pattern.as_str()));

        match rule {
            Some(rule) => {
                if let Some(ref mut remaining) = rule.remaining {
                    *remaining -= 1;
                }
                Ok(rule.output.clone())
            }
            None => Ok(CommandOutput::ok("")),
        }
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut state = self.state.lock();
        state.calls.push(Call::Run(spec.clone()));
        Self::answer(&mut state, spec)
    }

    async fn run_logged(&self, spec: &CommandSpec, log: &Path) -> Result<CommandOutput> {
        let mut state = self.state.lock();
        state.calls.push(Call::RunLogged(spec.clone(), log.to_path_buf()));
        let output = Self::answer(&mut state, spec)?;
        drop(state);

        if let Some(parent) = log.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(log, format!("{}{}", output.stdout, output.stderr))?;
        Ok(output)
    }

    async fn spawn_detached(&self, spec: &CommandSpec, log: &Path) -> Result<u32> {
        let mut state = self.state.lock();
        let line = spec.to_string();
        if state.launch_failures.iter().any(|p| line.contains(p.as_str())) {
            state.calls.push(Call::Run(spec.clone()));
            return Err(OmsError::Process(format!("Failed to launch {}: not found", spec.program)));
        }

        let pid = state.next_pid;
        state.next_pid += 1;
        state.alive.insert(pid);
        state.calls.push(Call::Spawn(spec.clone(), log.to_path_buf(), pid));
        drop(state);

        if let Some(parent) = log.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(log, "")?;
        Ok(pid)
    }

    async fn is_alive(&self, pid: u32) -> bool {
        self.state.lock().alive.contains(&pid)
    }

    async fn terminate(&self, pid: u32) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Terminate(pid));
        state.alive.remove(&pid);
        Ok(())
    }
}

/// [`ToolLocator`] with a fixed set of installed tools
#[derive(Debug, Clone, Default)]
pub struct FakeLocator {
    installed: HashSet<String>,
}

impl FakeLocator {
    pub fn with(tools: &[&str]) -> Self {
        Self {
            installed: tools.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Every tool the default configuration asks for, plus the deploy tool
    pub fn all_default() -> Self {
        Self::with(&["java", "mvn", "node", "npm", "aws", "eb"])
    }

    pub fn without(mut self, tool: &str) -> Self {
        self.installed.remove(tool);
        self
    }
}

impl ToolLocator for FakeLocator {
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        self.installed
            .contains(tool)
            .then(|| PathBuf::from("/usr/bin").join(tool))
    }
}
