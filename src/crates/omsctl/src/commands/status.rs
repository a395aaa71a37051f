//! Status report (`omsctl status`)
//!
//! Read-only view of the recorded processes, provisioned resources and
//! required tools.

use crate::context::Context;
use crate::error::{OmsError, Result};
use crate::prereq::{survey, ToolStatus};
use crate::state::{ProcessRecord, ResourceState};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

/// One recorded process and whether it is still running
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    pub role: String,
    pub pid: u32,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub processes: Vec<ProcessStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub resources: ResourceState,
    pub tools: Vec<ToolStatus>,
}

impl StatusReport {
    pub fn missing_tools(&self) -> Vec<&str> {
        self.tools
            .iter()
            .filter(|tool| !tool.is_installed())
            .map(|tool| tool.name.as_str())
            .collect()
    }
}

#[derive(Tabled)]
struct ProcessRow {
    #[tabled(rename = "Process")]
    role: String,
    #[tabled(rename = "PID")]
    pid: u32,
    #[tabled(rename = "State")]
    state: String,
}

#[derive(Tabled)]
struct ToolRow {
    #[tabled(rename = "Tool")]
    name: String,
    #[tabled(rename = "Path")]
    path: String,
}

/// Collect the report without changing anything
pub async fn collect(ctx: &Context) -> Result<StatusReport> {
    let record = ProcessRecord::load(&ctx.pid_path())?.unwrap_or_default();
    let mut processes = Vec::new();
    for (role, pid) in record.pids() {
        processes.push(ProcessStatus {
            role: role.to_string(),
            pid,
            running: ctx.runner().is_alive(pid).await,
        });
    }

    Ok(StatusReport {
        processes,
        started_at: record.started_at,
        resources: ResourceState::load(&ctx.state_path())?,
        tools: survey(ctx.locator(), &ctx.config().deploy_tools()),
    })
}

/// Print the report as tables, or as JSON when `json` is set
pub async fn status(ctx: &Context, json: bool) -> Result<StatusReport> {
    let report = collect(ctx).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| OmsError::Other(format!("Failed to render status: {}", e)))?;
        println!("{}", rendered);
        return Ok(report);
    }

    println!("{}", "Processes".bold());
    if report.processes.is_empty() {
        println!("  {}", "none recorded".dimmed());
    } else {
        let rows: Vec<ProcessRow> = report
            .processes
            .iter()
            .map(|p| ProcessRow {
                role: p.role.clone(),
                pid: p.pid,
                state: if p.running { "running".to_string() } else { "exited".to_string() },
            })
            .collect();
        println!("{}", Table::new(rows));
        if let Some(started_at) = report.started_at {
            println!("  started {}", started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }

    println!();
    println!("{}", "Resources".bold());
    let unset = || "(not provisioned)".dimmed().to_string();
    let resources = &report.resources;
    println!("  Region:  {}", resources.region.clone().unwrap_or_else(unset));
    println!("  Table:   {}", resources.table_name.clone().unwrap_or_else(unset));
    println!("  Bucket:  {}", resources.bucket_name.clone().unwrap_or_else(unset));
    println!("  Topic:   {}", resources.topic_arn.clone().unwrap_or_else(unset));

    println!();
    println!("{}", "Tools".bold());
    let rows: Vec<ToolRow> = report
        .tools
        .iter()
        .map(|tool| ToolRow {
            name: tool.name.clone(),
            path: tool
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "missing".to_string()),
        })
        .collect();
    println!("{}", Table::new(rows));

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OmsConfig;
    use crate::context::ContextBuilder;
    use crate::testing::{FakeLocator, ScriptedRunner};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_collect_reports_liveness_and_tools() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.adopt_process(7);
        let ctx = ContextBuilder::new()
            .with_config(OmsConfig::default())
            .with_root(temp_dir.path())
            .with_runner(runner)
            .with_locator(Arc::new(FakeLocator::all_default().without("eb")))
            .build()
            .await
            .unwrap();
        ProcessRecord {
            backend_pid: Some(7),
            frontend_pid: Some(8),
            started_at: None,
        }
        .save(&ctx.pid_path())
        .unwrap();

        let report = collect(&ctx).await.unwrap();

        assert_eq!(
            report.processes,
            vec![
                ProcessStatus { role: "backend".to_string(), pid: 7, running: true },
                ProcessStatus { role: "frontend".to_string(), pid: 8, running: false },
            ]
        );
        assert_eq!(report.missing_tools(), vec!["eb"]);
        assert!(report.resources.is_empty());
    }

    #[tokio::test]
    async fn test_collect_does_not_run_commands() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let ctx = ContextBuilder::new()
            .with_config(OmsConfig::default())
            .with_root(temp_dir.path())
            .with_runner(runner.clone())
            .with_locator(Arc::new(FakeLocator::all_default()))
            .build()
            .await
            .unwrap();

        let report = collect(&ctx).await.unwrap();

        assert!(report.processes.is_empty());
        assert!(runner.is_empty());
    }
}
