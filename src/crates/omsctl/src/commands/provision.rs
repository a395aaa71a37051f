//! Cloud resource provisioning (`omsctl setup`)
//!
//! Four independent create-or-ignore calls through the `aws` CLI: the orders
//! table, the upload bucket, the bucket CORS rule and the notification topic.
//! There is no rollback and no ordering guarantee beyond issuing them in
//! sequence. The bucket name and topic ARN are persisted to the state file.

use crate::console;
use crate::context::Context;
use crate::error::{OmsError, Result};
use crate::process::{CommandOutput, CommandSpec};
use crate::state::ResourceState;
use regex::Regex;
use serde_json::json;
use crate::config::AwsConfig;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// S3 bucket names are limited to 63 characters
const MAX_BUCKET_NAME: usize = 63;

/// A provisioned resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Table,
    Bucket,
    BucketCors,
    Topic,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "DynamoDB table"),
            Self::Bucket => write!(f, "S3 bucket"),
            Self::BucketCors => write!(f, "S3 bucket CORS"),
            Self::Topic => write!(f, "SNS topic"),
        }
    }
}

/// How one provisioning call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Created,
    AlreadyExists,
    Failed(String),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub resource: Resource,
    pub outcome: StepOutcome,
}

/// Outcome of a whole `setup` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub steps: Vec<StepResult>,
    pub state: ResourceState,
}

impl ProvisionReport {
    pub fn outcome(&self, resource: Resource) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|step| step.resource == resource)
            .map(|step| &step.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|step| step.outcome.is_failure())
    }
}

fn already_exists_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)ResourceInUseException|BucketAlreadyOwnedByYou|already exists|already own it")
            .expect("static regex is valid")
    })
}

/// Classify the result of a create call
pub fn classify(output: &CommandOutput) -> StepOutcome {
    if output.success {
        return StepOutcome::Created;
    }
    if already_exists_pattern().is_match(&output.stderr) || already_exists_pattern().is_match(&output.stdout) {
        return StepOutcome::AlreadyExists;
    }
    let detail = output
        .stderr
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no error output")
        .to_string();
    StepOutcome::Failed(format!("{}: {}", output.status_label(), detail))
}

/// Bucket to create: the recorded one, else `<prefix>-<unix seconds>`.
///
/// A prefix with nothing usable left after cleaning falls back to the
/// default prefix.
pub fn bucket_name(previous: &ResourceState, prefix: &str, unix_seconds: i64) -> String {
    if let Some(ref bucket) = previous.bucket_name {
        return bucket.clone();
    }
    let suffix = format!("-{}", unix_seconds);
    let max_prefix = MAX_BUCKET_NAME.saturating_sub(suffix.len());
    let mut cleaned = clean_prefix(prefix, max_prefix);
    if cleaned.is_empty() {
        warn!(prefix, "Bucket prefix has no usable characters, using the default");
        cleaned = clean_prefix(&AwsConfig::default().bucket_prefix, max_prefix);
    }
    format!("{}{}", cleaned, suffix)
}

/// Lowercase, map anything outside `[a-z0-9.-]` to `-`, and strip separators
/// from both ends since bucket names must start and end with a letter or digit
fn clean_prefix(prefix: &str, max_len: usize) -> String {
    let mut cleaned: String = prefix
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
        .collect();
    cleaned.truncate(max_len);
    cleaned.trim_matches(['-', '.']).to_string()
}

/// CORS rule for browser uploads and downloads
pub fn cors_configuration(origins: &[String]) -> String {
    json!({
        "CORSRules": [{
            "AllowedHeaders": ["*"],
            "AllowedMethods": ["GET", "PUT", "POST", "DELETE", "HEAD"],
            "AllowedOrigins": origins,
            "ExposeHeaders": ["ETag"],
            "MaxAgeSeconds": 3000
        }]
    })
    .to_string()
}

/// Run the four provisioning calls and persist the identifiers.
///
/// "Already exists" is never fatal. Other failures are logged and skipped,
/// unless `[aws] strict` is set.
pub async fn provision(ctx: &Context) -> Result<ProvisionReport> {
    let aws = &ctx.config().aws;
    let state_path = ctx.state_path();
    let previous = ResourceState::load(&state_path)?;
    let bucket = bucket_name(&previous, &aws.bucket_prefix, chrono::Utc::now().timestamp());

    console::header("Provisioning AWS resources");
    info!(region = %aws.region, table = %aws.table_name, bucket = %bucket, topic = %aws.topic_name, "Provisioning");

    let mut steps = Vec::with_capacity(4);
    let mut state = previous.clone();
    state.region = Some(aws.region.clone());
    state.table_name = Some(aws.table_name.clone());

    interrupt_point(ctx, &state, &state_path, "creating the table")?;
    let table = CommandSpec::new("aws")
        .args(["dynamodb", "create-table", "--table-name"])
        .arg(&aws.table_name)
        .arg("--attribute-definitions")
        .arg(format!("AttributeName={},AttributeType=S", aws.table_key))
        .arg("--key-schema")
        .arg(format!("AttributeName={},KeyType=HASH", aws.table_key))
        .args(["--billing-mode", "PAY_PER_REQUEST", "--region"])
        .arg(&aws.region);
    let (outcome, _) = run_step(ctx, Resource::Table, &aws.table_name, &table).await?;
    steps.push(StepResult { resource: Resource::Table, outcome });

    interrupt_point(ctx, &state, &state_path, "creating the bucket")?;
    let make_bucket = CommandSpec::new("aws")
        .args(["s3", "mb"])
        .arg(format!("s3://{}", bucket))
        .arg("--region")
        .arg(&aws.region);
    let (bucket_outcome, _) = run_step(ctx, Resource::Bucket, &bucket, &make_bucket).await?;
    steps.push(StepResult { resource: Resource::Bucket, outcome: bucket_outcome.clone() });
    if !bucket_outcome.is_failure() {
        state.bucket_name = Some(bucket.clone());
    }

    interrupt_point(ctx, &state, &state_path, "configuring bucket CORS")?;
    let cors = CommandSpec::new("aws")
        .args(["s3api", "put-bucket-cors", "--bucket"])
        .arg(&bucket)
        .arg("--cors-configuration")
        .arg(cors_configuration(&aws.cors_origins))
        .arg("--region")
        .arg(&aws.region);
    let (outcome, _) = run_step(ctx, Resource::BucketCors, &bucket, &cors).await?;
    steps.push(StepResult { resource: Resource::BucketCors, outcome });

    interrupt_point(ctx, &state, &state_path, "creating the topic")?;
    let topic = CommandSpec::new("aws")
        .args(["sns", "create-topic", "--name"])
        .arg(&aws.topic_name)
        .arg("--region")
        .arg(&aws.region)
        .args(["--query", "TopicArn", "--output", "text"]);
    let (mut topic_outcome, topic_output) = run_step(ctx, Resource::Topic, &aws.topic_name, &topic).await?;
    let topic_arn = topic_output
        .filter(|output| output.success)
        .map(|output| output.stdout.trim().to_string())
        .filter(|arn| !arn.is_empty() && arn != "None");
    // create-topic is idempotent upstream; seeing the recorded ARN again means
    // the topic was already there.
    if topic_arn.is_some() && topic_arn == previous.topic_arn {
        topic_outcome = StepOutcome::AlreadyExists;
    }
    steps.push(StepResult { resource: Resource::Topic, outcome: topic_outcome });

    if topic_arn.is_some() {
        state.topic_arn = topic_arn;
    }
    state.save(&state_path)?;

    let report = ProvisionReport { steps, state };
    summarize(ctx, &report);
    Ok(report)
}

/// Stop between calls once shutdown is requested, saving what exists so far
fn interrupt_point(ctx: &Context, state: &ResourceState, path: &Path, before: &str) -> Result<()> {
    if let Err(e) = ctx.check_interrupted(before) {
        state.save(path)?;
        return Err(e);
    }
    Ok(())
}

/// Issue one call. A launch failure counts as a failed step, not an error.
async fn run_step(
    ctx: &Context,
    resource: Resource,
    name: &str,
    spec: &CommandSpec,
) -> Result<(StepOutcome, Option<CommandOutput>)> {
    console::info(format!("Creating {} {}", resource, name));

    let (outcome, output) = match ctx.runner().run(spec).await {
        Ok(output) => (classify(&output), Some(output)),
        Err(e) => (StepOutcome::Failed(e.to_string()), None),
    };

    match outcome {
        StepOutcome::Created => console::success(format!("{} {} ready", resource, name)),
        StepOutcome::AlreadyExists => {
            console::warning(format!("{} {} already exists, continuing", resource, name));
        }
        StepOutcome::Failed(ref message) => {
            warn!(resource = %resource, name, error = %message, "Provisioning call failed");
            if ctx.config().aws.strict {
                return Err(OmsError::Provision(format!("{} {}: {}", resource, name, message)));
            }
            console::warning(format!("{} {} failed ({}), continuing", resource, name, message));
        }
    }

    Ok((outcome, output))
}

fn summarize(ctx: &Context, report: &ProvisionReport) {
    let failed = report.failures().count();
    if failed == 0 {
        console::success("AWS resources provisioned");
    } else {
        console::warning(format!("{} provisioning call(s) failed", failed));
    }
    if let Some(ref bucket) = report.state.bucket_name {
        println!("  S3 bucket:  {}", bucket);
    }
    if let Some(ref topic) = report.state.topic_arn {
        println!("  SNS topic:  {}", topic);
    }
    println!("  Saved to:   {}", ctx.state_path().display());
}
