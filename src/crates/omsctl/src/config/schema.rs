//! Configuration schema for omsctl

use crate::env::{expand_var, EnvSource};
use serde::{Deserialize, Serialize};

/// Main omsctl configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OmsConfig {
    /// Project layout and local file names
    #[serde(default)]
    pub project: ProjectConfig,

    /// Cloud resource names
    #[serde(default)]
    pub aws: AwsConfig,

    /// Local run settings
    #[serde(default)]
    pub local: LocalConfig,

    /// Deployment settings
    #[serde(default)]
    pub deploy: DeployConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the two projects live and where omsctl keeps its files.
///
/// Relative paths resolve against the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Maven project of the order service
    pub backend_dir: String,

    /// npm project of the order UI
    pub frontend_dir: String,

    /// Directory receiving build and run logs
    pub log_dir: String,

    /// File holding generated resource identifiers
    pub state_file: String,

    /// File holding the PIDs of the last started pair
    pub pid_file: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            backend_dir: "order-service".to_string(),
            frontend_dir: "order-ui".to_string(),
            log_dir: "logs".to_string(),
            state_file: ".aws-resources".to_string(),
            pid_file: ".oms-pids".to_string(),
        }
    }
}

/// AWS resource configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Region passed to every `aws` call
    pub region: String,

    /// DynamoDB table holding orders
    pub table_name: String,

    /// Hash key attribute of the orders table
    pub table_key: String,

    /// Prefix of the generated upload bucket name
    pub bucket_prefix: String,

    /// SNS topic for order notifications
    pub topic_name: String,

    /// Origins allowed by the bucket CORS rule
    pub cors_origins: Vec<String>,

    /// Abort `setup` on any failed call other than "already exists"
    pub strict: bool,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            table_name: "Orders".to_string(),
            table_key: "orderId".to_string(),
            bucket_prefix: "order-management-files".to_string(),
            topic_name: "order-notifications".to_string(),
            cors_origins: vec!["*".to_string()],
            strict: false,
        }
    }
}

/// Local run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Port the order service listens on
    pub backend_port: u16,

    /// Port of the UI dev server
    pub frontend_port: u16,

    /// Seconds to wait after starting the backend before starting the frontend
    pub startup_delay_secs: u64,

    /// Executables that must be on the search path
    pub required_tools: Vec<String>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            backend_port: 8080,
            frontend_port: 3000,
            startup_delay_secs: 15,
            required_tools: ["java", "mvn", "node", "npm", "aws"]
                .iter()
                .map(|tool| tool.to_string())
                .collect(),
        }
    }
}

/// Deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Platform deployment executable for the backend
    pub tool: String,

    /// Elastic Beanstalk environment receiving the backend
    pub environment: String,

    /// Bucket hosting the built UI; defaults to the provisioned bucket
    pub frontend_bucket: Option<String>,

    /// Build output directory of the UI, relative to the frontend dir
    pub frontend_build_dir: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            tool: "eb".to_string(),
            environment: "order-service-env".to_string(),
            frontend_bucket: None,
            frontend_build_dir: "build".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl OmsConfig {
    /// Resolve `${VAR_NAME}` references in string values that commonly come
    /// from the environment
    pub fn resolve_env_vars(&mut self, env: &dyn EnvSource) {
        self.aws.region = expand_var(&self.aws.region, env);
        self.aws.table_name = expand_var(&self.aws.table_name, env);
        self.aws.topic_name = expand_var(&self.aws.topic_name, env);
        self.deploy.environment = expand_var(&self.deploy.environment, env);
        if let Some(ref bucket) = self.deploy.frontend_bucket {
            self.deploy.frontend_bucket = Some(expand_var(bucket, env));
        }
    }

    /// Tools needed by `deploy`: the local set plus the deployment tool
    pub fn deploy_tools(&self) -> Vec<String> {
        let mut tools = self.local.required_tools.clone();
        if !tools.contains(&self.deploy.tool) {
            tools.push(self.deploy.tool.clone());
        }
        tools
    }
}

/// Merge a parsed config file into `base`, key by key. Nested tables merge
/// recursively; any other value in `overlay` replaces the one in `base`.
///
/// The loader handles priority: user file, then project file
pub fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StaticEnv;

    #[test]
    fn test_default_config() {
        let config = OmsConfig::default();
        assert_eq!(config.project.backend_dir, "order-service");
        assert_eq!(config.project.frontend_dir, "order-ui");
        assert_eq!(config.aws.table_name, "Orders");
        assert_eq!(config.aws.table_key, "orderId");
        assert_eq!(config.local.startup_delay_secs, 15);
        assert!(!config.aws.strict);
        assert_eq!(config.local.required_tools, vec!["java", "mvn", "node", "npm", "aws"]);
    }

    #[test]
    fn test_merge_values_keeps_keys_from_both_sides() {
        let mut base: toml::Value =
            toml::from_str("[aws]\nregion = \"eu-west-1\"\ntopic_name = \"user-topic\"\n[local]\nstartup_delay_secs = 2\n")
                .unwrap();
        let overlay: toml::Value =
            toml::from_str("[aws]\nregion = \"eu-central-1\"\ncors_origins = [\"https://shop.example\"]\n").unwrap();

        merge_values(&mut base, overlay);
        let config: OmsConfig = base.try_into().unwrap();

        assert_eq!(config.aws.region, "eu-central-1");
        assert_eq!(config.aws.topic_name, "user-topic");
        assert_eq!(config.aws.cors_origins, vec!["https://shop.example"]);
        assert_eq!(config.aws.table_name, "Orders");
        assert_eq!(config.local.startup_delay_secs, 2);
    }

    #[test]
    fn test_merge_values_replaces_arrays_whole() {
        let mut base: toml::Value = toml::from_str("[local]\nrequired_tools = [\"java\", \"mvn\"]\n").unwrap();
        let overlay: toml::Value = toml::from_str("[local]\nrequired_tools = [\"node\"]\n").unwrap();

        merge_values(&mut base, overlay);
        let config: OmsConfig = base.try_into().unwrap();

        assert_eq!(config.local.required_tools, vec!["node"]);
    }

    #[test]
    fn test_partial_section_keeps_field_defaults() {
        let toml = r#"
            [aws]
            region = "ap-south-1"

            [local]
            startup_delay_secs = 0
        "#;
        let config: OmsConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.aws.region, "ap-south-1");
        assert_eq!(config.aws.topic_name, "order-notifications");
        assert_eq!(config.local.startup_delay_secs, 0);
        assert_eq!(config.local.backend_port, 8080);
        assert_eq!(config.deploy.tool, "eb");
    }

    #[test]
    fn test_env_var_expansion() {
        let mut config = OmsConfig::default();
        config.aws.region = "${OMS_REGION}".to_string();
        config.deploy.frontend_bucket = Some("${UI_BUCKET}".to_string());

        let env = StaticEnv::new()
            .with("OMS_REGION", "us-west-2")
            .with("UI_BUCKET", "oms-ui");
        config.resolve_env_vars(&env);

        assert_eq!(config.aws.region, "us-west-2");
        assert_eq!(config.deploy.frontend_bucket.as_deref(), Some("oms-ui"));
    }

    #[test]
    fn test_deploy_tools_appends_deploy_tool_once() {
        let mut config = OmsConfig::default();
        assert_eq!(config.deploy_tools().last().map(String::as_str), Some("eb"));

        config.local.required_tools.push("eb".to_string());
        let tools = config.deploy_tools();
        assert_eq!(tools.iter().filter(|t| t.as_str() == "eb").count(), 1);
    }
}
