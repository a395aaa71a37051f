//! Environment variable access
//!
//! Reads go through [`EnvSource`] so credential checks and `${VAR}` expansion
//! can be exercised without touching the process environment.

use crate::error::{OmsError, Result};
use std::collections::HashMap;

/// Variables that must be set and non-empty before `deploy` does anything.
pub const CREDENTIAL_VARS: [&str; 2] = ["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"];

/// Source of environment variables
pub trait EnvSource: Send + Sync {
    /// Value of `key`, or `None` when unset or not valid unicode
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed set of variables, used by tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    vars: HashMap<String, String>,
}

impl StaticEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl EnvSource for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Check that every credential variable is present and non-empty.
///
/// All missing names are reported together.
pub fn require_credentials(env: &dyn EnvSource) -> Result<()> {
    let missing: Vec<String> = CREDENTIAL_VARS
        .iter()
        .filter(|key| {
            env.var(key)
                .map(|value| value.trim().is_empty())
                .unwrap_or(true)
        })
        .map(|key| key.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(OmsError::MissingCredentials(missing))
    }
}

/// Expand a whole-value `${VAR_NAME}` reference.
///
/// Values that are not a single reference, or reference an unset variable,
/// are returned unchanged.
pub fn expand_var(value: &str, env: &dyn EnvSource) -> String {
    match value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(name) if !name.is_empty() => env.var(name).unwrap_or_else(|| value.to_string()),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_present() {
        let env = StaticEnv::new()
            .with("AWS_ACCESS_KEY_ID", "AKIA")
            .with("AWS_SECRET_ACCESS_KEY", "secret");
        assert!(require_credentials(&env).is_ok());
    }

    #[test]
    fn test_credentials_all_missing_reported_together() {
        let err = require_credentials(&StaticEnv::new()).unwrap_err();
        match err {
            OmsError::MissingCredentials(names) => {
                assert_eq!(names, vec!["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_credential_counts_as_missing() {
        let env = StaticEnv::new()
            .with("AWS_ACCESS_KEY_ID", "AKIA")
            .with("AWS_SECRET_ACCESS_KEY", "   ");
        match require_credentials(&env) {
            Err(OmsError::MissingCredentials(names)) => {
                assert_eq!(names, vec!["AWS_SECRET_ACCESS_KEY"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_expand_var() {
        let env = StaticEnv::new().with("REGION", "eu-west-1");
        assert_eq!(expand_var("${REGION}", &env), "eu-west-1");
        assert_eq!(expand_var("${UNSET}", &env), "${UNSET}");
        assert_eq!(expand_var("plain", &env), "plain");
        assert_eq!(expand_var("${}", &env), "${}");
    }
}
