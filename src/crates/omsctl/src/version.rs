//! Version reported by `omsctl version` and `--version`
//!
//! Build number, git commit and build timestamp are injected by `build.rs`;
//! a local build reports build `0` and commit `unknown`.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const BUILD_NUMBER: &str = env!("OMSCTL_BUILD_NUMBER");
pub const GIT_COMMIT: &str = env!("OMSCTL_GIT_COMMIT");
pub const BUILD_TIMESTAMP: &str = env!("OMSCTL_BUILD_TIMESTAMP");

/// One line, e.g.
/// `omsctl 0.1.0 (commit abc123, build 42, built 2025-01-15T10:30:00Z, linux/x86_64)`
pub fn full_version() -> String {
    VersionInfo::get().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: &'static str,
    pub build_number: &'static str,
    pub git_commit: &'static str,
    pub build_timestamp: &'static str,
    /// `os/arch` the binary was compiled for
    pub platform: String,
}

impl VersionInfo {
    pub fn get() -> Self {
        Self {
            version: VERSION,
            build_number: BUILD_NUMBER,
            git_commit: GIT_COMMIT,
            build_timestamp: BUILD_TIMESTAMP,
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "omsctl {} (commit {}, build {}, built {}, {})",
            self.version, self.git_commit, self.build_number, self.build_timestamp, self.platform
        )
    }
}
