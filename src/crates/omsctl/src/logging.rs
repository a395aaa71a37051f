//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Filter directive for the run: `RUST_LOG` when set, else `debug` when
/// verbose, else the configured level
pub fn filter_directive(configured: &str, verbose: bool, rust_log: Option<&str>) -> String {
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive.to_string(),
        _ if verbose => "debug".to_string(),
        _ => configured.to_string(),
    }
}

/// Install the global subscriber, writing compact lines to stderr.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(configured: &str, verbose: bool) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(configured, verbose, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins() {
        assert_eq!(filter_directive("warn", true, Some("omsctl=trace")), "omsctl=trace");
    }

    #[test]
    fn test_verbose_over_configured() {
        assert_eq!(filter_directive("warn", true, None), "debug");
        assert_eq!(filter_directive("warn", true, Some("  ")), "debug");
    }

    #[test]
    fn test_configured_default() {
        assert_eq!(filter_directive("info", false, None), "info");
    }
}
