//! Tracing setup for binaries. Library crates only emit events.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor configuration sets one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` wins over `configured`, which wins over [`DEFAULT_LOG_FILTER`].
/// Calling this twice is harmless; the second call is ignored.
pub fn init_tracing(configured: Option<&str>) {
    let filter = resolve_filter(std::env::var("RUST_LOG").ok().as_deref(), configured);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_filter(from_env: Option<&str>, configured: Option<&str>) -> String {
    [from_env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|filter| !filter.is_empty())
        .unwrap_or(DEFAULT_LOG_FILTER)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_filter_wins() {
        assert_eq!(resolve_filter(Some("debug"), Some("warn")), "debug");
        assert_eq!(resolve_filter(Some("  "), Some("warn")), "warn");
        assert_eq!(resolve_filter(None, None), DEFAULT_LOG_FILTER);
    }
}
