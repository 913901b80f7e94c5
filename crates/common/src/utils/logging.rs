use std::io;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

/// Default directives when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,tower_http=info,axum=info";

/// Output layout of the stdout subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Install the global subscriber in the requested format.
/// - Respects `RUST_LOG` if set, otherwise uses `default_filter`
/// - Writes to stdout so container runtimes pick it up
/// - A second call is a no-op (the first subscriber wins)
pub fn init_logging(format: LogFormat, default_filter: &str) {
    match format {
        LogFormat::Compact => init_compact(default_filter),
        LogFormat::Json => init_json(default_filter),
    }
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

fn init_compact(default_filter: &str) {
    let _ = fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(false)
        .compact()
        .with_writer(io::stdout)
        .try_init();
}

fn init_json(default_filter: &str) {
    let _ = fmt()
        .with_env_filter(env_filter(default_filter))
        .with_target(true)
        .json()
        .with_writer(io::stdout)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: LogFormat,
        }
        let w: Wrapper = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(w.format, LogFormat::Json);
        let w: Wrapper = serde_json::from_str(r#"{"format":"compact"}"#).unwrap();
        assert_eq!(w.format, LogFormat::Compact);
    }

    #[test]
    fn repeated_init_does_not_panic() {
        init_logging(LogFormat::Compact, DEFAULT_FILTER);
        init_logging(LogFormat::Json, DEFAULT_FILTER);
    }
}
