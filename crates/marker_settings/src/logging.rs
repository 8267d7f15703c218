use tracing_subscriber::{fmt, EnvFilter};

/// Install the process-wide tracing subscriber. Level comes from
/// `MARKER_LOG` (fallback `RUST_LOG`, default `info`); set
/// `MARKER_LOG_JSON=true` for JSON output. Safe to call more than once.
pub fn init_logging() {
    let filter = std::env::var("MARKER_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    let json = std::env::var("MARKER_LOG_JSON")
        .map(|value| value == "true" || value == "1")
        .unwrap_or(false);

    let builder = fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // A second init in tests is expected; keep the first subscriber.
    let _ = result;
}
