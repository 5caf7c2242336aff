// logging.rs

use anyhow::Result;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// `RUST_LOG` always wins; otherwise falls back to the configured
/// `exporter.log_level`.
pub fn init_logging(default_level: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    Ok(())
}
