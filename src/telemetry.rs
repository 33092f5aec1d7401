//! Tracing setup for the harness.
//!
//! The evaluator itself does not log on the hot path — every store executing
//! every tick would drown the signal. Only `step()` boundaries, scheduler
//! hand-offs, and access-checker rejections are annotated.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Install a process-global `tracing` subscriber from the given config.
///
/// Safe to call more than once; later calls are ignored (mirrors
/// `tracing::subscriber::set_global_default`'s own idempotence guard).
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    let result = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    if let Err(e) = result {
        tracing::trace!("tracing subscriber already installed: {e}");
    }
}
