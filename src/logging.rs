use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize structured logging with tracing.
/// This should be called once at startup by the embedding service.
pub fn init_logging() {
    if let Err(e) = try_init_logging() {
        tracing::warn!(error = %e, "Global tracing subscriber already set");
        return;
    }
    tracing::info!("Structured logging initialized");
}

/// Install the JSON subscriber, reporting failure instead of panicking
/// when a global subscriber already exists.
pub fn try_init_logging() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let subscriber = tracing_subscriber::registry()
        .with(filter())
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .json()
        );

    tracing::subscriber::set_global_default(subscriber)
}
