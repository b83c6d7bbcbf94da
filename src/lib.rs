pub mod advisor;
pub mod config;
pub mod efficiency;
pub mod error;
pub mod goals;
pub mod logging;
pub mod metrics;
pub mod pace;
pub mod records;
pub mod routes;
pub mod state;
pub mod summary;

pub use error::{StudyError, ValidationError};
pub use state::app::AppState;

/// Bring the engine up for an embedding service: logging, process-wide
/// config, then the pace store at the configured location.
pub async fn start() -> Result<std::sync::Arc<AppState>, StudyError> {
    logging::init_logging();
    tracing::info!("study-pace engine starting");

    let config = config::get_engine_config().clone();
    let state = AppState::open(config).await?;
    tracing::info!(
        store = ?state.pace.path(),
        entries = state.pace.len().await,
        "Pace store ready"
    );

    Ok(std::sync::Arc::new(state))
}
