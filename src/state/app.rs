use std::sync::Arc;
use parking_lot::RwLock;
use crate::config::EngineConfig;
use crate::error::StudyError;
use crate::metrics::Metrics;
use crate::pace::PaceStore;

/// Engine-wide state container.
/// Shared mutable state lives here and is passed explicitly to handlers.
#[derive(Clone)]
pub struct AppState {
    /// Active configuration; swapped wholesale on reload
    pub config: Arc<RwLock<EngineConfig>>,
    /// Per-(owner, subject) pace factors
    pub pace: Arc<PaceStore>,
    pub metrics: Metrics,
}

impl AppState {
    /// Open the pace store at the configured location.
    pub async fn open(config: EngineConfig) -> Result<Self, StudyError> {
        config.validate()?;
        let pace = match config.store_path.as_ref() {
            Some(path) => PaceStore::open(path.clone(), config.pace.rounding).await?,
            None => PaceStore::in_memory(config.pace.rounding),
        };
        Ok(Self::with_store(config, pace))
    }

    /// State whose pace store never touches disk.
    pub fn in_memory(config: EngineConfig) -> Self {
        let pace = PaceStore::in_memory(config.pace.rounding);
        Self::with_store(config, pace)
    }

    fn with_store(config: EngineConfig, pace: PaceStore) -> Self {
        AppState {
            config: Arc::new(RwLock::new(config)),
            pace: Arc::new(pace),
            metrics: Metrics::new(),
        }
    }

    /// Copy of the current configuration.
    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// Replace policy settings. The pace store keeps its location and
    /// rounding mode until the state is reopened.
    pub fn reload_config(&self, config: EngineConfig) -> Result<(), StudyError> {
        config.validate()?;
        if config.store_path.as_deref() != self.pace.path() {
            tracing::warn!(
                new_path = ?config.store_path,
                "store_path changes take effect on next open"
            );
        }
        *self.config.write() = config;
        tracing::info!("Engine config reloaded");
        Ok(())
    }
}
