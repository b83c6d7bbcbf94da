pub mod engine;

pub use engine::{get_engine_config, AllocationConfig, EngineConfig, PaceConfig};
