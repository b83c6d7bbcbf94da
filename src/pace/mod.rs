pub mod model;
pub mod store;

pub use model::{PaceEntry, PaceRounding, PaceTable, DEFAULT_ALPHA, DEFAULT_PACE_FACTOR};
pub use store::PaceStore;
