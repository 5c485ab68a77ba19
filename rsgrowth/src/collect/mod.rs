pub mod backend;
#[cfg(feature = "earth-engine")]
pub mod earth_engine;
pub mod global_variables;
pub mod memory;

pub use backend::{Evaluation, ImageryBackend};
pub use memory::{BandSource, MemoryCatalog, SceneRecord};
