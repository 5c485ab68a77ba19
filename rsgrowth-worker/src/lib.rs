//! Daily growth worker: lists plots, analyses each one and stores new results.

pub mod config;
pub mod registry;
pub mod runner;
pub mod store;
pub mod supabase;

pub use config::WorkerConfig;
pub use runner::{run_once, RunReport};
