pub mod ee_collect;
pub mod expression;

pub use ee_collect::EarthEngine;
