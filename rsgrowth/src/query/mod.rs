//! Lazy query descriptions: built locally, executed only by a backend.

pub mod expr;
pub mod scene;

pub use expr::{CompareOp, ImageExpr, ValueExpr, Visualization};
pub use scene::{CatalogScene, PropertyFilter, SceneQuery, SortKey};
