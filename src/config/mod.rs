// src/config/mod.rs

//! Task graph configuration.
//!
//! - [`model`] mirrors the TOML layout (`[scheduler]`, `[task.<name>]`).
//! - [`loader`] reads a file and runs validation.
//! - [`validate`] checks references and cycles with `petgraph`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConditionKind, GraphFile, RawGraphFile, SchedulerSection, TaskConfig};
