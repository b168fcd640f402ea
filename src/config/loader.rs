// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{GraphFile, RawGraphFile};
use crate::errors::Result;

/// Load a task graph file and return the raw, unvalidated `RawGraphFile`.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] for
/// the semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawGraphFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawGraphFile = toml::from_str(&contents)?;
    Ok(raw)
}

/// Load a task graph file and validate it:
///
/// - at least one task,
/// - no unknown or self-referencing `after` entries,
/// - no empty commands,
/// - no cycles.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GraphFile> {
    let raw = load_from_path(&path)?;
    GraphFile::try_from(raw)
}

/// `Taskqueue.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Taskqueue.toml")
}
