//! CLI command implementations.

pub mod build;
pub mod check;

use std::path::{Path, PathBuf};

/// Resolve a configured directory against the directory holding the config file.
pub(crate) fn resolve(config_path: &Path, dir: &str) -> PathBuf {
    match config_path.parent() {
        Some(base) => base.join(dir),
        None => PathBuf::from(dir),
    }
}
