//! Configuration management.
//!
//! This module provides functions for locating the nsrc directories,
//! resolving the database path, and loading the settings file.
//!
//! # Architecture
//!
//! Everything lives under a single global directory, `~/.nacelle/`:
//! - **Database**: `~/.nacelle/data/nodes.db`
//! - **Settings**: `~/.nacelle/config.json`
//!
//! Fragment files are per-project and default to `./gql-fragments`.

mod settings;

pub use settings::{
    config_path, load_settings, load_settings_from, reset_settings, save_settings,
    save_settings_to, Settings, SourceConfig, SourceOverrides, DEFAULT_ENDPOINT,
    DEFAULT_FRAGMENTS_DIR, DEFAULT_TYPE_PREFIX, SOURCE_NAME,
};

use std::path::{Path, PathBuf};

/// Get the global nsrc directory location, `~/.nacelle/`.
#[must_use]
pub fn global_nacelle_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".nacelle"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `NSRC_DB` environment variable
/// 3. Global location: `~/.nacelle/data/nodes.db`
///
/// # Returns
///
/// Returns the path to the database file, or `None` if no location found.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var("NSRC_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_nacelle_dir().map(|dir| dir.join("data").join("nodes.db"))
}
