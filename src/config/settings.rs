//! Settings file and run configuration.
//!
//! Settings are kept in `~/.nacelle/config.json`. A [`SourceConfig`] is
//! resolved per invocation from command-line flags and environment (both
//! handled by clap), then the settings file, then defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::global_nacelle_dir;
use crate::error::{Error, Result};

/// Name of the remote source, used in error context.
pub const SOURCE_NAME: &str = "Nacelle";

pub const DEFAULT_ENDPOINT: &str = "https://hailfrequency.com/v2/graphql";

/// Prefix of local node types, `Nacelle` + `Product`.
pub const DEFAULT_TYPE_PREFIX: &str = "Nacelle";

/// Fragment cache directory, relative to the working directory.
pub const DEFAULT_FRAGMENTS_DIR: &str = "gql-fragments";

/// Contents of `config.json`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragments_dir: Option<PathBuf>,
}

impl Settings {
    /// Overlay the keys set in `other` onto these settings.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            space_id: other.space_id.or(self.space_id),
            access_token: other.access_token.or(self.access_token),
            verbose: other.verbose.or(self.verbose),
            endpoint: other.endpoint.or(self.endpoint),
            type_prefix: other.type_prefix.or(self.type_prefix),
            fragments_dir: other.fragments_dir.or(self.fragments_dir),
        }
    }

    /// Copy with the access token masked, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            access_token: self.access_token.as_deref().map(mask),
            ..self.clone()
        }
    }
}

fn mask(token: &str) -> String {
    let visible: String = token.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    if token.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("****{visible}")
    }
}

/// Get the settings file path.
///
/// # Errors
///
/// Returns `Config` if the home directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    global_nacelle_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Load settings from the global settings file.
///
/// # Errors
///
/// Returns `Config` if the file exists but cannot be read or parsed.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&config_path()?)
}

/// Load settings from `path`; a missing file yields defaults.
///
/// # Errors
///
/// Returns `Config` if the file exists but cannot be read or parsed.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Save settings to the global settings file.
///
/// # Errors
///
/// Returns `Config` if the file cannot be written.
pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&config_path()?, settings)
}

/// Save settings to `path`, creating its directory.
///
/// # Errors
///
/// Returns `Config` if the file cannot be written.
pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))
}

/// Delete the global settings file. Returns whether one existed.
///
/// # Errors
///
/// Returns `Config` if the file exists but cannot be removed.
pub fn reset_settings() -> Result<bool> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(&path)
        .map_err(|e| Error::Config(format!("Failed to remove config file: {e}")))?;
    Ok(true)
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct SourceOverrides {
    pub space_id: Option<String>,
    pub access_token: Option<String>,
    pub endpoint: Option<String>,
    pub type_prefix: Option<String>,
    pub fragments_dir: Option<PathBuf>,
    pub verbose: bool,
}

/// Fully resolved configuration of one sourcing invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub space_id: String,
    pub access_token: String,
    /// Log every operation name and its variables.
    pub verbose: bool,
    pub endpoint: String,
    pub type_prefix: String,
    pub fragments_dir: PathBuf,
}

impl SourceConfig {
    /// Resolve overrides > settings > defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no space id or access token is available.
    pub fn resolve(overrides: SourceOverrides, settings: Settings, cwd: &Path) -> Result<Self> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let space_id = non_empty(overrides.space_id)
            .or_else(|| non_empty(settings.space_id))
            .ok_or_else(|| Error::Config("Missing space id".to_string()))?;
        let access_token = non_empty(overrides.access_token)
            .or_else(|| non_empty(settings.access_token))
            .ok_or_else(|| Error::Config("Missing access token".to_string()))?;

        let fragments_dir = overrides
            .fragments_dir
            .or(settings.fragments_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FRAGMENTS_DIR));

        Ok(Self {
            space_id,
            access_token,
            verbose: overrides.verbose || settings.verbose.unwrap_or(false),
            endpoint: non_empty(overrides.endpoint)
                .or(settings.endpoint)
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            type_prefix: overrides
                .type_prefix
                .or(settings.type_prefix)
                .unwrap_or_else(|| DEFAULT_TYPE_PREFIX.to_string()),
            fragments_dir: cwd.join(fragments_dir),
        })
    }
}
