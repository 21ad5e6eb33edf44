//! Disk-backed fragment cache.
//!
//! One file per registered type, `<Type>.graphql`, in the fragments
//! directory. Files are read if present and generated from the remote
//! schema otherwise. An existing file is never rewritten, so hand edits
//! are honored on later runs.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::generate::default_fragment_text;
use super::FragmentProvider;
use crate::error::{Error, Result};
use crate::schema::RemoteSchema;

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a temporary file next to the target
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let temp_path = path.with_extension("graphql.tmp");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Whether a fragment file was already there or has just been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentFileStatus {
    Existing,
    Generated,
}

/// A fragment file and its status, as reported by [`DiskFragmentCache::ensure`].
#[derive(Debug, Clone, Serialize)]
pub struct FragmentFile {
    pub remote_type: String,
    pub path: PathBuf,
    pub status: FragmentFileStatus,
}

/// Read-or-generate fragment cache in a directory.
pub struct DiskFragmentCache<'a> {
    dir: PathBuf,
    schema: &'a RemoteSchema,
}

impl<'a> DiskFragmentCache<'a> {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, schema: &'a RemoteSchema) -> Self {
        Self {
            dir: dir.into(),
            schema,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for `remote_type`.
    #[must_use]
    pub fn path_for(&self, remote_type: &str) -> PathBuf {
        self.dir.join(format!("{remote_type}.graphql"))
    }

    /// Make sure a file exists for every type, generating missing ones.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read, generated or written.
    pub fn ensure<'n>(&self, remote_types: impl IntoIterator<Item = &'n str>) -> Result<Vec<FragmentFile>> {
        remote_types
            .into_iter()
            .map(|remote_type| {
                let (_, status) = self.read_or_generate(remote_type)?;
                Ok(FragmentFile {
                    remote_type: remote_type.to_string(),
                    path: self.path_for(remote_type),
                    status,
                })
            })
            .collect()
    }

    fn read_or_generate(&self, remote_type: &str) -> Result<(String, FragmentFileStatus)> {
        let path = self.path_for(remote_type);

        if path.exists() {
            let text = fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Failed to read fragment file {}: {e}", path.display()))
            })?;
            debug!(remote_type, path = %path.display(), "Using cached fragment");
            return Ok((text, FragmentFileStatus::Existing));
        }

        let text = default_fragment_text(self.schema, remote_type)?;
        atomic_write(&path, &text)?;
        info!(remote_type, path = %path.display(), "Generated default fragment");
        Ok((text, FragmentFileStatus::Generated))
    }
}

impl FragmentProvider for DiskFragmentCache<'_> {
    fn get_fragment(&self, remote_type: &str) -> Result<String> {
        self.read_or_generate(remote_type).map(|(text, _)| text)
    }
}
