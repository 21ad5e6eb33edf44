//! Field-selection fragments per remote entity type.
//!
//! The compiler asks a [`FragmentProvider`] for the fragment text of each
//! registered type. [`DiskFragmentCache`] reads it from
//! `<fragments_dir>/<Type>.graphql`, generating a default from the remote
//! schema the first time; [`MemoryFragments`] serves fixed text.

mod disk;
mod generate;

pub use disk::{atomic_write, DiskFragmentCache, FragmentFile, FragmentFileStatus};
pub use generate::{default_fragment, default_fragment_text, MAX_DEPTH};

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::schema::RemoteSchema;

/// Supplies the field-selection fragment text for a remote type.
pub trait FragmentProvider {
    /// Fragment document for `remote_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text can be neither read nor generated.
    fn get_fragment(&self, remote_type: &str) -> Result<String>;
}

/// In-memory fragments, optionally falling back to schema-generated defaults.
#[derive(Debug, Clone, Default)]
pub struct MemoryFragments {
    fragments: HashMap<String, String>,
    schema: Option<RemoteSchema>,
}

impl MemoryFragments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate defaults from `schema` for types without explicit text.
    #[must_use]
    pub fn generated(schema: &RemoteSchema) -> Self {
        Self {
            fragments: HashMap::new(),
            schema: Some(schema.clone()),
        }
    }

    #[must_use]
    pub fn with(mut self, remote_type: &str, text: &str) -> Self {
        self.fragments
            .insert(remote_type.to_string(), text.to_string());
        self
    }
}

impl FragmentProvider for MemoryFragments {
    fn get_fragment(&self, remote_type: &str) -> Result<String> {
        if let Some(text) = self.fragments.get(remote_type) {
            return Ok(text.clone());
        }
        match &self.schema {
            Some(schema) => default_fragment_text(schema, remote_type),
            None => Err(Error::Config(format!("No fragment provided for {remote_type}"))),
        }
    }
}
