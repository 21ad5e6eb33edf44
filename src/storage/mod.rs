//! Node storage.
//!
//! The node store is the system of record for sourced nodes. It is reached
//! through the [`NodeStore`] trait so the sourcing engine does not care
//! whether nodes land in SQLite or in memory.
//!
//! # Submodules
//!
//! - [`events`] - Node change history
//! - [`memory`] - In-memory store
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - SQLite store with source run bookkeeping

pub mod events;
pub mod memory;
pub mod schema;
pub mod sqlite;

pub use events::{Event, EventType};
pub use memory::MemoryNodeStore;
pub use sqlite::{MutationContext, RunStatus, SourceRun, SqliteStorage};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::digest::content_digest;
use crate::error::Result;
use crate::model::Node;

/// What an upsert did to the stored node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Tally of upsert outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl UpsertStats {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Add another tally to this one.
    pub fn merge(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

/// Number of stored nodes of one node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    pub node_type: String,
    pub count: usize,
}

/// The node store consumed by the sourcing engine.
pub trait NodeStore {
    /// Idempotent upsert keyed by `node.id`.
    ///
    /// A node whose digest matches the stored one is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    fn create_node(&mut self, node: Node) -> Result<UpsertOutcome>;

    /// Upsert a batch of nodes.
    ///
    /// # Errors
    ///
    /// Returns the first upsert error.
    fn create_nodes(&mut self, nodes: Vec<Node>) -> Result<UpsertStats> {
        let mut stats = UpsertStats::default();
        for node in nodes {
            stats.record(self.create_node(node)?);
        }
        Ok(stats)
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_node(&self, id: &str) -> Result<Option<Node>>;

    /// Nodes ordered by type then id, optionally of one node type only.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list_nodes(&self, node_type: Option<&str>, limit: Option<u32>) -> Result<Vec<Node>>;

    /// Node counts per node type, ordered by type.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn count_by_type(&self) -> Result<Vec<TypeCount>>;

    /// Digest of a field mapping, as stored in `internal.contentDigest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the fields cannot be serialized.
    fn content_digest(&self, fields: &Map<String, Value>) -> Result<String> {
        content_digest(fields)
    }
}

impl<S: NodeStore + ?Sized> NodeStore for &mut S {
    fn create_node(&mut self, node: Node) -> Result<UpsertOutcome> {
        (**self).create_node(node)
    }

    fn create_nodes(&mut self, nodes: Vec<Node>) -> Result<UpsertStats> {
        (**self).create_nodes(nodes)
    }

    fn get_node(&self, id: &str) -> Result<Option<Node>> {
        (**self).get_node(id)
    }

    fn list_nodes(&self, node_type: Option<&str>, limit: Option<u32>) -> Result<Vec<Node>> {
        (**self).list_nodes(node_type, limit)
    }

    fn count_by_type(&self) -> Result<Vec<TypeCount>> {
        (**self).count_by_type()
    }

    fn content_digest(&self, fields: &Map<String, Value>) -> Result<String> {
        (**self).content_digest(fields)
    }
}
