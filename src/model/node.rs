//! Materialized nodes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::item::{NaturalKey, RawItem};
use crate::error::Result;

/// The locally materialized, content-addressed form of one remote entity.
///
/// Once handed to a node store the store owns it; the sourcing engine keeps
/// no reference after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Derived from the type name and natural key; stable across runs.
    pub id: String,
    /// The remote item's fields, verbatim.
    pub fields: Map<String, Value>,
    pub internal: NodeInternal,
}

/// Bookkeeping owned by the node store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInternal {
    /// Local node type, e.g. `NacelleProduct`.
    #[serde(rename = "type")]
    pub node_type: String,
    /// SHA256 over `fields` only.
    pub content_digest: String,
}

impl Node {
    /// Materialize a node from a raw item and its natural key.
    ///
    /// `digest` computes `internal.contentDigest` over the fields; the
    /// sourcing engine passes the node store's digest function.
    ///
    /// # Errors
    ///
    /// Returns the digest function's error.
    pub fn from_item<D>(key: &NaturalKey, item: RawItem, type_prefix: &str, digest: D) -> Result<Self>
    where
        D: FnOnce(&Map<String, Value>) -> Result<String>,
    {
        let fields = item.into_fields();
        let content_digest = digest(&fields)?;

        Ok(Self {
            id: key.node_id(),
            fields,
            internal: NodeInternal {
                node_type: format!("{type_prefix}{}", key.remote_type()),
                content_digest,
            },
        })
    }

    #[must_use]
    pub fn node_type(&self) -> &str {
        &self.internal.node_type
    }

    #[must_use]
    pub fn content_digest(&self) -> &str {
        &self.internal.content_digest
    }
}
