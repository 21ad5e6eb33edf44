//! In-memory node store.

use std::collections::BTreeMap;

use super::{NodeStore, TypeCount, UpsertOutcome};
use crate::digest::has_changed;
use crate::error::Result;
use crate::model::Node;

/// Node store backed by a sorted map. Used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryNodeStore {
    nodes: BTreeMap<String, Node>,
}

impl MemoryNodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stored ids with their digests, in id order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.nodes
            .values()
            .map(|n| (n.id.clone(), n.internal.content_digest.clone()))
            .collect()
    }
}

impl NodeStore for MemoryNodeStore {
    fn create_node(&mut self, node: Node) -> Result<UpsertOutcome> {
        let stored = self.nodes.get(&node.id).map(Node::content_digest);
        let outcome = match stored {
            None => UpsertOutcome::Created,
            Some(digest) if has_changed(node.content_digest(), Some(digest)) => {
                UpsertOutcome::Updated
            }
            Some(_) => return Ok(UpsertOutcome::Unchanged),
        };
        self.nodes.insert(node.id.clone(), node);
        Ok(outcome)
    }

    fn get_node(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.nodes.get(id).cloned())
    }

    fn list_nodes(&self, node_type: Option<&str>, limit: Option<u32>) -> Result<Vec<Node>> {
        let limit = limit.map_or(usize::MAX, |l| l as usize);
        let mut nodes: Vec<Node> = self
            .nodes
            .values()
            .filter(|n| node_type.is_none_or(|t| n.node_type() == t))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| (a.node_type(), &a.id).cmp(&(b.node_type(), &b.id)));
        nodes.truncate(limit);
        Ok(nodes)
    }

    fn count_by_type(&self) -> Result<Vec<TypeCount>> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for node in self.nodes.values() {
            *counts.entry(node.node_type()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(node_type, count)| TypeCount {
                node_type: node_type.to_string(),
                count,
            })
            .collect())
    }
}
