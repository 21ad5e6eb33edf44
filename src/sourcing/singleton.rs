//! Exactly-one-instance entity types.
//!
//! A singleton has no listing. Its lookup query runs once, without
//! variables, after every multi-instance type has been sourced, and must
//! return exactly one item.

use serde_json::{Map, Value};
use tracing::info;

use super::engine::SourcingEngine;
use super::types::TypeReport;
use crate::error::{Error, Result};
use crate::executor::QueryExecutor;
use crate::model::{NaturalKey, Node, RawItem};
use crate::query::CompiledEntityType;
use crate::storage::{NodeStore, UpsertStats};

/// Execute a singleton's lookup and key the result by its remote id.
///
/// # Errors
///
/// Returns `SingletonMissing` if the result is null or absent, and
/// `MalformedPage` if it is not an object or carries no remote id.
pub async fn fetch_singleton<E: QueryExecutor>(
    executor: &E,
    compiled: &CompiledEntityType,
) -> Result<(NaturalKey, RawItem)> {
    let lookup = &compiled.lookup;
    let remote_type = compiled.remote_type();
    let malformed = |reason: String| Error::MalformedPage {
        operation: lookup.operation_name.clone(),
        reason,
    };

    let data = executor.execute(&lookup.request(Map::new())).await?;

    let item = match data.get(&lookup.root_field) {
        None | Some(Value::Null) => {
            return Err(Error::SingletonMissing {
                remote_type: remote_type.to_string(),
            });
        }
        Some(value) => RawItem::from_value(value.clone())
            .ok_or_else(|| malformed(format!("`{}` is not an object", lookup.root_field)))?,
    };

    let key = item
        .singleton_key(remote_type)
        .ok_or_else(|| malformed(format!("{remote_type} has no remoteId or id")))?;

    Ok((key, item))
}

impl<E: QueryExecutor> SourcingEngine<'_, E> {
    /// Source one singleton type.
    ///
    /// # Errors
    ///
    /// Returns the fetch or store error, wrapped with the remote type.
    pub async fn source_singleton<S: NodeStore>(
        &self,
        compiled: &CompiledEntityType,
        store: &mut S,
    ) -> Result<TypeReport> {
        let remote_type = compiled.remote_type();

        let result: Result<UpsertStats> = async {
            let (key, item) = fetch_singleton(self.executor, compiled).await?;
            let node = Node::from_item(&key, item, &self.type_prefix, |f| store.content_digest(f))?;
            let mut stats = UpsertStats::default();
            stats.record(store.create_node(node)?);
            Ok(stats)
        }
        .await;

        let stats = result.map_err(|e| Error::for_entity(remote_type, e))?;
        info!(remote_type, created = stats.created, updated = stats.updated, "Sourced singleton");

        Ok(TypeReport {
            remote_type: remote_type.to_string(),
            node_type: self.node_type(remote_type),
            pages: 1,
            items: 1,
            stats,
        })
    }
}
