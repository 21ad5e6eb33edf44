//! Pagination walks and node upsert for multi-instance entity types.

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::types::{RefreshReport, TypeReport};
use crate::error::{Error, Result};
use crate::executor::QueryExecutor;
use crate::model::item::{HANDLE_FIELD, LOCALE_FIELD};
use crate::model::{NaturalKey, Node, RawItem};
use crate::pagination::{AccumulatedResult, Page, Paged, PaginationAdapter};
use crate::query::{CompiledEntityType, SourcingPlan};
use crate::storage::NodeStore;

/// Drives compiled queries through an executor into a node store.
///
/// Entity types are sourced one after another, in plan order, and pages of
/// one type strictly in sequence. The first error aborts the run.
pub struct SourcingEngine<'a, E> {
    pub(super) executor: &'a E,
    pub(super) adapter: &'a dyn PaginationAdapter,
    pub(super) plan: &'a SourcingPlan,
    pub(super) type_prefix: String,
}

impl<'a, E: QueryExecutor> SourcingEngine<'a, E> {
    #[must_use]
    pub fn new(
        executor: &'a E,
        adapter: &'a dyn PaginationAdapter,
        plan: &'a SourcingPlan,
        type_prefix: &str,
    ) -> Self {
        Self {
            executor,
            adapter,
            plan,
            type_prefix: type_prefix.to_string(),
        }
    }

    #[must_use]
    pub fn plan(&self) -> &SourcingPlan {
        self.plan
    }

    /// Local node type of a remote type, e.g. `NacelleProduct`.
    #[must_use]
    pub fn node_type(&self, remote_type: &str) -> String {
        format!("{}{remote_type}", self.type_prefix)
    }

    /// Walk the listing of one type to exhaustion.
    ///
    /// Returns the accumulator and the number of requests made.
    ///
    /// # Errors
    ///
    /// Returns the first executor or malformed page error; nothing is retried.
    pub async fn walk(&self, compiled: &CompiledEntityType) -> Result<(AccumulatedResult, usize)> {
        let remote_type = compiled.remote_type();
        let list = compiled.list.as_ref().ok_or_else(|| {
            Error::InvalidArgument(format!("{remote_type} has no listing query"))
        })?;

        let mut state = self.adapter.start();
        let mut acc = AccumulatedResult::default();
        let mut pages = 0;

        while state.has_next_page {
            let request = list.request(state.variables.clone());
            let data = self.executor.execute(&request).await?;
            let page = Page::from_response(&data, &list.operation_name, &list.root_field, remote_type)?;
            pages += 1;

            debug!(
                remote_type,
                page = pages,
                items = page.len(),
                next_token = page.next_token(),
                "Fetched page"
            );

            let next = self.adapter.next(&state, &page);
            acc = self.adapter.concat(acc, page);
            state = next;
        }

        Ok((acc, pages))
    }

    /// Source one multi-instance type: walk, then upsert every accumulated item.
    ///
    /// Nodes are only written once the walk has completed, so a failed walk
    /// writes nothing for its type.
    ///
    /// # Errors
    ///
    /// Returns the walk or store error, wrapped with the remote type.
    pub async fn source_type<S: NodeStore>(
        &self,
        compiled: &CompiledEntityType,
        store: &mut S,
    ) -> Result<TypeReport> {
        let remote_type = compiled.remote_type();

        let result: Result<TypeReport> = async {
            let (acc, pages) = self.walk(compiled).await?;
            let items = acc.len();
            let nodes = self.materialize(compiled, &acc, store)?;
            let stats = store.create_nodes(nodes)?;

            Ok(TypeReport {
                remote_type: remote_type.to_string(),
                node_type: self.node_type(remote_type),
                pages,
                items,
                stats,
            })
        }
        .await;

        let report = result.map_err(|e| Error::for_entity(remote_type, e))?;
        info!(
            remote_type,
            pages = report.pages,
            items = report.items,
            created = report.stats.created,
            updated = report.stats.updated,
            unchanged = report.stats.unchanged,
            "Sourced nodes"
        );
        Ok(report)
    }

    /// Re-fetch one node by natural key through its lookup query and upsert it.
    ///
    /// `handle` and `locale` are ignored for singleton types.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` for a type missing from the plan, `NodeNotFound`
    /// when the lookup returns null, and executor or store errors otherwise.
    pub async fn refresh_node<S: NodeStore>(
        &self,
        remote_type: &str,
        handle: &str,
        locale: Option<&str>,
        store: &mut S,
    ) -> Result<RefreshReport> {
        let compiled = self.plan.get(remote_type).ok_or_else(|| Error::UnknownType {
            name: remote_type.to_string(),
            suggestion: None,
        })?;

        if compiled.is_singleton() {
            let (key, item) = super::singleton::fetch_singleton(self.executor, compiled).await?;
            let node = Node::from_item(&key, item, &self.type_prefix, |f| store.content_digest(f))?;
            return self.upsert_refreshed(node, store);
        }

        let mut variables = Map::new();
        variables.insert(HANDLE_FIELD.to_string(), Value::from(handle));
        variables.insert(
            LOCALE_FIELD.to_string(),
            locale.map_or(Value::Null, Value::from),
        );

        let lookup = &compiled.lookup;
        let data = self.executor.execute(&lookup.request(variables)).await?;
        let requested = NaturalKey::Handle {
            remote_type: remote_type.to_string(),
            handle: handle.to_string(),
            locale: locale.map(str::to_string),
        };

        let item = match data.get(&lookup.root_field) {
            None | Some(Value::Null) => return Err(Error::NodeNotFound { id: requested.node_id() }),
            Some(value) => RawItem::from_value(value.clone()).ok_or_else(|| Error::MalformedPage {
                operation: lookup.operation_name.clone(),
                reason: format!("`{}` is not an object", lookup.root_field),
            })?,
        };
        let key = item.natural_key(remote_type).ok_or_else(|| Error::MalformedPage {
            operation: lookup.operation_name.clone(),
            reason: format!("result has no `{HANDLE_FIELD}` to key it by"),
        })?;

        let node = Node::from_item(&key, item, &self.type_prefix, |f| store.content_digest(f))?;
        self.upsert_refreshed(node, store)
    }

    /// Turn an accumulator into nodes, in key order, through the adapter's
    /// item projection. Digests come from `store`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPage` for an item without a handle, or the store's
    /// digest error.
    pub fn materialize<S: NodeStore>(
        &self,
        compiled: &CompiledEntityType,
        acc: &AccumulatedResult,
        store: &S,
    ) -> Result<Vec<Node>> {
        let remote_type = compiled.remote_type();
        self.adapter
            .get_items(Paged::Accumulated(acc))
            .into_iter()
            .map(|item| {
                let key = item.natural_key(remote_type).ok_or_else(|| Error::MalformedPage {
                    operation: compiled
                        .list
                        .as_ref()
                        .map_or_else(|| remote_type.to_string(), |list| list.operation_name.clone()),
                    reason: format!("item has no `{HANDLE_FIELD}` to key it by"),
                })?;
                Node::from_item(&key, item.clone(), &self.type_prefix, |f| store.content_digest(f))
            })
            .collect()
    }

    fn upsert_refreshed<S: NodeStore>(&self, node: Node, store: &mut S) -> Result<RefreshReport> {
        let node_id = node.id.clone();
        let node_type = node.node_type().to_string();
        let outcome = store.create_node(node)?;
        info!(node_id = %node_id, ?outcome, "Refreshed node");
        Ok(RefreshReport {
            node_id,
            node_type,
            outcome,
        })
    }
}
