//! The sourcing run.
//!
//! A run sources every multi-instance type through its pagination walk,
//! then every singleton, into one node store. The first failure aborts the
//! run and is reported as `Problem sourcing data from Nacelle: <cause>`.
//!
//! # Submodules
//!
//! - [`engine`] - Pagination walks, node upsert and single-node refresh
//! - [`singleton`] - Exactly-one-instance types

pub mod engine;
pub mod singleton;
mod types;

pub use engine::SourcingEngine;
pub use singleton::fetch_singleton;
pub use types::{RefreshReport, RunReport, TypeReport};

use tracing::info;

use crate::config::SOURCE_NAME;
use crate::error::{Error, Result};
use crate::executor::QueryExecutor;
use crate::storage::NodeStore;

impl<E: QueryExecutor> SourcingEngine<'_, E> {
    /// Run the whole pipeline: multi-instance types, then singletons.
    ///
    /// # Errors
    ///
    /// Returns the first failure, wrapped with the source name. Types after
    /// the failing one are not attempted; nodes of types that completed
    /// before it stay in the store.
    pub async fn run<S: NodeStore>(&self, store: &mut S) -> Result<RunReport> {
        let mut report = RunReport::default();
        self.run_into(store, &mut report).await?;

        let totals = report.totals();
        info!(
            types = report.types.len(),
            created = totals.created,
            updated = totals.updated,
            unchanged = totals.unchanged,
            "Sourcing complete"
        );
        Ok(report)
    }

    /// Like [`run`](Self::run), but appends each type's report to `report`
    /// as soon as the type completes.
    ///
    /// On failure `report` holds the types sourced before it.
    ///
    /// # Errors
    ///
    /// Returns the first failure, wrapped with the source name.
    pub async fn run_into<S: NodeStore>(&self, store: &mut S, report: &mut RunReport) -> Result<()> {
        let outcome: Result<()> = async {
            for compiled in self.plan.multi_instance() {
                report.types.push(self.source_type(compiled, store).await?);
            }
            for compiled in self.plan.singletons() {
                report.types.push(self.source_singleton(compiled, store).await?);
            }
            Ok(())
        }
        .await;
        outcome.map_err(|e| Error::sourcing(SOURCE_NAME, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::MemoryFragments;
    use crate::pagination::NacellePagination;
    use crate::query::{EntityRegistry, QueryCompiler, SourcingPlan};
    use crate::storage::{MemoryNodeStore, SqliteStorage, UpsertStats};
    use crate::testing::{handles, listing, nacelle_schema, ScriptedExecutor};
    use serde_json::json;

    fn plan() -> SourcingPlan {
        let schema = nacelle_schema();
        let adapter = NacellePagination::new();
        QueryCompiler::new(&schema, &adapter)
            .compile_all(&EntityRegistry::nacelle(), &MemoryFragments::generated(&schema))
            .unwrap()
    }

    /// One full, successful run's worth of responses.
    fn full_source() -> ScriptedExecutor {
        ScriptedExecutor::new()
            .respond("LIST_PRODUCTS", listing("getProducts", handles("p", 0..100), Some("t1")))
            .respond("LIST_PRODUCTS", listing("getProducts", handles("p", 100..120), Some("t2")))
            .respond("LIST_COLLECTION", listing("getCollections", handles("c", 0..5), None))
            .respond("NODE_SPACE", json!({"getSpace": {"id": "space-1", "name": "Shop"}}))
    }

    #[tokio::test]
    async fn test_run_sources_all_types_in_order() {
        let executor = full_source();
        let adapter = NacellePagination::new();
        let plan = plan();
        let engine = SourcingEngine::new(&executor, &adapter, &plan, "Nacelle");
        let mut store = MemoryNodeStore::new();

        let report = engine.run(&mut store).await.unwrap();

        assert_eq!(
            report.types.iter().map(|t| t.remote_type.as_str()).collect::<Vec<_>>(),
            vec!["Product", "Collection", "Space"]
        );
        assert_eq!(report.totals().created, 126);
        assert_eq!(store.len(), 126);
        assert_eq!(
            executor.operations(),
            vec!["LIST_PRODUCTS", "LIST_PRODUCTS", "LIST_COLLECTION", "NODE_SPACE"]
        );
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let adapter = NacellePagination::new();
        let plan = plan();
        let mut store = MemoryNodeStore::new();

        let first = full_source();
        SourcingEngine::new(&first, &adapter, &plan, "Nacelle")
            .run(&mut store)
            .await
            .unwrap();
        let snapshot = store.snapshot();

        let second = full_source();
        let report = SourcingEngine::new(&second, &adapter, &plan, "Nacelle")
            .run(&mut store)
            .await
            .unwrap();

        assert_eq!(store.snapshot(), snapshot);
        assert_eq!(
            report.totals(),
            UpsertStats { created: 0, updated: 0, unchanged: 126 }
        );
    }

    #[tokio::test]
    async fn test_rerun_against_sqlite_is_idempotent() {
        let adapter = NacellePagination::new();
        let plan = plan();
        let mut storage = SqliteStorage::open_memory().unwrap();

        let first = full_source();
        SourcingEngine::new(&first, &adapter, &plan, "Nacelle")
            .run(&mut storage)
            .await
            .unwrap();
        let before = storage.list_nodes(None, None).unwrap();

        let second = full_source();
        SourcingEngine::new(&second, &adapter, &plan, "Nacelle")
            .run(&mut storage)
            .await
            .unwrap();

        assert_eq!(storage.list_nodes(None, None).unwrap(), before);
    }

    #[tokio::test]
    async fn test_second_type_failure_stops_run() {
        let executor = ScriptedExecutor::new()
            .respond("LIST_PRODUCTS", listing("getProducts", handles("p", 0..3), None))
            .fail("LIST_COLLECTION", "Unauthorized: invalid space token")
            .respond("NODE_SPACE", json!({"getSpace": {"id": "space-1"}}));
        let adapter = NacellePagination::new();
        let plan = plan();
        let engine = SourcingEngine::new(&executor, &adapter, &plan, "Nacelle");
        let mut store = MemoryNodeStore::new();

        let err = engine.run(&mut store).await.unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("Problem sourcing data from Nacelle: "));
        assert!(message.contains("Unauthorized: invalid space token"));
        assert_eq!(err.error_code(), crate::error::ErrorCode::TransportError);

        assert!(!executor.operations().contains(&"NODE_SPACE".to_string()));
        assert!(store.list_nodes(Some("NacelleSpace"), None).unwrap().is_empty());
        assert!(store.list_nodes(Some("NacelleCollection"), None).unwrap().is_empty());
        assert_eq!(store.list_nodes(Some("NacelleProduct"), None).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_run_keeps_completed_types_in_report() {
        let executor = ScriptedExecutor::new()
            .respond("LIST_PRODUCTS", listing("getProducts", handles("p", 0..4), None))
            .fail("LIST_COLLECTION", "socket hang up");
        let adapter = NacellePagination::new();
        let plan = plan();
        let engine = SourcingEngine::new(&executor, &adapter, &plan, "Nacelle");
        let mut store = MemoryNodeStore::new();
        let mut report = RunReport::default();

        let err = engine.run_into(&mut store, &mut report).await.unwrap_err();

        assert!(err.to_string().starts_with("Problem sourcing data from Nacelle: "));
        assert_eq!(report.types.len(), 1);
        assert_eq!(report.types[0].remote_type, "Product");
        assert_eq!(report.totals(), UpsertStats { created: 4, updated: 0, unchanged: 0 });
    }

    #[tokio::test]
    async fn test_empty_listing_is_not_an_error() {
        let executor = ScriptedExecutor::new()
            .respond("LIST_PRODUCTS", listing("getProducts", vec![], None))
            .respond("LIST_COLLECTION", listing("getCollections", vec![], None))
            .respond("NODE_SPACE", json!({"getSpace": {"id": "space-1"}}));
        let adapter = NacellePagination::new();
        let plan = plan();
        let engine = SourcingEngine::new(&executor, &adapter, &plan, "Nacelle");
        let mut store = MemoryNodeStore::new();

        let report = engine.run(&mut store).await.unwrap();

        let products = report.get("Product").unwrap();
        assert_eq!(products.pages, 1);
        assert_eq!(products.items, 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_keys_across_pages_keep_last() {
        let mut first_page = handles("p", 0..100);
        first_page[7] = json!({"handle": "dup", "locale": "en-US", "title": "old"});
        let second_page = vec![json!({"handle": "dup", "locale": "en-US", "title": "new"})];

        let executor = ScriptedExecutor::new()
            .respond("LIST_PRODUCTS", listing("getProducts", first_page, Some("t1")))
            .respond("LIST_PRODUCTS", listing("getProducts", second_page, None))
            .respond("LIST_COLLECTION", listing("getCollections", vec![], None))
            .respond("NODE_SPACE", json!({"getSpace": {"id": "space-1"}}));
        let adapter = NacellePagination::new();
        let plan = plan();
        let engine = SourcingEngine::new(&executor, &adapter, &plan, "Nacelle");
        let mut store = MemoryNodeStore::new();

        let report = engine.run(&mut store).await.unwrap();

        assert_eq!(report.get("Product").unwrap().items, 100);
        assert_eq!(store.get_node("Productdupen-US").unwrap().unwrap().fields["title"], "new");
    }

    #[tokio::test]
    async fn test_missing_singleton_fails_run() {
        let executor = ScriptedExecutor::new()
            .respond("LIST_PRODUCTS", listing("getProducts", vec![], None))
            .respond("LIST_COLLECTION", listing("getCollections", vec![], None))
            .respond("NODE_SPACE", json!({"getSpace": null}));
        let adapter = NacellePagination::new();
        let plan = plan();
        let engine = SourcingEngine::new(&executor, &adapter, &plan, "Nacelle");

        let err = engine.run(&mut MemoryNodeStore::new()).await.unwrap_err();
        assert_eq!(err.error_code(), crate::error::ErrorCode::SingletonMissing);
        assert!(err.to_string().contains("Space"));
    }
}
