//! SQLite storage implementation.
//!
//! This module provides the main node store backed by SQLite. Writes go
//! through [`SqliteStorage::mutate`], which runs a closure inside an
//! IMMEDIATE transaction and writes node history at commit.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction};
use serde::Serialize;
use serde_json::{Map, Value};

use super::events::{get_events, insert_event, Event, EventType};
use super::schema::apply_schema;
use super::{NodeStore, TypeCount, UpsertOutcome, UpsertStats};
use crate::digest::has_changed;
use crate::error::{Error, Result};
use crate::model::{Node, NodeInternal};

/// Actor recorded in node history when none is set.
pub const DEFAULT_ACTOR: &str = "nsrc";

/// How long a write waits for another connection's lock.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based node store.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    actor: String,
}

/// Context for a mutation operation, tracking side effects.
///
/// Passed to mutation closures to collect node history events and the
/// tally of upsert outcomes.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation (`source`, `refresh`, ...).
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
    pub stats: UpsertStats,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
            stats: UpsertStats::default(),
        }
    }

    /// Record a digest change for a node.
    pub fn record_change(
        &mut self,
        node_id: &str,
        event_type: EventType,
        old_digest: Option<String>,
        new_digest: Option<String>,
    ) {
        self.events.push(
            Event::new(node_id, event_type, &self.actor).with_digests(old_digest, new_digest),
        );
    }
}

/// Lifecycle of a source run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            _ => Self::Running,
        }
    }
}

/// A recorded `nsrc source` run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRun {
    pub id: i64,
    pub source_name: String,
    pub space_id: Option<String>,
    pub status: RunStatus,
    pub created: i64,
    pub updated: i64,
    pub unchanged: i64,
    pub error: Option<String>,
    pub started_at: i64,
    pub finished_at: Option<i64>,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist. Waits up
    /// to [`BUSY_TIMEOUT`] for a lock held by another process.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            actor: DEFAULT_ACTOR.to_string(),
        })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn,
            actor: DEFAULT_ACTOR.to_string(),
        })
    }

    /// Set the actor recorded in node history for later writes.
    #[must_use]
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes node history events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, &self.actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        tracing::debug!(
            op = %ctx.op_name,
            actor = %ctx.actor,
            events = ctx.events.len(),
            created = ctx.stats.created,
            updated = ctx.stats.updated,
            unchanged = ctx.stats.unchanged,
            "Committed mutation"
        );

        Ok(result)
    }

    // ==================
    // Node Operations
    // ==================

    /// Every stored node id, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn node_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM nodes ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Most recent history events of a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn node_history(&self, node_id: &str, limit: Option<u32>) -> Result<Vec<Event>> {
        Ok(get_events(&self.conn, node_id, limit)?)
    }

    // ==================
    // Source Run Operations
    // ==================

    /// Record the start of a source run.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn start_run(&mut self, source_name: &str, space_id: Option<&str>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO source_runs (source_name, space_id, status, started_at)
             VALUES (?1, ?2, 'running', ?3)",
            rusqlite::params![source_name, space_id, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Record the end of a source run.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails or the run does not exist.
    pub fn finish_run(&mut self, run_id: i64, stats: UpsertStats, error: Option<&str>) -> Result<()> {
        let status = if error.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };
        let count = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);

        let changed = self.conn.execute(
            "UPDATE source_runs
             SET status = ?1, created = ?2, updated = ?3, unchanged = ?4, error = ?5, finished_at = ?6
             WHERE id = ?7",
            rusqlite::params![
                status.as_str(),
                count(stats.created),
                count(stats.updated),
                count(stats.unchanged),
                error,
                chrono::Utc::now().timestamp_millis(),
                run_id,
            ],
        )?;

        if changed == 0 {
            return Err(Error::Other(format!("Source run {run_id} does not exist")));
        }
        Ok(())
    }

    /// The most recently started run.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn last_run(&self) -> Result<Option<SourceRun>> {
        Ok(self.list_runs(1)?.into_iter().next())
    }

    /// Runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_runs(&self, limit: u32) -> Result<Vec<SourceRun>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_name, space_id, status, created, updated, unchanged, error, started_at, finished_at
             FROM source_runs ORDER BY started_at DESC, id DESC LIMIT ?1",
        )?;
        let runs = stmt
            .query_map([limit], map_run_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}

/// Insert or update one node inside a mutation.
fn upsert_node(tx: &Transaction, ctx: &mut MutationContext, node: &Node) -> Result<UpsertOutcome> {
    let stored: Option<String> = tx
        .query_row(
            "SELECT content_digest FROM nodes WHERE id = ?1",
            [&node.id],
            |row| row.get(0),
        )
        .optional()?;

    if !has_changed(node.content_digest(), stored.as_deref()) {
        ctx.stats.record(UpsertOutcome::Unchanged);
        return Ok(UpsertOutcome::Unchanged);
    }

    let now = chrono::Utc::now().timestamp_millis();
    let fields = serde_json::to_string(&node.fields)?;

    let outcome = if stored.is_some() {
        tx.execute(
            "UPDATE nodes SET node_type = ?1, fields = ?2, content_digest = ?3, updated_at = ?4
             WHERE id = ?5",
            rusqlite::params![node.node_type(), fields, node.content_digest(), now, node.id],
        )?;
        UpsertOutcome::Updated
    } else {
        tx.execute(
            "INSERT INTO nodes (id, node_type, fields, content_digest, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![node.id, node.node_type(), fields, node.content_digest(), now],
        )?;
        UpsertOutcome::Created
    };

    let event_type = match outcome {
        UpsertOutcome::Created => EventType::NodeCreated,
        _ => EventType::NodeUpdated,
    };
    ctx.record_change(
        &node.id,
        event_type,
        stored,
        Some(node.content_digest().to_string()),
    );
    ctx.stats.record(outcome);
    Ok(outcome)
}

impl NodeStore for SqliteStorage {
    fn create_node(&mut self, node: Node) -> Result<UpsertOutcome> {
        self.mutate("create_node", |tx, ctx| upsert_node(tx, ctx, &node))
    }

    /// One transaction for the whole batch.
    fn create_nodes(&mut self, nodes: Vec<Node>) -> Result<UpsertStats> {
        self.mutate("create_nodes", |tx, ctx| {
            for node in &nodes {
                upsert_node(tx, ctx, node)?;
            }
            Ok(ctx.stats)
        })
    }

    fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let node = self
            .conn
            .query_row(
                "SELECT id, node_type, fields, content_digest FROM nodes WHERE id = ?1",
                [id],
                map_node_row,
            )
            .optional()?;
        Ok(node)
    }

    fn list_nodes(&self, node_type: Option<&str>, limit: Option<u32>) -> Result<Vec<Node>> {
        let limit = i64::from(limit.unwrap_or(u32::MAX));
        let mut stmt = self.conn.prepare(
            "SELECT id, node_type, fields, content_digest FROM nodes
             WHERE ?1 IS NULL OR node_type = ?1
             ORDER BY node_type, id LIMIT ?2",
        )?;
        let nodes = stmt
            .query_map(rusqlite::params![node_type, limit], map_node_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    fn count_by_type(&self) -> Result<Vec<TypeCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT node_type, COUNT(*) FROM nodes GROUP BY node_type ORDER BY node_type",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok(TypeCount {
                    node_type: row.get(0)?,
                    count: usize::try_from(row.get::<_, i64>(1)?).unwrap_or(0),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }
}

fn map_node_row(row: &rusqlite::Row) -> rusqlite::Result<Node> {
    let fields: String = row.get(2)?;
    let fields: Map<String, Value> = serde_json::from_str(&fields).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Node {
        id: row.get(0)?,
        fields,
        internal: NodeInternal {
            node_type: row.get(1)?,
            content_digest: row.get(3)?,
        },
    })
}

fn map_run_row(row: &rusqlite::Row) -> rusqlite::Result<SourceRun> {
    Ok(SourceRun {
        id: row.get(0)?,
        source_name: row.get(1)?,
        space_id: row.get(2)?,
        status: RunStatus::parse(row.get::<_, String>(3)?.as_str()),
        created: row.get(4)?,
        updated: row.get(5)?,
        unchanged: row.get(6)?,
        error: row.get(7)?,
        started_at: row.get(8)?,
        finished_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawItem;
    use serde_json::json;
    use tempfile::TempDir;

    fn product(handle: &str, title: &str) -> Node {
        let item = RawItem::from_value(json!({"handle": handle, "locale": "en-US", "title": title}))
            .unwrap();
        let key = item.natural_key("Product").unwrap();
        Node::from_item(&key, item, "Nacelle", |f| crate::digest::content_digest(f)).unwrap()
    }

    #[test]
    fn test_create_node_outcomes() {
        let mut storage = SqliteStorage::open_memory().unwrap();

        assert_eq!(storage.create_node(product("shirt", "Shirt")).unwrap(), UpsertOutcome::Created);
        assert_eq!(storage.create_node(product("shirt", "Shirt")).unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(storage.create_node(product("shirt", "Tee")).unwrap(), UpsertOutcome::Updated);

        let node = storage.get_node("Productshirten-US").unwrap().unwrap();
        assert_eq!(node.fields["title"], "Tee");
        assert_eq!(node.node_type(), "NacelleProduct");
        assert_eq!(node, product("shirt", "Tee"));
    }

    #[test]
    fn test_history_records_changes_only() {
        let mut storage = SqliteStorage::open_memory().unwrap().with_actor("source");
        storage.create_node(product("shirt", "Shirt")).unwrap();
        storage.create_node(product("shirt", "Shirt")).unwrap();
        storage.create_node(product("shirt", "Tee")).unwrap();

        let history = storage.node_history("Productshirten-US", None).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event_type, EventType::NodeUpdated);
        assert_eq!(history[1].event_type, EventType::NodeCreated);
        assert_eq!(history[1].actor, "source");
        assert!(history[1].old_digest.is_none());
    }

    #[test]
    fn test_create_nodes_batch() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.create_node(product("a", "A")).unwrap();

        let stats = storage
            .create_nodes(vec![product("a", "A"), product("b", "B"), product("c", "C")])
            .unwrap();

        assert_eq!(stats, UpsertStats { created: 2, updated: 0, unchanged: 1 });
        assert_eq!(storage.node_ids().unwrap().len(), 3);
    }

    #[test]
    fn test_list_and_count_nodes() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.create_node(product("b", "B")).unwrap();
        storage.create_node(product("a", "A")).unwrap();

        let all = storage.list_nodes(None, None).unwrap();
        assert_eq!(all.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["Productaen-US", "Productben-US"]);
        assert_eq!(storage.list_nodes(Some("NacelleProduct"), Some(1)).unwrap().len(), 1);
        assert!(storage.list_nodes(Some("NacelleSpace"), None).unwrap().is_empty());

        let counts = storage.count_by_type().unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].count, 2);
    }

    #[test]
    fn test_source_runs() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(storage.last_run().unwrap().is_none());

        let run = storage.start_run("Nacelle", Some("space-1")).unwrap();
        assert_eq!(storage.last_run().unwrap().unwrap().status, RunStatus::Running);

        let stats = UpsertStats { created: 3, updated: 1, unchanged: 0 };
        storage.finish_run(run, stats, None).unwrap();

        let last = storage.last_run().unwrap().unwrap();
        assert_eq!(last.status, RunStatus::Succeeded);
        assert_eq!(last.created, 3);
        assert!(last.finished_at.is_some());

        let failed = storage.start_run("Nacelle", None).unwrap();
        storage.finish_run(failed, UpsertStats::default(), Some("boom")).unwrap();
        assert_eq!(storage.list_runs(10).unwrap()[0].error.as_deref(), Some("boom"));

        assert!(storage.finish_run(999, stats, None).is_err());
    }

    #[test]
    fn test_reopen_file_database() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nodes.db");

        {
            let mut storage = SqliteStorage::open(&path).unwrap();
            storage.create_node(product("shirt", "Shirt")).unwrap();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        assert!(storage.get_node("Productshirten-US").unwrap().is_some());
    }
}
