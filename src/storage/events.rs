//! Node change history.
//!
//! Every create or content change of a node is recorded, so `nsrc nodes get`
//! can show when a node first appeared and how often it changed.

use rusqlite::{Connection, Result};
use serde::Serialize;

/// Event types for node history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NodeCreated,
    NodeUpdated,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NodeCreated => "node_created",
            Self::NodeUpdated => "node_updated",
        }
    }

    /// Parse a stored event type; `None` for anything not written by [`as_str`](Self::as_str).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "node_created" => Some(Self::NodeCreated),
            "node_updated" => Some(Self::NodeUpdated),
            _ => None,
        }
    }
}

/// A node history record.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub node_id: String,
    pub event_type: EventType,
    pub actor: String,
    pub old_digest: Option<String>,
    pub new_digest: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(node_id: &str, event_type: EventType, actor: &str) -> Self {
        Self {
            id: 0,
            node_id: node_id.to_string(),
            event_type,
            actor: actor.to_string(),
            old_digest: None,
            new_digest: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add old/new digests for change tracking.
    #[must_use]
    pub fn with_digests(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_digest = old;
        self.new_digest = new;
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO node_events (node_id, event_type, actor, old_digest, new_digest, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            event.node_id,
            event.event_type.as_str(),
            event.actor,
            event.old_digest,
            event.new_digest,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get the most recent events for a node.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_events(conn: &Connection, node_id: &str, limit: Option<u32>) -> Result<Vec<Event>> {
    let limit = limit.unwrap_or(20);
    let mut stmt = conn.prepare(
        "SELECT id, node_id, event_type, actor, old_digest, new_digest, created_at
         FROM node_events
         WHERE node_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(rusqlite::params![node_id, limit], |row| {
        Ok(Event {
            id: row.get(0)?,
            node_id: row.get(1)?,
            event_type: parse_event_type(&row.get::<_, String>(2)?)?,
            actor: row.get(3)?,
            old_digest: row.get(4)?,
            new_digest: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;

    rows.collect()
}

fn parse_event_type(s: &str) -> Result<EventType> {
    EventType::parse(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown event type `{s}`").into(),
        )
    })
}
