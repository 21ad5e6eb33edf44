//! Nodes command implementation.

use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::NodesCommands;
use crate::config::{load_settings, DEFAULT_TYPE_PREFIX};
use crate::error::{Error, Result};
use crate::model::Node;
use crate::query::EntityRegistry;
use crate::storage::{Event, NodeStore, SqliteStorage};
use crate::validate::{find_similar_ids, resolve_type_name};

#[derive(Serialize)]
struct ListOutput<'a> {
    nodes: &'a [Node],
    count: usize,
}

#[derive(Serialize)]
struct GetOutput<'a> {
    node: &'a Node,
    #[serde(skip_serializing_if = "Option::is_none")]
    history: Option<&'a [Event]>,
}

/// Execute nodes commands.
///
/// # Errors
///
/// Returns an error if the database cannot be read, the type filter is
/// unknown, or the requested node does not exist.
pub fn execute(command: &NodesCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = super::open_storage(db_path)?;

    match command {
        NodesCommands::List { remote_type, limit } => list(&storage, remote_type.as_deref(), *limit, json),
        NodesCommands::Get { id, history } => get(&storage, id, *history, json),
    }
}

fn list(storage: &SqliteStorage, remote_type: Option<&str>, limit: u32, json: bool) -> Result<()> {
    let node_type = match remote_type {
        Some(input) => {
            let prefix = load_settings()?
                .type_prefix
                .unwrap_or_else(|| DEFAULT_TYPE_PREFIX.to_string());
            let name = resolve_type_name(input, &EntityRegistry::nacelle().names(), &prefix)?;
            Some(format!("{prefix}{name}"))
        }
        None => None,
    };

    let nodes = storage.list_nodes(node_type.as_deref(), Some(limit))?;

    if json {
        let output = ListOutput {
            count: nodes.len(),
            nodes: &nodes,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if nodes.is_empty() {
        println!("No nodes found.");
        println!();
        println!("Source some with: nsrc source");
        return Ok(());
    }

    for node in &nodes {
        let title = node
            .fields
            .get("title")
            .or_else(|| node.fields.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        println!(
            "{:<40} {:<20} {}",
            node.id.bold(),
            node.node_type().dimmed(),
            title
        );
    }
    println!();
    println!("{} node(s)", nodes.len());
    Ok(())
}

fn get(storage: &SqliteStorage, id: &str, with_history: bool, json: bool) -> Result<()> {
    let Some(node) = storage.get_node(id)? else {
        let similar = find_similar_ids(id, &storage.node_ids()?, 3);
        if similar.is_empty() {
            return Err(Error::NodeNotFound { id: id.to_string() });
        }
        return Err(Error::NodeNotFoundSimilar {
            id: id.to_string(),
            similar,
        });
    };

    let history = if with_history {
        Some(storage.node_history(id, None)?)
    } else {
        None
    };

    if json {
        let output = GetOutput {
            node: &node,
            history: history.as_deref(),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", node.id.cyan().bold());
    println!("  Type:   {}", node.node_type());
    println!("  Digest: {}", node.content_digest().dimmed());
    println!();
    println!("{}", serde_json::to_string_pretty(&node.fields)?);

    if let Some(events) = history {
        println!();
        println!("{}", "History".yellow().bold());
        for event in &events {
            let when = chrono::DateTime::from_timestamp_millis(event.created_at)
                .map_or_else(|| event.created_at.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
            println!(
                "  {} {:<13} {}",
                when.dimmed(),
                event.event_type.as_str(),
                event.actor
            );
        }
    }
    Ok(())
}
