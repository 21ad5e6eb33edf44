//! Status command implementation.

use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::resolve_db_path;
use crate::error::Result;
use crate::storage::{NodeStore, RunStatus, SourceRun, TypeCount};

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    db_path: String,
    node_count: usize,
    types: Vec<TypeCount>,
    last_run: Option<SourceRun>,
}

/// Execute status command.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or read.
pub fn execute(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let storage = super::open_storage(db_path)?;
    let types = storage.count_by_type()?;
    let node_count: usize = types.iter().map(|t| t.count).sum();
    let last_run = storage.last_run()?;
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path))
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    if json {
        let output = StatusOutput {
            db_path,
            node_count,
            types,
            last_run,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("nsrc Status");
    println!("===========");
    println!();
    println!("Database: {db_path}");
    println!();

    if types.is_empty() {
        println!("No nodes sourced yet.");
    } else {
        println!("Nodes: {node_count}");
        for t in &types {
            println!("  {:<24} {}", t.node_type, t.count);
        }
    }
    println!();

    match last_run {
        Some(run) => {
            let status = match run.status {
                RunStatus::Succeeded => run.status.as_str().green(),
                RunStatus::Failed => run.status.as_str().red(),
                RunStatus::Running => run.status.as_str().yellow(),
            };
            let started = chrono::DateTime::from_timestamp_millis(run.started_at)
                .map_or_else(|| run.started_at.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string());
            println!("Last Run: #{} {status}", run.id);
            println!("  Started:   {started}");
            println!(
                "  Nodes:     {} created, {} updated, {} unchanged",
                run.created, run.updated, run.unchanged
            );
            if let Some(error) = run.error {
                println!("  Error:     {}", error.red());
            }
        }
        None => {
            println!("No sourcing runs recorded.");
            println!();
            println!("Start one with: nsrc source");
        }
    }

    Ok(())
}
