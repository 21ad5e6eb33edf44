//! Source command implementation.

use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use tracing::warn;

use super::RemoteExecutor;
use crate::cli::RemoteArgs;
use crate::config::{SourceConfig, SOURCE_NAME};
use crate::error::{Error, Result};
use crate::pagination::NacellePagination;
use crate::sourcing::{RunReport, SourcingEngine};
use crate::storage::{SqliteStorage, UpsertStats};

#[derive(Serialize)]
struct SourceOutput<'a> {
    run_id: i64,
    space_id: &'a str,
    #[serde(flatten)]
    report: &'a RunReport,
    totals: UpsertStats,
}

/// Execute the source command.
///
/// # Errors
///
/// Returns an error if configuration is incomplete, compilation fails or
/// any type cannot be sourced. The run is recorded either way.
pub fn execute(remote: &RemoteArgs, db_path: Option<&PathBuf>, verbose: u8, json: bool) -> Result<()> {
    super::block_on(execute_async(remote, db_path, verbose, json))
}

async fn execute_async(remote: &RemoteArgs, db_path: Option<&PathBuf>, verbose: u8, json: bool) -> Result<()> {
    let config = super::resolve_config(remote, verbose)?;
    let executor = super::connect(&config)?;
    let mut storage = super::open_storage(db_path)?.with_actor("source");

    let run_id = storage.start_run(SOURCE_NAME, Some(&config.space_id))?;
    let mut report = RunReport::default();
    let result = source(&executor, &config, &mut storage, &mut report).await;
    record_run(&mut storage, run_id, &report, result.as_ref().err())?;
    result?;

    if json {
        let output = SourceOutput {
            run_id,
            space_id: &config.space_id,
            report: &report,
            totals: report.totals(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

async fn source(
    executor: &RemoteExecutor,
    config: &SourceConfig,
    storage: &mut SqliteStorage,
    report: &mut RunReport,
) -> Result<()> {
    let (_, plan) = super::compile_plan(executor, config)
        .await
        .map_err(|e| Error::sourcing(SOURCE_NAME, e))?;
    let adapter = NacellePagination::new();

    SourcingEngine::new(executor, &adapter, &plan, &config.type_prefix)
        .run_into(storage, report)
        .await
}

/// Close a run with the totals of the types that completed.
///
/// Failing to record a failed run is only logged, so the sourcing error
/// is the one reported.
fn record_run(storage: &mut SqliteStorage, run_id: i64, report: &RunReport, error: Option<&Error>) -> Result<()> {
    let Some(error) = error else {
        return storage.finish_run(run_id, report.totals(), None);
    };
    if let Err(record_err) = storage.finish_run(run_id, report.totals(), Some(&error.to_string())) {
        warn!(run_id, error = %record_err, "Failed to record failed run");
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("{}", format!("Sourced from {SOURCE_NAME}").cyan().bold());
    println!();
    println!(
        "  {:<24} {:>6} {:>8} {:>8} {:>10}",
        "TYPE".dimmed(),
        "PAGES".dimmed(),
        "CREATED".dimmed(),
        "UPDATED".dimmed(),
        "UNCHANGED".dimmed()
    );

    for t in &report.types {
        println!(
            "  {:<24} {:>6} {:>8} {:>8} {:>10}",
            t.node_type.bold(),
            t.pages,
            t.stats.created.to_string().green(),
            t.stats.updated.to_string().yellow(),
            t.stats.unchanged
        );
    }

    let totals = report.totals();
    println!();
    println!(
        "{} {} nodes ({} created, {} updated, {} unchanged)",
        "Total:".bold(),
        totals.total(),
        totals.created,
        totals.updated,
        totals.unchanged
    );
}
