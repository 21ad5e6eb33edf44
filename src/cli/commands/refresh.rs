//! Refresh command implementation.

use colored::Colorize;
use std::path::PathBuf;

use crate::cli::RemoteArgs;
use crate::error::Result;
use crate::pagination::NacellePagination;
use crate::query::EntityRegistry;
use crate::sourcing::SourcingEngine;
use crate::storage::UpsertOutcome;
use crate::validate::resolve_type_name;

/// Execute the refresh command.
///
/// # Errors
///
/// Returns `UnknownType` for an unrecognized type, `NodeNotFound` if the
/// remote source has no node with that handle, and remote or storage
/// errors otherwise.
pub fn execute(
    remote_type: &str,
    handle: &str,
    locale: Option<&str>,
    remote: &RemoteArgs,
    db_path: Option<&PathBuf>,
    verbose: u8,
    json: bool,
) -> Result<()> {
    super::block_on(async {
        let config = super::resolve_config(remote, verbose)?;
        let registry = EntityRegistry::nacelle();
        let remote_type = resolve_type_name(remote_type, &registry.names(), &config.type_prefix)?;

        let executor = super::connect(&config)?;
        let (_, plan) = super::compile_plan(&executor, &config).await?;
        let mut storage = super::open_storage(db_path)?.with_actor("refresh");

        let adapter = NacellePagination::new();
        let report = SourcingEngine::new(&executor, &adapter, &plan, &config.type_prefix)
            .refresh_node(&remote_type, handle, locale, &mut storage)
            .await?;

        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            let outcome = match report.outcome {
                UpsertOutcome::Created => "created".green(),
                UpsertOutcome::Updated => "updated".yellow(),
                UpsertOutcome::Unchanged => "unchanged".dimmed(),
            };
            println!("{} {} ({})", report.node_id.bold(), outcome, report.node_type);
        }
        Ok(())
    })
}
