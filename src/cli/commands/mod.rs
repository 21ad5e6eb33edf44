//! Command implementations.

pub mod completions;
pub mod config;
pub mod fragments;
pub mod nodes;
pub mod refresh;
pub mod source;
pub mod status;
pub mod version;

use std::fs;
use std::future::Future;
use std::path::PathBuf;

use crate::cli::RemoteArgs;
use crate::config::{load_settings, resolve_db_path, SourceConfig};
use crate::error::{Error, Result};
use crate::executor::{HttpExecutor, LoggingExecutor};
use crate::fragments::DiskFragmentCache;
use crate::pagination::NacellePagination;
use crate::query::{EntityRegistry, QueryCompiler, SourcingPlan};
use crate::schema::RemoteSchema;
use crate::storage::SqliteStorage;

/// Executor used by every remote command.
pub(crate) type RemoteExecutor = LoggingExecutor<HttpExecutor>;

/// Run a future to completion on a fresh runtime.
pub(crate) fn block_on<F: Future<Output = Result<()>>>(future: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
    rt.block_on(future)
}

/// Resolve flags, environment and the settings file into a run configuration.
pub(crate) fn resolve_config(remote: &RemoteArgs, verbose: u8) -> Result<SourceConfig> {
    let cwd = std::env::current_dir()?;
    SourceConfig::resolve(remote.overrides(verbose), load_settings()?, &cwd)
}

pub(crate) fn connect(config: &SourceConfig) -> Result<RemoteExecutor> {
    let http = HttpExecutor::new(&config.endpoint, &config.space_id, &config.access_token)?;
    Ok(LoggingExecutor::new(http, config.verbose))
}

/// Open the node database, creating its directory on first use.
pub(crate) fn open_storage(db_path: Option<&PathBuf>) -> Result<SqliteStorage> {
    let path = resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine database path".to_string()))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    SqliteStorage::open(&path)
}

/// Load the remote schema and compile every registered type.
///
/// Fragment files missing from the fragments directory are generated.
pub(crate) async fn compile_plan(
    executor: &RemoteExecutor,
    config: &SourceConfig,
) -> Result<(RemoteSchema, SourcingPlan)> {
    let schema = RemoteSchema::load(executor).await?;
    let adapter = NacellePagination::new();
    let fragments = DiskFragmentCache::new(config.fragments_dir.clone(), &schema);
    let plan = QueryCompiler::new(&schema, &adapter).compile_all(&EntityRegistry::nacelle(), &fragments)?;
    Ok((schema, plan))
}
