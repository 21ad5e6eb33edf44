//! Version command implementation.

use serde::Serialize;

use crate::config::{DEFAULT_ENDPOINT, SOURCE_NAME};
use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    source: &'a str,
    default_endpoint: &'a str,
    store_schema: i32,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        build: if cfg!(debug_assertions) { "dev" } else { "release" },
        source: SOURCE_NAME,
        default_endpoint: DEFAULT_ENDPOINT,
        store_schema: CURRENT_SCHEMA_VERSION,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("nsrc {} ({})", output.version, output.build);
    println!("  source:       {} ({})", output.source, output.default_endpoint);
    println!("  store schema: v{}", output.store_schema);
    Ok(())
}
