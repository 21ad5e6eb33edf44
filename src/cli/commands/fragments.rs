//! Fragments command implementation.

use colored::Colorize;
use serde::Serialize;

use crate::cli::FragmentsCommands;
use crate::error::Result;
use crate::fragments::{DiskFragmentCache, FragmentFile, FragmentFileStatus, FragmentProvider};
use crate::query::EntityRegistry;
use crate::schema::RemoteSchema;
use crate::validate::resolve_type_name;

#[derive(Serialize)]
struct GenerateOutput<'a> {
    dir: String,
    files: &'a [FragmentFile],
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    remote_type: &'a str,
    path: String,
    fragment: &'a str,
}

/// Execute fragments commands.
///
/// # Errors
///
/// Returns an error if the schema cannot be loaded or a fragment file
/// cannot be read or written.
pub fn execute(command: &FragmentsCommands, verbose: u8, json: bool) -> Result<()> {
    match command {
        FragmentsCommands::Generate { remote } => super::block_on(async {
            let config = super::resolve_config(remote, verbose)?;
            let executor = super::connect(&config)?;
            let schema = RemoteSchema::load(&executor).await?;
            let cache = DiskFragmentCache::new(config.fragments_dir.clone(), &schema);

            let files = cache.ensure(EntityRegistry::nacelle().names())?;
            print_generated(&cache, &files, json)
        }),

        FragmentsCommands::Show {
            remote_type,
            remote,
        } => super::block_on(async {
            let config = super::resolve_config(remote, verbose)?;
            let registry = EntityRegistry::nacelle();
            let remote_type = resolve_type_name(remote_type, &registry.names(), &config.type_prefix)?;

            let executor = super::connect(&config)?;
            let schema = RemoteSchema::load(&executor).await?;
            let cache = DiskFragmentCache::new(config.fragments_dir.clone(), &schema);
            let fragment = cache.get_fragment(&remote_type)?;

            if json {
                let output = ShowOutput {
                    remote_type: &remote_type,
                    path: cache.path_for(&remote_type).display().to_string(),
                    fragment: &fragment,
                };
                println!("{}", serde_json::to_string(&output)?);
            } else {
                print!("{fragment}");
                if !fragment.ends_with('\n') {
                    println!();
                }
            }
            Ok(())
        }),
    }
}

fn print_generated(cache: &DiskFragmentCache<'_>, files: &[FragmentFile], json: bool) -> Result<()> {
    if json {
        let output = GenerateOutput {
            dir: cache.dir().display().to_string(),
            files,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("Fragments in {}", cache.dir().display());
    for file in files {
        let status = match file.status {
            FragmentFileStatus::Generated => "generated".green(),
            FragmentFileStatus::Existing => "kept".dimmed(),
        };
        println!("  {:<12} {}", file.remote_type.bold(), status);
    }
    Ok(())
}
