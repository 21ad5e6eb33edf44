//! Config command implementation.

use serde::Serialize;

use crate::cli::{ConfigCommands, ConfigSetArgs};
use crate::config::{config_path, load_settings, reset_settings, save_settings, Settings};
use crate::error::{Error, Result};

#[derive(Serialize)]
struct ShowOutput {
    path: String,
    settings: Settings,
}

#[derive(Serialize)]
struct ResetOutput {
    path: String,
    removed: bool,
}

/// Execute config commands.
///
/// # Errors
///
/// Returns an error if the settings file cannot be read or written.
pub fn execute(command: &ConfigCommands, json: bool) -> Result<()> {
    let path = config_path()?.display().to_string();

    match command {
        ConfigCommands::Show => {
            let settings = load_settings()?.redacted();
            if json {
                println!("{}", serde_json::to_string(&ShowOutput { path, settings })?);
            } else {
                println!("Settings: {path}");
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
        }

        ConfigCommands::Set(args) => {
            let update = settings_from_args(args)?;
            let settings = load_settings()?.merge(update);
            save_settings(&settings)?;

            if json {
                let output = ShowOutput {
                    path,
                    settings: settings.redacted(),
                };
                println!("{}", serde_json::to_string(&output)?);
            } else {
                println!("Saved settings to {path}");
            }
        }

        ConfigCommands::Reset => {
            let removed = reset_settings()?;
            if json {
                println!("{}", serde_json::to_string(&ResetOutput { path, removed })?);
            } else if removed {
                println!("Removed {path}");
            } else {
                println!("No settings file at {path}");
            }
        }
    }

    Ok(())
}

fn settings_from_args(args: &ConfigSetArgs) -> Result<Settings> {
    let settings = Settings {
        space_id: args.space_id.clone(),
        access_token: args.token.clone(),
        verbose: args.log_operations,
        endpoint: args.endpoint.clone(),
        type_prefix: args.type_prefix.clone(),
        fragments_dir: args.fragments_dir.clone(),
    };

    if settings == Settings::default() {
        return Err(Error::InvalidArgument(
            "Nothing to set. Pass at least one of --space-id, --token, --endpoint, \
             --type-prefix, --fragments-dir, --log-operations"
                .to_string(),
        ));
    }
    Ok(settings)
}
