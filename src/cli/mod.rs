//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::SourceOverrides;

pub mod commands;

/// nsrc - Source Nacelle GraphQL data into a local node store
#[derive(Parser, Debug)]
#[command(name = "nsrc", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.nacelle/data/nodes.db)
    #[arg(long, global = true, env = "NSRC_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON (for scripting)
    #[arg(long, alias = "robot", global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v logs every operation, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Source every entity type into the node store
    Source {
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Re-fetch one node by handle and upsert it
    Refresh {
        /// Entity type (Product, Collection, Space)
        #[arg(value_name = "TYPE")]
        remote_type: String,

        /// Node handle (ignored for Space)
        #[arg(default_value = "")]
        handle: String,

        /// Node locale
        #[arg(short, long)]
        locale: Option<String>,

        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Fragment cache management
    Fragments {
        #[command(subcommand)]
        command: FragmentsCommands,
    },

    /// Inspect sourced nodes
    Nodes {
        #[command(subcommand)]
        command: NodesCommands,
    },

    /// Show node counts and the last sourcing run
    Status,

    /// Settings file management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Connection options shared by every command that talks to the remote source.
#[derive(Args, Debug, Default, Clone)]
pub struct RemoteArgs {
    /// Nacelle space id
    #[arg(long, env = "NACELLE_SPACE_ID")]
    pub space_id: Option<String>,

    /// Nacelle GraphQL access token
    #[arg(long, env = "NACELLE_GRAPHQL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GraphQL endpoint
    #[arg(long, env = "NACELLE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Prefix of local node types
    #[arg(long)]
    pub type_prefix: Option<String>,

    /// Fragment cache directory (default: ./gql-fragments)
    #[arg(long)]
    pub fragments_dir: Option<PathBuf>,
}

impl RemoteArgs {
    /// Convert to config overrides; `-v` turns on operation logging.
    #[must_use]
    pub fn overrides(&self, verbose: u8) -> SourceOverrides {
        SourceOverrides {
            space_id: self.space_id.clone(),
            access_token: self.token.clone(),
            endpoint: self.endpoint.clone(),
            type_prefix: self.type_prefix.clone(),
            fragments_dir: self.fragments_dir.clone(),
            verbose: verbose > 0,
        }
    }
}

// ============================================================================
// Fragments Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum FragmentsCommands {
    /// Write default fragment files for types that have none
    Generate {
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Print the effective fragment of a type
    Show {
        /// Entity type (Product, Collection, Space)
        #[arg(value_name = "TYPE")]
        remote_type: String,

        #[command(flatten)]
        remote: RemoteArgs,
    },
}

// ============================================================================
// Nodes Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum NodesCommands {
    /// List sourced nodes
    List {
        /// Filter by entity type (Product, Collection, Space)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        remote_type: Option<String>,

        /// Maximum nodes to return
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },

    /// Show one node
    Get {
        /// Node id, e.g. `Productshirten-US`
        id: String,

        /// Include change history
        #[arg(long)]
        history: bool,
    },
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current settings (token masked)
    Show,

    /// Set one or more settings
    Set(ConfigSetArgs),

    /// Delete the settings file
    Reset,
}

#[derive(Args, Debug, Default)]
pub struct ConfigSetArgs {
    /// Nacelle space id
    #[arg(long)]
    pub space_id: Option<String>,

    /// Nacelle GraphQL access token
    #[arg(long)]
    pub token: Option<String>,

    /// GraphQL endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Prefix of local node types
    #[arg(long)]
    pub type_prefix: Option<String>,

    /// Fragment cache directory
    #[arg(long)]
    pub fragments_dir: Option<PathBuf>,

    /// Log every operation and its variables on each run
    #[arg(long, value_name = "BOOL")]
    pub log_operations: Option<bool>,
}
