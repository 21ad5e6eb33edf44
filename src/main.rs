//! nsrc CLI entry point.

use clap::Parser;
use nsrc::cli::commands;
use nsrc::cli::{Cli, Commands};
use nsrc::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // A malformed settings file is reported by the command that needs it.
    let log_operations = nsrc::config::load_settings()
        .ok()
        .and_then(|settings| settings.verbose)
        .unwrap_or(false);
    init_tracing(cli.verbose, log_operations, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, log_operations: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(tracing_directives(verbose, log_operations))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Filter directives for a verbosity level.
///
/// `log_operations` comes from the settings file's `verbose` and lets the
/// per-operation log lines through even without `-v`.
fn tracing_directives(verbose: u8, log_operations: bool) -> String {
    let base = match verbose {
        0 => "warn",
        1 => "info,reqwest=warn,hyper=warn",
        2 => "debug,rusqlite=info,hyper=info,reqwest=info,rustls=info",
        _ => "trace",
    };
    if log_operations && verbose == 0 {
        format!("{base},nsrc::executor=info")
    } else {
        base.to_string()
    }
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    match &cli.command {
        Commands::Source { remote } => {
            commands::source::execute(remote, cli.db.as_ref(), cli.verbose, json)
        }
        Commands::Refresh {
            remote_type,
            handle,
            locale,
            remote,
        } => commands::refresh::execute(
            remote_type,
            handle,
            locale.as_deref(),
            remote,
            cli.db.as_ref(),
            cli.verbose,
            json,
        ),
        Commands::Fragments { command } => commands::fragments::execute(command, cli.verbose, json),
        Commands::Nodes { command } => commands::nodes::execute(command, cli.db.as_ref(), json),
        Commands::Status => commands::status::execute(cli.db.as_ref(), json),
        Commands::Config { command } => commands::config::execute(command, json),
        Commands::Version => commands::version::execute(json),
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
