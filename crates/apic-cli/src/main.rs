//! # apic CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use apic_cli::check::{run_check, CheckArgs};
use apic_cli::document::{run_document, DocumentArgs};
use apic_cli::respond::{run_respond, RespondArgs};

/// API contract engine toolchain.
///
/// Checks endpoint declarations, renders the aggregate document and
/// validates response payloads offline.
#[derive(Parser, Debug)]
#[command(name = "apic", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Registry cache file.
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load declaration files and report broken references.
    Check(CheckArgs),

    /// Print the aggregate API document.
    Document(DocumentArgs),

    /// Validate a response payload against its declaration.
    Respond(RespondArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let mut stdout = std::io::stdout().lock();
    let cache = cli.cache.as_deref();
    let result = match &cli.command {
        Commands::Check(args) => run_check(args, &mut stdout),
        Commands::Document(args) => run_document(cache, args, &mut stdout),
        Commands::Respond(args) => run_respond(cache, args, &mut stdout),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
