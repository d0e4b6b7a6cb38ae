//! # nits CLI entry point
//!
//! Parses command-line arguments, installs the tracing subscriber, and
//! dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use nits_cli::cache::{run_cache, CacheArgs};
use nits_cli::keygen::{run_keygen, KeygenArgs};
use nits_cli::logging::{self, LogFormat};

/// Nix binary cache with signing and access-based garbage collection.
#[derive(Parser, Debug)]
#[command(name = "nits", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve or garbage-collect the binary cache.
    Cache(CacheArgs),

    /// Generate a Nix signing key pair.
    Keygen(KeygenArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "nits starting");

    let result = match cli.command {
        Commands::Cache(args) => run_cache(&args),
        Commands::Keygen(args) => run_keygen(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
