//! opchain: check, inspect and run typed operation pipelines
//!
//! ## Commands
//!
//! - **check**: build a pipeline document and report each stage's resolved signature
//! - **run**: run a pipeline over JSON input values
//! - **signature**: resolve the input/output signatures of one operation document
//! - **catalog**: list the registered operation kinds
//!
//! ## Example Usage
//!
//! ```bash
//! # Verify every edge of a pipeline composes
//! opchain check pipeline.yaml --deny-unknown
//!
//! # Run it over a JSON array (or JSON Lines) file
//! opchain run pipeline.yaml --input values.json
//!
//! # Run it over a single value
//! opchain run pipeline.yaml --value '"42"'
//!
//! # Resolve one operation document
//! opchain signature op.json --json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

use opchain::{logging, Settings};

mod opchain_cli;

use opchain_cli::{catalog::CatalogCmd, check::CheckCmd, run::RunCmd, signature::SignatureCmd};

#[derive(Parser)]
#[command(
    name = "opchain",
    author,
    version,
    about = "Typed operation pipelines",
    long_about = "Resolve, check and run declaratively composed operation pipelines.\n\n\
                  Every edge of a pipeline is type-checked before any value flows through it."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logging, operation kinds)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log filter directive (overrides OPCHAIN_LOG and --verbose)
    #[arg(long, global = true)]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a pipeline and report the signature of each stage
    Check(CheckCmd),

    /// Run a pipeline over JSON input values
    Run(RunCmd),

    /// Resolve the signatures of one operation document
    Signature(SignatureCmd),

    /// List registered operation kinds
    Catalog(CatalogCmd),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Check(_) => "check",
            Commands::Run(_) => "run",
            Commands::Signature(_) => "signature",
            Commands::Catalog(_) => "catalog",
        }
    }

    fn deny_unknown(&self) -> bool {
        matches!(self, Commands::Check(cmd) if cmd.deny_unknown)
    }
}

fn main() -> Result<()> {
    let Cli {
        command,
        json,
        verbose,
        log,
    } = Cli::parse();

    let settings = Settings::from_env().with_overrides(log.as_deref(), verbose, command.deny_unknown());
    logging::init(&settings.log_filter)?;
    tracing::debug!(command = command.name(), ?settings, "starting");

    match command {
        Commands::Check(cmd) => cmd.execute(&settings, json, verbose),
        Commands::Run(cmd) => cmd.execute(&settings, json),
        Commands::Signature(cmd) => cmd.execute(json),
        Commands::Catalog(cmd) => cmd.execute(json),
    }
}
