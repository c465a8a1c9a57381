//! Sign-off CLI
//!
//! Operator tooling for the sign-off engine:
//! - Validate workflow configuration files
//! - Show a template's step table and return policy
//! - Check signature images against the upload limits
//! - Dry-run scripted case operations against an in-memory engine

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod output;

use error::CliError;
use output::OutputFormat;

/// Sign-off CLI application
#[derive(Parser)]
#[command(name = "signoff")]
#[command(about = "Sign-off workflow tooling", long_about = None)]
#[command(version)]
struct Cli {
    /// Engine configuration file (TOML or YAML)
    #[arg(short, long, env = "SIGNOFF_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table", global = true)]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and list its templates
    Check,

    /// Show the steps and return policy of a template
    Show {
        /// Template id
        template: String,
    },

    /// Check a signature image against the configured limits
    InspectSignature {
        /// Image file
        file: PathBuf,
    },

    /// Run a scripted sequence of operations against an in-memory engine
    Simulate {
        /// Script file (YAML or JSON list of operations)
        script: PathBuf,

        /// Stop at the first failing operation
        #[arg(long)]
        strict: bool,
    },
}

fn require_config(config: Option<&PathBuf>) -> Result<&PathBuf, CliError> {
    config.ok_or_else(|| CliError::InvalidInput("--config (or SIGNOFF_CONFIG) is required".into()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let config = cli.config.as_ref();
    match cli.command {
        Commands::Check => {
            let path = require_config(config)?;
            commands::check::execute(path, cli.output)
                .with_context(|| format!("checking {}", path.display()))
        }
        Commands::Show { template } => {
            let path = require_config(config)?;
            commands::show::execute(path, &template, cli.output)
                .with_context(|| format!("showing template '{}'", template))
        }
        Commands::InspectSignature { file } => {
            commands::inspect::execute(&file, config.map(|p| p.as_path()), cli.output)
                .with_context(|| format!("inspecting {}", file.display()))
        }
        Commands::Simulate { script, strict } => {
            let path = require_config(config)?;
            commands::simulate::execute(path, &script, strict, cli.output)
                .with_context(|| format!("running {}", script.display()))
        }
    }
}
