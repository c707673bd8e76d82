// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use quartermaster::config::EngineConfig;
use quartermaster::engine::LocalEngine;
use quartermaster::orchestrator::{EnsureAction, PackageOrchestrator};
use std::process::ExitCode;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "quartermaster")]
#[command(author, version, about = "Declarative package state management", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List packages or repositories
    List {
        /// What to list: installed, upgrades, available, repositories,
        /// or package specs
        #[arg(required = true)]
        args: Vec<String>,
    },
    /// Drive packages toward a desired state
    Ensure {
        /// Desired state: present, latest, absent, or autoremove
        action: String,
        /// Package specs (names, globs, or NEVRA forms)
        specs: Vec<String>,
    },
}

fn run(cli: Cli) -> Result<()> {
    let config_path = EngineConfig::resolve_path();
    let config = EngineConfig::load(&config_path)?;

    info!("Configuration loaded from {}", config_path.display());

    let engine = LocalEngine::open(config)?;
    let mut orchestrator = PackageOrchestrator::new(engine)?;

    match cli.command {
        Commands::List { args } => {
            for entry in orchestrator.list(&args)? {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
        Commands::Ensure { action, specs } => {
            let action = EnsureAction::from_keyword(&action);
            let report = orchestrator.ensure(action, &specs)?;
            print!("{}", report);
        }
    }

    Ok(())
}

/// Help and version requests parse as errors but are not usage mistakes.
fn is_informational(e: &clap::Error) -> bool {
    matches!(
        e.kind(),
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
    )
}

fn main() -> ExitCode {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Malformed invocations print the usage message and exit 1;
    // --help and --version exit 0
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            println!("{}", e);
            return if is_informational(&e) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
