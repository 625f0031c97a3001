//! regsync CLI
//!
//! Command-line tools for regsync definition stores and registries.
//!
//! # Commands
//!
//! - `inspect` - List stored definitions
//! - `scan` - Show what the next pass would pick up, without writing
//! - `purge` - Remove definitions of deleted files

mod commands;

use clap::{Parser, Subcommand};
use regsync_core::DefinitionState;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// regsync registry and definition store tools.
#[derive(Parser)]
#[command(name = "regsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the definition store directory
    #[arg(global = true, short, long)]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored definitions
    Inspect {
        /// Only show definitions in this state (new, modified, parsed, broken, deleted)
        #[arg(long)]
        state: Option<DefinitionState>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Dry-run change detection over a registry
    Scan {
        /// Registry root directory
        #[arg(short, long)]
        registry: PathBuf,

        /// File extensions to collect, in priority order
        #[arg(short, long = "ext", value_delimiter = ',', required = true)]
        extensions: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove definitions of deleted files
    Purge {
        /// Also remove definitions whose file is missing from this registry
        #[arg(short, long)]
        registry: Option<PathBuf>,

        /// Dry run - show what would be removed
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { state, format } => {
            let store = cli.store.ok_or("Store path required for inspect")?;
            commands::inspect::run(&store, state, &format)?;
        }
        Commands::Scan {
            registry,
            extensions,
            format,
        } => {
            commands::scan::run(cli.store.as_deref(), &registry, &extensions, &format)?;
        }
        Commands::Purge { registry, dry_run } => {
            let store = cli.store.ok_or("Store path required for purge")?;
            commands::purge::run(&store, registry.as_deref(), dry_run)?;
        }
        Commands::Version => {
            println!("regsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("regsync core v{}", regsync_core::VERSION);
            println!("regsync engine v{}", regsync_engine::VERSION);
        }
    }

    Ok(())
}
