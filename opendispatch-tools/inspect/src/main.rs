//! opendispatch inspector binary
//!
//! Run with: `opendispatch-inspect [COMMAND] <MANIFEST>`

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use opendispatch_inspect::{compile_file, inspect, render_json, render_text};

#[derive(Parser)]
#[command(name = "opendispatch-inspect")]
#[command(about = "Resolve an open method hierarchy and print its dispatch tables")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the initialization report
    Report {
        /// Hierarchy manifest
        manifest: PathBuf,
    },

    /// Print the resolved overrider of every concrete argument tuple
    Resolve {
        /// Hierarchy manifest
        manifest: PathBuf,

        /// Only this method
        #[arg(short, long)]
        method: Option<String>,

        /// Report ambiguous cells instead of failing
        #[arg(long)]
        allow_ambiguous: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Report { manifest } => {
            let tables = compile_file(&manifest, true)
                .with_context(|| format!("failed to resolve {}", manifest.display()))?;
            let report = tables.report();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(report)?);
            } else {
                println!("{report}");
            }
        }
        Commands::Resolve {
            manifest,
            method,
            allow_ambiguous,
        } => {
            let tables = compile_file(&manifest, !allow_ambiguous)
                .with_context(|| format!("failed to resolve {}", manifest.display()))?;
            let inspection = inspect(&tables, method.as_deref());
            if inspection.methods.is_empty() {
                info!("no matching methods");
            }
            if cli.json {
                println!("{}", render_json(&inspection)?);
            } else {
                print!("{}", render_text(&inspection, cli.verbose));
            }
        }
    }

    Ok(())
}
