use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::core::Engine;

#[derive(Parser)]
#[command(name = "docgraph")]
#[command(about = "Cross-file call graphs for JS/TS projects, with staleness checks")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default docgraph.toml
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Build the call graph and write a snapshot
    Build {
        /// Source directories to analyze (defaults to the configured ones)
        #[arg(short, long)]
        source: Vec<PathBuf>,

        /// Snapshot output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report units whose code changed since the last build
    Check {
        /// Snapshot to check against
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Exit with an error if anything is stale (useful for CI)
        #[arg(long)]
        fail_on_stale: bool,
    },

    /// List the units extracted from one file
    Symbols {
        /// Source file
        file: PathBuf,
    },
}

impl Cli {
    pub fn execute(self, engine: Engine) -> Result<()> {
        match self.command {
            Commands::Init { path } => engine.init(path),
            Commands::Build { source, output } => engine.build(source, output).map(|_| ()),
            Commands::Check {
                snapshot,
                fail_on_stale,
            } => engine.check(snapshot, fail_on_stale).map(|_| ()),
            Commands::Symbols { file } => engine.symbols(&file),
        }
    }
}
