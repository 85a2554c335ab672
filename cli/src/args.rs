//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "pocketctl", version)]
#[command(about = "Keep a Pocket ID instance in line with a TOML manifest")]
pub struct Cli {
    /// Config file (default: ~/.pocketctl/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Reconcile every poll interval and whenever the manifest changes
    Run,
    /// Run a single pass (exit 1 unless every resource is Available)
    Once,
    /// Print each resource's condition from the state file
    Status,
}
