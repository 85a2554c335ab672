//! pocketctl - keeps a Pocket ID instance in line with a TOML manifest.
//!
//! ```text
//! main() -> Cli::parse -> PocketctlConfig::load
//!             |
//!             +- run     Session::open -> Session::run (poll + manifest watch)
//!             +- once    Session::open -> Session::pass -> exit code
//!             +- status  Workspace::open -> render_status
//! ```
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`). Status output
//! goes to stdout.

mod args;
mod session;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use pocketctl_config::PocketctlConfig;

use crate::args::{Cli, Command};
use crate::session::{Session, Workspace, render_status, status_file};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();
    let config = PocketctlConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run => {
            let mut session = Session::open(&config)?;
            session.run().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Once => {
            let mut session = Session::open(&config)?;
            let report = session.pass().await;
            for entry in report.unconverged() {
                eprintln!("{}/{}: {}", entry.kind, entry.name, entry.outcome);
            }
            if session.workspace().all_available() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Status => {
            let workspace = Workspace::open(&config)?;
            if workspace.inventory.is_empty() {
                println!("No resources declared in {}", workspace.settings.manifest.display());
            } else {
                if !status_file(&workspace).exists() {
                    eprintln!("No status saved yet; run `pocketctl once` first.");
                }
                print!("{}", render_status(&workspace.conditions()));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
