// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! amux - agent multiplexer CLI

mod app;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{session, workspace};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "amux",
    version,
    about = "Agent multiplexer - per-task workspaces with supervised agent sessions"
)]
struct Cli {
    /// State directory override (default: $AMUX_STATE_DIR or ~/.local/state/amux)
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Session management
    #[command(subcommand)]
    Session(session::SessionCommand),
    /// Workspace management
    #[command(subcommand, alias = "workspace")]
    Ws(workspace::WorkspaceCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("AMUX_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = app::App::load(cli.state_dir)?;

    match cli.command {
        Commands::Session(command) => session::handle(command, &app).await,
        Commands::Ws(command) => workspace::handle(command, &app).await,
    }
}
