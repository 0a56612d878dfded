// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `amux ws` - workspace management commands
//!
//! Worktree creation stays with git (`git worktree add`); amux tracks the
//! resulting directory and gates its removal on the session semaphore.

use crate::app::App;
use amux_core::{Workspace, WorkspaceId};
use anyhow::{bail, Result};
use clap::Subcommand;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Subcommand)]
pub enum WorkspaceCommand {
    /// Track an existing worktree directory as a workspace
    Add {
        /// Workspace id
        id: String,
        /// Worktree checkout path
        path: PathBuf,
        /// Branch checked out there
        #[arg(long, default_value = "")]
        branch: String,
    },
    /// List workspaces with their in-use state
    List,
    /// Remove a workspace (refused while sessions hold it)
    Remove {
        /// Workspace id (prefix match)
        id: String,
        /// Stop the workspace's sessions first and remove regardless
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle(command: WorkspaceCommand, app: &App) -> Result<()> {
    let cancel = CancellationToken::new();
    match command {
        WorkspaceCommand::Add { id, path, branch } => {
            let path = path
                .canonicalize()
                .map_err(|e| anyhow::anyhow!("cannot resolve {}: {e}", path.display()))?;
            if !path.is_dir() {
                bail!("{} is not a directory", path.display());
            }
            if app.registry.get(&WorkspaceId::new(id.as_str())).is_some() {
                bail!("workspace {id} already exists");
            }
            app.registry.add(Workspace::new(id.clone(), path, branch));
            app.save_workspaces()?;
            println!("workspace {id} added");
            Ok(())
        }

        WorkspaceCommand::List => {
            let workspaces = app.registry.list();
            if workspaces.is_empty() {
                println!("No workspaces");
                return Ok(());
            }
            for workspace in workspaces {
                let (in_use, holders) = app.registry.in_use(&workspace.id, &cancel).await?;
                let usage = if in_use {
                    format!("in use ({} holder{})", holders.len(), if holders.len() == 1 { "" } else { "s" })
                } else {
                    "free".to_string()
                };
                let existence = if workspace.exists() { "" } else { "  [path missing]" };
                println!(
                    "{:<16}  {:<8}  {}{}",
                    workspace.id,
                    usage,
                    workspace.path.display(),
                    existence
                );
            }
            Ok(())
        }

        WorkspaceCommand::Remove { id, force } => {
            let workspace = app.find_workspace(&id)?;
            let report = app
                .registry
                .remove_with_check(&app.manager, &workspace.id, force, &cancel)
                .await?;
            app.save_workspaces()?;

            for session_id in &report.stopped_sessions {
                println!("stopped session {session_id}");
            }
            for (session_id, error) in &report.stop_errors {
                eprintln!("warning: could not stop session {session_id}: {error}");
            }
            println!("workspace {} removed", workspace.id);
            Ok(())
        }
    }
}
