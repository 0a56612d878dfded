// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `amux session` - session management commands

use crate::app::App;
use crate::commands::parse_env_var;
use amux_core::{AgentId, BackendKind, SessionState};
use amux_engine::CreateSpec;
use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, ValueEnum)]
pub enum BackendArg {
    Tmux,
    Local,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Tmux => BackendKind::Tmux,
            BackendArg::Local => BackendKind::Local,
        }
    }
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Create and start a session in a workspace
    Run {
        /// Workspace id (prefix match)
        #[arg(long = "ws")]
        workspace: String,
        /// Agent profile
        #[arg(long, default_value = "claude")]
        agent: String,
        /// Process backend
        #[arg(long, value_enum, default_value = "tmux")]
        backend: BackendArg,
        /// Environment variables (KEY=VALUE, repeatable)
        #[arg(short = 'e', long = "env", value_parser = parse_env_var)]
        env: Vec<(String, String)>,
        /// Prompt injected after the agent starts
        #[arg(long)]
        prompt: Option<String>,
        /// tmux window name
        #[arg(long)]
        window_name: Option<String>,
        /// Wire the process to this terminal's stdio instead of detaching
        #[arg(long)]
        foreground: bool,
        /// Block until the session reaches a terminal state
        #[arg(long)]
        wait: bool,
        /// Command to run (defaults to the agent profile's command)
        #[arg(trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// List sessions
    List,
    /// Show a session's status
    Status {
        /// Session id, id prefix, or index
        id: String,
        /// Bypass the status cache
        #[arg(long)]
        fresh: bool,
    },
    /// Stop a running session
    Stop {
        id: String,
    },
    /// Type text into a session
    Send {
        id: String,
        text: String,
    },
    /// Show how to attach a terminal to a session
    Attach {
        id: String,
    },
    /// Show the tail of a session's screen
    Screen {
        id: String,
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: u32,
    },
    /// Remove a terminal session's records
    Remove {
        id: String,
    },
}

pub async fn handle(command: SessionCommand, app: &App) -> Result<()> {
    let cancel = CancellationToken::new();
    match command {
        SessionCommand::Run {
            workspace,
            agent,
            backend,
            env,
            prompt,
            window_name,
            foreground,
            wait,
            command,
        } => {
            let workspace = app.find_workspace(&workspace)?;
            let command = if command.is_empty() {
                None
            } else {
                Some(command.join(" "))
            };

            let session = app
                .manager
                .create(CreateSpec {
                    workspace,
                    agent: AgentId::new(agent),
                    backend: backend.into(),
                    command,
                    env,
                    initial_prompt: prompt,
                    window_name,
                    detached: !foreground,
                })
                .await?;
            session.start(&cancel).await?;

            println!("session {} started (index {})", session.id(), session.index());
            if let Ok(instructions) = session.attach_instructions(&cancel).await {
                println!("attach: {}", instructions);
            }

            if wait {
                let snapshot = loop {
                    let snapshot = session.status_fresh(&cancel).await?;
                    if snapshot.state.is_terminal() {
                        break snapshot;
                    }
                    tokio::time::sleep(Duration::from_millis(200)).await;
                };
                print_status(&snapshot);
                if snapshot.state != SessionState::Completed {
                    std::process::exit(1);
                }
            }
            Ok(())
        }

        SessionCommand::List => {
            let metas = app.manager.list()?;
            if metas.is_empty() {
                println!("No sessions");
                return Ok(());
            }
            for meta in metas {
                let session = app.manager.resolve(meta.session_id.as_str(), &cancel).await?;
                let snapshot = session.status(&cancel).await?;
                println!(
                    "{:>3}  {:<12}  {:<10}  {:<12}  {}",
                    meta.index,
                    meta.session_id.abbrev(12),
                    snapshot.state,
                    meta.workspace_id.abbrev(12),
                    meta.agent_id,
                );
            }
            Ok(())
        }

        SessionCommand::Status { id, fresh } => {
            let session = app.manager.resolve(&id, &cancel).await?;
            let snapshot = if fresh {
                session.status_fresh(&cancel).await?
            } else {
                session.status(&cancel).await?
            };
            print_status(&snapshot);
            Ok(())
        }

        SessionCommand::Stop { id } => {
            let session = app.manager.resolve(&id, &cancel).await?;
            session.stop(&cancel).await?;
            let snapshot = session.status(&cancel).await?;
            println!("session {} {}", session.id(), snapshot.state);
            Ok(())
        }

        SessionCommand::Send { id, text } => {
            let session = app.manager.resolve(&id, &cancel).await?;
            session.send_input(&text, &cancel).await?;
            Ok(())
        }

        SessionCommand::Attach { id } => {
            let session = app.manager.resolve(&id, &cancel).await?;
            println!("{}", session.attach_instructions(&cancel).await?);
            Ok(())
        }

        SessionCommand::Screen { id, lines } => {
            let session = app.manager.resolve(&id, &cancel).await?;
            print!("{}", session.screen(lines, &cancel).await?);
            Ok(())
        }

        SessionCommand::Remove { id } => {
            app.manager.remove(&id, &cancel).await?;
            println!("session removed");
            Ok(())
        }
    }
}

fn print_status(snapshot: &amux_storage::SessionStateSnapshot) {
    println!("state: {}", snapshot.state);
    println!("session: {}", snapshot.session_id);
    println!("workspace: {}", snapshot.workspace_id);
    if let Some(handle) = &snapshot.handle {
        println!("handle: {}", handle);
    }
    if let Some(pid) = snapshot.pid {
        println!("pid: {}", pid);
    }
    if let Some(started_at) = snapshot.started_at {
        println!("started: {}", started_at.to_rfc3339());
    }
    if let Some(stopped_at) = snapshot.stopped_at {
        println!("stopped: {}", stopped_at.to_rfc3339());
    }
    if let Some(code) = snapshot.exit_code {
        println!("exit code: {}", code);
    }
    if let Some(error) = &snapshot.error {
        println!("error: {}", error);
    }
    if let Some(last_output) = snapshot.last_output_time {
        println!("last output: {}", last_output.to_rfc3339());
    }
}
