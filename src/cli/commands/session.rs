//! Session CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::commands::build_service;
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::{format_timestamp, Config, Session};
use crate::services::SessionLifecycleService;

#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommands,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List stored sessions
    List {
        /// Show only active sessions
        #[arg(long)]
        active: bool,
    },
    /// Show session details
    Show {
        /// Session ID or name
        id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct SessionOutput {
    pub id: String,
    pub name: String,
    pub status: String,
    pub external_id: String,
    pub is_active: bool,
    pub last_seen: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Session> for SessionOutput {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            status: s.status.as_str().to_string(),
            external_id: s.external_id.clone(),
            is_active: s.is_active,
            last_seen: s.last_seen.map(format_timestamp),
            created_at: format_timestamp(s.created_at),
            updated_at: format_timestamp(s.updated_at),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SessionListOutput {
    pub sessions: Vec<SessionOutput>,
    pub total: usize,
}

impl CommandOutput for SessionListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "name", "status", "active", "last seen"]);
        for s in &self.sessions {
            table.add_row(vec![
                s.id.chars().take(8).collect::<String>(),
                s.name.clone(),
                s.status.clone(),
                if s.is_active { "yes" } else { "no" }.to_string(),
                s.last_seen.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        render_list("session", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SessionDetailOutput {
    pub session: SessionOutput,
}

impl CommandOutput for SessionDetailOutput {
    fn to_human(&self) -> String {
        let s = &self.session;
        let mut lines = vec![
            format!("Session: {}", s.id),
            format!("Name: {}", s.name),
            format!("Status: {}", s.status),
            format!("Active: {}", s.is_active),
        ];

        if !s.external_id.is_empty() {
            lines.push(format!("External ID: {}", s.external_id));
        }
        if let Some(ref seen) = s.last_seen {
            lines.push(format!("Last Seen: {seen}"));
        }

        lines.push(format!("Created: {}", s.created_at));
        lines.push(format!("Updated: {}", s.updated_at));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: SessionArgs, config: &Config, json_mode: bool) -> Result<()> {
    let service = build_service(config).await?;

    match args.command {
        SessionCommands::List { active } => {
            let sessions = service.list_sessions(active).await?;
            let out = SessionListOutput {
                total: sessions.len(),
                sessions: sessions.iter().map(SessionOutput::from).collect(),
            };
            output(&out, json_mode);
        }
        SessionCommands::Show { id } => {
            let session = resolve_session(&service, &id).await?;
            output(
                &SessionDetailOutput {
                    session: SessionOutput::from(&session),
                },
                json_mode,
            );
        }
    }

    Ok(())
}

/// Look a session up by id, falling back to its name.
async fn resolve_session(service: &SessionLifecycleService, id_or_name: &str) -> Result<Session> {
    match service.get_session(id_or_name).await {
        Ok(session) => Ok(session),
        Err(DomainError::NotFound(_)) => Ok(service.get_session_by_name(id_or_name).await?),
        Err(err) => Err(err.into()),
    }
}
