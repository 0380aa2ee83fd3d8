//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::serve::ServeArgs;
use crate::cli::commands::session::SessionArgs;

#[derive(Parser, Debug)]
#[command(name = "linkgate")]
#[command(about = "Linkgate - messaging session gateway", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a YAML config file (defaults to ./linkgate.yaml when present)
    #[arg(short, long, global = true, env = "LINKGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the REST API server
    Serve(ServeArgs),

    /// Inspect stored sessions
    Session(SessionArgs),
}
