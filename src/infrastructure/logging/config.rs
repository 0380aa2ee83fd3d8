//! The `logging:` section of the configuration file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter level; `RUST_LOG` directives take precedence.
    pub level: String,
    pub console: ConsoleLog,
    /// Rolling JSON file output. Absent means no log file.
    pub file: Option<FileLog>,
}

impl LogConfig {
    /// The configured level, or `None` when it is not a level name.
    pub fn level(&self) -> Option<Level> {
        self.level.parse().ok()
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleLog::default(),
            file: None,
        }
    }
}

/// What goes to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLog {
    Off,
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLog {
    pub directory: PathBuf,
    #[serde(default)]
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    Daily,
    Hourly,
    Never,
}
