//! JSONL forward log: one line per delivery attempt.

use crate::forward::EventIdSource;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A single delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardLogEntry {
    pub timestamp: String,
    pub row_id: String,
    pub event_id: Option<String>,
    pub source: EventIdSource,
    pub status: String,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Append-only JSONL log of forwarded alerts.
pub struct ForwardLog {
    file: File,
    path: PathBuf,
}

impl ForwardLog {
    /// Open or create the log file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open forward log: {}", path.display()))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&mut self, entry: &ForwardLogEntry) -> Result<()> {
        let json = serde_json::to_string(entry)?;
        writeln!(self.file, "{json}")?;
        Ok(())
    }
}
