//! Run configuration module.
//!
//! This module contains the representation of the detach run
//! configuration, usually deserialized from a TOML file.

use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf, result};
use thiserror::Error;

use crate::{ImapConfig, SizeEstimate};

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot expand export directory {1}")]
    ExpandExportDirError(#[source] shellexpand::LookupError<env::VarError>, String),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the operating mode of a run.
#[derive(
    Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Logs what would happen, writes nothing.
    #[default]
    Report,
    /// Writes attachment files, leaves the mailbox untouched.
    Export,
    /// Writes attachment files, replaces the original messages.
    Detach,
}

impl Mode {
    pub fn writes_files(&self) -> bool {
        matches!(self, Mode::Export | Mode::Detach)
    }

    pub fn mutates_mailbox(&self) -> bool {
        matches!(self, Mode::Detach)
    }
}

/// Represents the detach run configuration.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DetachConfig {
    /// Represents the operating mode.
    pub mode: Mode,
    /// Represents the export directory. Shell variables and `~` are
    /// expanded.
    pub export_dir: String,
    /// Represents the folder to scan, subfolders included. An empty
    /// value means every folder of the account.
    pub folder: String,
    /// Only messages older than this number of days are considered.
    pub email_age_days: i64,
    /// Only messages larger than this number of bytes are considered.
    pub max_mail_size: u64,
    /// Attachments estimated at or above this number of bytes are
    /// detached.
    pub max_attachment_size: u64,
    /// Skips messages flagged by the user.
    pub ignore_flagged: bool,
    /// Represents the attachment size estimation strategy.
    pub size_estimate: SizeEstimate,
    /// Maximum number of reconnect attempts after a transient session
    /// error.
    pub max_retries: u32,
    /// Initial reconnect delay in seconds, doubled after each failed
    /// attempt.
    pub retry_delay_secs: u64,
}

impl Default for DetachConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            export_dir: String::from("export"),
            folder: String::new(),
            email_age_days: 365,
            max_mail_size: 2 * 1024 * 1024,
            max_attachment_size: 256 * 1024,
            ignore_flagged: true,
            size_estimate: SizeEstimate::default(),
            max_retries: 3,
            retry_delay_secs: 2,
        }
    }
}

impl DetachConfig {
    /// Expands the export directory into an absolute path.
    pub fn export_path(&self) -> Result<PathBuf> {
        let dir = shellexpand::full(&self.export_dir)
            .map_err(|err| Error::ExpandExportDirError(err, self.export_dir.clone()))?;
        Ok(PathBuf::from(dir.to_string()))
    }
}

/// Represents the complete configuration file.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub imap: ImapConfig,
    pub detach: DetachConfig,
}
