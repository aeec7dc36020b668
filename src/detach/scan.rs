//! Mailbox scan module.
//!
//! This module contains the orchestration of a detach run: folder
//! enumeration, message screening, rewriting and the append then
//! delete replacement of rewritten messages.

use chrono::Local;
use log::{debug, info, warn};
use std::{
    path::Path,
    result,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};
use thiserror::Error;

use super::reconcile::{self, FlagsMap};
use crate::{
    backend::imap, config, folder, has_attachment_larger_than, message::rewrite, DetachConfig,
    Folder, ImapBackend, ImapConfig, Part, Rewriter, RunReport,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("scan aborted after {1} attempts")]
    RetriesExhaustedError(#[source] Box<Error>, u32),
    #[error(transparent)]
    ImapError(#[from] imap::Error),
    #[error(transparent)]
    ReconcileError(#[from] reconcile::Error),
    #[error(transparent)]
    RewriteError(#[from] rewrite::Error),
    #[error(transparent)]
    ConfigError(#[from] config::Error),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    fn is_transient(&self) -> bool {
        match self {
            Error::ImapError(err) => err.is_transient(),
            Error::ReconcileError(reconcile::Error::ImapError(err)) => err.is_transient(),
            _ => false,
        }
    }
}

/// Represents one configured detach run.
pub struct Detacher {
    imap_config: ImapConfig,
    config: DetachConfig,
    interrupt: Arc<AtomicBool>,
}

impl Detacher {
    pub fn new(imap_config: ImapConfig, config: DetachConfig) -> Self {
        Self {
            imap_config,
            config,
            interrupt: Arc::default(),
        }
    }

    /// Returns the flag cooperatively cancelling the run: once set,
    /// the scan ends cleanly after the operation in progress.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// Runs the scan, restarting it from a fresh connection on
    /// transient session aborts, with a bounded number of attempts and
    /// an exponentially growing delay.
    pub fn run(&self) -> Result<RunReport> {
        let mut attempts = 0;
        let mut delay = Duration::from_secs(self.config.retry_delay_secs);

        loop {
            match self.scan() {
                Ok(report) => return Ok(report),
                Err(err) if err.is_transient() => {
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        return Err(Error::RetriesExhaustedError(Box::new(err), attempts));
                    }
                    warn!(
                        "session aborted, restarting scan in {}s (attempt {}/{}): {}",
                        delay.as_secs(),
                        attempts,
                        self.config.max_retries,
                        err,
                    );
                    thread::sleep(delay);
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn scan(&self) -> Result<RunReport> {
        let mut report = RunReport::default();
        let query = search_query(&self.config);
        let export_root = self.config.export_path()?;
        let root = folder::unquote(&self.config.folder);

        if root.is_empty() {
            info!("scanning for messages matching {:?} in all folders", query);
        } else {
            info!("scanning for messages matching {:?} in {}", query, root);
        }

        let mut backend = ImapBackend::connect(&self.imap_config)?;
        let flags_map = reconcile::collect_flags(&self.imap_config, &self.config, &query)?;
        debug!("reconciled flags of {} messages", flags_map.len());

        for folder in backend.list_folders(&root)?.iter() {
            if self.interrupted() {
                info!("cancelling scan");
                break;
            }

            report.folders += 1;
            debug!("scanning folder: {}", folder);
            backend.select(&folder.name)?;

            let uids = backend.uid_search(&query)?;
            info!("found {} messages in folder {}", uids.len(), folder);

            for uid in uids {
                if self.interrupted() {
                    break;
                }
                report.messages += 1;
                self.process_message(&mut backend, folder, uid, &flags_map, &export_root, &mut report)?;
            }

            if self.config.mode.mutates_mailbox() {
                backend.expunge(&folder.name)?;
            }
            debug!("folder completed: {}", folder);
        }

        backend.close()?;
        Ok(report)
    }

    fn process_message(
        &self,
        backend: &mut ImapBackend,
        folder: &Folder,
        uid: u32,
        flags_map: &FlagsMap,
        export_root: &Path,
        report: &mut RunReport,
    ) -> Result<()> {
        debug!("examining message {} in folder {}", uid, folder);
        let (raw, internal_date) = backend.fetch_message(uid)?;
        let text = decode_message(&raw);

        let part = match Part::parse(text.into_bytes()) {
            Ok(part) => part,
            Err(err) => {
                warn!(
                    "cannot parse message {} in folder {}, skipping: {}",
                    uid, folder, err,
                );
                report.skipped += 1;
                return Ok(());
            }
        };

        if !has_attachment_larger_than(
            &part,
            self.config.max_attachment_size,
            self.config.size_estimate,
        ) {
            debug!("message {} has no attachment above the threshold", uid);
            return Ok(());
        }

        let Some(date) = part.date() else {
            warn!(
                "cannot parse date of message {} in folder {}, skipping",
                uid, folder,
            );
            report.skipped += 1;
            return Ok(());
        };
        let prefix = format!(
            "{}/{}",
            folder.to_path().display(),
            date.format("%Y%m%d-%H%M"),
        );
        debug!("rewriting message {} with export prefix {}", uid, prefix);

        let rewriter = Rewriter::new(
            self.config.mode,
            self.config.max_attachment_size,
            self.config.size_estimate,
            export_root,
            &prefix,
        );
        let rewritten = rewriter.rewrite(part, report)?;

        if self.config.mode.mutates_mailbox() {
            // a message the reconciliation pass did not see is left
            // alone: without its flags the replacement would lose them
            let Some(flags) = reconcile::reconciled_flags(flags_map, &folder.name, uid) else {
                warn!(
                    "no reconciled flags for message {} in folder {}, skipping replacement",
                    uid, folder,
                );
                report.skipped += 1;
                return Ok(());
            };

            backend.append(&folder.name, &rewritten.to_bytes(), flags, internal_date)?;
            backend.mark_deleted(uid)?;
        }

        report.rewritten += 1;
        Ok(())
    }
}

/// Builds the server-side search query shared by the reconciliation
/// pass and the scan: messages older than the age cutoff, larger than
/// the size limit and, if configured, not user flagged.
pub fn search_query(config: &DetachConfig) -> String {
    let cutoff = Local::now().date_naive() - chrono::Duration::days(config.email_age_days);
    let mut query = format!(
        "BEFORE {} LARGER {}",
        cutoff.format("%d-%b-%Y"),
        config.max_mail_size,
    );
    if config.ignore_flagged {
        query.push_str(" UNFLAGGED");
    }

    query
}

/// Decodes raw message bytes, trying UTF-8 first, then Latin-1, then
/// lossy UTF-8 substitution.
fn decode_message(raw: &[u8]) -> String {
    match String::from_utf8(raw.to_vec()) {
        Ok(text) => text,
        Err(err) => {
            let raw = err.into_bytes();
            let (text, _, had_errors) = encoding_rs::WINDOWS_1252.decode(&raw);
            if had_errors {
                String::from_utf8_lossy(&raw).into_owned()
            } else {
                text.into_owned()
            }
        }
    }
}
