//! Flag reconciliation module.
//!
//! The scan session cannot observe message flags once it starts
//! mutating the mailbox it walks, so the flags of every matching
//! message are collected up front by a dedicated read-only session.
//! The scan later joins the two sessions by folder name and uid.

use log::debug;
use std::{collections::HashMap, result};
use thiserror::Error;

use crate::{backend::imap, DetachConfig, Flags, ImapBackend, ImapConfig};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    ImapError(#[from] imap::Error),
}

pub type Result<T> = result::Result<T, Error>;

/// Identifies a message across the two sessions of a run: the folder
/// name plus the protocol-assigned uid, which is only unique within
/// one folder.
///
/// The correlation is best effort: a message added, removed or
/// renumbered between the two sessions no longer reconciles, which the
/// scan treats as an explicit skip.
pub type MessageKey = (String, u32);

pub type FlagsMap = HashMap<MessageKey, Flags>;

/// Collects the flags of every message matching the given search
/// query, in the configured folder and its subfolders, using a
/// session of its own. Performs no mutation.
pub fn collect_flags(
    imap_config: &ImapConfig,
    config: &DetachConfig,
    query: &str,
) -> Result<FlagsMap> {
    let mut backend = ImapBackend::connect(imap_config)?;
    let mut flags_map = FlagsMap::new();

    let root = crate::folder::unquote(&config.folder);
    for folder in backend.list_folders(&root)?.iter() {
        debug!("scanning folder {} for message flags", folder);
        backend.examine(&folder.name)?;

        let uids = backend.uid_search(query)?;
        for (uid, flags) in backend.fetch_flags(&uids)? {
            debug!("message {} flags: {}", uid, flags);
            flags_map.insert((folder.name.clone(), uid), flags);
        }
    }

    backend.close()?;
    Ok(flags_map)
}

/// Looks up the reconciled flags of a message. `None` means the
/// mailbox changed between the two sessions and the message must not
/// be replaced.
pub fn reconciled_flags<'a>(flags_map: &'a FlagsMap, folder: &str, uid: u32) -> Option<&'a Flags> {
    flags_map.get(&(folder.to_owned(), uid))
}
