pub mod imap;

pub use self::imap::{ImapBackend, ImapConfig, ImapSession, ImapSessionStream};
