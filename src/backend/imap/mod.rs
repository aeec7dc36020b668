pub mod backend;
pub mod config;

pub use self::backend::{Error, ImapBackend, ImapSession, ImapSessionStream, Result};
pub use self::config::ImapConfig;
