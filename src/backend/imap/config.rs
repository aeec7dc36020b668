//! IMAP backend config module.
//!
//! This module contains the representation of the IMAP server
//! configuration.

use serde::{Deserialize, Serialize};
use std::result;
use thiserror::Error;

use crate::process;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot get imap password")]
    GetPasswdError(#[source] process::Error),
    #[error("cannot get imap password: password is empty")]
    GetPasswdEmptyError,
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the IMAP server configuration.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ImapConfig {
    /// Represents the IMAP server host.
    pub host: String,
    /// Represents the IMAP server port.
    pub port: u16,
    /// Enables SSL.
    pub ssl: Option<bool>,
    /// Enables StartTLS.
    pub starttls: Option<bool>,
    /// Trusts any certificate.
    pub insecure: Option<bool>,
    /// Represents the IMAP server login.
    pub login: String,
    /// Represents the IMAP server password command.
    pub passwd_cmd: String,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 993,
            ssl: None,
            starttls: None,
            insecure: None,
            login: String::new(),
            passwd_cmd: String::new(),
        }
    }
}

impl ImapConfig {
    /// Executes the password command in order to retrieve the IMAP
    /// server password.
    pub fn passwd(&self) -> Result<String> {
        let passwd = process::run(&self.passwd_cmd).map_err(Error::GetPasswdError)?;
        let passwd = passwd.lines().next().ok_or(Error::GetPasswdEmptyError)?;
        Ok(passwd.to_owned())
    }

    /// Gets the SSL IMAP option.
    pub fn ssl(&self) -> bool {
        self.ssl.unwrap_or(true)
    }

    /// Gets the StartTLS IMAP option.
    pub fn starttls(&self) -> bool {
        self.starttls.unwrap_or_default()
    }

    /// Gets the insecure IMAP option.
    pub fn insecure(&self) -> bool {
        self.insecure.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::ImapConfig;

    #[test]
    fn test_passwd_cmd() {
        let config = ImapConfig {
            passwd_cmd: "echo 'password'".into(),
            ..ImapConfig::default()
        };

        assert_eq!("password", config.passwd().unwrap());
    }

    #[test]
    fn test_defaults() {
        let config = ImapConfig::default();

        assert_eq!(993, config.port);
        assert!(config.ssl());
        assert!(!config.starttls());
        assert!(!config.insecure());
    }
}
