//! IMAP backend module.
//!
//! This module contains the IMAP session wrapper driving every
//! protocol operation of a detach run.

use chrono::{DateTime, FixedOffset};
use imap_proto::NameAttribute;
use log::{debug, log_enabled, trace, Level};
use native_tls::{TlsConnector, TlsStream};
use std::{
    io::{self, Read, Write},
    net::TcpStream,
    result,
};
use thiserror::Error;
use utf7_imap::{decode_utf7_imap as decode_utf7, encode_utf7_imap as encode_utf7};

use crate::{backend, Flags, Folder, Folders};

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot create tls connector")]
    CreateTlsConnectorError(#[source] native_tls::Error),
    #[error("cannot connect to imap server")]
    ConnectImapServerError(#[source] imap::Error),
    #[error("cannot login to imap server")]
    LoginImapServerError(#[source] imap::Error),
    #[error("cannot list folders")]
    ListFoldersError(#[source] imap::Error),
    #[error("cannot select folder {1}")]
    SelectFolderError(#[source] imap::Error, String),
    #[error("cannot examine folder {1}")]
    ExamineFolderError(#[source] imap::Error, String),
    #[error("cannot search messages in folder with query: {1}")]
    SearchMessagesError(#[source] imap::Error, String),
    #[error("cannot fetch flags of messages {1}")]
    FetchFlagsError(#[source] imap::Error, String),
    #[error("cannot fetch message {1}")]
    FetchMessageError(#[source] imap::Error, u32),
    #[error("cannot find message {0}")]
    FindMessageError(u32),
    #[error("cannot get uid of message {0}")]
    GetUidError(u32),
    #[error("cannot get body of message {0}")]
    GetBodyError(u32),
    #[error("cannot append message to folder {1}")]
    AppendMessageError(#[source] imap::Error, String),
    #[error("cannot add flags {1} to message {2}")]
    AddFlagsError(#[source] imap::Error, String, u32),
    #[error("cannot expunge folder {1}")]
    ExpungeFolderError(#[source] imap::Error, String),
    #[error("cannot close imap session")]
    CloseImapSessionError(#[source] imap::Error),

    #[error(transparent)]
    ConfigError(#[from] backend::imap::config::Error),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    /// Returns true when the underlying protocol error is a transient
    /// session abort worth restarting the run for.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.imap_source(),
            Some(imap::Error::Io(_) | imap::Error::ConnectionLost)
        )
    }

    fn imap_source(&self) -> Option<&imap::Error> {
        match self {
            Error::ConnectImapServerError(err)
            | Error::LoginImapServerError(err)
            | Error::ListFoldersError(err)
            | Error::SelectFolderError(err, _)
            | Error::ExamineFolderError(err, _)
            | Error::SearchMessagesError(err, _)
            | Error::FetchFlagsError(err, _)
            | Error::FetchMessageError(err, _)
            | Error::AppendMessageError(err, _)
            | Error::AddFlagsError(err, _, _)
            | Error::ExpungeFolderError(err, _)
            | Error::CloseImapSessionError(err) => Some(err),
            _ => None,
        }
    }
}

pub enum ImapSessionStream {
    Tls(TlsStream<TcpStream>),
    Tcp(TcpStream),
}

impl Read for ImapSessionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tls(stream) => stream.read(buf),
            Self::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for ImapSessionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tls(stream) => stream.write(buf),
            Self::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tls(stream) => stream.flush(),
            Self::Tcp(stream) => stream.flush(),
        }
    }
}

pub type ImapSession = imap::Session<ImapSessionStream>;

/// Represents one authenticated IMAP session.
pub struct ImapBackend {
    session: ImapSession,
}

impl ImapBackend {
    /// Connects and authenticates a new session.
    pub fn connect(config: &super::ImapConfig) -> Result<Self> {
        let builder = TlsConnector::builder()
            .danger_accept_invalid_certs(config.insecure())
            .danger_accept_invalid_hostnames(config.insecure())
            .build()
            .map_err(Error::CreateTlsConnectorError)?;

        let mut client_builder = imap::ClientBuilder::new(&config.host, config.port);
        if config.starttls() {
            client_builder.starttls();
        }

        let client = if config.ssl() {
            client_builder.connect(|domain, tcp| {
                let connector = TlsConnector::connect(&builder, domain, tcp)?;
                Ok(ImapSessionStream::Tls(connector))
            })
        } else {
            client_builder.connect(|_, tcp| Ok(ImapSessionStream::Tcp(tcp)))
        }
        .map_err(Error::ConnectImapServerError)?;

        let mut session = client
            .login(&config.login, config.passwd()?)
            .map_err(|res| Error::LoginImapServerError(res.0))?;
        session.debug = log_enabled!(Level::Trace);

        Ok(Self { session })
    }

    /// Lists the folder named `root` and every folder below it, or
    /// every folder of the account when `root` is empty. Folders that
    /// cannot be selected are left out.
    pub fn list_folders(&mut self, root: &str) -> Result<Folders> {
        let names = if root.is_empty() {
            self.session.list(Some(""), Some("*"))
        } else {
            let pattern = format!("{}*", encode_utf7(root.to_owned()));
            self.session.list(Some(""), Some(&pattern))
        }
        .map_err(Error::ListFoldersError)?;

        let folders = Folders::from_iter(
            names
                .iter()
                .filter(|name| !name.attributes().contains(&NameAttribute::NoSelect))
                .map(|name| {
                    Folder::new(
                        name.delimiter().unwrap_or_default(),
                        decode_utf7(name.name().into()),
                    )
                }),
        );

        trace!("imap folders: {:?}", folders);
        Ok(folders)
    }

    /// Selects the given folder in read-only mode.
    pub fn examine(&mut self, folder: &str) -> Result<()> {
        let folder = encode_utf7(folder.to_owned());
        self.session
            .examine(&folder)
            .map_err(|err| Error::ExamineFolderError(err, folder.clone()))?;

        Ok(())
    }

    /// Selects the given folder.
    pub fn select(&mut self, folder: &str) -> Result<()> {
        let folder = encode_utf7(folder.to_owned());
        self.session
            .select(&folder)
            .map_err(|err| Error::SelectFolderError(err, folder.clone()))?;

        Ok(())
    }

    /// Searches the selected folder, returning the matching uids in
    /// ascending order.
    pub fn uid_search(&mut self, query: &str) -> Result<Vec<u32>> {
        let mut uids: Vec<u32> = self
            .session
            .uid_search(query)
            .map_err(|err| Error::SearchMessagesError(err, query.to_owned()))?
            .into_iter()
            .collect();
        uids.sort_unstable();

        debug!("found {} messages", uids.len());
        trace!("uids: {:?}", uids);
        Ok(uids)
    }

    /// Fetches the flags of the given uids.
    pub fn fetch_flags(&mut self, uids: &[u32]) -> Result<Vec<(u32, Flags)>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let seq = uids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let fetches = self
            .session
            .uid_fetch(&seq, "(UID FLAGS)")
            .map_err(|err| Error::FetchFlagsError(err, seq))?;

        fetches
            .iter()
            .map(|fetch| {
                let uid = fetch.uid.ok_or(Error::GetUidError(fetch.message))?;
                Ok((uid, Flags::from(fetch.flags())))
            })
            .collect()
    }

    /// Fetches the full raw bytes and the internal date of the given
    /// uid, without touching its flags.
    pub fn fetch_message(&mut self, uid: u32) -> Result<(Vec<u8>, Option<DateTime<FixedOffset>>)> {
        let fetches = self
            .session
            .uid_fetch(uid.to_string(), "(UID INTERNALDATE BODY.PEEK[])")
            .map_err(|err| Error::FetchMessageError(err, uid))?;
        let fetch = fetches.get(0).ok_or(Error::FindMessageError(uid))?;
        let body = fetch.body().ok_or(Error::GetBodyError(uid))?.to_vec();

        Ok((body, fetch.internal_date()))
    }

    /// Appends a message to the given folder with the given flags and
    /// internal date.
    pub fn append(
        &mut self,
        folder: &str,
        message: &[u8],
        flags: &Flags,
        internal_date: Option<DateTime<FixedOffset>>,
    ) -> Result<()> {
        debug!("appending message to folder {} with flags {}", folder, flags);

        let folder = encode_utf7(folder.to_owned());
        let raw_flags = flags.clone_without_recent().into_imap_flags_vec();

        match internal_date {
            Some(date) => self
                .session
                .append(&folder, message)
                .flags(raw_flags)
                .internal_date(date)
                .finish(),
            None => self
                .session
                .append(&folder, message)
                .flags(raw_flags)
                .finish(),
        }
        .map_err(|err| Error::AppendMessageError(err, folder.clone()))?;

        Ok(())
    }

    /// Marks the given uid for deletion. The deletion only becomes
    /// irreversible once the folder is expunged.
    pub fn mark_deleted(&mut self, uid: u32) -> Result<()> {
        let query = "+FLAGS (\\Deleted)";
        self.session
            .uid_store(uid.to_string(), query)
            .map_err(|err| Error::AddFlagsError(err, query.to_owned(), uid))?;

        Ok(())
    }

    /// Commits the pending deletions of the selected folder.
    pub fn expunge(&mut self, folder: &str) -> Result<()> {
        self.session
            .expunge()
            .map_err(|err| Error::ExpungeFolderError(err, folder.to_owned()))?;

        Ok(())
    }

    /// Cleanly shuts the session down.
    pub fn close(&mut self) -> Result<()> {
        self.session
            .logout()
            .map_err(Error::CloseImapSessionError)?;

        Ok(())
    }
}
