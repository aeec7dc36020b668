//! Message rewrite module.
//!
//! This module contains the recursive part tree rewriter: it walks a
//! message, strips qualifying attachment leaves, exports their decoded
//! payload and leaves a plain text notice in place.

use humansize::{format_size, BINARY};
use log::debug;
use std::{
    fs, io,
    path::{Path, PathBuf},
    result,
};
use thiserror::Error;

use super::part;
use crate::{Mode, Notice, Part, PartBody, RunReport, SizeEstimate};

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot decode payload of attachment {1:?}")]
    DecodeAttachmentError(#[source] part::Error, String),
    #[error("cannot create export directory {1}")]
    CreateExportDirError(#[source] io::Error, PathBuf),
    #[error("cannot write attachment to {1}")]
    WriteAttachmentError(#[source] io::Error, PathBuf),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the part tree rewriter of one message.
pub struct Rewriter<'a> {
    mode: Mode,
    max_attachment_size: u64,
    estimate: SizeEstimate,
    export_dir: &'a Path,
    filename_prefix: &'a str,
}

impl<'a> Rewriter<'a> {
    pub fn new(
        mode: Mode,
        max_attachment_size: u64,
        estimate: SizeEstimate,
        export_dir: &'a Path,
        filename_prefix: &'a str,
    ) -> Self {
        Self {
            mode,
            max_attachment_size,
            estimate,
            export_dir,
            filename_prefix,
        }
    }

    /// Rewrites the given part tree, returning the transformed tree.
    ///
    /// Containers are never stripped themselves: their children are
    /// rewritten recursively and reassembled in the same order. A leaf
    /// is stripped when it is an attachment candidate, estimated at or
    /// above the configured threshold, not an embedded message, and
    /// carries a resolvable file name.
    pub fn rewrite(&self, mut part: Part, report: &mut RunReport) -> Result<Part> {
        match part.body {
            PartBody::Multipart(ref mut multipart) => {
                let children = std::mem::take(&mut multipart.children);
                multipart.children = children
                    .into_iter()
                    .map(|child| self.rewrite(child, report))
                    .collect::<Result<Vec<_>>>()?;

                Ok(part)
            }
            PartBody::Leaf => self.rewrite_leaf(part, report),
        }
    }

    fn rewrite_leaf(&self, part: Part, report: &mut RunReport) -> Result<Part> {
        if !part.is_attachment() {
            return Ok(part);
        }

        let estimated = self.estimate.estimate(&part) as u64;
        if estimated < self.max_attachment_size {
            return Ok(part);
        }

        // embedded messages are kept in place
        if part.ctype.mimetype == "message/rfc822" {
            return Ok(part);
        }

        let Some(filename) = part.filename.clone() else {
            debug!("attachment without file name, skipping");
            return Ok(part);
        };

        let path = self.export_path(&filename);
        if self.mode.writes_files() {
            debug!(
                "exporting {:?} ({}) to {} ({})",
                filename,
                part.ctype.mimetype,
                path.display(),
                format_size(estimated, BINARY),
            );
            let payload = part
                .decoded_payload()
                .map_err(|err| Error::DecodeAttachmentError(err, filename.clone()))?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|err| Error::CreateExportDirError(err, parent.to_owned()))?;
            }
            fs::write(&path, payload)
                .map_err(|err| Error::WriteAttachmentError(err, path.clone()))?;
        } else {
            debug!(
                "would export {:?} to {} ({})",
                filename,
                path.display(),
                format_size(estimated, BINARY),
            );
        }

        let params: Vec<(String, String)> = part
            .ctype
            .params
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let notice = Notice::new(&part.ctype.mimetype, &filename, &params);

        report.attachments += 1;
        Ok(part.into_stripped(&notice.render()))
    }

    /// Builds the export file path: the prefix (folder path and
    /// message timestamp), a space, then the original file name with
    /// path separators neutralized.
    fn export_path(&self, filename: &str) -> PathBuf {
        let filename = filename.replace(['/', '\\'], "_");
        self.export_dir
            .join(format!("{} {}", self.filename_prefix, filename))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{Mode, Notice, Part, RunReport, Rewriter, SizeEstimate};

    fn two_attachments_message() -> String {
        [
            "Date: Thu, 31 Dec 2020 23:59:00 +0000",
            "From: alice@localhost",
            "To: bob@localhost",
            "Subject: reports",
            "Content-Type: multipart/mixed; boundary=bnd",
            "",
            "--bnd",
            "Content-Type: text/plain",
            "",
            "See the attached reports.",
            "--bnd",
            "Content-Type: application/octet-stream; name=\"small.bin\"",
            "Content-Disposition: attachment; filename=\"small.bin\"",
            "Content-Transfer-Encoding: base64",
            "",
            "aGVsbG8=",
            "--bnd",
            "Content-Type: application/octet-stream; name=\"large.bin\"",
            "Content-Disposition: attachment; filename=\"large.bin\"",
            "Content-Transfer-Encoding: base64",
            "",
            &"QUJDREVGR0hJSktM".repeat(16),
            "--bnd--",
            "",
        ]
        .join("\r\n")
    }

    #[test]
    fn test_strips_only_leaves_above_threshold() {
        let export = tempfile::tempdir().unwrap();
        let part = Part::parse(two_attachments_message().into_bytes()).unwrap();
        let rewriter = Rewriter::new(
            Mode::Export,
            64,
            SizeEstimate::Encoded,
            export.path(),
            "INBOX/20201231-2359",
        );
        let mut report = RunReport::default();

        let rewritten = rewriter.rewrite(part, &mut report).unwrap();

        assert_eq!(1, report.attachments);

        let children = rewritten.children().unwrap();
        assert_eq!(3, children.len());
        assert_eq!("text/plain", children[0].ctype.mimetype);
        // the small attachment is byte-identical
        assert_eq!(Some("small.bin".into()), children[1].filename);
        assert!(String::from_utf8(children[1].to_bytes())
            .unwrap()
            .contains("aGVsbG8="));
        // the large one got replaced by the notice
        assert_eq!("text/plain", children[2].ctype.mimetype);
        let notice =
            Notice::parse(&String::from_utf8(children[2].stored_payload().to_vec()).unwrap().replace("\r\n", "\n"))
                .unwrap();
        assert_eq!("application/octet-stream", notice.content_type);
        assert_eq!("large.bin", notice.filename);

        let exported = export
            .path()
            .join("INBOX")
            .join("20201231-2359 large.bin");
        let payload = fs::read(exported).unwrap();
        assert_eq!("ABCDEFGHIJKL".repeat(16).into_bytes(), payload);
    }

    #[test]
    fn test_report_mode_writes_nothing() {
        let export = tempfile::tempdir().unwrap();
        let part = Part::parse(two_attachments_message().into_bytes()).unwrap();
        let rewriter = Rewriter::new(
            Mode::Report,
            64,
            SizeEstimate::Encoded,
            export.path(),
            "INBOX/20201231-2359",
        );
        let mut report = RunReport::default();

        rewriter.rewrite(part, &mut report).unwrap();

        assert_eq!(1, report.attachments);
        assert_eq!(
            0,
            fs::read_dir(export.path()).unwrap().count(),
            "report mode must not write files",
        );
    }

    #[test]
    fn test_embedded_message_is_kept() {
        let export = tempfile::tempdir().unwrap();
        let raw = [
            "Content-Type: message/rfc822; name=\"fwd.eml\"",
            "Content-Disposition: attachment; filename=\"fwd.eml\"",
            "",
            "Subject: embedded",
            "",
            "embedded body way above the one byte threshold",
        ]
        .join("\r\n");
        let part = Part::parse(raw.clone().into_bytes()).unwrap();
        let rewriter = Rewriter::new(Mode::Export, 1, SizeEstimate::Encoded, export.path(), "p");
        let mut report = RunReport::default();

        let rewritten = rewriter.rewrite(part, &mut report).unwrap();

        assert_eq!(0, report.attachments);
        assert_eq!(raw.into_bytes(), rewritten.to_bytes());
    }

    #[test]
    fn test_attachment_without_filename_is_kept() {
        let export = tempfile::tempdir().unwrap();
        let raw = [
            "Content-Type: application/octet-stream",
            "Content-Disposition: attachment",
            "Content-Transfer-Encoding: base64",
            "",
            &"QUJDREVGR0hJSktM".repeat(16),
        ]
        .join("\r\n");
        let part = Part::parse(raw.clone().into_bytes()).unwrap();
        let rewriter = Rewriter::new(Mode::Export, 1, SizeEstimate::Encoded, export.path(), "p");
        let mut report = RunReport::default();

        let rewritten = rewriter.rewrite(part, &mut report).unwrap();

        assert_eq!(0, report.attachments);
        assert_eq!(raw.into_bytes(), rewritten.to_bytes());
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let export = tempfile::tempdir().unwrap();
        let part = Part::parse(two_attachments_message().into_bytes()).unwrap();
        let rewriter = Rewriter::new(
            Mode::Export,
            64,
            SizeEstimate::Encoded,
            export.path(),
            "INBOX/20201231-2359",
        );
        let mut report = RunReport::default();

        let once = rewriter.rewrite(part, &mut report).unwrap();
        let bytes = once.to_bytes();
        let again = rewriter
            .rewrite(Part::parse(bytes.clone()).unwrap(), &mut report)
            .unwrap();

        assert_eq!(bytes, again.to_bytes());
        assert_eq!(1, report.attachments);
    }
}
