//! Message part module.
//!
//! This module contains the representation of a message as a tree of
//! MIME parts, parsed from raw bytes and serializable back to raw
//! bytes. Parts left untouched by a rewrite serialize to their
//! original bytes.

use chrono::{DateTime, Local};
use log::debug;
use mailparse::{
    parse_content_disposition, parse_content_type, parse_headers, DispositionType, MailHeaderMap,
    ParsedContentType,
};
use std::result;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse part headers")]
    ParseHeadersError(#[source] mailparse::MailParseError),
    #[error("cannot find boundary of multipart {0}")]
    GetBoundaryError(String),
    #[error("cannot decode part payload")]
    DecodePayloadError(#[source] mailparse::MailParseError),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents a node of the message part tree.
#[derive(Debug)]
pub struct Part {
    /// Raw bytes of the part: the header block for multipart
    /// containers, the header block plus the stored payload for
    /// leaves.
    pub(crate) raw: Vec<u8>,
    /// Offset of the first byte after the header block within `raw`.
    pub(crate) body_offset: usize,
    /// Parsed Content-Type of the part.
    pub ctype: ParsedContentType,
    /// Parsed Content-Disposition type of the part.
    pub disposition: DispositionType,
    /// Attachment file name, resolved from the disposition `filename`
    /// parameter or the content type `name` parameter.
    pub filename: Option<String>,
    pub body: PartBody,
}

#[derive(Debug)]
pub enum PartBody {
    Leaf,
    Multipart(Multipart),
}

/// Represents the body of a multipart container.
#[derive(Debug)]
pub struct Multipart {
    pub boundary: String,
    pub(crate) preamble: Vec<u8>,
    pub children: Vec<Part>,
    pub(crate) epilogue: Vec<u8>,
    pub(crate) crlf: bool,
}

impl Part {
    /// Parses a part tree from raw message bytes.
    ///
    /// Whether a part is split further is decided by a single test on
    /// the content type main type, the same test `is_multipart`
    /// reflects afterwards.
    pub fn parse(raw: Vec<u8>) -> Result<Self> {
        let (ctype, disposition, filename, body_offset, crlf) = {
            let (headers, body_offset) = parse_headers(&raw).map_err(Error::ParseHeadersError)?;

            let ctype = headers
                .get_first_value("Content-Type")
                .map(|value| parse_content_type(&value))
                .unwrap_or_default();
            let cdisp = headers
                .get_first_value("Content-Disposition")
                .map(|value| parse_content_disposition(&value))
                .unwrap_or_default();
            let filename = cdisp
                .params
                .get("filename")
                .or_else(|| ctype.params.get("name"))
                .map(|name| decode_filename(name));
            let crlf = raw[..body_offset].windows(2).any(|win| win == b"\r\n");

            (ctype, cdisp.disposition, filename, body_offset, crlf)
        };

        if !ctype.mimetype.starts_with("multipart/") {
            return Ok(Self {
                raw,
                body_offset,
                ctype,
                disposition,
                filename,
                body: PartBody::Leaf,
            });
        }

        let boundary = ctype
            .params
            .get("boundary")
            .cloned()
            .ok_or_else(|| Error::GetBoundaryError(ctype.mimetype.clone()))?;

        let (preamble, sections, epilogue) = split_multipart(&raw[body_offset..], &boundary);
        let children = sections
            .into_iter()
            .map(Part::parse)
            .collect::<Result<Vec<_>>>()?;

        // containers only need their header block
        let mut raw = raw;
        raw.truncate(body_offset);

        Ok(Self {
            raw,
            body_offset,
            ctype,
            disposition,
            filename,
            body: PartBody::Multipart(Multipart {
                boundary,
                preamble,
                children,
                epilogue,
                crlf,
            }),
        })
    }

    /// Returns true when the part is a multipart container.
    pub fn is_multipart(&self) -> bool {
        matches!(self.body, PartBody::Multipart(_))
    }

    /// Returns true when the part is an attachment candidate: a part
    /// bearing a file name or an attachment disposition.
    pub fn is_attachment(&self) -> bool {
        self.filename.is_some() || self.disposition == DispositionType::Attachment
    }

    pub fn children(&self) -> Option<&[Part]> {
        match &self.body {
            PartBody::Multipart(multipart) => Some(&multipart.children),
            PartBody::Leaf => None,
        }
    }

    /// Returns the payload of a leaf exactly as stored in the message,
    /// transfer encoding included.
    pub fn stored_payload(&self) -> &[u8] {
        &self.raw[self.body_offset..]
    }

    /// Decodes the stored payload of a leaf part according to its
    /// transfer encoding.
    pub fn decoded_payload(&self) -> Result<Vec<u8>> {
        let parsed = mailparse::parse_mail(&self.raw).map_err(Error::DecodePayloadError)?;
        parsed.get_body_raw().map_err(Error::DecodePayloadError)
    }

    /// Parses the Date header of the part.
    pub fn date(&self) -> Option<DateTime<Local>> {
        let (headers, _) = parse_headers(&self.raw).ok()?;
        let date = headers.get_first_value("Date")?;
        let timestamp = mailparse::dateparse(&date).ok()?;
        DateTime::from_timestamp(timestamp, 0).map(|date| date.with_timezone(&Local))
    }

    /// Serializes the part tree back to raw bytes. Untouched leaves
    /// are emitted verbatim.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut Vec<u8>) {
        match &self.body {
            PartBody::Leaf => out.extend_from_slice(&self.raw),
            PartBody::Multipart(multipart) => {
                let eol: &[u8] = if multipart.crlf { b"\r\n" } else { b"\n" };
                out.extend_from_slice(&self.raw);
                out.extend_from_slice(&multipart.preamble);
                for child in &multipart.children {
                    out.extend_from_slice(b"--");
                    out.extend_from_slice(multipart.boundary.as_bytes());
                    out.extend_from_slice(eol);
                    child.write(out);
                    out.extend_from_slice(eol);
                }
                out.extend_from_slice(b"--");
                out.extend_from_slice(multipart.boundary.as_bytes());
                out.extend_from_slice(b"--");
                out.extend_from_slice(eol);
                out.extend_from_slice(&multipart.epilogue);
            }
        }
    }

    /// Replaces the leaf with a plain text leaf carrying the given
    /// notice. The content type is reset to bare `text/plain`, the
    /// transfer encoding and disposition headers are dropped, every
    /// other header is kept as serialized.
    pub(crate) fn into_stripped(self, notice: &str) -> Part {
        let eol = if self.raw[..self.body_offset]
            .windows(2)
            .any(|win| win == b"\r\n")
        {
            "\r\n"
        } else {
            "\n"
        };

        let mut raw = retain_headers(
            &self.raw[..self.body_offset],
            &[
                "content-type",
                "content-transfer-encoding",
                "content-disposition",
            ],
        );
        raw.extend_from_slice(format!("Content-Type: text/plain{eol}{eol}").as_bytes());
        let body_offset = raw.len();
        if eol == "\n" {
            raw.extend_from_slice(notice.as_bytes());
        } else {
            raw.extend_from_slice(notice.replace('\n', eol).as_bytes());
        }

        Part {
            raw,
            body_offset,
            ctype: ParsedContentType::default(),
            disposition: DispositionType::Inline,
            filename: None,
            body: PartBody::Leaf,
        }
    }
}

/// Decodes RFC 2047 encoded words in attachment file names.
fn decode_filename(name: &str) -> String {
    if !name.contains("=?") {
        return name.to_string();
    }

    rfc2047_decoder::Decoder::new()
        .skip_encoded_word_length(true)
        .decode(name.as_bytes())
        .unwrap_or_else(|err| {
            debug!("cannot decode attachment file name {:?}: {}", name, err);
            name.to_string()
        })
}

/// Splits a multipart body into its preamble, the raw bytes of each
/// child part, and the epilogue. The line ending preceding a boundary
/// delimiter belongs to the delimiter, so child bytes round-trip
/// exactly through serialization.
fn split_multipart(body: &[u8], boundary: &str) -> (Vec<u8>, Vec<Vec<u8>>, Vec<u8>) {
    let delim = format!("--{}", boundary).into_bytes();
    let close_delim = format!("--{}--", boundary).into_bytes();

    let mut preamble = Vec::new();
    let mut sections: Vec<Vec<u8>> = Vec::new();

    let mut section_start: Option<usize> = None;
    let mut seen_delim = false;
    let mut prev_eol_start = 0;

    let mut pos = 0;
    while pos < body.len() {
        let line_end = match body[pos..].iter().position(|&b| b == b'\n') {
            Some(i) => pos + i + 1,
            None => body.len(),
        };
        let content = trim_trailing_ws(trim_eol(&body[pos..line_end]));

        if content == delim.as_slice() || content == close_delim.as_slice() {
            if let Some(start) = section_start.take() {
                let end = prev_eol_start.max(start);
                sections.push(body[start..end].to_vec());
            } else if !seen_delim {
                preamble = body[..pos].to_vec();
            }
            seen_delim = true;

            if content == close_delim.as_slice() {
                return (preamble, sections, body[line_end..].to_vec());
            }
            section_start = Some(line_end);
        }

        let mut eol_start = line_end;
        if eol_start > pos && body[eol_start - 1] == b'\n' {
            eol_start -= 1;
            if eol_start > pos && body[eol_start - 1] == b'\r' {
                eol_start -= 1;
            }
        }
        prev_eol_start = eol_start;
        pos = line_end;
    }

    // tolerate a missing closing delimiter
    if let Some(start) = section_start {
        sections.push(body[start..].to_vec());
    } else if !seen_delim {
        preamble = body.to_vec();
    }

    (preamble, sections, Vec::new())
}

/// Copies a raw header block, dropping the headers named in `drop`
/// (case insensitive, folded continuation lines included) and the
/// terminating blank line.
fn retain_headers(block: &[u8], drop: &[&str]) -> Vec<u8> {
    let mut out = Vec::with_capacity(block.len());
    let mut dropping = false;

    for line in LineIter::new(block) {
        let content = trim_eol(line);
        if content.is_empty() {
            break;
        }
        if content[0] == b' ' || content[0] == b'\t' {
            if !dropping {
                out.extend_from_slice(line);
            }
            continue;
        }

        let name = content
            .splitn(2, |&b| b == b':')
            .next()
            .unwrap_or(content);
        let name = String::from_utf8_lossy(name).trim().to_lowercase();
        dropping = drop.contains(&name.as_str());
        if !dropping {
            out.extend_from_slice(line);
        }
    }

    out
}

struct LineIter<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> LineIter<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }
}

impl<'a> Iterator for LineIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let start = self.pos;
        let end = match self.buf[start..].iter().position(|&b| b == b'\n') {
            Some(i) => start + i + 1,
            None => self.buf.len(),
        };
        self.pos = end;
        Some(&self.buf[start..end])
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
        end -= 1;
    }
    &line[..end]
}

fn trim_trailing_ws(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b' ' || line[end - 1] == b'\t') {
        end -= 1;
    }
    &line[..end]
}


#[cfg(test)]
mod test_part_strip {
    use mailparse::DispositionType;

    use super::Part;

    fn attachment() -> Part {
        let raw = [
            "Content-Type: application/octet-stream; name=\"data.bin\"",
            "Content-Transfer-Encoding: base64",
            "Content-Disposition: attachment; filename=\"data.bin\"",
            "X-Loop: keep-me",
            "",
            "aGVsbG8gd29ybGQ=",
        ]
        .join("\r\n");

        Part::parse(raw.into_bytes()).unwrap()
    }

    #[test]
    fn test_into_stripped() {
        let stripped = attachment().into_stripped("The attachment is gone.\n");
        let raw = String::from_utf8(stripped.to_bytes()).unwrap();

        assert!(raw.starts_with("X-Loop: keep-me\r\n"));
        assert!(raw.contains("Content-Type: text/plain\r\n\r\n"));
        assert!(raw.ends_with("The attachment is gone.\r\n"));
        assert!(!raw.contains("base64"));
        assert!(!raw.contains("Content-Disposition"));
    }

    #[test]
    fn test_stripped_is_no_longer_an_attachment() {
        let stripped = attachment().into_stripped("gone\n");
        let reparsed = Part::parse(stripped.to_bytes()).unwrap();

        assert!(!reparsed.is_attachment());
        assert_eq!("text/plain", reparsed.ctype.mimetype);
        assert_eq!(DispositionType::Inline, reparsed.disposition);
        assert_eq!(None, reparsed.filename);
    }

    #[test]
    fn test_retain_headers_drops_folded_header() {
        let block = concat!(
            "Content-Type: application/octet-stream;\r\n",
            "  name=\"data.bin\"\r\n",
            "Subject: hello\r\n",
            "\r\n",
        );

        let kept = super::retain_headers(block.as_bytes(), &["content-type"]);

        assert_eq!(b"Subject: hello\r\n".to_vec(), kept);
    }
}
