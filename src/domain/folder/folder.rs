//! Folder module.
//!
//! This module contains the representation of the email folder.

use serde::Serialize;
use std::{fmt, path::PathBuf};

/// Represents the folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Folder {
    /// Represents the folder hierarchy delimiter.
    pub delim: String,
    /// Represents the folder name.
    pub name: String,
}

impl Folder {
    pub fn new<D: ToString, N: AsRef<str>>(delim: D, name: N) -> Self {
        Self {
            delim: delim.to_string(),
            name: unquote(name.as_ref()),
        }
    }

    /// Builds the relative filesystem path matching the folder
    /// hierarchy. Each hierarchy level becomes one path segment, with
    /// path separators inside a segment replaced so a folder name
    /// cannot escape its export subdirectory.
    pub fn to_path(&self) -> PathBuf {
        let mut path = PathBuf::new();

        let segments: Vec<&str> = if self.delim.is_empty() {
            vec![self.name.as_str()]
        } else {
            self.name.split(self.delim.as_str()).collect()
        };

        for segment in segments {
            let segment = segment.replace(['/', '\\'], "_");
            if segment.is_empty() || segment == "." || segment == ".." {
                continue;
            }
            path.push(segment);
        }

        path
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Removes surrounding double quotes from a folder name and unescapes
/// quoted-string escapes, as found in raw LIST responses or in
/// configuration values pasted from them.
pub fn unquote(name: &str) -> String {
    if name.len() < 2 || !name.starts_with('"') || !name.ends_with('"') {
        return name.to_string();
    }

    let mut unquoted = String::with_capacity(name.len() - 2);
    let mut escaped = false;

    for c in name[1..name.len() - 1].chars() {
        if escaped {
            unquoted.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            unquoted.push(c);
        }
    }

    unquoted
}
