//! Replacement notice module.
//!
//! This module contains the fixed plain text notice left in place of a
//! stripped attachment, and its parser.

use regex::Regex;

/// Represents the notice replacing a stripped attachment payload.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Notice {
    /// Original content type of the attachment.
    pub content_type: String,
    /// Original file name of the attachment.
    pub filename: String,
    /// Remaining content type parameters, rendered `key=value` and
    /// comma separated.
    pub params: String,
}

impl Notice {
    pub fn new<C, F>(content_type: C, filename: F, params: &[(String, String)]) -> Self
    where
        C: ToString,
        F: ToString,
    {
        Self {
            content_type: content_type.to_string(),
            filename: filename.to_string(),
            params: params
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Renders the notice text.
    pub fn render(&self) -> String {
        format!(
            "This message contained an attachment that was stripped out.\nThe original type was: {}\nThe filename was: {},\n(and it had additional parameters of:\n{})\n",
            self.content_type, self.filename, self.params,
        )
    }

    /// Parses a notice back from its rendered text.
    pub fn parse(text: &str) -> Option<Self> {
        let re = Regex::new(
            r"(?s)This message contained an attachment that was stripped out\.\nThe original type was: (?P<content_type>[^\n]*)\nThe filename was: (?P<filename>.*),\n\(and it had additional parameters of:\n(?P<params>.*)\)\n",
        )
        .unwrap();
        let captures = re.captures(text)?;

        Some(Self {
            content_type: captures["content_type"].to_string(),
            filename: captures["filename"].to_string(),
            params: captures["params"].to_string(),
        })
    }
}
