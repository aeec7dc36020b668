//! Run report module.
//!
//! This module contains the counters of one detach run, threaded
//! through the scan instead of living in global state.

use serde::Serialize;
use std::fmt;

/// Represents the counters of one detach run.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize)]
pub struct RunReport {
    /// Number of folders scanned.
    pub folders: usize,
    /// Number of messages examined.
    pub messages: usize,
    /// Number of messages rewritten.
    pub rewritten: usize,
    /// Number of attachments detached.
    pub attachments: usize,
    /// Number of messages skipped (unparseable, missing date or
    /// missing reconciled flags).
    pub skipped: usize,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary:")?;
        writeln!(f, "* Scanned {} folders", self.folders)?;
        writeln!(f, "* Scanned {} e-mails", self.messages)?;
        writeln!(f, "* Rewrote {} e-mails", self.rewritten)?;
        writeln!(f, "* Extracted {} attachments", self.attachments)?;
        write!(f, "* Skipped {} e-mails", self.skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::RunReport;

    #[test]
    fn test_display() {
        let report = RunReport {
            folders: 2,
            messages: 10,
            rewritten: 3,
            attachments: 4,
            skipped: 1,
        };

        let summary = report.to_string();
        assert!(summary.contains("Scanned 2 folders"));
        assert!(summary.contains("Scanned 10 e-mails"));
        assert!(summary.contains("Extracted 4 attachments"));
    }
}
