//! Size estimation module.
//!
//! This module contains the strategies used to approximate the decoded
//! size of a part payload, used both to pre-screen whole messages and
//! to decide per leaf whether it gets stripped.

use serde::{Deserialize, Serialize};

use crate::Part;

/// Represents the attachment size estimation strategy.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizeEstimate {
    /// Approximates the decoded size from the stored payload length,
    /// assuming a base64-like encoding: `len * 3 / 4`. Cheap, off by
    /// the encoding padding and line break overhead.
    #[default]
    Encoded,
    /// Decodes the transfer encoding and measures the exact size.
    Decoded,
}

impl SizeEstimate {
    /// Estimates the decoded byte size of a leaf payload.
    pub fn estimate(&self, part: &Part) -> usize {
        match self {
            Self::Encoded => part.stored_payload().len() * 3 / 4,
            Self::Decoded => part
                .decoded_payload()
                .map(|payload| payload.len())
                .unwrap_or_else(|_| part.stored_payload().len() * 3 / 4),
        }
    }
}

/// Returns true when any attachment leaf of the part tree has an
/// estimated size above the given threshold.
pub fn has_attachment_larger_than(part: &Part, threshold: u64, estimate: SizeEstimate) -> bool {
    match part.children() {
        Some(children) => children
            .iter()
            .any(|child| has_attachment_larger_than(child, threshold, estimate)),
        None => part.is_attachment() && estimate.estimate(part) as u64 > threshold,
    }
}
