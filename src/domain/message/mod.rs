//! Message module.
//!
//! This module contains everything related to the content of a
//! message: the part tree, size estimation, the replacement notice and
//! the rewriter.

pub mod part;
pub use part::{Multipart, Part, PartBody};

pub mod estimate;
pub use estimate::*;

pub mod notice;
pub use notice::Notice;

pub mod rewrite;
pub use rewrite::Rewriter;
