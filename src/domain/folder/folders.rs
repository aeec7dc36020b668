//! Folders module.
//!
//! This module contains the representation of the email folders.

use serde::Serialize;
use std::ops;

use crate::Folder;

/// Represents the list of folders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Folders(pub Vec<Folder>);

impl ops::Deref for Folders {
    type Target = Vec<Folder>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ops::DerefMut for Folders {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<Folder> for Folders {
    fn from_iter<T: IntoIterator<Item = Folder>>(iter: T) -> Self {
        Folders(iter.into_iter().collect())
    }
}
