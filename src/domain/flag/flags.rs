use serde::Serialize;
use std::{collections::HashSet, fmt, ops};

use crate::Flag;

/// Represents the set of flags attached to a message.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Flags(pub HashSet<Flag>);

impl Flags {
    /// Builds a clone without the `\Recent` flag, which a client
    /// cannot set on append.
    pub fn clone_without_recent(&self) -> Self {
        Self::from_iter(
            self.iter()
                .filter(|flag| !matches!(flag, Flag::Recent))
                .cloned(),
        )
    }

    /// Builds the IMAP query string, like `\Seen \Answered`.
    pub fn to_imap_query(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut glue = "";

        for flag in &self.0 {
            write!(f, "{}{}", glue, flag)?;
            glue = " ";
        }

        Ok(())
    }
}

impl ops::Deref for Flags {
    type Target = HashSet<Flag>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ops::DerefMut for Flags {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<&str> for Flags {
    fn from(flags: &str) -> Self {
        Flags(
            flags
                .split_whitespace()
                .map(|flag| flag.trim().into())
                .collect(),
        )
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        let mut flags = Flags::default();
        flags.extend(iter);
        flags
    }
}
