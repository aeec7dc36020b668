//! IMAP flag module.
//!
//! This module provides conversion utilities between the domain flags
//! and the flags of the `imap` crate.

use std::borrow::Cow;

use crate::{Flag, Flags};

pub type RawFlag<'a> = imap::types::Flag<'a>;

impl From<&RawFlag<'_>> for Flag {
    fn from(raw: &RawFlag<'_>) -> Self {
        match raw {
            imap::types::Flag::Seen => Flag::Seen,
            imap::types::Flag::Answered => Flag::Answered,
            imap::types::Flag::Flagged => Flag::Flagged,
            imap::types::Flag::Deleted => Flag::Deleted,
            imap::types::Flag::Draft => Flag::Draft,
            imap::types::Flag::Recent => Flag::Recent,
            imap::types::Flag::Custom(flag) => Flag::Custom(flag.to_string()),
            flag => Flag::Custom(flag.to_string()),
        }
    }
}

impl From<Flag> for RawFlag<'static> {
    fn from(flag: Flag) -> Self {
        match flag {
            Flag::Seen => imap::types::Flag::Seen,
            Flag::Answered => imap::types::Flag::Answered,
            Flag::Flagged => imap::types::Flag::Flagged,
            Flag::Deleted => imap::types::Flag::Deleted,
            Flag::Draft => imap::types::Flag::Draft,
            Flag::Recent => imap::types::Flag::Recent,
            Flag::Custom(flag) => imap::types::Flag::Custom(Cow::Owned(flag)),
        }
    }
}

impl From<&[RawFlag<'_>]> for Flags {
    fn from(raws: &[RawFlag<'_>]) -> Self {
        raws.iter().map(Flag::from).collect()
    }
}

impl Flags {
    pub fn into_imap_flags_vec(self) -> Vec<RawFlag<'static>> {
        self.0.into_iter().map(RawFlag::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Flag, Flags};

    #[test]
    fn test_from_raws() {
        let raws = [
            imap::types::Flag::Seen,
            imap::types::Flag::Custom("$Forwarded".into()),
        ];
        let flags = Flags::from(raws.as_slice());

        assert_eq!(2, flags.len());
        assert!(flags.contains(&Flag::Seen));
        assert!(flags.contains(&Flag::custom("$Forwarded")));
    }

    #[test]
    fn test_round_trip() {
        let flags = Flags::from("\\Answered \\Flagged");
        let raws = flags.clone().into_imap_flags_vec();
        assert_eq!(flags, Flags::from(raws.as_slice()));
    }
}
