use serde::Serialize;
use std::fmt;

/// Represents the flag variants.
#[derive(Debug, Clone, Eq, Hash, PartialEq, Serialize)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Recent,
    Custom(String),
}

impl Flag {
    pub fn custom<F: ToString>(flag: F) -> Self {
        Self::Custom(flag.to_string())
    }
}

impl From<&str> for Flag {
    fn from(s: &str) -> Self {
        match s.trim_start_matches('\\').to_lowercase().as_str() {
            "seen" => Flag::Seen,
            "answered" | "replied" => Flag::Answered,
            "flagged" => Flag::Flagged,
            "deleted" | "trashed" => Flag::Deleted,
            "draft" => Flag::Draft,
            "recent" => Flag::Recent,
            _ => Flag::Custom(s.into()),
        }
    }
}

impl From<String> for Flag {
    fn from(s: String) -> Self {
        s.as_str().into()
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Seen => write!(f, "\\Seen"),
            Flag::Answered => write!(f, "\\Answered"),
            Flag::Flagged => write!(f, "\\Flagged"),
            Flag::Deleted => write!(f, "\\Deleted"),
            Flag::Draft => write!(f, "\\Draft"),
            Flag::Recent => write!(f, "\\Recent"),
            Flag::Custom(flag) => write!(f, "{}", flag),
        }
    }
}
