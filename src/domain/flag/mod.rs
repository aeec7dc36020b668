pub mod flag;
pub mod flags;
pub mod imap;

pub use self::flag::*;
pub use self::flags::*;
