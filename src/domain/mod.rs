pub mod flag;
pub use flag::{Flag, Flags};

pub mod folder;
pub use folder::*;

pub mod message;
pub use message::*;
