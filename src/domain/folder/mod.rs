pub mod folder;
pub use folder::*;

pub mod folders;
pub use folders::*;
