#![no_std]

pub mod segptr;
pub use segptr::SegPtr;

pub mod memflags;
pub use memflags::MemFlags;

pub mod error;
pub use error::{DosError, COMMAND_NOT_LOADED, RETURN_OK};
