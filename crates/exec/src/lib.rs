//! Host emulator boundary for the guest personality.
//!
//! This crate provides:
//! - the guest memory arena every allocation lives in,
//! - the `Host` trait, the narrow foreign-call interface the
//!   personality layer runs against,
//! - `Emulator`, the single-threaded reference implementation.
//!
//! The cooperative scheduler itself is an external collaborator; only
//! its entry points (ready-queue append, reschedule, disable/enable)
//! cross this boundary.

pub mod mem;
pub use mem::GuestMemory;

pub mod host;
pub use host::Host;

pub mod emulator;
pub use emulator::{Emulator, Symbol};
