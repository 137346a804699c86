//! Process-execution personality of the guest OS.
//!
//! This crate reimplements the command-execution surface of a legacy
//! 32-bit operating system on top of a host CPU emulator: the
//! relocatable-binary loader, the CLI task-number registry, the process
//! spawner, and the synchronous spawn-and-wait coordinator. Guest
//! processes share one address space and are scheduled cooperatively by
//! an external collaborator reached through `exec::Host`.

pub mod base;
pub use base::Dos;

pub mod fs;
pub use fs::{DirLock, FileHandle, FileSystem, MemFs};

pub mod hunk;

pub mod loader;

pub mod taskarray;

pub mod process;
pub use process::{CliSpec, SpawnConfig, DEFAULT_STACK, MIN_STACK};

pub mod run;
