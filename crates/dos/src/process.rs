//! Process control records and the spawner.
//!
//! A guest process here is bookkeeping around an entry point: a stack,
//! a copied argument string, inherited I/O handles, an optional CLI
//! control block with its task number, and a message-endpoint block in
//! guest memory whose address identifies the process everywhere (ready
//! queue, task array slots). Spawning never leaves a half-created
//! process behind: the record only becomes visible once nothing can
//! fail.

use log::debug;
use types::{DosError, MemFlags, SegPtr};

use crate::base::Dos;
use crate::fs::{DirLock, FileHandle};

/// Smallest stack a spawned process can get; smaller requests are
/// clamped up to this.
pub const MIN_STACK: u32 = 4096;

/// Default stack for command-line processes.
pub const DEFAULT_STACK: u32 = 4096;

/// Size of the message-endpoint block allocated per process.
const ENDPOINT_BYTES: u32 = 32;

/// A guest allocation tracked by address and requested size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuestBuf {
    pub addr: u32,
    pub len: u32,
}

/// Buffer-length hints for the CLI control block, supplied by the
/// caller that requests CLI-process semantics.
#[derive(Clone, Copy, Debug)]
pub struct CliSpec {
    pub dir_name_len: u32,
    pub command_name_len: u32,
    pub command_file_len: u32,
    pub prompt_len: u32,
}

impl Default for CliSpec {
    fn default() -> Self {
        Self {
            dir_name_len: 256,
            command_name_len: 256,
            command_file_len: 256,
            prompt_len: 64,
        }
    }
}

/// Command-line-interface control block owned by a CLI process.
#[derive(Debug)]
pub struct CliBlock {
    pub dir_name: GuestBuf,
    pub command_name: GuestBuf,
    pub command_file: GuestBuf,
    pub prompt: GuestBuf,
    /// Default stack for commands, in words.
    pub default_stack: u32,
}

impl CliBlock {
    fn buffers(&self) -> [GuestBuf; 4] {
        [self.dir_name, self.command_name, self.command_file, self.prompt]
    }
}

/// Configuration for one spawn. Either `entry` or `seglist` must be
/// given; with no explicit entry the process starts at the first
/// executable byte of the segment list.
pub struct SpawnConfig<'a> {
    pub name: &'a str,
    pub entry: Option<u32>,
    pub seglist: Option<SegPtr>,
    /// Transfer segment-list ownership: the exit path unloads it.
    pub free_seglist: bool,
    pub stack_size: u32,
    pub priority: i8,
    /// Copied at spawn; the caller may free or reuse its buffer.
    pub args: &'a str,
    pub input: FileHandle,
    pub output: FileHandle,
    /// Already duplicated for the child; released by the exit path.
    pub current_dir: DirLock,
    /// CLI-process semantics: allocate a CLI block and a task number.
    pub cli: Option<CliSpec>,
}

impl<'a> SpawnConfig<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            entry: None,
            seglist: None,
            free_seglist: false,
            stack_size: DEFAULT_STACK,
            priority: 0,
            args: "",
            input: FileHandle::NIL,
            output: FileHandle::NIL,
            current_dir: DirLock::NONE,
            cli: None,
        }
    }
}

/// One guest process as the personality layer sees it.
#[derive(Debug)]
pub struct Process {
    /// Guest address of the message-endpoint block; identifies the
    /// process in the ready queue and the task array.
    pub endpoint: u32,
    pub name: String,
    pub entry: u32,
    pub priority: i8,
    pub stack: GuestBuf,
    /// NUL-terminated copy of the argument string.
    pub args: GuestBuf,
    pub input: FileHandle,
    pub output: FileHandle,
    pub current_dir: DirLock,
    pub seglist: Option<SegPtr>,
    pub free_seglist: bool,
    pub cli: Option<CliBlock>,
    /// 0 unless this is a CLI process.
    pub task_number: u32,
    /// Settable per-process error code.
    pub io_err: i32,
}

impl Dos {
    /// Builds a runnable process and appends it to the external ready
    /// queue. Returns the new process's endpoint address.
    ///
    /// Any failure rolls back completely; the scheduler never sees a
    /// half-created process.
    pub fn spawn(&self, cfg: &SpawnConfig<'_>) -> Result<u32, DosError> {
        let entry = match (cfg.entry, cfg.seglist) {
            (Some(entry), _) => entry,
            // First executable byte: the word after the link word.
            (None, Some(seg)) => seg.addr() + 4,
            (None, None) => {
                self.set_io_err(DosError::MissingEntry);
                return Err(DosError::MissingEntry);
            }
        };

        let host = &*self.host;
        let stack_size = cfg.stack_size.max(MIN_STACK);
        let result = (|| {
            let stack_addr = host
                .alloc_mem(stack_size, MemFlags::PUBLIC)
                .ok_or(DosError::NoFreeStore)?;
            let stack = GuestBuf { addr: stack_addr, len: stack_size };

            let endpoint = match host.alloc_mem(ENDPOINT_BYTES, MemFlags::PUBLIC | MemFlags::CLEAR) {
                Some(addr) => addr,
                None => {
                    host.free_mem(stack.addr, stack.len);
                    return Err(DosError::NoFreeStore);
                }
            };

            let args = match self.copy_args(cfg.args) {
                Some(buf) => buf,
                None => {
                    host.free_mem(endpoint, ENDPOINT_BYTES);
                    host.free_mem(stack.addr, stack.len);
                    return Err(DosError::NoFreeStore);
                }
            };

            let (cli, task_number) = match cfg.cli {
                Some(spec) => match self.build_cli(&spec, cfg.name, stack_size, endpoint) {
                    Ok((block, number)) => (Some(block), number),
                    Err(err) => {
                        // The process has not been made visible yet, so
                        // releasing its allocations is a full rollback.
                        host.free_mem(args.addr, args.len);
                        host.free_mem(endpoint, ENDPOINT_BYTES);
                        host.free_mem(stack.addr, stack.len);
                        return Err(err);
                    }
                },
                None => (None, 0),
            };

            Ok(Process {
                endpoint,
                name: cfg.name.to_string(),
                entry,
                priority: cfg.priority,
                stack,
                args,
                input: cfg.input,
                output: cfg.output,
                current_dir: cfg.current_dir,
                seglist: cfg.seglist,
                free_seglist: cfg.free_seglist,
                cli,
                task_number,
                io_err: 0,
            })
        })();

        let proc = match result {
            Ok(proc) => proc,
            Err(err) => {
                self.set_io_err(err);
                return Err(err);
            }
        };

        let endpoint = proc.endpoint;
        debug!(
            "spawned {} (endpoint 0x{endpoint:08x}, entry 0x{:08x}, stack {}, cli {})",
            proc.name, proc.entry, proc.stack.len, proc.task_number
        );
        self.procs.borrow_mut().push(proc);
        // Ready-queue insertion follows the same critical-section
        // discipline as the task array.
        host.disable();
        host.add_ready(endpoint);
        host.enable();
        Ok(endpoint)
    }

    /// Exit path: tears down everything the record owns and returns the
    /// task-number slot. The external scheduler calls this when the
    /// process's entry returns.
    pub fn exit_process(&self, endpoint: u32) {
        let proc = {
            let mut procs = self.procs.borrow_mut();
            match procs.iter().position(|p| p.endpoint == endpoint) {
                Some(index) => procs.remove(index),
                None => {
                    debug!("exit for unknown endpoint 0x{endpoint:08x}");
                    return;
                }
            }
        };
        debug!("process {} exiting (cli {})", proc.name, proc.task_number);

        let host = &*self.host;
        if proc.task_number != 0 {
            self.numbers.free(host, proc.task_number);
        }
        if let Some(cli) = &proc.cli {
            for buf in cli.buffers().iter().filter(|b| b.len != 0) {
                host.free_mem(buf.addr, buf.len);
            }
        }
        host.free_mem(proc.args.addr, proc.args.len);
        host.free_mem(proc.stack.addr, proc.stack.len);
        host.free_mem(proc.endpoint, ENDPOINT_BYTES);
        self.fs.unlock(proc.current_dir);
        if proc.free_seglist {
            if let Some(seg) = proc.seglist {
                self.unload_seg(seg);
            }
        }
    }

    /// Copies the argument string into a NUL-terminated guest buffer.
    fn copy_args(&self, args: &str) -> Option<GuestBuf> {
        let len = args.len() as u32 + 1;
        let addr = self.host.alloc_mem(len, MemFlags::PUBLIC | MemFlags::CLEAR)?;
        self.host.write_bytes(addr, args.as_bytes());
        Some(GuestBuf { addr, len })
    }

    /// Allocates the CLI control block and claims a task number.
    /// Partial failures release whatever was already allocated here;
    /// the caller rolls back the rest.
    fn build_cli(
        &self,
        spec: &CliSpec,
        name: &str,
        stack_size: u32,
        endpoint: u32,
    ) -> Result<(CliBlock, u32), DosError> {
        let host = &*self.host;
        let lens = [
            spec.dir_name_len,
            spec.command_name_len,
            spec.command_file_len,
            spec.prompt_len,
        ];
        let mut bufs = [GuestBuf { addr: 0, len: 0 }; 4];
        for index in 0..bufs.len() {
            let len = lens[index];
            if len == 0 {
                continue;
            }
            match host.alloc_mem(len, MemFlags::PUBLIC | MemFlags::CLEAR) {
                Some(addr) => bufs[index] = GuestBuf { addr, len },
                None => {
                    for allocated in bufs[..index].iter().filter(|b| b.len != 0) {
                        host.free_mem(allocated.addr, allocated.len);
                    }
                    return Err(DosError::NoFreeStore);
                }
            }
        }

        let block = CliBlock {
            dir_name: bufs[0],
            command_name: bufs[1],
            command_file: bufs[2],
            prompt: bufs[3],
            default_stack: stack_size / 4,
        };

        // Record the command name, truncated to the caller's hint and
        // keeping the terminating NUL.
        if block.command_name.len != 0 {
            let name_bytes = name.as_bytes();
            let keep = name_bytes.len().min(block.command_name.len as usize - 1);
            self.host.write_bytes(block.command_name.addr, &name_bytes[..keep]);
        }

        let number = self.numbers.allocate(host, endpoint);
        if number == 0 {
            for buf in block.buffers().iter().filter(|b| b.len != 0) {
                host.free_mem(buf.addr, buf.len);
            }
            return Err(DosError::NoFreeStore);
        }
        Ok((block, number))
    }
}
