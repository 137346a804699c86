//! Synchronous command execution: load a command binary, spawn it as a
//! CLI process, and optionally wait for it to finish.

use log::debug;
use types::{DosError, SegPtr, COMMAND_NOT_LOADED, RETURN_OK};

use crate::base::Dos;
use crate::fs::{DirLock, FileHandle};
use crate::process::{CliSpec, SpawnConfig, DEFAULT_STACK};

/// Directory tried when a bare command name cannot be loaded verbatim.
const SYSTEM_BIN_PREFIX: &str = "C:";

impl Dos {
    /// Runs `command_line` as a CLI process.
    ///
    /// The first whitespace-delimited token names the binary; the rest
    /// is handed to the child as its argument string. The child
    /// inherits the caller's input/output unless non-nil handles are
    /// given, and receives a duplicated lock on the caller's current
    /// directory.
    ///
    /// With `asynch` set the call returns right after the spawn and the
    /// child owns the loaded segment list. Otherwise the call blocks,
    /// polling the child's task-array slot and yielding between polls,
    /// until the child exits; then the segment list is released.
    ///
    /// Returns `RETURN_OK` on success and `COMMAND_NOT_LOADED` when the
    /// binary cannot be located, loaded, or spawned. The child's own
    /// exit code is not propagated. Known limitation, preserved from
    /// the legacy system: there is no timeout, so a child that never
    /// exits blocks the caller forever.
    pub fn run_command(
        &self,
        command_line: &str,
        input: FileHandle,
        output: FileHandle,
        asynch: bool,
    ) -> i32 {
        let (name, args) = split_command(command_line.trim_start());
        if name.is_empty() {
            self.set_io_err(DosError::ObjectNotFound);
            return COMMAND_NOT_LOADED;
        }

        let seg = match self.load_with_fallback(name) {
            Some(seg) => seg,
            None => return COMMAND_NOT_LOADED,
        };

        // Inherit the caller's streams and current directory.
        let caller = self.host.current_endpoint();
        let (caller_input, caller_output, caller_dir) = self
            .with_process(caller, |p| (p.input, p.output, p.current_dir))
            .unwrap_or((FileHandle::NIL, FileHandle::NIL, DirLock::NONE));
        let dir = self.fs.dup_lock(caller_dir);

        let mut cfg = SpawnConfig::new(name);
        cfg.seglist = Some(seg);
        cfg.free_seglist = asynch;
        cfg.stack_size = DEFAULT_STACK;
        cfg.args = args;
        cfg.input = if input.is_nil() { caller_input } else { input };
        cfg.output = if output.is_nil() { caller_output } else { output };
        cfg.current_dir = dir;
        cfg.cli = Some(CliSpec::default());

        let endpoint = match self.spawn(&cfg) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                debug!("could not spawn {name}: {err}");
                self.fs.unlock(dir);
                self.unload_seg(seg);
                return COMMAND_NOT_LOADED;
            }
        };

        if asynch {
            return RETURN_OK;
        }

        // Capture the endpoint's task number before waiting. Once the
        // child exits its record is gone and must not be examined, so
        // the wait below looks only at the task-array slot.
        let number = self
            .with_process(endpoint, |p| p.task_number)
            .unwrap_or(0);
        loop {
            let slot = self.numbers.read(&*self.host, number);
            // Slot cleared: the child exited. Slot holding some other
            // endpoint: the child exited and the number was recycled.
            if slot == 0 || slot != endpoint {
                break;
            }
            self.host.reschedule();
        }

        self.unload_seg(seg);
        RETURN_OK
    }

    /// Loads `name`, retrying with the system-binary prefix when a bare
    /// name cannot be found verbatim.
    fn load_with_fallback(&self, name: &str) -> Option<SegPtr> {
        match self.load_seg(name) {
            Ok(seg) => Some(seg),
            Err(DosError::ObjectNotFound) if !name.contains([':', '/']) => {
                let fallback = format!("{SYSTEM_BIN_PREFIX}{name}");
                self.load_seg(&fallback).ok()
            }
            Err(_) => None,
        }
    }
}

/// Splits a command line into the binary name and the residual
/// argument string.
fn split_command(line: &str) -> (&str, &str) {
    match line.find(char::is_whitespace) {
        Some(split) => (&line[..split], line[split..].trim_start()),
        None => (line, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::split_command;

    #[test]
    fn splits_name_and_arguments() {
        assert_eq!(split_command("copy from to"), ("copy", "from to"));
        assert_eq!(split_command("dir"), ("dir", ""));
        assert_eq!(split_command(""), ("", ""));
        assert_eq!(split_command("echo  spaced   args"), ("echo", "spaced   args"));
    }
}
