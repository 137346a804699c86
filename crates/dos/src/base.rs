use std::cell::{Cell, RefCell};
use std::rc::Rc;

use exec::Host;
use types::DosError;

use crate::fs::FileSystem;
use crate::process::Process;
use crate::taskarray::TaskNumbers;

/// State owned by the process-execution subsystem.
///
/// The legacy system reached this through an ambient library-base
/// pointer; here it is explicit and injected into everything that
/// needs it. One `Dos` per emulated machine.
pub struct Dos {
    pub host: Rc<dyn Host>,
    pub fs: Rc<dyn FileSystem>,
    pub(crate) numbers: TaskNumbers,
    pub(crate) procs: RefCell<Vec<Process>>,
    /// Error slot used when no guest process is current.
    ambient_err: Cell<i32>,
}

impl Dos {
    pub fn new(host: Rc<dyn Host>, fs: Rc<dyn FileSystem>) -> Self {
        Self {
            host,
            fs,
            numbers: TaskNumbers::new(),
            procs: RefCell::new(Vec::new()),
            ambient_err: Cell::new(0),
        }
    }

    /// Stores `err` in the current process's error slot, or in the
    /// subsystem-level slot when no process is current.
    pub fn set_io_err(&self, err: DosError) {
        let code = err.code();
        let current = self.host.current_endpoint();
        if current != 0 {
            let mut procs = self.procs.borrow_mut();
            if let Some(proc) = procs.iter_mut().find(|p| p.endpoint == current) {
                proc.io_err = code;
                return;
            }
        }
        self.ambient_err.set(code);
    }

    /// The most recent error code for the current process.
    pub fn io_err(&self) -> i32 {
        let current = self.host.current_endpoint();
        if current != 0 {
            let procs = self.procs.borrow();
            if let Some(proc) = procs.iter().find(|p| p.endpoint == current) {
                return proc.io_err;
            }
        }
        self.ambient_err.get()
    }

    /// Runs `f` against the record for `endpoint`, if it is still alive.
    pub fn with_process<T>(&self, endpoint: u32, f: impl FnOnce(&Process) -> T) -> Option<T> {
        let procs = self.procs.borrow();
        procs.iter().find(|p| p.endpoint == endpoint).map(f)
    }

    /// Number of live guest processes.
    pub fn process_count(&self) -> usize {
        self.procs.borrow().len()
    }

    /// Claims a CLI task number for `owner`'s message endpoint.
    /// Returns 0 when the registry cannot grow.
    pub fn allocate_cli_number(&self, owner: u32) -> u32 {
        self.numbers.allocate(&*self.host, owner)
    }

    /// Returns a CLI task number's slot to the free pool.
    pub fn free_cli_number(&self, number: u32) {
        self.numbers.free(&*self.host, number);
    }

    /// Message endpoint registered for CLI number `number`, or 0 when
    /// the slot is free. Occupancy is authoritative proof the numbered
    /// process is alive.
    pub fn find_cli(&self, number: u32) -> u32 {
        self.numbers.read(&*self.host, number)
    }

    /// Capacity of the task array: the highest number ever handed out
    /// rounds up to this. Never shrinks.
    pub fn max_cli(&self) -> u32 {
        self.numbers.capacity(&*self.host)
    }
}
