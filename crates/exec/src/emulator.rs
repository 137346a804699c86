use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use log::trace;
use types::MemFlags;

use crate::host::Host;
use crate::mem::GuestMemory;

/// A symbol reported by the loader, kept for host-side debugging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub addr: u32,
}

/// Hook invoked on every cooperative yield. This is the external
/// scheduler's entry: it may run ready processes, drive their exit
/// paths, and call back into the personality layer.
pub type SchedulerHook = Box<dyn FnMut()>;

/// Reference `Host` implementation: one guest memory arena, a ready
/// queue, a disable/enable nesting counter, and an installable
/// scheduler hook. Strictly single-threaded; all sharing is `Cell` and
/// `RefCell`.
pub struct Emulator {
    mem: GuestMemory,
    disable_depth: Cell<u32>,
    ready: RefCell<VecDeque<u32>>,
    current: Cell<u32>,
    symbols: RefCell<Vec<Symbol>>,
    scheduler: RefCell<Option<SchedulerHook>>,
}

impl Emulator {
    pub fn new(memory_size: usize) -> Self {
        Self {
            mem: GuestMemory::new(memory_size),
            disable_depth: Cell::new(0),
            ready: RefCell::new(VecDeque::new()),
            current: Cell::new(0),
            symbols: RefCell::new(Vec::new()),
            scheduler: RefCell::new(None),
        }
    }

    pub fn memory(&self) -> &GuestMemory {
        &self.mem
    }

    /// Installs the scheduler entry invoked on `reschedule`.
    pub fn set_scheduler(&self, hook: SchedulerHook) {
        *self.scheduler.borrow_mut() = Some(hook);
    }

    /// Marks which process endpoint is currently executing (0 = none).
    pub fn set_current_endpoint(&self, endpoint: u32) {
        self.current.set(endpoint);
    }

    /// Scheduler side: removes and returns the next ready endpoint.
    pub fn take_ready(&self) -> Option<u32> {
        self.ready.borrow_mut().pop_front()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.borrow().len()
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.borrow().clone()
    }

    /// True outside any disable/enable region. Tests use this to check
    /// that critical sections are balanced.
    pub fn interrupts_enabled(&self) -> bool {
        self.disable_depth.get() == 0
    }
}

impl Host for Emulator {
    fn alloc_mem(&self, size: u32, flags: MemFlags) -> Option<u32> {
        let addr = self.mem.allocate(size, flags);
        trace!("alloc_mem({size}, {flags:?}) -> {addr:?}");
        addr
    }

    fn free_mem(&self, addr: u32, size: u32) {
        trace!("free_mem(0x{addr:08x}, {size})");
        self.mem.release(addr, size);
    }

    fn load_u32(&self, addr: u32) -> u32 {
        self.mem.load_u32(addr)
    }

    fn store_u32(&self, addr: u32, value: u32) {
        self.mem.store_u32(addr, value)
    }

    fn read_bytes(&self, addr: u32, buf: &mut [u8]) {
        self.mem.read_bytes(addr, buf)
    }

    fn write_bytes(&self, addr: u32, data: &[u8]) {
        self.mem.write_bytes(addr, data)
    }

    fn disable(&self) {
        self.disable_depth.set(self.disable_depth.get() + 1);
    }

    fn enable(&self) {
        let depth = self.disable_depth.get();
        assert!(depth > 0, "enable without matching disable");
        self.disable_depth.set(depth - 1);
    }

    fn reschedule(&self) {
        // Take the hook out for the duration of the call so a nested
        // reschedule from inside the scheduler idles instead of
        // re-entering it.
        let hook = self.scheduler.borrow_mut().take();
        match hook {
            Some(mut hook) => {
                hook();
                let mut slot = self.scheduler.borrow_mut();
                if slot.is_none() {
                    *slot = Some(hook);
                }
            }
            None => trace!("reschedule: nothing ready, idling"),
        }
    }

    fn current_endpoint(&self) -> u32 {
        self.current.get()
    }

    fn add_ready(&self, endpoint: u32) {
        self.ready.borrow_mut().push_back(endpoint);
    }

    fn register_symbol(&self, name: &str, addr: u32) {
        trace!("symbol {name} = 0x{addr:08x}");
        self.symbols.borrow_mut().push(Symbol {
            name: name.to_string(),
            addr,
        });
    }
}
