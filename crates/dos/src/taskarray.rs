//! The CLI task-number registry: a growable array of machine words in
//! guest memory. Slot 0 holds the capacity; slots 1..=capacity hold
//! the owning process's message-endpoint address, or zero when free.
//!
//! Numbers are never renumbered: growth copies every slot forward, so
//! an assigned number stays valid (same owner) for the life of its
//! process and is recycled only after being freed. All slot traffic
//! runs inside the host's disable/enable critical section because any
//! process may allocate or free any slot.

use std::cell::Cell;

use exec::Host;
use log::trace;
use types::MemFlags;

/// Fixed growth increment: a full array grows by this many slots.
pub const GROWTH: u32 = 8;

pub struct TaskNumbers {
    /// Guest address of the array, 0 until the first allocation.
    /// Lazily created, never destroyed: its lifetime is the
    /// subsystem's.
    base: Cell<u32>,
}

fn array_bytes(capacity: u32) -> u32 {
    (1 + capacity) * 4
}

impl TaskNumbers {
    pub fn new() -> Self {
        Self { base: Cell::new(0) }
    }

    /// Claims a free number for `owner`, growing the array when every
    /// slot is taken. Returns 0 when the expansion allocation fails,
    /// the registry's only failure mode.
    pub fn allocate(&self, host: &dyn Host, owner: u32) -> u32 {
        host.disable();
        let number = self.allocate_locked(host, owner);
        host.enable();
        trace!("task number {number} -> endpoint 0x{owner:08x}");
        number
    }

    fn allocate_locked(&self, host: &dyn Host, owner: u32) -> u32 {
        let mut base = self.base.get();
        if base == 0 {
            let Some(fresh) = host.alloc_mem(array_bytes(GROWTH), MemFlags::PUBLIC | MemFlags::CLEAR)
            else {
                return 0;
            };
            host.store_u32(fresh, GROWTH);
            self.base.set(fresh);
            base = fresh;
        }

        let capacity = host.load_u32(base);
        for number in 1..=capacity {
            if host.load_u32(base + number * 4) == 0 {
                host.store_u32(base + number * 4, owner);
                return number;
            }
        }

        // Every slot is live: allocate a wider array, copy every slot
        // forward, claim the first new one, and swap. Capacity is
        // monotonically non-decreasing.
        let new_capacity = capacity + GROWTH;
        let Some(fresh) = host.alloc_mem(array_bytes(new_capacity), MemFlags::PUBLIC | MemFlags::CLEAR)
        else {
            return 0;
        };
        host.store_u32(fresh, new_capacity);
        for number in 1..=capacity {
            host.store_u32(fresh + number * 4, host.load_u32(base + number * 4));
        }
        let number = capacity + 1;
        host.store_u32(fresh + number * 4, owner);
        self.base.set(fresh);
        host.free_mem(base, array_bytes(capacity));
        number
    }

    /// Clears a slot. Out-of-range numbers are ignored; no compaction
    /// happens, the number is simply reusable afterwards.
    pub fn free(&self, host: &dyn Host, number: u32) {
        host.disable();
        let base = self.base.get();
        if base != 0 && number >= 1 && number <= host.load_u32(base) {
            host.store_u32(base + number * 4, 0);
            trace!("task number {number} freed");
        }
        host.enable();
    }

    /// The slot's current contents: the owner's endpoint address, or 0
    /// for a free or out-of-range number.
    pub fn read(&self, host: &dyn Host, number: u32) -> u32 {
        let base = self.base.get();
        if base == 0 || number < 1 || number > host.load_u32(base) {
            return 0;
        }
        host.load_u32(base + number * 4)
    }

    pub fn capacity(&self, host: &dyn Host) -> u32 {
        let base = self.base.get();
        if base == 0 { 0 } else { host.load_u32(base) }
    }
}

impl Default for TaskNumbers {
    fn default() -> Self {
        Self::new()
    }
}
