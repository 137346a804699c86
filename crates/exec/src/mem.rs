use std::cell::RefCell;
use std::rc::Rc;

use types::MemFlags;

/// Allocation granularity of the arena. Every block starts and ends on
/// this boundary, so releasing with the original request size always
/// returns the exact span that was handed out.
pub const ALIGN: u32 = 8;

/// One flat big-endian guest address space with a first-fit free-list
/// allocator on top.
///
/// All guest words are big-endian, matching the on-disk image format.
/// Address 0 is never handed out so callers can use it as a null value.
/// Out-of-bounds access is a caller bug and panics; running out of free
/// store is an ordinary condition and reports `None`.
pub struct GuestMemory {
    mem: Rc<RefCell<Vec<u8>>>,
    free: RefCell<Vec<Span>>,
}

/// A free span, kept sorted by address and coalesced with neighbors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    addr: u32,
    size: u32,
}

fn round_up(size: u32) -> u32 {
    (size + (ALIGN - 1)) & !(ALIGN - 1)
}

impl GuestMemory {
    pub fn new(memory_size: usize) -> Self {
        assert!(memory_size as u32 > ALIGN, "arena too small");
        Self {
            mem: Rc::new(RefCell::new(vec![0u8; memory_size])),
            // Keep address 0 reserved as the null sentinel.
            free: RefCell::new(vec![Span {
                addr: ALIGN,
                size: memory_size as u32 - ALIGN,
            }]),
        }
    }

    pub fn size(&self) -> usize {
        self.mem.borrow().len()
    }

    /// Total bytes currently free. Useful for leak checks: a sequence
    /// of operations that rolls back completely leaves this unchanged.
    pub fn free_bytes(&self) -> u32 {
        self.free.borrow().iter().map(|s| s.size).sum()
    }

    /// First-fit allocation. Returns `None` when no span fits; a zero
    /// request is refused the same way.
    pub fn allocate(&self, size: u32, flags: MemFlags) -> Option<u32> {
        if size == 0 {
            return None;
        }
        let size = round_up(size);
        let mut free = self.free.borrow_mut();
        let idx = free.iter().position(|s| s.size >= size)?;
        let span = free[idx];
        if span.size == size {
            free.remove(idx);
        } else {
            free[idx] = Span {
                addr: span.addr + size,
                size: span.size - size,
            };
        }
        drop(free);
        if flags.contains(MemFlags::CLEAR) {
            self.mem.borrow_mut()[span.addr as usize..(span.addr + size) as usize].fill(0);
        }
        Some(span.addr)
    }

    /// Returns a block to the free list. `size` must be the size the
    /// block was allocated with; it is rounded identically.
    pub fn release(&self, addr: u32, size: u32) {
        let size = round_up(size);
        assert!(addr as usize + size as usize <= self.size(), "release out of bounds");
        let mut free = self.free.borrow_mut();
        let idx = free.partition_point(|s| s.addr < addr);
        debug_assert!(
            idx == 0 || free[idx - 1].addr + free[idx - 1].size <= addr,
            "release overlaps a free span"
        );
        free.insert(idx, Span { addr, size });
        // Coalesce with the right neighbor, then the left.
        if idx + 1 < free.len() && free[idx].addr + free[idx].size == free[idx + 1].addr {
            free[idx].size += free[idx + 1].size;
            free.remove(idx + 1);
        }
        if idx > 0 && free[idx - 1].addr + free[idx - 1].size == free[idx].addr {
            free[idx - 1].size += free[idx].size;
            free.remove(idx);
        }
    }

    pub fn load_u32(&self, addr: u32) -> u32 {
        let mem = self.mem.borrow();
        let addr = addr as usize;
        if addr + 4 > mem.len() {
            panic!("load u32 out of bounds: addr = 0x{:08x}", addr);
        }
        u32::from_be_bytes(mem[addr..addr + 4].try_into().unwrap())
    }

    pub fn store_u32(&self, addr: u32, val: u32) {
        let mut mem = self.mem.borrow_mut();
        let addr = addr as usize;
        if addr + 4 > mem.len() {
            panic!("store u32 out of bounds: addr = 0x{:08x}", addr);
        }
        mem[addr..addr + 4].copy_from_slice(&val.to_be_bytes());
    }

    pub fn read_bytes(&self, addr: u32, buf: &mut [u8]) {
        let mem = self.mem.borrow();
        let start = addr as usize;
        let end = start + buf.len();
        if end > mem.len() {
            panic!("read bytes out of bounds: addr = 0x{:08x}", start);
        }
        buf.copy_from_slice(&mem[start..end]);
    }

    pub fn write_bytes(&self, addr: u32, data: &[u8]) {
        let mut mem = self.mem.borrow_mut();
        let start = addr as usize;
        let end = start + data.len();
        if end > mem.len() {
            panic!("write bytes out of bounds: addr = 0x{:08x}", start);
        }
        mem[start..end].copy_from_slice(data);
    }
}
