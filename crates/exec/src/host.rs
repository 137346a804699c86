use types::MemFlags;

/// The foreign-call boundary to the host emulator.
///
/// The legacy system reached these operations through a register-pinned
/// calling convention; here they are ordinary trait methods with
/// explicit parameter lists. Everything is single-threaded and
/// cooperative, so methods take `&self` and implementations use
/// interior mutability.
pub trait Host {
    /// Allocates guest memory, or `None` when free store is exhausted.
    fn alloc_mem(&self, size: u32, flags: MemFlags) -> Option<u32>;

    /// Releases a guest allocation. `size` must match the request the
    /// block was allocated with.
    fn free_mem(&self, addr: u32, size: u32);

    fn load_u32(&self, addr: u32) -> u32;
    fn store_u32(&self, addr: u32, value: u32);
    fn read_bytes(&self, addr: u32, buf: &mut [u8]);
    fn write_bytes(&self, addr: u32, data: &[u8]);

    /// Enters a no-interruption region. Nestable; every `disable` must
    /// be balanced by an `enable`.
    fn disable(&self);
    fn enable(&self);

    /// Cooperative yield: forces a scheduler pass if any process is
    /// ready to run, or falls back to a host-level idle wait.
    fn reschedule(&self);

    /// Message endpoint of the process currently executing, or 0 when
    /// no guest process is current.
    fn current_endpoint(&self) -> u32;

    /// Appends a process endpoint to the external ready queue. Callers
    /// hold the disable/enable critical section around this.
    fn add_ready(&self, endpoint: u32);

    /// Reports a symbol of a loaded image for host-side debugging.
    fn register_symbol(&self, name: &str, addr: u32);
}
