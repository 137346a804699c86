use bitflags::bitflags;

bitflags! {
    /// Memory-requirement classes understood by the guest allocator.
    ///
    /// The low bits mirror the legacy allocator's requirement word; the
    /// loader derives them from the top two bits of each hunk size word.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct MemFlags: u32 {
        /// Plain memory with no placement requirement.
        const PUBLIC = 1 << 0;
        /// Must live in the device-reachable region.
        const CHIP = 1 << 1;
        /// Prefer the CPU-only region.
        const FAST = 1 << 2;
        /// Zero-fill the allocation before returning it.
        const CLEAR = 1 << 16;
    }
}
