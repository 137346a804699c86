//! The executable loader: turns a relocatable hunk image into a linked
//! segment list in guest memory.
//!
//! Loading is all-or-nothing. Every block allocated for a partially
//! read image is released again on the first error, so a failed load
//! leaves guest memory exactly as it found it and reports through the
//! per-process error code.

use std::io::Read;

use log::{debug, trace, warn};
use types::{DosError, MemFlags, SegPtr};

use crate::base::Dos;
use crate::hunk::{
    class_flags, split_size_word, tag_name, HunkReader, HUNK_BSS, HUNK_CODE, HUNK_DATA,
    HUNK_DEBUG, HUNK_END, HUNK_HEADER, HUNK_RELOC32, HUNK_SYMBOL, VALUE_MASK,
};

/// Bytes in front of every segment payload: the total-size word used to
/// release the block, then the link word the segment pointer addresses.
pub const SEG_OVERHEAD: u32 = 8;

/// Scratch mapping from hunk index to allocated block base address.
/// Lives for one load; on failure it releases everything it holds.
struct HunkTable<'a> {
    dos: &'a Dos,
    blocks: Vec<u32>,
}

impl<'a> HunkTable<'a> {
    fn new(dos: &'a Dos, table_size: usize) -> Self {
        Self {
            dos,
            blocks: vec![0; table_size],
        }
    }

    fn set(&mut self, index: usize, base: u32) {
        self.blocks[index] = base;
    }

    fn base(&self, index: usize) -> u32 {
        self.blocks[index]
    }

    /// Payload base of an active hunk; inactive or out-of-range hunk
    /// references are a format violation.
    fn payload_base(&self, index: usize) -> Result<u32, DosError> {
        match self.blocks.get(index) {
            Some(&base) if base != 0 => Ok(base + SEG_OVERHEAD),
            _ => Err(DosError::ObjectNotFound),
        }
    }

    /// Payload bytes of an active hunk, recovered from its size word.
    fn payload_size(&self, index: usize) -> Result<u32, DosError> {
        match self.blocks.get(index) {
            Some(&base) if base != 0 => Ok(self.dos.host.load_u32(base) - SEG_OVERHEAD),
            _ => Err(DosError::ObjectNotFound),
        }
    }

    fn release_all(&mut self) {
        for &base in &self.blocks {
            if base != 0 {
                let total = self.dos.host.load_u32(base);
                self.dos.host.free_mem(base, total);
            }
        }
        self.blocks.clear();
    }
}

impl Dos {
    /// Loads the binary at `path` and returns the head of its segment
    /// list. On failure guest memory is exactly as before the call and
    /// the per-process error code is set.
    pub fn load_seg(&self, path: &str) -> Result<SegPtr, DosError> {
        let result = match self.fs.open(path) {
            Some(stream) => self.load_hunks(&mut HunkReader::new(stream)),
            None => Err(DosError::ObjectNotFound),
        };
        match result {
            Ok(seg) => {
                debug!("loaded {path}: first segment {seg}");
                Ok(seg)
            }
            Err(err) => {
                debug!("load of {path} failed: {err}");
                self.set_io_err(err);
                Err(err)
            }
        }
    }

    /// Releases every block of a segment list. A null pointer is
    /// tolerated so failed loads can be unloaded unconditionally.
    pub fn unload_seg(&self, seg: SegPtr) {
        let mut link = seg;
        while !link.is_null() {
            let addr = link.addr();
            let next = SegPtr::from_raw(self.host.load_u32(addr));
            let base = addr - 4;
            let total = self.host.load_u32(base);
            self.host.free_mem(base, total);
            link = next;
        }
    }

    fn load_hunks<R: Read>(&self, r: &mut HunkReader<R>) -> Result<SegPtr, DosError> {
        let magic = r.word()?;
        if magic != HUNK_HEADER {
            debug!("not a loadable object: leading word 0x{magic:08x}");
            return Err(DosError::ObjectNotFound);
        }
        let table_size = r.word()? as usize;
        let first = r.word()? as usize;
        let last = r.word()? as usize;
        if table_size == 0 || first > last || last >= table_size {
            debug!("bad hunk table geometry: size {table_size}, active {first}..{last}");
            return Err(DosError::ObjectNotFound);
        }
        trace!("hunk table: size {table_size}, active {first}..{last}");

        let mut table = HunkTable::new(self, table_size);
        match self.read_image(r, &mut table, first, last) {
            Ok(()) => Ok(SegPtr::from_addr(table.base(first) + 4)),
            Err(err) => {
                table.release_all();
                Err(err)
            }
        }
    }

    /// Allocation pass over the size table, then the body records.
    fn read_image<R: Read>(
        &self,
        r: &mut HunkReader<R>,
        table: &mut HunkTable<'_>,
        first: usize,
        last: usize,
    ) -> Result<(), DosError> {
        let mut prev_link: Option<u32> = None;
        for index in first..=last {
            let (class, words) = split_size_word(r.word()?);
            let flags = match class_flags(class) {
                Some(flags) => flags,
                // "Either" class: the explicit requirement word decides.
                None => MemFlags::from_bits_truncate(r.word()?),
            };
            let bytes = words.checked_mul(4).ok_or(DosError::ObjectNotFound)?;
            let total = bytes.checked_add(SEG_OVERHEAD).ok_or(DosError::ObjectNotFound)?;
            let base = self
                .host
                .alloc_mem(total, flags | MemFlags::CLEAR)
                .ok_or(DosError::NoFreeStore)?;
            self.host.store_u32(base, total);
            if let Some(link) = prev_link {
                self.host.store_u32(link, SegPtr::from_addr(base + 4).raw());
            }
            prev_link = Some(base + 4);
            table.set(index, base);
            trace!("hunk {index}: {words} words at 0x{:08x}, {flags:?}", base + SEG_OVERHEAD);
        }

        let mut current = first;
        while current <= last {
            let tag = r.word()? & VALUE_MASK;
            trace!("hunk {current}: record {}", tag_name(tag));
            match tag {
                HUNK_CODE | HUNK_DATA => {
                    let words = r.word()?;
                    let len = words.checked_mul(4).ok_or(DosError::ObjectNotFound)?;
                    if len > table.payload_size(current)? {
                        return Err(DosError::ObjectNotFound);
                    }
                    // A zero-size payload marks an uninitialized hunk;
                    // the block is already zero-filled.
                    if words > 0 {
                        let data = r.bytes(len as usize)?;
                        self.host.write_bytes(table.payload_base(current)?, &data);
                    }
                }
                HUNK_BSS => {
                    let _words = r.word()?;
                }
                HUNK_RELOC32 => self.apply_reloc32(r, table, current)?,
                HUNK_SYMBOL => self.read_symbols(r, table, current)?,
                HUNK_DEBUG => {
                    let words = r.word()?;
                    r.skip_words(words)?;
                }
                HUNK_END => current += 1,
                other => {
                    warn!("unknown hunk record 0x{other:08x}, aborting load");
                    return Err(DosError::ObjectNotFound);
                }
            }
        }
        Ok(())
    }

    /// 32-bit base relocation: add the target hunk's payload base to
    /// every referenced word of the current hunk. This is the whole of
    /// link-time fixup; there is no separate link pass.
    fn apply_reloc32<R: Read>(
        &self,
        r: &mut HunkReader<R>,
        table: &HunkTable<'_>,
        current: usize,
    ) -> Result<(), DosError> {
        let hunk = table.payload_base(current)?;
        let limit = table.payload_size(current)?;
        loop {
            let count = r.word()?;
            if count == 0 {
                return Ok(());
            }
            let target = r.word()? as usize;
            let delta = table.payload_base(target)?;
            for _ in 0..count {
                let offset = r.word()?;
                if limit < 4 || offset > limit - 4 {
                    return Err(DosError::ObjectNotFound);
                }
                let addr = hunk + offset;
                let value = self.host.load_u32(addr);
                self.host.store_u32(addr, value.wrapping_add(delta));
            }
        }
    }

    /// Symbol table: every (name, offset) pair is reported to the host
    /// for symbolic debugging. The loaded image is not touched.
    fn read_symbols<R: Read>(
        &self,
        r: &mut HunkReader<R>,
        table: &HunkTable<'_>,
        current: usize,
    ) -> Result<(), DosError> {
        let base = table.payload_base(current)?;
        loop {
            let name_words = r.word()?;
            if name_words == 0 {
                return Ok(());
            }
            let len = name_words.checked_mul(4).ok_or(DosError::ObjectNotFound)?;
            let raw = r.bytes(len as usize)?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            let name = String::from_utf8_lossy(&raw[..end]).into_owned();
            let value = r.word()?;
            self.host.register_symbol(&name, base + value);
        }
    }
}
