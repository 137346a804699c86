//! The on-disk hunk format: record tags, size-word decoding, and the
//! big-endian stream reader the loader parses images with.
//!
//! An image is a stream of 32-bit big-endian words. It opens with a
//! header block (magic, hunk-table size, first/last active hunk
//! indices, one size word per active hunk) and continues with body
//! records, each led by a type tag. The top two bits of size and tag
//! words carry a memory-requirement class and are masked off before
//! the value is used.

use std::io::Read;

use types::{DosError, MemFlags};

pub const HUNK_HEADER: u32 = 0x3F3;

pub const HUNK_CODE: u32 = 0x3E9;
pub const HUNK_DATA: u32 = 0x3EA;
pub const HUNK_BSS: u32 = 0x3EB;
pub const HUNK_RELOC32: u32 = 0x3EC;
pub const HUNK_SYMBOL: u32 = 0x3F0;
pub const HUNK_DEBUG: u32 = 0x3F1;
pub const HUNK_END: u32 = 0x3F2;

/// Top two bits of a size or tag word.
pub const CLASS_MASK: u32 = 0xC000_0000;
/// Low 30 bits: a word count or a record tag.
pub const VALUE_MASK: u32 = 0x3FFF_FFFF;

pub const CLASS_ANY: u32 = 0;
pub const CLASS_CHIP: u32 = 1;
pub const CLASS_FAST: u32 = 2;
/// Both bits set: an explicit requirement word follows the size word.
pub const CLASS_EXPLICIT: u32 = 3;

/// Splits a hunk size word into its memory class and payload word count.
pub fn split_size_word(word: u32) -> (u32, u32) {
    (word >> 30, word & VALUE_MASK)
}

/// Allocator flags for an encoded memory class, or `None` for
/// `CLASS_EXPLICIT`, where the caller must read the follow-up word.
pub fn class_flags(class: u32) -> Option<MemFlags> {
    match class {
        CLASS_ANY => Some(MemFlags::PUBLIC),
        CLASS_CHIP => Some(MemFlags::CHIP),
        CLASS_FAST => Some(MemFlags::FAST),
        _ => None,
    }
}

/// Human-readable name of a record tag, for diagnostics.
pub fn tag_name(tag: u32) -> &'static str {
    match tag {
        HUNK_HEADER => "HEADER",
        HUNK_CODE => "CODE",
        HUNK_DATA => "DATA",
        HUNK_BSS => "BSS",
        HUNK_RELOC32 => "RELOC32",
        HUNK_SYMBOL => "SYMBOL",
        HUNK_DEBUG => "DEBUG",
        HUNK_END => "END",
        _ => "?",
    }
}

/// Big-endian word reader over a raw byte stream. A short read is a
/// format-integrity violation, not a recoverable condition: every one
/// surfaces as `ObjectNotFound`.
pub struct HunkReader<R: Read> {
    inner: R,
}

impl<R: Read> HunkReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn word(&mut self) -> Result<u32, DosError> {
        let mut raw = [0u8; 4];
        self.inner
            .read_exact(&mut raw)
            .map_err(|_| DosError::ObjectNotFound)?;
        Ok(u32::from_be_bytes(raw))
    }

    pub fn bytes(&mut self, len: usize) -> Result<Vec<u8>, DosError> {
        let mut buf = vec![0u8; len];
        self.inner
            .read_exact(&mut buf)
            .map_err(|_| DosError::ObjectNotFound)?;
        Ok(buf)
    }

    pub fn skip_words(&mut self, count: u32) -> Result<(), DosError> {
        for _ in 0..count {
            self.word()?;
        }
        Ok(())
    }
}
