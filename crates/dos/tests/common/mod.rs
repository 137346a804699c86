#![allow(dead_code)]

use std::rc::Rc;

use dos::hunk::{
    HUNK_BSS, HUNK_CODE, HUNK_DATA, HUNK_DEBUG, HUNK_END, HUNK_HEADER, HUNK_RELOC32, HUNK_SYMBOL,
};
use dos::{Dos, MemFs};
use exec::{Emulator, Host};
use types::SegPtr;

/// Builds synthetic hunk images word by word, the way the build tools
/// of the legacy system would emit them.
pub struct ImageBuilder {
    words: Vec<u32>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Header block for an image whose hunks are all active and carry
    /// their size words verbatim (memory class in the top two bits).
    pub fn header(self, size_words: &[u32]) -> Self {
        let count = size_words.len() as u32;
        self.raw_header(count, 0, count - 1, size_words)
    }

    /// Header block with explicit geometry, for images that need an
    /// explicit-requirement word or out-of-shape tables.
    pub fn raw_header(mut self, table_size: u32, first: u32, last: u32, words: &[u32]) -> Self {
        self.words.push(HUNK_HEADER);
        self.words.push(table_size);
        self.words.push(first);
        self.words.push(last);
        self.words.extend_from_slice(words);
        self
    }

    pub fn word(mut self, word: u32) -> Self {
        self.words.push(word);
        self
    }

    pub fn code(self, payload: &[u32]) -> Self {
        self.block(HUNK_CODE, payload)
    }

    pub fn data(self, payload: &[u32]) -> Self {
        self.block(HUNK_DATA, payload)
    }

    fn block(mut self, tag: u32, payload: &[u32]) -> Self {
        self.words.push(tag);
        self.words.push(payload.len() as u32);
        self.words.extend_from_slice(payload);
        self
    }

    pub fn bss(mut self, size_words: u32) -> Self {
        self.words.push(HUNK_BSS);
        self.words.push(size_words);
        self
    }

    pub fn reloc32(mut self, entries: &[(u32, &[u32])]) -> Self {
        self.words.push(HUNK_RELOC32);
        for &(target, offsets) in entries {
            self.words.push(offsets.len() as u32);
            self.words.push(target);
            self.words.extend_from_slice(offsets);
        }
        self.words.push(0);
        self
    }

    pub fn symbol(mut self, name: &str, value: u32) -> Self {
        self.words.push(HUNK_SYMBOL);
        let name_words = name.len().div_ceil(4) as u32;
        self.words.push(name_words);
        let mut padded = name.as_bytes().to_vec();
        padded.resize(name_words as usize * 4, 0);
        for chunk in padded.chunks(4) {
            self.words.push(u32::from_be_bytes(chunk.try_into().unwrap()));
        }
        self.words.push(value);
        self.words.push(0);
        self
    }

    pub fn debug(mut self, size_words: u32) -> Self {
        self.words.push(HUNK_DEBUG);
        self.words.push(size_words);
        for _ in 0..size_words {
            self.words.push(0);
        }
        self
    }

    pub fn end(mut self) -> Self {
        self.words.push(HUNK_END);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }
}

/// Smallest valid runnable image: one code hunk, one word of payload.
pub fn trivial_image() -> Vec<u8> {
    ImageBuilder::new().header(&[1]).code(&[0x4e75_0000]).end().build()
}

/// An emulated machine with an in-memory volume.
pub struct Env {
    pub emu: Rc<Emulator>,
    pub fs: Rc<MemFs>,
    pub dos: Rc<Dos>,
}

pub fn env(files: &[(&str, Vec<u8>)]) -> Env {
    env_sized(64 * 1024, files)
}

pub fn env_sized(memory_size: usize, files: &[(&str, Vec<u8>)]) -> Env {
    let emu = Rc::new(Emulator::new(memory_size));
    let fs = Rc::new(MemFs::new());
    for (path, bytes) in files {
        fs.insert(path, bytes.clone());
    }
    let dos = Rc::new(Dos::new(emu.clone(), fs.clone()));
    Env { emu, fs, dos }
}

/// Payload base addresses of every segment in the list, in chain order.
pub fn seg_payloads(host: &dyn Host, seg: SegPtr) -> Vec<u32> {
    let mut payloads = Vec::new();
    let mut link = seg;
    while !link.is_null() {
        payloads.push(link.addr() + 4);
        link = SegPtr::from_raw(host.load_u32(link.addr()));
    }
    payloads
}
