use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// Opaque handle to an open stream. Streams themselves belong to the
/// out-of-scope filesystem layer; processes only carry the handles and
/// children inherit them from the parent unless overridden.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileHandle(pub u32);

impl FileHandle {
    pub const NIL: FileHandle = FileHandle(0);

    pub fn is_nil(self) -> bool {
        self.0 == 0
    }
}

/// Opaque lock on a directory. A spawned child receives a duplicate so
/// it can release its copy independently of the parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirLock(pub u32);

impl DirLock {
    pub const NONE: DirLock = DirLock(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// The narrow slice of the virtual filesystem the personality layer
/// consumes. The filesystem itself is an external collaborator.
pub trait FileSystem {
    /// Opens `path` for reading, or `None` when it does not exist.
    fn open(&self, path: &str) -> Option<Box<dyn Read>>;

    /// Duplicates a directory lock so the holder can release its copy
    /// independently. Duplicating `DirLock::NONE` yields `NONE`.
    fn dup_lock(&self, lock: DirLock) -> DirLock;

    /// Releases a directory lock. Releasing `DirLock::NONE` is a no-op.
    fn unlock(&self, lock: DirLock);
}

/// In-memory volume: a path-to-bytes map plus lock bookkeeping. Backs
/// the tests and the emulator environment the way example binaries on
/// disk back a real machine.
pub struct MemFs {
    files: RefCell<HashMap<String, Vec<u8>>>,
    next_lock: Cell<u32>,
    outstanding: Cell<u32>,
}

impl MemFs {
    pub fn new() -> Self {
        Self {
            files: RefCell::new(HashMap::new()),
            next_lock: Cell::new(1),
            outstanding: Cell::new(0),
        }
    }

    pub fn insert(&self, path: &str, bytes: Vec<u8>) {
        self.files.borrow_mut().insert(path.to_string(), bytes);
    }

    /// Creates a fresh lock, standing in for locking a directory.
    pub fn new_lock(&self) -> DirLock {
        let id = self.next_lock.get();
        self.next_lock.set(id + 1);
        self.outstanding.set(self.outstanding.get() + 1);
        DirLock(id)
    }

    /// Locks still held. Tests use this to prove teardown released
    /// every duplicate.
    pub fn live_locks(&self) -> u32 {
        self.outstanding.get()
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemFs {
    fn open(&self, path: &str) -> Option<Box<dyn Read>> {
        let files = self.files.borrow();
        let bytes = files.get(path)?.clone();
        Some(Box::new(Cursor::new(bytes)))
    }

    fn dup_lock(&self, lock: DirLock) -> DirLock {
        if lock.is_none() {
            return DirLock::NONE;
        }
        self.new_lock()
    }

    fn unlock(&self, lock: DirLock) {
        if lock.is_none() {
            return;
        }
        let count = self.outstanding.get();
        assert!(count > 0, "unlock without a live lock");
        self.outstanding.set(count - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_unknown_path_is_none() {
        let fs = MemFs::new();
        assert!(fs.open("missing").is_none());

        fs.insert("tool", vec![1, 2, 3]);
        let mut out = Vec::new();
        fs.open("tool").unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn dup_and_unlock_balance() {
        let fs = MemFs::new();
        let base = fs.new_lock();
        let dup = fs.dup_lock(base);
        assert_ne!(base, dup);
        assert_eq!(fs.live_locks(), 2);

        fs.unlock(dup);
        fs.unlock(base);
        assert_eq!(fs.live_locks(), 0);

        // NONE never touches the bookkeeping.
        assert!(fs.dup_lock(DirLock::NONE).is_none());
        fs.unlock(DirLock::NONE);
        assert_eq!(fs.live_locks(), 0);
    }
}
