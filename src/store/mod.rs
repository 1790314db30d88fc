//! Persistent key-value store for the auth token, the device key, and the
//! in-flight `UpdateResponse`.
//!
//! Writes are atomic (write to a sibling temp file, then rename), mirroring
//! the pattern the teacher codebase uses for its own atomically-replaced
//! on-disk artifacts (MOTD fragments): never leave a reader observing a
//! partially-written value.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persistent key-value store abstraction, mutated only by the controller.
pub trait Store: Send + std::fmt::Debug {
    /// Read the value for `key`, or `None` if absent.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Atomically write `value` under `key`.
    fn write(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`, if present.
    fn remove(&self, key: &str) -> Result<()>;

    /// Whether the store is opened read-only (bootstrap must fail fatally
    /// if no device key exists and the store cannot be written).
    fn is_read_only(&self) -> bool;
}

/// File-backed store: one file per key under a directory, each written
/// atomically via a temp file + rename in the same directory (so the
/// rename is guaranteed atomic on the same filesystem).
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    read_only: bool,
}

impl FileStore {
    /// Open (creating if necessary) a file-backed store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, read_only: bool) -> Result<Self> {
        let dir = dir.into();
        if !read_only {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create store dir {}", dir.display()))?;
        }
        Ok(FileStore { dir, read_only })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl Store for FileStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("failed to read store entry"),
        }
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.read_only {
            bail!("store is read-only");
        }

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", key))
            .suffix(".partial")
            .tempfile_in(&self.dir)
            .context("failed to create temp file for atomic store write")?;
        use std::io::Write;
        tmp.write_all(value)
            .context("failed to write store entry to temp file")?;
        tmp.flush().context("failed to flush store entry")?;
        tmp.persist(self.path_for(key))
            .map_err(|e| anyhow::anyhow!("failed to persist store entry: {}", e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("failed to remove store entry"),
        }
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// In-memory store used by tests and by the mock controller fixtures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn read_only() -> Self {
        MemoryStore {
            entries: Mutex::new(HashMap::new()),
            read_only: true,
        }
    }
}

impl Store for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        if self.read_only {
            bail!("store is read-only");
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_a_value() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path(), false).unwrap();
        store.write("authtoken", b"opaque-bytes").unwrap();
        assert_eq!(store.read("authtoken").unwrap().unwrap(), b"opaque-bytes");
    }

    #[test]
    fn file_store_missing_key_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path(), false).unwrap();
        assert!(store.read("authtoken").unwrap().is_none());
    }

    #[test]
    fn file_store_remove_then_read_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path(), false).unwrap();
        store.write("device-key", b"pem").unwrap();
        store.remove("device-key").unwrap();
        assert!(store.read("device-key").unwrap().is_none());
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path(), true).unwrap();
        assert!(store.write("device-key", b"pem").is_err());
        assert!(store.is_read_only());
    }

    #[test]
    fn write_overwrites_previous_value_atomically() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path(), false).unwrap();
        store.write("authtoken", b"first").unwrap();
        store.write("authtoken", b"second").unwrap();
        assert_eq!(store.read("authtoken").unwrap().unwrap(), b"second");
    }

    #[test]
    fn memory_store_behaves_like_file_store() {
        let store = MemoryStore::new();
        assert!(store.read("k").unwrap().is_none());
        store.write("k", b"v").unwrap();
        assert_eq!(store.read("k").unwrap().unwrap(), b"v");
        store.remove("k").unwrap();
        assert!(store.read("k").unwrap().is_none());
    }
}
