//! Storage backends
//!
//! The persistence gate writes the whole document as one text value under
//! one key. The backend contract is deliberately that small: a synchronous,
//! size-constrained key-value text store, same as the environment the data
//! model was designed for.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// Key under which the document is stored
pub const DOCUMENT_KEY: &str = "lingolog";

/// A synchronous key-value text store
pub trait TextStore {
    /// Read the value under a key, `None` if absent
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    /// Write the value under a key, replacing any previous value
    fn write(&mut self, key: &str, value: &str) -> io::Result<()>;
}

// ============================================================================
// FILE STORE
// ============================================================================

/// File-backed store: one file per key in a data directory
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at the given directory, creating it if needed
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        // Owner-only on Unix: the journal is personal data.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            let _ = std::fs::set_permissions(&dir, perms);
        }
        Ok(Self { dir })
    }

    /// Open a store in the platform data directory
    pub fn open_default() -> io::Result<Self> {
        let dirs = ProjectDirs::from("io", "lingolog", "lingolog").ok_or_else(|| {
            io::Error::other("could not determine platform data directory")
        })?;
        Self::open(dirs.data_dir())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl TextStore for FileStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        // Write-then-rename so a crash mid-write never corrupts the document.
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }
        Ok(())
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// In-memory store for tests
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value before opening, to simulate pre-existing state
    pub fn seeded(key: &str, value: &str) -> Self {
        let mut store = Self::default();
        store.values.insert(key.to_string(), value.to_string());
        store
    }

    /// Raw access for assertions
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl TextStore for MemoryStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.read(DOCUMENT_KEY).unwrap(), None);
        store.write(DOCUMENT_KEY, "{\"version\":4}").unwrap();
        assert_eq!(
            store.read(DOCUMENT_KEY).unwrap().as_deref(),
            Some("{\"version\":4}")
        );
    }

    #[test]
    fn test_memory_store_seeded() {
        let store = MemoryStore::seeded(DOCUMENT_KEY, "seed");
        assert_eq!(store.read(DOCUMENT_KEY).unwrap().as_deref(), Some("seed"));
    }
}
