//! Opening backends by path.

use crate::backend::StorageBackend;
use crate::error::StorageResult;
use crate::file::FileBackend;
use crate::memory::InMemoryBackend;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Opens storage backends by path.
///
/// The WAL names its segment files deterministically and asks a provider to
/// open them. Every `open` is create-if-missing + append. Opening the same
/// path twice yields two handles onto the same bytes.
pub trait StorageProvider: Send + Sync {
    /// Opens (creating if missing) the backend at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be opened or created.
    fn open(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>>;

    /// Lists the paths that exist directly under `dir`.
    ///
    /// A missing directory lists as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    fn list(&self, dir: &Path) -> StorageResult<Vec<PathBuf>>;
}

/// Provider backed by the operating system's file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileProvider;

impl StorageProvider for FileProvider {
    fn open(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>> {
        Ok(Box::new(FileBackend::open_with_create_dirs(path)?))
    }

    fn list(&self, dir: &Path) -> StorageResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// Provider that keeps every "file" in memory.
///
/// Handles opened for the same path share their bytes, so a WAL can be
/// closed and reopened against the same provider to exercise recovery.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    files: Mutex<BTreeMap<PathBuf, InMemoryBackend>>,
}

impl InMemoryProvider {
    /// Creates an empty in-memory namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle onto the bytes stored at `path`, if any.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<InMemoryBackend> {
        self.files.lock().get(path).cloned()
    }
}

impl StorageProvider for InMemoryProvider {
    fn open(&self, path: &Path) -> StorageResult<Box<dyn StorageBackend>> {
        let backend = self
            .files
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone();
        Ok(Box::new(backend))
    }

    fn list(&self, dir: &Path) -> StorageResult<Vec<PathBuf>> {
        Ok(self
            .files
            .lock()
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_provider_reopen_shares_bytes() {
        let provider = InMemoryProvider::new();
        let path = Path::new("/wal/00000000000000000000.log");

        let mut first = provider.open(path).unwrap();
        first.append(b"abc").unwrap();
        first.close().unwrap();

        let second = provider.open(path).unwrap();
        assert_eq!(second.read_at(0, 3).unwrap(), b"abc");
        assert_eq!(provider.get(path).unwrap().data(), b"abc");
    }

    #[test]
    fn memory_provider_lists_direct_children_only() {
        let provider = InMemoryProvider::new();
        provider.open(Path::new("/wal/a.log")).unwrap();
        provider.open(Path::new("/wal/a.idx")).unwrap();
        provider.open(Path::new("/wal/nested/b.log")).unwrap();

        let listed = provider.list(Path::new("/wal")).unwrap();
        assert_eq!(
            listed,
            vec![PathBuf::from("/wal/a.idx"), PathBuf::from("/wal/a.log")]
        );
    }

    #[test]
    fn file_provider_lists_sorted_files() {
        let dir = tempdir().unwrap();
        let provider = FileProvider;

        provider.open(&dir.path().join("2.log")).unwrap();
        provider.open(&dir.path().join("1.log")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let listed = provider.list(dir.path()).unwrap();
        assert_eq!(
            listed,
            vec![dir.path().join("1.log"), dir.path().join("2.log")]
        );
    }

    #[test]
    fn file_provider_missing_dir_lists_empty() {
        let dir = tempdir().unwrap();
        let listed = FileProvider.list(&dir.path().join("absent")).unwrap();
        assert!(listed.is_empty());
    }
}
