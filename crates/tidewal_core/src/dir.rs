//! WAL directory management.
//!
//! ```text
//! <root>/
//! ├─ LOCK                        # Advisory lock for single-writer
//! ├─ FILTER                      # Duplicate filter checkpoint
//! ├─ 00000000000000000000.idx    # Segment index
//! └─ 00000000000000000000.log    # Segment log
//! ```
//!
//! The LOCK file ensures only one process writes the WAL at a time.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const FILTER_FILE: &str = "FILTER";
/// Temporary file for atomic filter writes.
const FILTER_TEMP: &str = "FILTER.tmp";

/// An exclusively locked WAL directory.
///
/// The lock is held until the `WalDir` is dropped.
#[derive(Debug)]
pub struct WalDir {
    path: PathBuf,
    _lock_file: File,
}

impl WalDir {
    /// Opens or creates a WAL directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - `path` is not a directory
    /// - Another process holds the lock (returns `WalLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_argument(format!(
                    "WAL directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_argument(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::WalLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the WAL directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the filter checkpoint.
    #[must_use]
    pub fn filter_path(&self) -> PathBuf {
        self.path.join(FILTER_FILE)
    }

    /// Reads the filter checkpoint, if one was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load_filter(&self) -> CoreResult<Option<Vec<u8>>> {
        let mut file = match File::open(self.filter_path()) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Some(data))
    }

    /// Replaces the filter checkpoint atomically.
    ///
    /// Write to a temporary file, sync it, rename it over FILTER, then sync
    /// the directory so the rename itself survives a crash.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails; the previous checkpoint is then
    /// still in place.
    pub fn save_filter(&self, encoded: &[u8]) -> CoreResult<()> {
        let temp_path = self.path.join(FILTER_TEMP);

        let mut file = File::create(&temp_path)?;
        file.write_all(encoded)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.filter_path())?;
        self.sync_directory()?;

        tracing::debug!(bytes = encoded.len(), "saved filter checkpoint");
        Ok(())
    }

    /// Syncs the directory so created, renamed or removed entries are durable.
    #[cfg(unix)]
    pub fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// Directory fsync is not available here; NTFS journals metadata.
    #[cfg(not(unix))]
    pub fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}
