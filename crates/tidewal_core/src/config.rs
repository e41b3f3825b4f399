//! WAL configuration.

use crate::error::{CoreError, CoreResult};
use crate::types::Durability;
use std::path::{Path, PathBuf};

/// Sizing for the duplicate filter consulted during replay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    /// Entries the first sub-filter is sized for.
    pub expected_entries: u64,
    /// Target false-positive rate before the first tightening.
    pub error_rate: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            expected_entries: 100_000,
            error_rate: 0.01,
        }
    }
}

impl FilterConfig {
    /// Creates a filter configuration.
    #[must_use]
    pub const fn new(expected_entries: u64, error_rate: f64) -> Self {
        Self {
            expected_entries,
            error_rate,
        }
    }
}

/// Configuration for opening a WAL.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Directory holding the segment files.
    pub root: PathBuf,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether segment files are fsynced before close.
    pub durability: Durability,

    /// Log size at which the next append starts a new segment.
    pub max_segment_size: u64,

    /// Whether to sync both segment files after every append.
    pub sync_on_append: bool,

    /// Duplicate filter used by replay; `None` disables deduplication.
    pub dedup: Option<FilterConfig>,
}

impl WalConfig {
    /// Creates a configuration rooted at `root` with default values.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            create_if_missing: true,
            durability: Durability::Fsync,
            max_segment_size: 64 * 1024 * 1024, // 64 MB
            sync_on_append: false,
            dedup: None,
        }
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the durability level.
    #[must_use]
    pub const fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Sets the segment roll-over size.
    #[must_use]
    pub const fn max_segment_size(mut self, size: u64) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Sets whether to sync after every append.
    #[must_use]
    pub const fn sync_on_append(mut self, value: bool) -> Self {
        self.sync_on_append = value;
        self
    }

    /// Enables replay deduplication with the given filter sizing.
    #[must_use]
    pub const fn dedup(mut self, filter: FilterConfig) -> Self {
        self.dedup = Some(filter);
        self
    }

    /// Checks values that would otherwise fail much later.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for a zero segment size or an
    /// out-of-range filter configuration.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_segment_size == 0 {
            return Err(CoreError::invalid_argument(
                "max_segment_size must be greater than zero",
            ));
        }
        if let Some(filter) = &self.dedup {
            if filter.expected_entries < 1 {
                return Err(CoreError::invalid_argument(
                    "filter expected_entries must be at least 1",
                ));
            }
            if !(filter.error_rate > 0.0 && filter.error_rate < 1.0) {
                return Err(CoreError::invalid_argument(format!(
                    "filter error_rate {} not in (0, 1)",
                    filter.error_rate
                )));
            }
        }
        Ok(())
    }
}
