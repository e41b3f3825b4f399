//! # tidewal storage
//!
//! Storage backend trait and implementations for the tidewal write-ahead log.
//!
//! Backends are **opaque byte stores**: they do not interpret the data they
//! hold. The WAL layer above owns the index/log record formats and decides
//! when to flush.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (read, append, flush, sync)
//! - No knowledge of segments, index records or filters
//! - Must be `Send + Sync` for concurrent access
//! - A [`StorageProvider`] opens backends by path, so the WAL can run against
//!   real files or an in-memory namespace with identical naming
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral logs
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use tidewal_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod provider;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use provider::{FileProvider, InMemoryProvider, StorageProvider};
