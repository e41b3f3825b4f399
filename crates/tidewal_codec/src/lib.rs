//! # tidewal codec
//!
//! Byte-level encoding used by the tidewal WAL.
//!
//! Two independent pieces live here:
//!
//! - [`BinaryEncoder`] / [`BinaryDecoder`]: fixed-width little-endian fields
//!   with no framing. Filter checkpoints and WAL records are built from
//!   these; their field order is their format.
//! - [`to_cbor`] / [`from_cbor`]: serde-based CBOR for messages that cross
//!   node boundaries, such as peer disk-usage reports.
//!
//! ## Usage
//!
//! ```
//! use tidewal_codec::{BinaryDecoder, BinaryEncoder};
//!
//! let mut enc = BinaryEncoder::new();
//! enc.put_u32(2);
//! enc.put_u64(4096);
//! let bytes = enc.into_bytes();
//!
//! let mut dec = BinaryDecoder::new(&bytes);
//! assert_eq!(dec.read_u32().unwrap(), 2);
//! assert_eq!(dec.read_u64().unwrap(), 4096);
//! assert!(dec.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod decoder;
mod encoder;
mod error;

pub use cbor::{from_cbor, to_cbor};
pub use decoder::BinaryDecoder;
pub use encoder::BinaryEncoder;
pub use error::{CodecError, CodecResult};
