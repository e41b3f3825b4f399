//! Fixed-width little-endian field decoder.

use crate::error::{CodecError, CodecResult};

/// Reads fixed-width fields from a byte slice.
///
/// The counterpart of [`crate::BinaryEncoder`]. Every read either consumes
/// the whole field or fails with [`CodecError::UnexpectedEof`] without
/// advancing.
#[derive(Debug)]
pub struct BinaryDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self) -> CodecResult<()> {
        let remaining = self.data.len() - self.pos;
        if remaining != 0 {
            return Err(CodecError::TrailingBytes { remaining });
        }
        Ok(())
    }

    #[inline]
    fn take<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let bytes = self.read_raw(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read `len` raw bytes.
    pub fn read_raw(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let remaining = self.data.len() - self.pos;
        if len > remaining {
            return Err(CodecError::UnexpectedEof {
                needed: len,
                remaining,
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Read a signed byte.
    pub fn read_i8(&mut self) -> CodecResult<i8> {
        self.take::<1>().map(i8::from_le_bytes)
    }

    /// Read an unsigned byte.
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        self.take::<1>().map(|b| b[0])
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&mut self) -> CodecResult<u16> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    /// Read a little-endian `i32`.
    pub fn read_i32(&mut self) -> CodecResult<i32> {
        self.take::<4>().map(i32::from_le_bytes)
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> CodecResult<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    /// Read a little-endian `u64`.
    pub fn read_u64(&mut self) -> CodecResult<u64> {
        self.take::<8>().map(u64::from_le_bytes)
    }

    /// Read an `f64` from its IEEE-754 bit pattern.
    pub fn read_f64(&mut self) -> CodecResult<f64> {
        self.read_u64().map(f64::from_bits)
    }
}
