//! Binary codec for persisted ledger entities
//!
//! Every scalar is little-endian. Byte strings are framed with a `u32`
//! length followed by the raw bytes. Readers never panic on short input:
//! a missing byte is reported as [`CodecError::Truncated`].

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Malformed or truncated persisted bytes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Truncated data: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("Byte string too long to encode: {0} bytes")]
    LengthOverflow(usize),
}

// =============================================================================
// Writers
// =============================================================================

pub fn put_u32(buf: &mut BytesMut, value: u32) {
    buf.put_u32_le(value);
}

pub fn put_u64(buf: &mut BytesMut, value: u64) {
    buf.put_u64_le(value);
}

/// Writes the raw IEEE-754 bits of `value`
pub fn put_f64(buf: &mut BytesMut, value: f64) {
    buf.put_u64_le(value.to_bits());
}

/// Writes a `u32` length prefix followed by `data`
pub fn put_bytes(buf: &mut BytesMut, data: &[u8]) -> Result<(), CodecError> {
    let len = u32::try_from(data.len()).map_err(|_| CodecError::LengthOverflow(data.len()))?;
    buf.reserve(4 + data.len());
    buf.put_u32_le(len);
    buf.put_slice(data);
    Ok(())
}

/// Writes a collection length as `u32`
pub fn put_count(buf: &mut BytesMut, count: usize) -> Result<(), CodecError> {
    let count = u32::try_from(count).map_err(|_| CodecError::LengthOverflow(count))?;
    buf.put_u32_le(count);
    Ok(())
}

// =============================================================================
// Readers
// =============================================================================

fn ensure<B: Buf>(buf: &B, needed: usize) -> Result<(), CodecError> {
    if buf.remaining() < needed {
        return Err(CodecError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

pub fn get_u32<B: Buf>(buf: &mut B) -> Result<u32, CodecError> {
    ensure(&*buf, 4)?;
    Ok(buf.get_u32_le())
}

pub fn get_u64<B: Buf>(buf: &mut B) -> Result<u64, CodecError> {
    ensure(&*buf, 8)?;
    Ok(buf.get_u64_le())
}

pub fn get_f64<B: Buf>(buf: &mut B) -> Result<f64, CodecError> {
    get_u64(buf).map(f64::from_bits)
}

/// Reads a `u32`-length-prefixed byte string
pub fn get_bytes<B: Buf>(buf: &mut B) -> Result<Vec<u8>, CodecError> {
    let len = get_u32(buf)? as usize;
    ensure(&*buf, len)?;
    let mut data = vec![0u8; len];
    buf.copy_to_slice(&mut data);
    Ok(data)
}
