//! Native side of the transfer-buffer contract.
//!
//! Format: `[4 bytes: i32 LE length][4 bytes: reserved][payload]`
//!
//! Input buffers declare their payload length. Output buffers arrive with the
//! header length set to their capacity; the engine overwrites it with the
//! number of bytes written and never writes past the capacity.

use std::ffi::c_void;

use crate::error::{EngineError, Result};

/// Header size in bytes: i32 length + i32 reserved.
pub const HEADER_SIZE: usize = 8;

/// Payload size of an integer buffer.
pub const INT64_SIZE: usize = 8;

fn header_len(buf: &[u8]) -> Result<usize> {
    if buf.len() < HEADER_SIZE {
        return Err(EngineError::InvalidLength(buf.len() as i64));
    }
    let len = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if len < 0 {
        return Err(EngineError::InvalidLength(len as i64));
    }
    Ok(len as usize)
}

/// Payload capacity of an output buffer slice.
pub fn capacity(buf: &[u8]) -> usize {
    buf.len().saturating_sub(HEADER_SIZE)
}

/// Borrow the payload of an input buffer.
pub fn read_bytes(buf: &[u8]) -> Result<&[u8]> {
    let len = header_len(buf)?;
    if len > capacity(buf) {
        return Err(EngineError::InvalidLength(len as i64));
    }
    Ok(&buf[HEADER_SIZE..HEADER_SIZE + len])
}

/// Borrow the payload of an input buffer as UTF-8.
pub fn read_str(buf: &[u8]) -> Result<&str> {
    std::str::from_utf8(read_bytes(buf)?).map_err(|_| EngineError::InvalidUtf8)
}

/// Read an `i64` input buffer.
pub fn read_i64(buf: &[u8]) -> Result<i64> {
    let bytes = read_bytes(buf)?;
    let array: [u8; INT64_SIZE] = bytes
        .try_into()
        .map_err(|_| EngineError::InvalidInteger(bytes.len()))?;
    Ok(i64::from_le_bytes(array))
}

/// Copy `data` into an output buffer and record its length.
pub fn write_bytes(buf: &mut [u8], data: &[u8]) -> Result<()> {
    let capacity = capacity(buf);
    if buf.len() < HEADER_SIZE || data.len() > capacity {
        return Err(EngineError::BufferTooSmall {
            needed: data.len(),
            capacity,
        });
    }
    let len = i32::try_from(data.len()).map_err(|_| EngineError::BufferTooLarge(data.len()))?;
    buf[HEADER_SIZE..HEADER_SIZE + data.len()].copy_from_slice(data);
    buf[..4].copy_from_slice(&len.to_le_bytes());
    buf[4..HEADER_SIZE].copy_from_slice(&[0u8; 4]);
    Ok(())
}

/// Write an `i64` into an output buffer.
pub fn write_i64(buf: &mut [u8], value: i64) -> Result<()> {
    write_bytes(buf, &value.to_le_bytes())
}

// ============================================================================
// Raw pointer access for the C ABI
// ============================================================================

/// Build a slice over an input buffer from its raw pointer.
///
/// # Safety
/// `ptr` must be null or point to a readable buffer of at least
/// `HEADER_SIZE + declared length` bytes that outlives `'a`.
pub unsafe fn input_slice<'a>(ptr: *const c_void) -> Result<&'a [u8]> {
    if ptr.is_null() {
        return Err(EngineError::NullPointer);
    }
    let header = std::slice::from_raw_parts(ptr as *const u8, HEADER_SIZE);
    let len = header_len(header)?;
    Ok(std::slice::from_raw_parts(ptr as *const u8, HEADER_SIZE + len))
}

/// Build a mutable slice over an output buffer from its raw pointer. The
/// header length is taken as the capacity.
///
/// # Safety
/// `ptr` must be null or point to a writable buffer of at least
/// `HEADER_SIZE + declared capacity` bytes, not aliased for `'a`.
pub unsafe fn output_slice<'a>(ptr: *mut c_void) -> Result<&'a mut [u8]> {
    if ptr.is_null() {
        return Err(EngineError::NullPointer);
    }
    let header = std::slice::from_raw_parts(ptr as *const u8, HEADER_SIZE);
    let capacity = header_len(header)?;
    Ok(std::slice::from_raw_parts_mut(
        ptr as *mut u8,
        HEADER_SIZE + capacity,
    ))
}
