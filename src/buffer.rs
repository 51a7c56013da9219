//! Host side of the transfer-buffer contract.
//!
//! Format: `[4 bytes: i32 LE length][4 bytes: reserved][payload]`
//!
//! Input buffers declare the payload length. Output buffers are allocated
//! with the header length set to their capacity; the engine replaces it with
//! the number of bytes it wrote. The engine cannot grow a buffer, so callers
//! size outputs up front (see [`crate::capacity`]).
//!
//! Storage is host-owned and scoped to the call that allocates it. It is
//! zeroized and freed on drop, on success and error paths alike.

use std::ffi::c_void;

use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Header size in bytes: i32 length + i32 reserved.
pub const HEADER_SIZE: usize = 8;

/// Payload size of an integer buffer.
pub const INT64_SIZE: usize = 8;

/// Largest payload a buffer can declare.
pub const MAX_PAYLOAD: usize = i32::MAX as usize;

pub struct Buffer {
    bytes: Vec<u8>,
}

impl Buffer {
    fn with_header(length: usize, payload: &[u8], capacity: usize) -> Result<Self> {
        let declared = i32::try_from(length).map_err(|_| {
            Error::BufferEncode(format!("{length} bytes exceeds the {MAX_PAYLOAD} byte limit"))
        })?;
        let mut bytes = Vec::with_capacity(HEADER_SIZE + capacity);
        bytes.extend_from_slice(&declared.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 4]);
        bytes.extend_from_slice(payload);
        bytes.resize(HEADER_SIZE + capacity, 0);
        Ok(Self { bytes })
    }

    /// Encode raw bytes as an input buffer. Empty input is allowed.
    pub fn encode_bytes(data: &[u8]) -> Result<Self> {
        Self::with_header(data.len(), data, data.len())
    }

    /// Encode a UTF-8 string as an input buffer, without a terminator.
    pub fn encode_str(value: &str) -> Result<Self> {
        Self::encode_bytes(value.as_bytes())
    }

    /// Encode an integer as an 8-byte little-endian input buffer.
    pub fn encode_i64(value: i64) -> Result<Self> {
        Self::encode_bytes(&value.to_le_bytes())
    }

    /// Reserve a zeroed output buffer with room for `capacity` payload bytes.
    pub fn allocate(capacity: usize) -> Result<Self> {
        Self::with_header(capacity, &[], capacity)
    }

    /// Payload bytes this buffer can hold.
    pub fn capacity(&self) -> usize {
        self.bytes.len() - HEADER_SIZE
    }

    /// Length currently recorded in the header.
    pub fn declared_len(&self) -> i32 {
        i32::from_le_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    fn payload(&self) -> Result<&[u8]> {
        let declared = self.declared_len();
        let len = usize::try_from(declared)
            .map_err(|_| Error::BufferDecode(format!("negative length {declared}")))?;
        if len > self.capacity() {
            return Err(Error::BufferDecode(format!(
                "declared length {len} exceeds capacity {}",
                self.capacity()
            )));
        }
        Ok(&self.bytes[HEADER_SIZE..HEADER_SIZE + len])
    }

    /// Copy out exactly the bytes the engine wrote.
    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        self.payload().map(<[u8]>::to_vec)
    }

    pub fn decode_string(&self) -> Result<String> {
        let payload = self.payload()?;
        std::str::from_utf8(payload)
            .map(str::to_owned)
            .map_err(|e| Error::BufferDecode(format!("invalid UTF-8: {e}")))
    }

    pub fn decode_i64(&self) -> Result<i64> {
        let payload = self.payload()?;
        let array: [u8; INT64_SIZE] = payload.try_into().map_err(|_| {
            Error::BufferDecode(format!("integer buffer holds {} bytes", payload.len()))
        })?;
        Ok(i64::from_le_bytes(array))
    }

    /// Whole buffer, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn as_ptr(&self) -> *const c_void {
        self.bytes.as_ptr() as *const c_void
    }

    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        self.bytes.as_mut_ptr() as *mut c_void
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("capacity", &self.capacity())
            .field("declared_len", &self.declared_len())
            .finish()
    }
}
