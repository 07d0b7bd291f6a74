//! Log record framing
//!
//! Encodes `timestamp + payload + crc32` into a padded buffer whose length
//! is a fixed function of the payload size.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WalError};

/// Size of the timestamp prefix
pub const TIMESTAMP_SIZE: usize = 8;

/// Size of the CRC32 suffix
pub const CHECKSUM_SIZE: usize = 4;

/// Framing bytes added to every payload
pub const RECORD_OVERHEAD: usize = TIMESTAMP_SIZE + CHECKSUM_SIZE;

/// Minimum device write granularity
pub const MIN_WRITE_SIZE: usize = 512;

/// A decoded log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub timestamp: u64,
    pub payload: Bytes,
    pub checksum: u32,
}

/// Padding rules applied to every record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFormat {
    min_write_size: usize,
    chunk_size: usize,
}

impl RecordFormat {
    /// Create a format; `chunk_size` must be non-zero
    pub fn new(min_write_size: usize, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self {
            min_write_size,
            chunk_size,
        }
    }

    pub fn min_write_size(&self) -> usize {
        self.min_write_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Padded on-log length of a record carrying `payload_len` bytes
    pub fn total_length(&self, payload_len: usize) -> usize {
        let len = encoded_len(payload_len).max(self.min_write_size);
        len.div_ceil(self.chunk_size) * self.chunk_size
    }

    /// Encode a record padded to `total_length(payload.len())`
    pub fn encode(&self, timestamp: u64, payload: &[u8]) -> BytesMut {
        encode_record(timestamp, payload, self.total_length(payload.len()))
    }
}

impl Default for RecordFormat {
    fn default() -> Self {
        Self::new(MIN_WRITE_SIZE, 1)
    }
}

/// Unpadded length of a record carrying `payload_len` bytes
pub fn encoded_len(payload_len: usize) -> usize {
    RECORD_OVERHEAD + payload_len
}

/// CRC32 over the payload bytes
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Encode a record into a zero-padded buffer of exactly `total` bytes
///
/// Format: timestamp (8) + payload + crc32 (4) + padding
pub fn encode_record(timestamp: u64, payload: &[u8], total: usize) -> BytesMut {
    assert!(
        total >= encoded_len(payload.len()),
        "record of {} payload bytes does not fit in {} bytes",
        payload.len(),
        total
    );

    let mut buf = BytesMut::with_capacity(total);
    buf.put_u64_le(timestamp);
    buf.put_slice(payload);
    buf.put_u32_le(checksum(payload));
    buf.resize(total, 0);
    buf
}

/// Decode a record whose payload is `payload_len` bytes long
///
/// Returns `Corruption` when the stored checksum does not match the
/// payload, which readers should treat as the end of the durable log.
pub fn decode_record(bytes: &[u8], payload_len: usize) -> Result<Record> {
    let needed = encoded_len(payload_len);
    if bytes.len() < needed {
        return Err(WalError::InvalidRecord(format!(
            "Truncated record: expected {} bytes, got {}",
            needed,
            bytes.len()
        )));
    }

    let mut cursor = &bytes[..needed];
    let timestamp = cursor.get_u64_le();
    let payload = Bytes::copy_from_slice(&cursor[..payload_len]);
    cursor.advance(payload_len);
    let stored = cursor.get_u32_le();

    let computed = checksum(&payload);
    if stored != computed {
        return Err(WalError::Corruption(format!(
            "CRC mismatch: stored {:#010x}, computed {:#010x}",
            stored, computed
        )));
    }

    Ok(Record {
        timestamp,
        payload,
        checksum: stored,
    })
}
