//! Metadata records
//!
//! A metadata record describes where a batch of entries landed in a
//! separate data stream: the stream index and byte offset packed into one
//! `u64`, followed by one address per entry.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, WalError};

/// Timestamp (8) + IndexedPosition (8) + Count (4)
pub const META_HEADER_SIZE: usize = 20;

/// Byte offsets must fit in the 56 bits left after the stream index
const MAX_POSITION: u64 = (1 << 56) - 1;

/// Encoded length of a metadata record with `count` addresses
pub fn meta_len(count: usize) -> usize {
    META_HEADER_SIZE + 8 * count
}

/// Pack a byte offset and a stream index into one value
pub fn to_indexed_position(position: u64, index: u8) -> u64 {
    assert!(
        position <= MAX_POSITION,
        "position {} does not fit in 56 bits",
        position
    );
    (position << 8) | index as u64
}

/// Split an indexed position into (byte offset, stream index)
pub fn parse_indexed_position(indexed: u64) -> (u64, u8) {
    (indexed >> 8, (indexed & 0xff) as u8)
}

/// A metadata record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaRecord {
    pub timestamp: u64,
    /// Byte offset of the described data within its stream
    pub position: u64,
    /// Which data stream the entries were written to
    pub stream_index: u8,
    /// One logical address per entry
    pub addresses: Vec<u64>,
}

impl MetaRecord {
    pub fn new(timestamp: u64, stream_index: u8, position: u64, addresses: Vec<u64>) -> Self {
        Self {
            timestamp,
            position,
            stream_index,
            addresses,
        }
    }

    /// Encoded length of this record
    pub fn encoded_len(&self) -> usize {
        meta_len(self.addresses.len())
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u64_le(self.timestamp);
        buf.put_u64_le(to_indexed_position(self.position, self.stream_index));
        buf.put_u32_le(self.addresses.len() as u32);
        for address in &self.addresses {
            buf.put_u64_le(*address);
        }
        buf
    }

    /// Decode a record, rejecting buffers shorter than the count implies
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < META_HEADER_SIZE {
            return Err(WalError::InvalidRecord(format!(
                "Incomplete metadata header: expected {} bytes, got {}",
                META_HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut cursor = bytes;
        let timestamp = cursor.get_u64_le();
        let (position, stream_index) = parse_indexed_position(cursor.get_u64_le());
        let count = cursor.get_u32_le() as usize;

        let needed = meta_len(count);
        if bytes.len() < needed {
            return Err(WalError::InvalidRecord(format!(
                "Incomplete metadata: {} addresses need {} bytes, got {}",
                count,
                needed,
                bytes.len()
            )));
        }

        let addresses = (0..count).map(|_| cursor.get_u64_le()).collect();

        Ok(Self {
            timestamp,
            position,
            stream_index,
            addresses,
        })
    }
}
