//! Record Codec
//!
//! Pure functions that frame log records and metadata records.
//!
//! ## Record Format (little-endian)
//! ```text
//! ┌───────────────┬──────────────────┬───────────┬──────────────────────┐
//! │ Timestamp (8) │ Payload (size)   │ CRC32 (4) │ Padding (zeroed)     │
//! └───────────────┴──────────────────┴───────────┴──────────────────────┘
//!   total = round_up(max(12 + size, min_write_size), chunk_size)
//! ```
//!
//! The CRC covers the payload bytes only. The record carries no length
//! field: readers must know the payload size, and treat a checksum
//! mismatch as the end of the durably written log.
//!
//! ## Metadata Format (little-endian)
//! ```text
//! ┌───────────────┬──────────────────────┬───────────┬──────────────────┐
//! │ Timestamp (8) │ IndexedPosition (8)  │ Count (4) │ Address (8) × N  │
//! └───────────────┴──────────────────────┴───────────┴──────────────────┘
//!   indexed_position = (byte_offset << 8) | stream_index
//! ```

mod meta;
mod record;

pub use meta::{
    meta_len, parse_indexed_position, to_indexed_position, MetaRecord, META_HEADER_SIZE,
};
pub use record::{
    checksum, decode_record, encode_record, encoded_len, Record, RecordFormat, CHECKSUM_SIZE,
    MIN_WRITE_SIZE, RECORD_OVERHEAD, TIMESTAMP_SIZE,
};
