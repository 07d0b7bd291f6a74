//! Writer Module
//!
//! Durable-medium drivers consumed by the group committer.
//!
//! ## Responsibilities
//! - Persist `buffer` at `logical_address`; return only once it is durable
//!   (as durable as the backend promises)
//! - Forward the caller's opaque `hint` (priority / latency class)
//!
//! The committer calls a Writer from whichever thread was elected flusher,
//! so implementations must be `Send + Sync` and tolerate concurrent calls
//! for disjoint (or, for partial slot rewrites, identical-prefix) ranges.
//!
//! ## Backends
//! - [`SleepWriter`]: latency + bandwidth simulator
//! - [`FileWriter`]: positional writes into one file
//! - [`BlockWriter`]: block-addressed writes (LBA = address >> block bits)
//! - [`MemWriter`]: in-memory image with a call log, for tests

mod block;
mod file;
mod memory;
mod sleep;

use std::io;
use std::sync::Arc;

pub use block::BlockWriter;
pub use file::FileWriter;
pub use memory::{MemWriter, WriteRecord};
pub use sleep::SleepWriter;

/// A durable-medium driver
pub trait Writer: Send + Sync {
    /// Write `buffer` at `logical_address`
    fn write(&self, buffer: &[u8], logical_address: u64, hint: i32) -> io::Result<()>;
}

impl<W: Writer + ?Sized> Writer for &W {
    fn write(&self, buffer: &[u8], logical_address: u64, hint: i32) -> io::Result<()> {
        (**self).write(buffer, logical_address, hint)
    }
}

impl<W: Writer + ?Sized> Writer for Arc<W> {
    fn write(&self, buffer: &[u8], logical_address: u64, hint: i32) -> io::Result<()> {
        (**self).write(buffer, logical_address, hint)
    }
}

impl<W: Writer + ?Sized> Writer for Box<W> {
    fn write(&self, buffer: &[u8], logical_address: u64, hint: i32) -> io::Result<()> {
        (**self).write(buffer, logical_address, hint)
    }
}
