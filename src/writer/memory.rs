//! Memory Writer
//!
//! Keeps the written log in memory and records every call, with optional
//! latency and failure injection.

use std::io;
use std::time::Duration;

use parking_lot::Mutex;

use super::Writer;

/// One recorded Writer call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub address: u64,
    pub len: usize,
    pub hint: i32,
}

impl WriteRecord {
    /// One past the last written address
    pub fn end(&self) -> u64 {
        self.address + self.len as u64
    }
}

#[derive(Default)]
struct MemState {
    image: Vec<u8>,
    writes: Vec<WriteRecord>,
}

/// In-memory writer
#[derive(Default)]
pub struct MemWriter {
    state: Mutex<MemState>,
    latency: Option<Duration>,
    fail_after: Option<usize>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long in every write, before touching the image
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Accept `count` writes, then fail every later one
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Every successful call, in completion order
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().writes.len()
    }

    /// Sum of all successful write lengths
    pub fn bytes_written(&self) -> u64 {
        self.state.lock().writes.iter().map(|w| w.len as u64).sum()
    }

    /// Copy of the written image (unwritten gaps are zero)
    pub fn image(&self) -> Vec<u8> {
        self.state.lock().image.clone()
    }

    /// Copy of `len` image bytes at `address`
    pub fn read(&self, address: u64, len: usize) -> Option<Vec<u8>> {
        let state = self.state.lock();
        let start = address as usize;
        state.image.get(start..start + len).map(<[u8]>::to_vec)
    }
}

impl Writer for MemWriter {
    fn write(&self, buffer: &[u8], logical_address: u64, hint: i32) -> io::Result<()> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        let mut state = self.state.lock();
        if let Some(limit) = self.fail_after {
            if state.writes.len() >= limit {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("injected failure writing {} bytes at {}", buffer.len(), logical_address),
                ));
            }
        }

        let start = logical_address as usize;
        let end = start + buffer.len();
        if state.image.len() < end {
            state.image.resize(end, 0);
        }
        state.image[start..end].copy_from_slice(buffer);
        state.writes.push(WriteRecord {
            address: logical_address,
            len: buffer.len(),
            hint,
        });
        Ok(())
    }
}
