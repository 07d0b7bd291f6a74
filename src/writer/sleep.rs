//! Sleep Writer
//!
//! Throughput simulator: every write costs a fixed latency plus its
//! length divided by the bandwidth.

use std::io;
use std::time::Duration;

use super::Writer;

/// Writer that only sleeps
#[derive(Debug, Clone, Copy)]
pub struct SleepWriter {
    latency: Duration,
    /// Bytes per microsecond (MB/s); 0 means unlimited
    bandwidth: u64,
}

impl SleepWriter {
    pub fn new(latency: Duration, bandwidth: u64) -> Self {
        Self { latency, bandwidth }
    }

    /// Simulated duration of a write of `len` bytes
    pub fn cost(&self, len: usize) -> Duration {
        let transfer = match self.bandwidth {
            0 => Duration::ZERO,
            bw => Duration::from_micros(len as u64 / bw),
        };
        self.latency + transfer
    }
}

impl Default for SleepWriter {
    /// 50 µs latency, 200 MB/s
    fn default() -> Self {
        Self::new(Duration::from_micros(50), 200)
    }
}

impl Writer for SleepWriter {
    fn write(&self, buffer: &[u8], _logical_address: u64, _hint: i32) -> io::Result<()> {
        let cost = self.cost(buffer.len());
        if !cost.is_zero() {
            std::thread::sleep(cost);
        }
        Ok(())
    }
}
