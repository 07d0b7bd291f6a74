//! Block Writer
//!
//! Block-addressed writer for raw devices (or files standing in for one).
//! Logical addresses are translated to a logical block address by
//! right-shifting by the device block-size bits.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::error::{Result, WalError};

use super::Writer;

/// Writer issuing whole-block writes at `base_lba + (address >> block_bits)`
pub struct BlockWriter {
    device: Mutex<File>,
    block_bits: u32,
    base_lba: u64,
}

impl BlockWriter {
    /// Open a device with blocks of `1 << block_bits` bytes
    pub fn open(path: &Path, block_bits: u32) -> Result<Self> {
        if !(9..=16).contains(&block_bits) {
            return Err(WalError::Config(format!(
                "block_bits must be in 9..=16, got {}",
                block_bits
            )));
        }

        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            device: Mutex::new(device),
            block_bits,
            base_lba: 0,
        })
    }

    /// Start the log at block `lba` instead of block zero
    pub fn with_base_lba(mut self, lba: u64) -> Self {
        self.base_lba = lba;
        self
    }

    pub fn block_size(&self) -> usize {
        1 << self.block_bits
    }

    /// Block address of a logical address
    pub fn lba(&self, logical_address: u64) -> u64 {
        self.base_lba + (logical_address >> self.block_bits)
    }

    /// Number of blocks covering `len` bytes
    pub fn num_blocks(&self, len: usize) -> usize {
        len.div_ceil(self.block_size())
    }
}

impl Writer for BlockWriter {
    fn write(&self, buffer: &[u8], logical_address: u64, _hint: i32) -> io::Result<()> {
        let block_size = self.block_size();
        if logical_address & (block_size as u64 - 1) != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "address {} is not aligned to {}-byte blocks",
                    logical_address, block_size
                ),
            ));
        }

        let padded_len = self.num_blocks(buffer.len()) * block_size;
        let offset = self.lba(logical_address) << self.block_bits;

        let mut device = self.device.lock();
        device.seek(SeekFrom::Start(offset))?;
        if padded_len == buffer.len() {
            device.write_all(buffer)?;
        } else {
            let mut blocks = vec![0u8; padded_len];
            blocks[..buffer.len()].copy_from_slice(buffer);
            device.write_all(&blocks)?;
        }
        device.sync_data()
    }
}
