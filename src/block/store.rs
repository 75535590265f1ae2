// @author:    olinex
// @time:      2023/12/02

// self mods

// use other mods
use alloc::sync::Arc;
use alloc::vec::Vec;

// use self mods
use super::BlockDevice;
use crate::{LFSError, Result};

/// Block granular view over a [`BlockDevice`].
/// Block `i` always occupies bytes `i * block_size .. (i + 1) * block_size` of the device.
/// Nothing is cached, each call goes straight to the device.
pub struct BlockStore {
    device: Arc<dyn BlockDevice>,
    block_size: usize,
    capacity_blocks: usize,
}
impl BlockStore {
    /// Create a new block store over the device.
    ///
    /// # Arguments
    /// * device: the backing device, it must be at least `block_size * capacity_blocks` bytes
    /// * block_size: the byte size of each block
    /// * capacity_blocks: the count of the blocks
    ///
    /// # Returns
    /// * Ok(BlockStore)
    /// * Err(InvalidConfig)
    pub fn new(
        device: &Arc<dyn BlockDevice>,
        block_size: usize,
        capacity_blocks: usize,
    ) -> Result<Self> {
        if device.byte_size() < block_size as u64 * capacity_blocks as u64 {
            return Err(LFSError::InvalidConfig);
        }
        Ok(Self {
            device: Arc::clone(device),
            block_size,
            capacity_blocks,
        })
    }

    #[inline(always)]
    fn offset_of(&self, block_index: usize) -> Result<u64> {
        if block_index < self.capacity_blocks {
            Ok(block_index as u64 * self.block_size as u64)
        } else {
            Err(LFSError::OutOfRange(block_index))
        }
    }

    /// Read a whole block into a new buffer
    ///
    /// # Returns
    /// * Ok(block bytes)
    /// * Err(OutOfRange(block index) | IoFailure(code))
    pub fn read_block(&self, block_index: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; self.block_size];
        self.read_block_into(block_index, &mut buffer)?;
        Ok(buffer)
    }

    /// Read the leading bytes of a block, the buffer must not be longer than a block
    ///
    /// # Returns
    /// * Ok(())
    /// * Err(OutOfRange(block index) | IoFailure(code))
    pub fn read_block_into(&self, block_index: usize, buffer: &mut [u8]) -> Result<()> {
        let offset = self.offset_of(block_index)?;
        assert!(buffer.len() <= self.block_size);
        self.device.read_at(offset, buffer)
    }

    /// Write a block, bytes shorter than a block will be padded with zero
    ///
    /// # Returns
    /// * Ok(())
    /// * Err(OutOfRange(block index) | IoFailure(code))
    pub fn write_block(&self, block_index: usize, bytes: &[u8]) -> Result<()> {
        let offset = self.offset_of(block_index)?;
        assert!(bytes.len() <= self.block_size);
        if bytes.len() == self.block_size {
            self.device.write_at(offset, bytes)
        } else {
            let mut buffer = vec![0u8; self.block_size];
            buffer[..bytes.len()].copy_from_slice(bytes);
            self.device.write_at(offset, &buffer)
        }
    }

    /// Fill the block with zero
    pub fn clear_block(&self, block_index: usize) -> Result<()> {
        self.write_block(block_index, &[])
    }

    /// Read raw bytes from the beginning of the device, used by the metadata region
    pub fn read_raw(&self, buffer: &mut [u8]) -> Result<()> {
        self.device.read_at(0, buffer)
    }

    /// Write raw bytes to the beginning of the device, used by the metadata region
    pub fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        self.device.write_at(0, bytes)
    }

    pub fn flush(&self) -> Result<()> {
        self.device.flush()
    }
}
