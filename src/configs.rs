// @author:    olinex
// @time:      2023/11/04

// self mods

// use other mods

// use self mods
use crate::layout::MetaLayout;
use crate::{LFSError, Result};

pub const DEFAULT_BLOCK_BYTE_SIZE: usize = 128;
pub const DEFAULT_CAPACITY_BLOCKS: usize = 10;
pub const DEFAULT_MAX_FILES: usize = 5;
pub const DEFAULT_MAX_FILENAME_LENGTH: usize = 11;

/// Blocks smaller than this can not hold a useful slice of file data
pub const MIN_BLOCK_BYTE_SIZE: usize = 16;

/// Names are stored with a one byte length prefix
pub const MAX_FILENAME_LENGTH_LIMIT: usize = u8::MAX as usize;

/// The geometry of a file system.
/// All of the values are fixed once the file system was formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsConfig {
    pub block_size: usize,
    pub capacity_blocks: usize,
    pub max_files: usize,
    pub max_filename_length: usize,
}
impl FsConfig {
    pub const fn new(
        block_size: usize,
        capacity_blocks: usize,
        max_files: usize,
        max_filename_length: usize,
    ) -> Self {
        Self {
            block_size,
            capacity_blocks,
            max_files,
            max_filename_length,
        }
    }

    /// Total bytes the backing store must provide
    #[inline(always)]
    pub fn store_byte_size(&self) -> u64 {
        self.block_size as u64 * self.capacity_blocks as u64
    }

    /// Check the geometry can hold the metadata region and at least one data block.
    ///
    /// # Returns
    /// * Ok(())
    /// * Err(InvalidConfig)
    pub fn validate(&self) -> Result<()> {
        if self.block_size < MIN_BLOCK_BYTE_SIZE
            || self.capacity_blocks == 0
            || self.capacity_blocks > i32::MAX as usize
            || self.store_byte_size() > u32::MAX as u64
            || self.max_files == 0
            || self.max_filename_length == 0
            || self.max_filename_length > MAX_FILENAME_LENGTH_LIMIT
        {
            return Err(LFSError::InvalidConfig);
        }
        if MetaLayout::new(self).blocks() >= self.capacity_blocks {
            return Err(LFSError::InvalidConfig);
        }
        Ok(())
    }
}
impl Default for FsConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_BLOCK_BYTE_SIZE,
            DEFAULT_CAPACITY_BLOCKS,
            DEFAULT_MAX_FILES,
            DEFAULT_MAX_FILENAME_LENGTH,
        )
    }
}
