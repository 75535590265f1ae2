// @author:    olinex
// @time:      2023/11/04

// self mods

// use other mods
use alloc::vec::Vec;
use core::any::Any;
use spin::Mutex;

// use self mods
use crate::{LFSError, Result};

/// The raw backing store of the file system.
/// A device is nothing more than a fixed length region of bytes which can be accessed at any offset.
pub trait BlockDevice: Send + Sync + Any {
    /// The total byte size of the device
    fn byte_size(&self) -> u64;

    /// Read bytes from device at the offset,
    /// the whole buffer must be filled or an error returned
    ///
    /// # Arguments
    /// * offset: the byte offset from the beginning of the device
    /// * buffer: the buffer which will store the byte data
    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<()>;

    /// Write bytes to device at the offset
    ///
    /// # Arguments
    /// * offset: the byte offset from the beginning of the device
    /// * buffer: the buffer which will be read and the data will be written to device
    fn write_at(&self, offset: u64, buffer: &[u8]) -> Result<()>;

    /// Make sure all the written bytes reach the persistent storage
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// The memory block device which is impl [`BlockDevice`] and used for testing.
/// Data will be stored into the heap.
pub struct MemoryBlockDevice {
    data: Mutex<Vec<u8>>,
}
impl MemoryBlockDevice {
    /// Create a new zeroed memory device
    ///
    /// # Arguments
    /// * byte_size: the total byte size of the device
    pub fn new(byte_size: usize) -> Self {
        Self {
            data: Mutex::new(vec![0; byte_size]),
        }
    }

    /// Copy all the bytes out of the device
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    fn range_of(&self, offset: u64, len: usize) -> Result<core::ops::Range<usize>> {
        let start = offset as usize;
        let end = start + len;
        if end > self.data.lock().len() {
            Err(LFSError::IoFailure(-1))
        } else {
            Ok(start..end)
        }
    }
}
impl BlockDevice for MemoryBlockDevice {
    fn byte_size(&self) -> u64 {
        self.data.lock().len() as u64
    }

    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        let range = self.range_of(offset, buffer.len())?;
        buffer.copy_from_slice(&self.data.lock()[range]);
        Ok(())
    }

    fn write_at(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        let range = self.range_of(offset, buffer.len())?;
        self.data.lock()[range].copy_from_slice(buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_block_device_read_and_write() {
        let mock = MemoryBlockDevice::new(256);
        assert_eq!(256, mock.byte_size());
        let mut test_block = [0; 128];
        assert!(mock.read_at(0, &mut test_block).is_ok());
        assert_eq!([0; 128], test_block);

        test_block[0] = 1;
        assert!(mock.read_at(0, &mut test_block).is_ok());
        assert_eq!([0; 128], test_block);

        test_block[0] = 1;
        assert!(mock.write_at(128, &test_block).is_ok());
        test_block[0] = 0;
        assert!(mock.read_at(128, &mut test_block).is_ok());
        assert_eq!(1, test_block[0]);
        assert_eq!(1, mock.snapshot()[128]);
    }

    #[test]
    fn test_memory_block_device_out_of_bounds() {
        let mock = MemoryBlockDevice::new(256);
        let mut buffer = [0; 128];
        assert!(mock
            .read_at(129, &mut buffer)
            .is_err_and(|e| e.is_iofailure()));
        assert!(mock.write_at(200, &buffer).is_err_and(|e| e.is_iofailure()));
        assert!(mock.write_at(128, &buffer).is_ok());
    }
}
