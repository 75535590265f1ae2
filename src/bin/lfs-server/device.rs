// @author:    olinex
// @time:      2023/12/08

// self mods

// use other mods
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

// use self mods
use linked_fs::{BlockDevice, LFSError, Result};

/// Block device backed by a regular file on the host
pub struct FileBlockDevice {
    file: Mutex<File>,
    byte_size: u64,
}
impl FileBlockDevice {
    /// Open the backing file, create it or extend it with zero when it is shorter than the device
    ///
    /// # Arguments
    /// * path: the path of the backing file
    /// * byte_size: the byte size of the device
    pub fn open(path: &Path, byte_size: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        if file.metadata()?.len() < byte_size {
            file.set_len(byte_size)?;
        }
        Ok(Self {
            file: Mutex::new(file),
            byte_size,
        })
    }

    fn io_failure(err: io::Error) -> LFSError {
        error!("backing file error: {}", err);
        LFSError::IoFailure(err.raw_os_error().map_or(-1, |code| code as isize))
    }

    fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        if offset + len as u64 > self.byte_size {
            Err(LFSError::IoFailure(-1))
        } else {
            Ok(())
        }
    }
}
impl BlockDevice for FileBlockDevice {
    fn byte_size(&self) -> u64 {
        self.byte_size
    }

    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        self.check_range(offset, buffer.len())?;
        let mut file = self.file.lock().map_err(|_| LFSError::IoFailure(-1))?;
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(buffer))
            .map_err(Self::io_failure)
    }

    fn write_at(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        self.check_range(offset, buffer.len())?;
        let mut file = self.file.lock().map_err(|_| LFSError::IoFailure(-1))?;
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.write_all(buffer))
            .map_err(Self::io_failure)
    }

    fn flush(&self) -> Result<()> {
        let mut file = self.file.lock().map_err(|_| LFSError::IoFailure(-1))?;
        file.flush().map_err(Self::io_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    #[test]
    fn test_file_block_device_read_and_write() {
        let path = env::temp_dir().join(format!("lfs-device-{}.dat", std::process::id()));
        let _ = fs::remove_file(&path);
        let device = FileBlockDevice::open(&path, 1280).unwrap();
        assert_eq!(1280, device.byte_size());
        assert_eq!(1280, fs::metadata(&path).unwrap().len());

        let mut buffer = [0u8; 128];
        assert!(device.read_at(128, &mut buffer).is_ok());
        assert_eq!([0u8; 128], buffer);
        assert!(device.write_at(130, &[9u8; 4]).is_ok());
        assert!(device.read_at(128, &mut buffer).is_ok());
        assert_eq!([0, 0, 9, 9, 9, 9, 0], buffer[..7]);
        assert!(device.write_at(1279, &[1u8; 2]).is_err_and(|e| e.is_iofailure()));
        assert!(device.flush().is_ok());
        drop(device);

        let device = FileBlockDevice::open(&path, 1280).unwrap();
        assert!(device.read_at(128, &mut buffer).is_ok());
        assert_eq!(9, buffer[2]);
        drop(device);
        let _ = fs::remove_file(&path);
    }
}
