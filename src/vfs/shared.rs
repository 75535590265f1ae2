// @author:    olinex
// @time:      2023/12/06

// self mods

// use other mods
use alloc::string::String;
use alloc::vec::Vec;
use spin::{RwLock, RwLockReadGuard};

// use self mods
use super::{FileSystem, FileSystemManager};
use crate::Result;

/// The file system shared by all clients.
/// One readers-writer lock guards the whole manager:
/// create, write and delete hold the write side, read and list hold the read side.
/// Every call therefore sees the tables in a consistent state and runs atomically against the others.
///
/// The lock is a `spin::RwLock`, so waiting clients busy-spin while a writer holds it,
/// device I/O and the final flush included.
/// With many connections over a slow backing file that costs CPU time.
pub struct SharedFileSystem {
    inner: RwLock<FileSystemManager>,
}
impl SharedFileSystem {
    pub fn new(manager: FileSystemManager) -> Self {
        Self {
            inner: RwLock::new(manager),
        }
    }

    /// Hold the read side of the lock to inspect the manager
    pub fn inspect(&self) -> RwLockReadGuard<'_, FileSystemManager> {
        self.inner.read()
    }

    /// Take the manager back once no client holds the file system
    pub fn into_inner(self) -> FileSystemManager {
        self.inner.into_inner()
    }
}
impl FileSystem for SharedFileSystem {
    fn create_file(&self, name: &str) -> Result<()> {
        self.inner.write().create_file(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.inner.write().delete_file(name)
    }

    fn write_file(&self, name: &str, contents: &[u8]) -> Result<()> {
        self.inner.write().write_file(name, contents)
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.inner.read().read_file(name)
    }

    fn list_files(&self) -> Vec<String> {
        self.inner.read().list_files()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockDevice, MemoryBlockDevice};
    use crate::configs::FsConfig;
    use alloc::string::ToString;
    use alloc::sync::Arc;
    use std::thread;

    fn new_shared(config: FsConfig) -> SharedFileSystem {
        let device: Arc<dyn BlockDevice> =
            Arc::new(MemoryBlockDevice::new(config.store_byte_size() as usize));
        SharedFileSystem::new(FileSystemManager::format(&device, config).unwrap())
    }

    #[test]
    fn test_shared_file_system_operations() {
        let fs = new_shared(FsConfig::default());
        assert!(fs.create_file("a").is_ok());
        assert!(fs.write_file("a", b"hello").is_ok());
        assert!(fs.read_file("a").is_ok_and(|read| read == b"hello"));
        assert_eq!(vec!["a"], fs.list_files());
        assert!(fs.delete_file("a").is_ok());
        assert!(fs.list_files().is_empty());
        assert!(fs.inspect().check_consistency().is_ok());
    }

    #[test]
    fn test_shared_file_system_concurrent_clients() {
        let fs = Arc::new(new_shared(FsConfig::new(64, 64, 8, 11)));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let fs = Arc::clone(&fs);
                thread::spawn(move || {
                    let name = format!("file{}", i);
                    fs.create_file(&name).unwrap();
                    for round in 0..20 {
                        let content = vec![i as u8; 50 + round * 3];
                        fs.write_file(&name, &content).unwrap();
                        assert_eq!(content, fs.read_file(&name).unwrap());
                        assert!(fs.list_files().contains(&name.to_string()));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(8, fs.list_files().len());
        let manager = Arc::try_unwrap(fs).ok().unwrap().into_inner();
        assert!(manager.check_consistency().is_ok());
        // 11 metadata blocks, each file ends with 107 bytes in two blocks
        assert_eq!(11, manager.metadata_blocks());
        assert_eq!(64 - 11 - 8 * 2, manager.free_count());
    }
}
