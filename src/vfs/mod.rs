// @author:    olinex
// @time:      2023/11/25

// self mods
mod manager;
mod shared;

// use other mods
use alloc::string::String;
use alloc::vec::Vec;

// use self mods
pub use manager::*;
pub use shared::*;

use crate::Result;

/// The operations a client of the file system can request
pub trait FileSystem {
    fn create_file(&self, name: &str) -> Result<()>;
    fn delete_file(&self, name: &str) -> Result<()>;
    fn write_file(&self, name: &str, contents: &[u8]) -> Result<()>;
    fn read_file(&self, name: &str) -> Result<Vec<u8>>;
    fn list_files(&self) -> Vec<String>;
}
