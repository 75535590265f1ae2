// @author:    olinex
// @time:      2023/11/03
#![cfg_attr(not(test), no_std)]

// self mods
pub mod block;
pub mod configs;
pub mod error;
pub mod layout;
pub mod vfs;

// use other mods
#[cfg(test)]
#[macro_use]
extern crate std;

#[macro_use]
extern crate bitflags;

#[macro_use]
extern crate log;

#[macro_use]
extern crate alloc;

extern crate bit_field;
extern crate spin;

// reexports
pub use block::{BlockDevice, MemoryBlockDevice};
pub use configs::FsConfig;
pub use error::{LFSError, Result};
pub use vfs::{FileSystem, FileSystemManager, SharedFileSystem};
