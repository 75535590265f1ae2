// @author:    olinex
// @time:      2023/11/30

// self mods

// use other mods
use alloc::string::String;
use enum_group::EnumGroup;
use thiserror_no_std::Error;

// use self mods

/// `user` errors are caused by the request itself, the file system is left untouched when one is returned.
/// `device` and `internal` errors come from the backing store or a corrupted state.
#[derive(Error, EnumGroup, Debug)]
pub enum LFSError {
    #[groups(user)]
    #[error("File '{0}' already exists")]
    AlreadyExists(String),

    #[groups(user)]
    #[error("File '{0}' does not exist")]
    NotFound(String),

    #[groups(user)]
    #[error("Inode table is full")]
    TableFull,

    #[groups(user)]
    #[error("No free block left on device")]
    DeviceFull,

    #[groups(user)]
    #[error("File too large: {0} blocks needed but only {1} available")]
    FileTooLarge(usize, usize),

    #[groups(user)]
    #[error("File name '{0}' is longer than {1} bytes")]
    FilenameTooLong(String, usize),

    #[groups(device)]
    #[error("Block {0} out of range")]
    OutOfRange(usize),

    #[groups(device)]
    #[error("Raw device error code: {0}")]
    IoFailure(isize),

    #[groups(device)]
    #[error("Not valid filesystem data in backing store")]
    NotValidStoreData,

    #[groups(internal)]
    #[error("Invalid filesystem configuration")]
    InvalidConfig,

    #[groups(internal)]
    #[error("Invariant violated: {0} (block {1})")]
    InvariantViolation(&'static str, usize),
}

pub type Result<T> = core::result::Result<T, LFSError>;
