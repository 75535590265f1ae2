// @author:    olinex
// @time:      2023/11/08

// self mods
mod bitmap;
mod descriptor;
mod inode;
mod meta;

// use other mods

// use self mods

// reexport
pub use bitmap::*;
pub use descriptor::*;
pub use inode::*;
pub use meta::*;
