// @author:    olinex
// @time:      2023/11/04

// self mods
mod device;
mod store;

// use other mods

// use self mods

// reexport
pub use device::*;
pub use store::*;
