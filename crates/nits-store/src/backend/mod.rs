//! Store backends.

pub mod fs;
pub mod memory;
