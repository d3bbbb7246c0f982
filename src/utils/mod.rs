//! Utility modules for file I/O, Arrow conversion and logging

pub mod arrow;
pub mod io;
pub mod logging;
