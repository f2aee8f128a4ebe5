//! Utility modules for common functionality

pub mod lock;

#[allow(unused_imports)]
pub use lock::{setup_signal_handlers, FileLock};

// vim: ts=4
