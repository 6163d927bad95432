//! Utility modules

pub mod memory_storage;
pub mod rounding;

pub use memory_storage::*;
pub use rounding::*;
