//! Journal entry validation, balancing and posting

pub mod entry;
pub mod posting;
pub mod reference;

pub use entry::*;
pub use posting::*;
pub use reference::*;
