//! Mutable packing state: the bin, its placed pieces, and the free-space
//! analyses that drive the later placement stages.

mod bin;
mod free_space;

pub use bin::{Bin, Slot};
pub use free_space::{FreeIsland, IslandPlacement};
