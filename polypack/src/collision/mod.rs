//! Broad-phase collision detection.

mod spatial_index;

pub use spatial_index::PieceIndex;
