//! `polypack` solves the two-dimensional irregular bin packing problem:
//! place a multiset of rigid polygonal pieces (possibly with holes) into as
//! few fixed-size rectangular bins as possible, maximizing the occupied area
//! within those bins. Pieces may be rotated in a finite set of angles, never
//! mirrored.
//!
//! The engine combines three subsystems:
//! - a maximal-free-rectangles placer with precise polygon collision
//!   detection backed by an R*-tree ([`entities::Bin`]),
//! - a gravity/compression engine that slides placed pieces toward the
//!   bin's lower-left corner, plus a "dive" drop for new pieces,
//! - a no-fit-polygon module ([`nfp`]) yielding, for any two oriented
//!   pieces, the locus of forbidden translations.
//!
//! [`orchestrator::pack`] runs the full multi-bin pipeline.

pub mod collision;
pub mod entities;
pub mod geometry;
pub mod io;
pub mod nfp;
pub mod orchestrator;
pub mod util;

/// Tolerance used for snapping degenerate geometry: boolean results with
/// area at or below this value are treated as empty, and axis-aligned
/// comparisons are closed up to this value.
pub const EPS: f64 = 1e-9;

#[doc(inline)]
pub use entities::Bin;
#[doc(inline)]
pub use geometry::{Piece, Rect, Vector};
#[doc(inline)]
pub use orchestrator::{pack, pack_preserve_order, CancelSwitch, PackError, PackSolution};
#[doc(inline)]
pub use util::config::PackConfig;
