//! Checks verifying the consistency of bin state.
//! Used in `debug_assert!()` blocks after every mutating bin operation.

use itertools::Itertools;
use log::error;

use crate::entities::Bin;
use crate::EPS;

/// All-in-one check used by the bin after each mutation.
pub fn bin_is_consistent(bin: &Bin) -> bool {
    free_rects_inside_bin(bin)
        && free_rects_are_maximal(bin)
        && index_matches_placed(bin)
        && placed_inside_bin(bin)
        && placed_pairwise_disjoint(bin)
}

pub fn free_rects_inside_bin(bin: &Bin) -> bool {
    let dimension = bin.dimension();
    for rect in bin.free_rects() {
        if !dimension.contains(rect) {
            error!("free rectangle {rect:?} escapes the bin {dimension:?}");
            return false;
        }
        if rect.width() <= EPS || rect.height() <= EPS {
            error!("degenerate free rectangle {rect:?}");
            return false;
        }
    }
    true
}

pub fn free_rects_are_maximal(bin: &Bin) -> bool {
    let rects = bin.free_rects();
    for (i, a) in rects.iter().enumerate() {
        for (j, b) in rects.iter().enumerate() {
            if i != j && b.contains(a) && b != a {
                error!("free rectangle {a:?} is contained in {b:?}");
                return false;
            }
        }
    }
    true
}

/// Every placed piece has exactly its own (bbox, index) entry in the
/// spatial index, and nothing else is indexed.
pub fn index_matches_placed(bin: &Bin) -> bool {
    if bin.index.len() != bin.n_placed() {
        error!(
            "index holds {} entries for {} placed pieces",
            bin.index.len(),
            bin.n_placed()
        );
        return false;
    }
    for (i, piece) in bin.placed_pieces().iter().enumerate() {
        if !bin.index.contains(piece.bbox(), i) {
            error!("piece {i} has no index entry at its bbox");
            return false;
        }
    }
    true
}

pub fn placed_inside_bin(bin: &Bin) -> bool {
    let dimension = bin.dimension();
    for (i, piece) in bin.placed_pieces().iter().enumerate() {
        if !piece.is_inside(&dimension) {
            error!("placed piece {i} (id {}) escapes the bin", piece.id());
            return false;
        }
    }
    true
}

pub fn placed_pairwise_disjoint(bin: &Bin) -> bool {
    for ((i, a), (j, b)) in bin.placed_pieces().iter().enumerate().tuple_combinations() {
        if a.overlaps(b, EPS) {
            error!(
                "placed pieces {i} (id {}) and {j} (id {}) overlap",
                a.id(),
                b.id()
            );
            return false;
        }
    }
    true
}
