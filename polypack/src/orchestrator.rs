//! The multi-bin packing pipeline.
//!
//! Bins are filled one at a time: stage 1 packs bounding boxes into
//! maximal free rectangles, stage 2 alternates move-and-replace with
//! repacking until the bin stops changing, stage 3 compresses, drops the
//! remaining pieces from the top and compresses again. Pieces that are
//! still left flow into the next bin.

use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use itertools::Itertools;
use log::{error, info, warn};
use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::entities::Bin;
use crate::geometry::{Piece, Rect};
use crate::nfp::{NfpCache, NfpEngine};
use crate::util::config::PackConfig;

/// Cooperative cancellation flag, checked at least once per piece
/// considered. Cancelling makes the orchestrator return the bins produced
/// so far; it is not an error.
#[derive(Clone, Debug, Default)]
pub struct CancelSwitch(Arc<AtomicBool>);

impl CancelSwitch {
    pub fn new() -> Self {
        CancelSwitch::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Input rejected before any bin is opened.
#[derive(Debug, Error)]
pub enum PackError {
    #[error(
        "piece {id} ({w:.3}x{h:.3}) exceeds the bin ({bin_w:.3}x{bin_h:.3}) in every rotation"
    )]
    PieceTooLarge {
        id: u64,
        w: f64,
        h: f64,
        bin_w: f64,
        bin_h: f64,
    },
    #[error("piece {id} is empty")]
    EmptyPiece { id: u64 },
}

/// The bins produced by a packing run, plus any pieces that found no
/// collision-free position across all stages. Unplaceable pieces are
/// reported here, never dropped silently.
#[derive(Debug)]
pub struct PackSolution {
    pub bins: Vec<Bin>,
    pub unplaced: Vec<Piece>,
}

impl PackSolution {
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn n_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn n_placed(&self) -> usize {
        self.bins.iter().map(|b| b.n_placed()).sum()
    }

    pub fn total_occupied_area(&self) -> f64 {
        self.bins.iter().map(|b| b.occupied_area()).sum()
    }
}

/// Packs `pieces` into bins of `bin_rect`, presenting them to the pipeline
/// in descending-area order (stable for ties).
pub fn pack(
    pieces: Vec<Piece>,
    bin_rect: Rect,
    config: &PackConfig,
    cancel: &CancelSwitch,
) -> Result<PackSolution, PackError> {
    let pieces = pieces
        .into_iter()
        .sorted_by_cached_key(|p| Reverse(OrderedFloat(p.area())))
        .collect_vec();
    run(pieces, bin_rect, config, cancel)
}

/// Same pipeline as [`pack`], but the input order is kept as-is. Intended
/// for metaheuristic wrappers that evaluate their own piece sequences.
pub fn pack_preserve_order(
    pieces: Vec<Piece>,
    bin_rect: Rect,
    config: &PackConfig,
    cancel: &CancelSwitch,
) -> Result<PackSolution, PackError> {
    run(pieces, bin_rect, config, cancel)
}

fn run(
    pieces: Vec<Piece>,
    bin_rect: Rect,
    config: &PackConfig,
    cancel: &CancelSwitch,
) -> Result<PackSolution, PackError> {
    for piece in &pieces {
        if piece.is_empty() {
            return Err(PackError::EmptyPiece { id: piece.id() });
        }
        let bbox = piece.bbox();
        if !Rect::fits(&bbox, &bin_rect) && !Rect::fits_rotated(&bbox, &bin_rect) {
            return Err(PackError::PieceTooLarge {
                id: piece.id(),
                w: bbox.width(),
                h: bbox.height(),
                bin_w: bin_rect.width(),
                bin_h: bin_rect.height(),
            });
        }
    }

    let start = Instant::now();
    let n_pieces = pieces.len();
    let shared_nfp_cache = Arc::new(NfpCache::new());

    let mut bins: Vec<Bin> = Vec::new();
    let mut todo = pieces;

    while !todo.is_empty() {
        if cancel.is_cancelled() {
            info!("packing cancelled with {} pieces remaining", todo.len());
            break;
        }

        let mut bin = Bin::with_nfp_engine(
            bin_rect,
            config.clone(),
            NfpEngine::with_cache(shared_nfp_cache.clone()),
        );

        // stage 1: bounding-box packing into maximal free rectangles
        let mut leftover = bin.bbox_pack(todo, cancel);

        // stage 2: move-and-replace until the bin stops gaining pieces
        if bin.n_placed() > 0 {
            loop {
                let placed_before_repack = bin.n_placed();
                bin.move_and_replace(0);
                if !leftover.is_empty() {
                    leftover = bin.bbox_pack(leftover, cancel);
                }
                if bin.n_placed() == placed_before_repack {
                    break;
                }
            }
        }

        // stage 2': exact free-space islands, when enabled
        if config.island_placement && !leftover.is_empty() {
            leftover = bin.place_in_free_islands(leftover, cancel);
        }

        // stage 3: compress, drop from the top, compress again
        bin.compress();
        if !leftover.is_empty() {
            leftover = bin.drop_pieces(leftover, cancel);
        }
        bin.compress();

        // an empty bin means the leftover count cannot shrink any further;
        // opening more bins would loop forever
        if bin.n_placed() == 0 {
            warn!(
                "could not place any of the {} remaining pieces into a fresh bin",
                leftover.len()
            );
            emit_unplaceable_diagnostic(&leftover);
            todo = leftover;
            break;
        }

        info!(
            "bin {}: {} pieces placed, {:.1}% occupied",
            bins.len() + 1,
            bin.n_placed(),
            bin.occupied_area() / bin_rect.area() * 100.0
        );
        bins.push(bin);
        todo = leftover;
    }

    info!(
        "packing finished: {}/{} pieces in {} bins, {}ms",
        n_pieces - todo.len(),
        n_pieces,
        bins.len(),
        start.elapsed().as_millis()
    );

    Ok(PackSolution {
        bins,
        unplaced: todo,
    })
}

fn emit_unplaceable_diagnostic(unplaced: &[Piece]) {
    if let Some(largest) = unplaced.iter().max_by_key(|p| OrderedFloat(p.area())) {
        error!(
            "{} pieces unplaceable; the largest (piece {}, {:.3}x{:.3}) fits the bin but found no collision-free position",
            unplaced.len(),
            largest.id(),
            largest.bbox().width(),
            largest.bbox().height()
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use float_cmp::approx_eq;

    fn rect(w: f64, h: f64) -> Rect {
        Rect::try_new(0.0, 0.0, w, h).unwrap()
    }

    #[test]
    fn empty_input_produces_zero_bins() {
        let solution = pack(
            vec![],
            rect(50.0, 50.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();
        assert!(solution.bins.is_empty());
        assert!(solution.is_complete());
    }

    #[test]
    fn oversized_piece_is_rejected_up_front() {
        let piece = Piece::rectangle(1, 60.0, 60.0).unwrap();
        let result = pack(
            vec![piece],
            rect(50.0, 50.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        );
        assert!(matches!(result, Err(PackError::PieceTooLarge { id: 1, .. })));
    }

    #[test]
    fn rotatable_piece_passes_validation() {
        // 60x40 fails as-is but fits the 50x70 bin rotated
        let piece = Piece::rectangle(1, 60.0, 40.0).unwrap();
        let solution = pack(
            vec![piece],
            rect(50.0, 70.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();
        assert_eq!(solution.n_bins(), 1);
        assert!(solution.is_complete());
    }

    #[test]
    fn two_large_squares_need_two_bins() {
        let pieces = vec![
            Piece::rectangle(1, 30.0, 30.0).unwrap(),
            Piece::rectangle(2, 30.0, 30.0).unwrap(),
        ];
        let solution = pack(
            pieces,
            rect(50.0, 50.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();
        assert_eq!(solution.n_bins(), 2);
        assert!(solution.is_complete());
        for bin in &solution.bins {
            assert_eq!(bin.n_placed(), 1);
            assert!(approx_eq!(f64, bin.occupied_area(), 900.0, epsilon = 1e-6));
            let bbox = bin.placed_pieces()[0].bbox();
            assert!(approx_eq!(f64, bbox.x_min, 0.0, epsilon = 1e-9));
            assert!(approx_eq!(f64, bbox.y_min, 0.0, epsilon = 1e-9));
        }
    }

    #[test]
    fn sorting_presents_larger_pieces_first() {
        let pieces = vec![
            Piece::rectangle(1, 10.0, 10.0).unwrap(),
            Piece::rectangle(2, 30.0, 30.0).unwrap(),
        ];
        let solution = pack(
            pieces,
            rect(50.0, 50.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();
        let bin = &solution.bins[0];
        assert_eq!(bin.placed_pieces()[0].id(), 2);
        assert_eq!(bin.placed_pieces()[1].id(), 1);
    }

    #[test]
    fn preserve_order_skips_the_sort() {
        let pieces = vec![
            Piece::rectangle(1, 10.0, 10.0).unwrap(),
            Piece::rectangle(2, 30.0, 30.0).unwrap(),
        ];
        let solution = pack_preserve_order(
            pieces,
            rect(50.0, 50.0),
            &PackConfig::default(),
            &CancelSwitch::new(),
        )
        .unwrap();
        let bin = &solution.bins[0];
        assert_eq!(bin.placed_pieces()[0].id(), 1);
        assert_eq!(bin.placed_pieces()[1].id(), 2);
    }

    #[test]
    fn cancelled_run_returns_partial_result() {
        let cancel = CancelSwitch::new();
        cancel.cancel();
        let pieces = vec![Piece::rectangle(1, 10.0, 10.0).unwrap()];
        let solution = pack(pieces, rect(50.0, 50.0), &PackConfig::default(), &cancel).unwrap();
        assert!(solution.bins.is_empty());
        assert_eq!(solution.unplaced.len(), 1);
    }
}
