use std::cmp::Reverse;

use geo::Coord;
use log::debug;
use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::collision::PieceIndex;
use crate::geometry::{Piece, Rect, Vector};
use crate::nfp::NfpEngine;
use crate::orchestrator::CancelSwitch;
use crate::util::{assertions, config::PackConfig};
use crate::EPS;

/// Slot chosen by [`Bin::find_where_to_place`]: which free rectangle to use
/// and the rotation to apply first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub rect_idx: usize,
    pub rotation: f64,
}

/// One bin under construction: the placed-piece sequence, the maximal free
/// rectangles covering unoccupied bbox space, and the spatial index over
/// placed bboxes.
///
/// A piece's position in `placed` is its stable handle inside the bin; the
/// index, the free-rectangle set and the placed sequence are mutually
/// consistent after every public operation.
#[derive(Clone, Debug)]
pub struct Bin {
    dimension: Rect,
    config: PackConfig,
    pub(crate) placed: Vec<Piece>,
    pub(crate) free_rects: Vec<Rect>,
    pub(crate) index: PieceIndex,
    nfp: NfpEngine,
}

impl Bin {
    pub fn new(dimension: Rect, config: PackConfig) -> Self {
        Bin::with_nfp_engine(dimension, config, NfpEngine::new())
    }

    /// Builds a bin around an existing NFP engine, so several bins can
    /// share one NFP cache.
    pub fn with_nfp_engine(dimension: Rect, config: PackConfig, nfp: NfpEngine) -> Self {
        Bin {
            dimension,
            config,
            placed: Vec::new(),
            free_rects: vec![dimension],
            index: PieceIndex::new(),
            nfp,
        }
    }

    pub fn dimension(&self) -> Rect {
        self.dimension
    }

    pub fn placed_pieces(&self) -> &[Piece] {
        &self.placed
    }

    pub fn n_placed(&self) -> usize {
        self.placed.len()
    }

    pub fn free_rects(&self) -> &[Rect] {
        &self.free_rects
    }

    pub fn nfp_engine(&self) -> &NfpEngine {
        &self.nfp
    }

    /// Sum of the areas of the placed pieces.
    pub fn occupied_area(&self) -> f64 {
        self.placed.iter().map(|p| p.area()).sum()
    }

    /// Bin area minus the occupied area.
    pub fn empty_area(&self) -> f64 {
        self.dimension.area() - self.occupied_area()
    }

    /// Collision oracle: does `piece`, at its current position, collide
    /// with any placed piece other than `ignored`?
    ///
    /// Broad phase queries the spatial index for bbox candidates; the
    /// narrow phase runs a precise polygon intersection with the
    /// configured area tolerance. With `nfp_collision` enabled, the oracle
    /// instead asks the NFP module whether the current position is valid.
    pub fn is_collision(&self, piece: &Piece, ignored: Option<usize>) -> bool {
        if self.config.nfp_collision {
            return self.is_collision_nfp(piece, ignored);
        }
        let candidates = self.index.query_intersecting(piece.bbox());
        candidates
            .into_iter()
            .filter(|&i| Some(i) != ignored)
            .any(|i| self.placed[i].overlaps(piece, self.config.collision_tolerance))
    }

    fn is_collision_nfp(&self, piece: &Piece, ignored: Option<usize>) -> bool {
        let obstacles: Vec<&Piece> = self
            .placed
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != ignored)
            .map(|(_, p)| p)
            .collect();
        let bbox = piece.bbox();
        let position = Coord {
            x: bbox.x_min,
            y: bbox.y_min,
        };
        !self
            .nfp
            .is_valid_placement(piece, position, &obstacles, &self.dimension)
    }

    /// Min-wastage slot search over the free rectangles, newest first, for
    /// every orientation in the stage-1 rotation set. Ties keep the first
    /// candidate encountered.
    ///
    /// Above the configured free-rect threshold the scan fans out over
    /// rayon; each worker reports its local best and a sequential reduction
    /// picks the global one, so no bin state is touched during the search.
    pub fn find_where_to_place(&self, piece: &Piece) -> Option<Slot> {
        if piece.is_empty() || self.free_rects.is_empty() {
            return None;
        }
        let bbox = piece.bbox();
        let orientations: Vec<(f64, f64, f64)> = self
            .config
            .stage1_rotations
            .iter()
            .map(|&angle| {
                let quarter_turns = angle.rem_euclid(360.0) / 90.0;
                if quarter_turns.fract() == 0.0 {
                    // quarter turns permute the bbox dimensions exactly
                    if quarter_turns as u32 % 2 == 1 {
                        (angle, bbox.height(), bbox.width())
                    } else {
                        (angle, bbox.width(), bbox.height())
                    }
                } else {
                    let mut rotated = piece.clone();
                    rotated.rotate(angle);
                    let b = rotated.bbox();
                    (angle, b.width(), b.height())
                }
            })
            .collect();

        let n = self.free_rects.len();
        // candidate key: (wastage, encounter rank, orientation rank)
        let evaluate = |(ri, rect): (usize, &Rect)| -> Option<(OrderedFloat<f64>, usize, usize)> {
            let mut local: Option<(OrderedFloat<f64>, usize, usize)> = None;
            for (oi, &(_, w, h)) in orientations.iter().enumerate() {
                if w <= rect.width() && h <= rect.height() {
                    let wastage = OrderedFloat(f64::min(rect.width() - w, rect.height() - h));
                    if local.map_or(true, |(best, _, _)| wastage < best) {
                        local = Some((wastage, n - 1 - ri, oi));
                    }
                }
            }
            local
        };

        let parallel =
            self.config.parallel_search && n > self.config.parallel_free_rect_threshold;
        let best = if parallel {
            self.free_rects
                .par_iter()
                .enumerate()
                .filter_map(evaluate)
                .min()
        } else {
            self.free_rects
                .iter()
                .enumerate()
                .rev()
                .filter_map(evaluate)
                .min()
        };

        best.map(|(_, rank, oi)| Slot {
            rect_idx: n - 1 - rank,
            rotation: orientations[oi].0,
        })
    }

    /// Stage 1: places each piece (callers present them already ordered)
    /// into its min-wastage free rectangle, verified by the collision
    /// oracle. Returns the pieces that found no collision-free slot.
    pub fn bbox_pack(&mut self, pieces: Vec<Piece>, cancel: &CancelSwitch) -> Vec<Piece> {
        let mut leftover = Vec::new();
        let mut queue = pieces.into_iter();
        while let Some(piece) = queue.next() {
            if cancel.is_cancelled() {
                leftover.push(piece);
                leftover.extend(queue);
                break;
            }
            match self.find_where_to_place(&piece) {
                Some(slot) => {
                    let target = self.free_rects[slot.rect_idx];
                    let mut candidate = piece.clone();
                    if slot.rotation != 0.0 {
                        candidate.rotate(slot.rotation);
                    }
                    candidate.place_at(target.x(), target.y());

                    // a bbox fit can still collide for non-convex neighbours
                    if self.is_collision(&candidate, None) {
                        leftover.push(piece);
                    } else {
                        debug!(
                            "placing piece {} at ({:.3}, {:.3}), rotation {}",
                            candidate.id(),
                            target.x(),
                            target.y(),
                            candidate.rotation()
                        );
                        let bbox = candidate.bbox();
                        self.split_free_rects(bbox);
                        self.prune_non_maximal();
                        self.push_placed(candidate);
                    }
                }
                None => leftover.push(piece),
            }
        }
        debug_assert!(assertions::bin_is_consistent(self));
        leftover
    }

    /// Inserts a piece at its current position, updating the index and
    /// carving its bbox out of the free rectangles. The caller vouches the
    /// position is collision-free.
    pub fn place_piece(&mut self, piece: Piece) -> usize {
        let bbox = piece.bbox();
        self.split_free_rects(bbox);
        self.prune_non_maximal();
        let idx = self.push_placed(piece);
        debug_assert!(assertions::bin_is_consistent(self));
        idx
    }

    fn push_placed(&mut self, piece: Piece) -> usize {
        let idx = self.placed.len();
        self.index.insert(piece.bbox(), idx);
        self.placed.push(piece);
        idx
    }

    /// Splits every free rectangle intersecting `just_placed` into the up
    /// to four maximal slabs beyond the overlap, dropping slabs thinner
    /// than ε.
    fn split_free_rects(&mut self, just_placed: Rect) {
        let mut next: Vec<Rect> = Vec::with_capacity(self.free_rects.len() + 4);
        for free in &self.free_rects {
            let Some(overlap) = Rect::intersection(free, &just_placed) else {
                next.push(*free);
                continue;
            };
            if free.y_max - overlap.y_max > EPS {
                next.push(Rect {
                    x_min: free.x_min,
                    y_min: overlap.y_max,
                    x_max: free.x_max,
                    y_max: free.y_max,
                });
            }
            if overlap.y_min - free.y_min > EPS {
                next.push(Rect {
                    x_min: free.x_min,
                    y_min: free.y_min,
                    x_max: free.x_max,
                    y_max: overlap.y_min,
                });
            }
            if overlap.x_min - free.x_min > EPS {
                next.push(Rect {
                    x_min: free.x_min,
                    y_min: free.y_min,
                    x_max: overlap.x_min,
                    y_max: free.y_max,
                });
            }
            if free.x_max - overlap.x_max > EPS {
                next.push(Rect {
                    x_min: overlap.x_max,
                    y_min: free.y_min,
                    x_max: free.x_max,
                    y_max: free.y_max,
                });
            }
        }
        self.free_rects = next;
    }

    /// Removes every free rectangle strictly contained in another. Exact
    /// duplicates keep their first occurrence.
    fn prune_non_maximal(&mut self) {
        self.free_rects
            .sort_by_key(|r| Reverse(OrderedFloat(r.area())));
        let rects = &self.free_rects;
        let n = rects.len();
        let mut keep = vec![true; n];
        for i in 0..n {
            for j in 0..n {
                if i != j
                    && rects[j].contains(&rects[i])
                    && (rects[j] != rects[i] || j < i)
                {
                    keep[i] = false;
                    break;
                }
            }
        }
        let mut it = keep.iter();
        self.free_rects.retain(|_| *it.next().unwrap_or(&true));
    }

    /// Slides every placed piece toward the lower-left corner in unit
    /// steps until a full pass moves nothing. Preserves containment and
    /// non-overlap by construction; the occupied area is unchanged.
    pub fn compress(&mut self) {
        if self.placed.is_empty() {
            return;
        }
        let mut moved_in_pass = true;
        while moved_in_pass {
            moved_in_pass = false;
            for i in 0..self.placed.len() {
                if self.compress_piece(i, Vector(-1.0, -1.0)) {
                    moved_in_pass = true;
                }
            }
        }
        debug_assert!(assertions::bin_is_consistent(self));
    }

    /// Repeatedly steps piece `i` by (0, v.y) then (v.x, 0), keeping a step
    /// only while the piece stays inside the bin and collision-free.
    /// The index entry is removed up front and re-inserted at the final
    /// position, so the piece is never indexed mid-flight.
    fn compress_piece(&mut self, i: usize, v: Vector) -> bool {
        if v.is_zero() {
            return false;
        }
        let mut piece = self.placed[i].clone();
        let was_indexed = self.index.remove(piece.bbox(), i);
        debug_assert!(was_indexed);

        let mut total_moves = 0u32;
        loop {
            let mut stepped = false;
            if v.y() != 0.0 {
                let candidate = piece.translated(Vector(0.0, v.y()));
                if candidate.is_inside(&self.dimension) && !self.is_collision(&candidate, Some(i)) {
                    piece = candidate;
                    stepped = true;
                    total_moves += 1;
                }
            }
            if v.x() != 0.0 {
                let candidate = piece.translated(Vector(v.x(), 0.0));
                if candidate.is_inside(&self.dimension) && !self.is_collision(&candidate, Some(i)) {
                    piece = candidate;
                    stepped = true;
                    total_moves += 1;
                }
            }
            if !stepped {
                break;
            }
        }

        let bbox = piece.bbox();
        self.placed[i] = piece;
        self.index.insert(bbox, i);
        total_moves > 0
    }

    /// Drops a piece from the top edge: scans left to right in steps of
    /// `w / dive_horizontal_factor`, and on the first collision-free start
    /// position lets the piece sink straight down. Falls back to the
    /// top-right corner before giving up.
    fn dive(&mut self, piece: Piece) -> Option<Piece> {
        if piece.is_empty() {
            return None;
        }
        let bbox = piece.bbox();
        let (pw, ph) = (bbox.width(), bbox.height());
        if pw > self.dimension.width() || ph > self.dimension.height() {
            return None;
        }

        let mut dx = pw / self.config.dive_horizontal_factor as f64;
        if dx < EPS {
            dx = 1.0;
        }
        let top_y = self.dimension.y_max - ph;

        let mut x = self.dimension.x_min;
        while x + pw <= self.dimension.x_max + EPS {
            let mut candidate = piece.clone();
            candidate.place_at(x, top_y);
            if !self.is_collision(&candidate, None) {
                return Some(self.settle(candidate));
            }
            x += dx;
        }

        let mut candidate = piece;
        candidate.place_at(self.dimension.x_max - pw, top_y);
        if !self.is_collision(&candidate, None) {
            return Some(self.settle(candidate));
        }
        None
    }

    /// Sinks a freshly dropped piece straight down through a temporary
    /// placement, then hands the settled piece back to the caller.
    fn settle(&mut self, candidate: Piece) -> Piece {
        let idx = self.placed.len();
        self.index.insert(candidate.bbox(), idx);
        self.placed.push(candidate);
        self.compress_piece(idx, Vector(0.0, -1.0));
        let settled = self.placed.pop().expect("settling piece pushed above");
        self.index.remove(settled.bbox(), idx);
        settled
    }

    /// Stage 3: tries to dive-drop each piece in every stage-2/3 rotation.
    /// Returns the pieces that could not be dropped.
    pub fn drop_pieces(&mut self, pieces: Vec<Piece>, cancel: &CancelSwitch) -> Vec<Piece> {
        let rotations = self.config.stage23_rotations.clone();
        let mut unplaced = Vec::new();
        let mut queue = pieces.into_iter();
        while let Some(piece) = queue.next() {
            if cancel.is_cancelled() {
                unplaced.push(piece);
                unplaced.extend(queue);
                break;
            }
            let mut was_placed = false;
            for &angle in &rotations {
                let mut candidate = piece.clone();
                if angle > 0.0 {
                    candidate.rotate(angle);
                }
                if let Some(settled) = self.dive(candidate) {
                    debug!(
                        "dropped piece {} to ({:.3}, {:.3})",
                        settled.id(),
                        settled.bbox().x_min,
                        settled.bbox().y_min
                    );
                    self.place_piece(settled);
                    was_placed = true;
                    break;
                }
            }
            if !was_placed {
                unplaced.push(piece);
            }
        }
        debug_assert!(assertions::bin_is_consistent(self));
        unplaced
    }

    /// Grid-scans `inside` through the bbox of placed piece
    /// `container_idx`, skipping positions that overlap the container or
    /// collide with any other placed piece (the piece being moved,
    /// `ignored`, excepted). First hit wins.
    fn sweep(&self, container_idx: usize, mut inside: Piece, ignored: usize) -> Option<Piece> {
        let container = &self.placed[container_idx];
        let tol = self.config.collision_tolerance;
        if !inside.overlaps(container, tol) && !self.is_collision(&inside, Some(ignored)) {
            return Some(inside);
        }

        let container_bbox = container.bbox();
        let inside_bbox = inside.bbox();

        let (mut dx_factor, mut dy_factor) = (
            self.config.dx_sweep_factor as f64,
            self.config.dy_sweep_factor as f64,
        );
        // dense outlines sweep on a coarser grid
        if inside.vertex_count() > 100 {
            dx_factor = 2.0;
            dy_factor = 1.0;
        }
        let mut dx = inside_bbox.width() / dx_factor;
        let mut dy = inside_bbox.height() / dy_factor;
        if dx < EPS {
            dx = 1.0;
        }
        if dy < EPS {
            dy = 1.0;
        }

        let mut y = container_bbox.y_min;
        while y + inside_bbox.height() <= container_bbox.y_max + EPS {
            let mut x = container_bbox.x_min;
            while x + inside_bbox.width() <= container_bbox.x_max + EPS {
                inside.place_at(x, y);
                if inside.is_inside(&self.dimension)
                    && !inside.overlaps(container, tol)
                    && !self.is_collision(&inside, Some(ignored))
                {
                    return Some(inside);
                }
                x += dx;
            }
            y += dy;
        }
        None
    }

    /// Stage 2: walks the placed pieces from newest down to `index_limit`
    /// and tries to tuck each into the unused bbox area of an earlier
    /// piece, freeing its old slot. Returns true if anything moved.
    pub fn move_and_replace(&mut self, index_limit: usize) -> bool {
        let mut movement = false;
        let mut i = self.placed.len();
        'pieces: while i > index_limit {
            i -= 1;
            for j in 0..i {
                if self.placed[j].free_area() <= self.placed[i].area() {
                    continue;
                }
                let container_bbox = self.placed[j].bbox();
                for angle in [0.0, 90.0] {
                    let mut candidate = self.placed[i].clone();
                    if angle > 0.0 {
                        candidate.rotate(angle);
                    }
                    candidate.place_at(container_bbox.x_min, container_bbox.y_min);

                    if let Some(swept) = self.sweep(j, candidate, i) {
                        debug!(
                            "move-and-replace: piece {} tucked into bbox of piece {}",
                            swept.id(),
                            self.placed[j].id()
                        );
                        let old_bbox = self.placed[i].bbox();
                        self.free_rects.push(old_bbox);
                        let was_indexed = self.index.remove(old_bbox, i);
                        debug_assert!(was_indexed);
                        self.index.insert(swept.bbox(), i);
                        self.placed[i] = swept;
                        self.compress_piece(i, Vector(-1.0, -1.0));
                        let new_bbox = self.placed[i].bbox();
                        self.split_free_rects(new_bbox);
                        self.prune_non_maximal();
                        movement = true;
                        continue 'pieces;
                    }
                }
            }
        }
        debug_assert!(assertions::bin_is_consistent(self));
        movement
    }

    pub(crate) fn config(&self) -> &PackConfig {
        &self.config
    }
}
