use rstar::{RStarInsertionStrategy, RTree, RTreeObject, RTreeParams, AABB};

use crate::geometry::Rect;

/// R*-tree parameters with a node fanout of 16.
#[derive(Clone, Debug)]
pub struct IndexParams;

impl RTreeParams for IndexParams {
    const MIN_SIZE: usize = 6;
    const MAX_SIZE: usize = 16;
    const REINSERTION_COUNT: usize = 3;
    type DefaultInsertionStrategy = RStarInsertionStrategy;
}

/// One placed piece in the index: its bbox and its position in the bin's
/// placed sequence.
#[derive(Clone, Debug, PartialEq)]
struct Entry {
    min: [f64; 2],
    max: [f64; 2],
    index: usize,
}

impl Entry {
    fn new(bbox: Rect, index: usize) -> Entry {
        Entry {
            min: [bbox.x_min, bbox.y_min],
            max: [bbox.x_max, bbox.y_max],
            index,
        }
    }
}

impl RTreeObject for Entry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// R*-tree over (bbox, placed-index) pairs: the broad phase of the bin's
/// collision oracle.
#[derive(Clone, Debug)]
pub struct PieceIndex {
    tree: RTree<Entry, IndexParams>,
}

impl Default for PieceIndex {
    fn default() -> Self {
        PieceIndex::new()
    }
}

impl PieceIndex {
    pub fn new() -> Self {
        PieceIndex {
            tree: RTree::new_with_params(),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn insert(&mut self, bbox: Rect, index: usize) {
        self.tree.insert(Entry::new(bbox, index));
    }

    /// Removes the exact (bbox, index) entry. Returns false when no such
    /// entry exists.
    pub fn remove(&mut self, bbox: Rect, index: usize) -> bool {
        self.tree.remove(&Entry::new(bbox, index)).is_some()
    }

    /// Indices of all entries whose bbox intersects `bbox`.
    pub fn query_intersecting(&self, bbox: Rect) -> Vec<usize> {
        let envelope = AABB::from_corners([bbox.x_min, bbox.y_min], [bbox.x_max, bbox.y_max]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|e| e.index)
            .collect()
    }

    /// True when the index holds exactly this (bbox, index) pair.
    pub fn contains(&self, bbox: Rect, index: usize) -> bool {
        let probe = Entry::new(bbox, index);
        self.tree
            .locate_in_envelope_intersecting(&probe.envelope())
            .any(|e| *e == probe)
    }
}
