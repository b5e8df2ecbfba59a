//! No-fit polygons: for an orbiting piece A and a stationary piece B, the
//! NFP is the locus of A's reference point (its bbox min-corner) where A
//! touches B without penetrating. Together with the inner-fit polygon of
//! the container it answers "where may A go?" without per-candidate
//! intersection tests.

use std::sync::Arc;

use geo::{Area, BooleanOps, Coord, Intersects, MapCoords, MultiPolygon, Point, Polygon};
use log::warn;
use ordered_float::OrderedFloat;

use crate::geometry::{Piece, Rect};
use crate::EPS;

mod cache;
mod minkowski;

pub use cache::{CacheStats, NfpCache, NfpKey};

/// NFP queries backed by a shared, position-independent cache.
///
/// Engines are cheap to clone-construct around an existing cache: bins
/// evaluated in parallel may share one cache (lookups serialise), or each
/// carry their own.
#[derive(Clone, Debug, Default)]
pub struct NfpEngine {
    cache: Arc<NfpCache>,
}

impl NfpEngine {
    pub fn new() -> Self {
        NfpEngine {
            cache: Arc::new(NfpCache::new()),
        }
    }

    pub fn with_cache(cache: Arc<NfpCache>) -> Self {
        NfpEngine { cache }
    }

    pub fn cache(&self) -> &Arc<NfpCache> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear()
    }

    /// The NFP of `orbiting` around `stationary`, in the coordinate system
    /// `stationary` is currently placed in. `None` when the Minkowski sum
    /// is empty; the obstacle then imposes no constraint.
    pub fn nfp(&self, orbiting: &Piece, stationary: &Piece) -> Option<Polygon<f64>> {
        let normalized = self.cached_normalized_nfp(orbiting, stationary)?;
        let bbox = stationary.bbox();
        Some(normalized.map_coords(|c| Coord {
            x: c.x + bbox.x_min,
            y: c.y + bbox.y_min,
        }))
    }

    fn cached_normalized_nfp(
        &self,
        orbiting: &Piece,
        stationary: &Piece,
    ) -> Option<Arc<Polygon<f64>>> {
        let key = NfpKey::for_pair(orbiting, stationary);
        if let Some(entry) = self.cache.lookup(key) {
            return entry;
        }
        let computed = minkowski::normalized_nfp(orbiting, stationary).map(Arc::new);
        if computed.is_none() {
            warn!(
                "empty NFP between piece {} and piece {}, obstacle imposes no constraint",
                orbiting.id(),
                stationary.id()
            );
        }
        self.cache.insert(key, computed.clone());
        computed
    }

    /// Inner-fit polygon: the rectangle of reference-point positions
    /// keeping the piece's bbox inside `container`. `None` when the piece
    /// does not fit in this orientation (a zero-area region counts as no
    /// placement).
    pub fn ifp(piece: &Piece, container: &Rect) -> Option<Rect> {
        if piece.is_empty() {
            return None;
        }
        let bbox = piece.bbox();
        let x_max = container.x_max - bbox.width();
        let y_max = container.y_max - bbox.height();
        if x_max - container.x_min <= EPS || y_max - container.y_min <= EPS {
            return None;
        }
        Some(Rect {
            x_min: container.x_min,
            y_min: container.y_min,
            x_max,
            y_max,
        })
    }

    /// All valid reference-point regions for `piece`: the IFP minus the
    /// union of the NFPs of every obstacle. Slivers (area ≤ ε) are
    /// discarded.
    pub fn valid_regions(
        &self,
        piece: &Piece,
        obstacles: &[&Piece],
        container: &Rect,
    ) -> MultiPolygon<f64> {
        let Some(ifp) = Self::ifp(piece, container) else {
            return MultiPolygon::new(vec![]);
        };
        let mut regions = MultiPolygon::new(vec![ifp.to_polygon()]);
        for obstacle in obstacles {
            if regions.0.is_empty() {
                break;
            }
            if let Some(nfp) = self.nfp(piece, obstacle) {
                regions = regions.difference(&MultiPolygon::new(vec![nfp]));
            }
        }
        regions.0.retain(|p| p.unsigned_area() > EPS);
        regions
    }

    /// True when placing the piece's reference point at `position` keeps it
    /// inside the container and clear of every obstacle. Boundary contact
    /// counts as valid.
    pub fn is_valid_placement(
        &self,
        piece: &Piece,
        position: Coord<f64>,
        obstacles: &[&Piece],
        container: &Rect,
    ) -> bool {
        let point = Point::new(position.x, position.y);
        self.valid_regions(piece, obstacles, container)
            .iter()
            .any(|region| region.intersects(&point))
    }

    /// The lexicographically lowest (y, then x) vertex of the largest valid
    /// region, or `None` when no region exists.
    pub fn find_best_placement(
        &self,
        piece: &Piece,
        obstacles: &[&Piece],
        container: &Rect,
    ) -> Option<Coord<f64>> {
        let regions = self.valid_regions(piece, obstacles, container);
        let largest = regions
            .0
            .iter()
            .max_by_key(|p| OrderedFloat(p.unsigned_area()))?;
        largest
            .exterior()
            .0
            .iter()
            .min_by_key(|c| (OrderedFloat(c.y), OrderedFloat(c.x)))
            .copied()
    }
}
