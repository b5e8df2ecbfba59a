//! Polygon-level free-space analysis.
//!
//! Unlike the maximal free rectangles, which conservatively track bbox
//! space for fast fit queries, the free islands are the exact connected
//! components of (bin − occupied union). The two representations serve
//! different stages and are never required to agree.

use geo::{Area, BooleanOps, BoundingRect, Contains, Coord, MultiPolygon, Polygon};
use log::debug;
use ordered_float::OrderedFloat;

use crate::entities::Bin;
use crate::geometry::{Piece, Rect};
use crate::orchestrator::CancelSwitch;
use crate::EPS;

/// Disconnected free regions below this area are discarded as slivers.
const MIN_ISLAND_AREA: f64 = 1.0;

/// A maximal connected region of free space, annotated with its principal
/// axes.
#[derive(Clone, Debug)]
pub struct FreeIsland {
    pub shape: Polygon<f64>,
    pub area: f64,
    pub centroid: Coord<f64>,
    /// Extent along the principal axis.
    pub major_axis_length: f64,
    /// Extent across the principal axis.
    pub minor_axis_length: f64,
    /// Orientation of the major axis, in degrees.
    pub principal_angle: f64,
    /// Thickness of the island: equal to the minor axis length.
    pub robustness: f64,
    pub aspect_ratio: f64,
}

impl FreeIsland {
    pub fn new(shape: Polygon<f64>) -> FreeIsland {
        let area = shape.unsigned_area();
        let vertices: Vec<Coord<f64>> = {
            let ring = &shape.exterior().0;
            match ring.len() {
                0 => vec![],
                n if ring[0] == ring[n - 1] => ring[..n - 1].to_vec(),
                _ => ring.clone(),
            }
        };
        if vertices.is_empty() {
            return FreeIsland {
                shape,
                area,
                centroid: Coord { x: 0.0, y: 0.0 },
                major_axis_length: 0.0,
                minor_axis_length: 0.0,
                principal_angle: 0.0,
                robustness: 0.0,
                aspect_ratio: 1.0,
            };
        }

        let n = vertices.len() as f64;
        let cx = vertices.iter().map(|v| v.x).sum::<f64>() / n;
        let cy = vertices.iter().map(|v| v.y).sum::<f64>() / n;

        // covariance of the vertex cloud
        let (mut xx, mut xy, mut yy) = (0.0, 0.0, 0.0);
        for v in &vertices {
            let (dx, dy) = (v.x - cx, v.y - cy);
            xx += dx * dx;
            xy += dx * dy;
            yy += dy * dy;
        }
        xx /= n;
        xy /= n;
        yy /= n;

        let trace = xx + yy;
        let det = xx * yy - xy * xy;

        let (major_axis_length, minor_axis_length, principal_angle);
        if det < 1e-10 {
            // degenerate covariance: settle for the bbox extents
            let bbox: Rect = shape
                .bounding_rect()
                .map(Into::into)
                .unwrap_or(Rect {
                    x_min: 0.0,
                    y_min: 0.0,
                    x_max: 0.0,
                    y_max: 0.0,
                });
            major_axis_length = f64::max(bbox.width(), bbox.height());
            minor_axis_length = f64::min(bbox.width(), bbox.height());
            principal_angle = if bbox.width() > bbox.height() { 0.0 } else { 90.0 };
        } else {
            let discriminant = (trace * trace - 4.0 * det).max(0.0);
            let lambda_major = (trace + discriminant.sqrt()) / 2.0;
            principal_angle = if xy.abs() > EPS {
                (lambda_major - xx).atan2(xy).to_degrees()
            } else if xx > yy {
                0.0
            } else {
                90.0
            };

            // project the vertices onto both axes for the true extents
            let (sin, cos) = principal_angle.to_radians().sin_cos();
            let (mut min_major, mut max_major) = (f64::MAX, f64::MIN);
            let (mut min_minor, mut max_minor) = (f64::MAX, f64::MIN);
            for v in &vertices {
                let (dx, dy) = (v.x - cx, v.y - cy);
                let along = dx * cos + dy * sin;
                let across = -dx * sin + dy * cos;
                min_major = min_major.min(along);
                max_major = max_major.max(along);
                min_minor = min_minor.min(across);
                max_minor = max_minor.max(across);
            }
            major_axis_length = max_major - min_major;
            minor_axis_length = max_minor - min_minor;
        }

        let aspect_ratio = if minor_axis_length > EPS {
            major_axis_length / minor_axis_length
        } else {
            1000.0
        };

        FreeIsland {
            shape,
            area,
            centroid: Coord { x: cx, y: cy },
            major_axis_length,
            minor_axis_length,
            principal_angle,
            robustness: minor_axis_length,
            aspect_ratio,
        }
    }
}

/// Placement chosen by the island search.
#[derive(Clone, Copy, Debug)]
pub struct IslandPlacement {
    pub island_idx: usize,
    pub position: Coord<f64>,
    pub rotation: f64,
    pub wasted_area: f64,
}

impl Bin {
    /// The union of all placed shapes.
    pub fn occupied_union(&self) -> MultiPolygon<f64> {
        let mut union: MultiPolygon<f64> = MultiPolygon::new(vec![]);
        for piece in &self.placed {
            union = if union.0.is_empty() {
                piece.shape().clone()
            } else {
                union.union(piece.shape())
            };
        }
        union
    }

    /// Subtracts the occupied union from the bin outline and returns each
    /// connected component as a [`FreeIsland`], slivers excluded.
    pub fn detect_free_islands(&self) -> Vec<FreeIsland> {
        let bin_poly = self.dimension().to_polygon();
        if self.placed.is_empty() {
            return vec![FreeIsland::new(bin_poly)];
        }
        let free = MultiPolygon::new(vec![bin_poly]).difference(&self.occupied_union());
        free.0
            .into_iter()
            .filter(|p| p.unsigned_area() > MIN_ISLAND_AREA)
            .map(FreeIsland::new)
            .collect()
    }

    /// Scans the islands of a piece, orientation by orientation, on a grid
    /// over each island's bbox; a candidate counts when its rotated shape
    /// lies geometrically within the island polygon. Candidates score
    /// bottom-left (lowest y, then lowest x).
    pub fn find_best_island_placement(
        &self,
        piece: &Piece,
        islands: &[FreeIsland],
    ) -> Option<IslandPlacement> {
        if islands.is_empty() || piece.is_empty() {
            return None;
        }

        let mut order: Vec<usize> = (0..islands.len()).collect();
        order.sort_by_key(|&i| OrderedFloat(-islands[i].area));

        let rotations = &self.config().stage23_rotations;
        let mut best: Option<((OrderedFloat<f64>, OrderedFloat<f64>), IslandPlacement)> = None;

        for island_idx in order {
            let island = &islands[island_idx];
            if piece.area() > island.area * 1.1 {
                continue;
            }
            let Some(island_bbox) = island.shape.bounding_rect().map(Rect::from) else {
                continue;
            };

            for &angle in rotations {
                let mut rotated = piece.clone();
                if angle.abs() > EPS {
                    rotated.rotate(angle);
                }
                let rotated_bbox = rotated.bbox();
                let (w, h) = (rotated_bbox.width(), rotated_bbox.height());

                let dx = f64::max(5.0, w / 4.0);
                let dy = f64::max(5.0, h / 4.0);

                let mut y = island_bbox.y_min;
                while y + h <= island_bbox.y_max + EPS {
                    let mut x = island_bbox.x_min;
                    while x + w <= island_bbox.x_max + EPS {
                        let mut candidate = rotated.clone();
                        candidate.place_at(x, y);
                        if island.shape.contains(candidate.shape()) {
                            let key = (OrderedFloat(y), OrderedFloat(x));
                            if best.as_ref().map_or(true, |(k, _)| key < *k) {
                                best = Some((
                                    key,
                                    IslandPlacement {
                                        island_idx,
                                        position: Coord { x, y },
                                        rotation: angle,
                                        wasted_area: island.area - candidate.area(),
                                    },
                                ));
                            }
                        }
                        x += dx;
                    }
                    y += dy;
                }
            }
        }
        best.map(|(_, placement)| placement)
    }

    /// Optional stage 2': places remaining pieces into the exact free-space
    /// islands, re-deriving the islands after every placement. Returns the
    /// pieces that found no island.
    pub fn place_in_free_islands(&mut self, pieces: Vec<Piece>, cancel: &CancelSwitch) -> Vec<Piece> {
        let mut pieces = pieces;
        pieces.sort_by_key(|p| std::cmp::Reverse(OrderedFloat(p.area())));

        let mut unplaced = Vec::new();
        let mut queue = pieces.into_iter();
        while let Some(piece) = queue.next() {
            if cancel.is_cancelled() {
                unplaced.push(piece);
                unplaced.extend(queue);
                break;
            }
            let islands = self.detect_free_islands();
            match self.find_best_island_placement(&piece, &islands) {
                Some(placement) => {
                    let mut candidate = piece.clone();
                    if placement.rotation.abs() > EPS {
                        candidate.rotate(placement.rotation);
                    }
                    candidate.place_at(placement.position.x, placement.position.y);
                    if self.is_collision(&candidate, None) {
                        unplaced.push(piece);
                    } else {
                        debug!(
                            "island placement: piece {} at ({:.3}, {:.3})",
                            candidate.id(),
                            placement.position.x,
                            placement.position.y
                        );
                        self.place_piece(candidate);
                    }
                }
                None => unplaced.push(piece),
            }
        }
        unplaced
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::config::PackConfig;
    use float_cmp::approx_eq;

    fn bin_100() -> Bin {
        Bin::new(
            Rect::try_new(0.0, 0.0, 100.0, 100.0).unwrap(),
            PackConfig::default(),
        )
    }

    #[test]
    fn empty_bin_is_one_island() {
        let bin = bin_100();
        let islands = bin.detect_free_islands();
        assert_eq!(islands.len(), 1);
        assert!(approx_eq!(f64, islands[0].area, 10_000.0, epsilon = 1e-6));
        assert!(approx_eq!(f64, islands[0].centroid.x, 50.0, epsilon = 1e-6));
        assert!(approx_eq!(f64, islands[0].centroid.y, 50.0, epsilon = 1e-6));
    }

    #[test]
    fn a_full_width_wall_splits_the_free_space_in_two() {
        let mut bin = bin_100();
        let mut wall = Piece::rectangle(1, 100.0, 10.0).unwrap();
        wall.place_at(0.0, 45.0);
        bin.place_piece(wall);

        let islands = bin.detect_free_islands();
        assert_eq!(islands.len(), 2);
        let total: f64 = islands.iter().map(|i| i.area).sum();
        assert!(approx_eq!(f64, total, 9_000.0, epsilon = 1e-6));
    }

    #[test]
    fn island_axes_follow_the_region_shape(){
        let mut bin = bin_100();
        // occupy everything above y = 20: one flat 100x20 island remains
        let mut block = Piece::rectangle(1, 100.0, 80.0).unwrap();
        block.place_at(0.0, 20.0);
        bin.place_piece(block);

        let islands = bin.detect_free_islands();
        assert_eq!(islands.len(), 1);
        let island = &islands[0];
        assert!(approx_eq!(f64, island.major_axis_length, 100.0, epsilon = 1e-6));
        assert!(approx_eq!(f64, island.minor_axis_length, 20.0, epsilon = 1e-6));
        assert_eq!(island.robustness, island.minor_axis_length);
        assert!(island.aspect_ratio > 4.0);
    }

    #[test]
    fn island_placement_lands_in_a_gap_between_pieces() {
        let mut bin = bin_100();
        let mut left = Piece::rectangle(1, 30.0, 100.0).unwrap();
        left.place_at(0.0, 0.0);
        bin.place_piece(left);
        let mut right = Piece::rectangle(2, 30.0, 100.0).unwrap();
        right.place_at(70.0, 0.0);
        bin.place_piece(right);

        // a 35x35 square only fits the middle corridor
        let square = Piece::rectangle(3, 35.0, 35.0).unwrap();
        let unplaced = bin.place_in_free_islands(vec![square], &CancelSwitch::new());
        assert!(unplaced.is_empty());
        let bbox = bin.placed_pieces()[2].bbox();
        assert!(bbox.x_min >= 30.0 - EPS && bbox.x_max <= 70.0 + EPS);
        assert!(approx_eq!(f64, bbox.y_min, 0.0, epsilon = 1e-6));
    }

    #[test]
    fn island_placement_rejects_pieces_larger_than_every_island() {
        let mut bin = bin_100();
        let mut wall = Piece::rectangle(1, 100.0, 60.0).unwrap();
        wall.place_at(0.0, 20.0);
        bin.place_piece(wall);

        let big = Piece::rectangle(2, 90.0, 30.0).unwrap();
        let unplaced = bin.place_in_free_islands(vec![big], &CancelSwitch::new());
        assert_eq!(unplaced.len(), 1);
        assert_eq!(bin.n_placed(), 1);
    }
}
