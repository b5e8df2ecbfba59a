use anyhow::{ensure, Result};
use geo::{Area, BooleanOps, BoundingRect, CoordsIter, Intersects, MapCoords};
use geo::{Coord, LineString, MultiPolygon, Polygon};

use crate::geometry::{Rect, Vector};
use crate::EPS;

/// A rigid polygonal piece: a possibly multi-connected polygon set (outer
/// rings CCW, holes CW) with a stable id and a cumulative orientation.
///
/// The derived `area` and `bbox` caches are refreshed by every mutating
/// method; shapes are only ever modified through these methods.
#[derive(Clone, Debug)]
pub struct Piece {
    id: u64,
    shape: MultiPolygon<f64>,
    /// Cumulative orientation in degrees, normalised to [0, 360).
    rotation: f64,
    area: f64,
    bbox: Option<Rect>,
}

impl Piece {
    /// Builds a piece from a CCW vertex list. Duplicate points are dropped,
    /// preserving first occurrence; clockwise input is reversed.
    pub fn new(points: Vec<Coord<f64>>, id: u64) -> Result<Piece> {
        let mut unique: Vec<Coord<f64>> = Vec::with_capacity(points.len());
        for p in points {
            if !unique.contains(&p) {
                unique.push(p);
            }
        }
        ensure!(
            unique.len() >= 3,
            "piece {id} needs at least 3 distinct vertices, got {}",
            unique.len()
        );

        let signed = shoelace(&unique);
        ensure!(
            signed.abs() > EPS,
            "piece {id} has no area: {unique:?}"
        );
        if signed < 0.0 {
            unique.reverse();
        }

        let polygon = Polygon::new(LineString::from(unique), vec![]);
        let mut piece = Piece {
            id,
            shape: MultiPolygon::new(vec![polygon]),
            rotation: 0.0,
            area: 0.0,
            bbox: None,
        };
        piece.update_cache();
        Ok(piece)
    }

    /// Convenience constructor for an axis-aligned `w`×`h` rectangle with
    /// its min-corner at the origin.
    pub fn rectangle(id: u64, w: f64, h: f64) -> Result<Piece> {
        Piece::new(
            vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: w, y: 0.0 },
                Coord { x: w, y: h },
                Coord { x: 0.0, y: h },
            ],
            id,
        )
    }

    /// Builds a piece by subtracting `hole` from `outer`. The result keeps
    /// the outer piece's id.
    pub fn with_hole(outer: &Piece, hole: &Piece) -> Result<Piece> {
        let shape = outer.shape.difference(&hole.shape);
        let mut piece = Piece {
            id: outer.id,
            shape,
            rotation: 0.0,
            area: 0.0,
            bbox: None,
        };
        piece.update_cache();
        ensure!(
            !piece.is_empty(),
            "piece {} is empty after hole subtraction",
            outer.id
        );
        Ok(piece)
    }

    pub fn empty(id: u64) -> Piece {
        Piece {
            id,
            shape: MultiPolygon::new(vec![]),
            rotation: 0.0,
            area: 0.0,
            bbox: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cumulative rotation in degrees, in [0, 360).
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Net area: outer rings minus holes.
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Bounding-box area minus net area.
    pub fn free_area(&self) -> f64 {
        match self.bbox {
            Some(bbox) => bbox.area() - self.area,
            None => 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bbox.is_none()
    }

    /// The envelope of the shape. Empty pieces report a degenerate
    /// rectangle at the origin.
    pub fn bbox(&self) -> Rect {
        self.bbox.unwrap_or(Rect {
            x_min: 0.0,
            y_min: 0.0,
            x_max: 0.0,
            y_max: 0.0,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.shape.coords_count()
    }

    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    /// The exterior rings of all polygons in the shape.
    pub fn outer_rings(&self) -> impl Iterator<Item = &LineString<f64>> + '_ {
        self.shape.iter().map(|p| p.exterior())
    }

    pub fn translate(&mut self, v: Vector) {
        if self.is_empty() || v.is_zero() {
            return;
        }
        let (dx, dy) = v.into();
        self.shape = self.shape.map_coords(|c| Coord {
            x: c.x + dx,
            y: c.y + dy,
        });
        // translation shifts the envelope exactly, no need to re-derive it
        self.bbox = self.bbox.map(|b| Rect {
            x_min: b.x_min + dx,
            y_min: b.y_min + dy,
            x_max: b.x_max + dx,
            y_max: b.y_max + dy,
        });
    }

    /// A translated clone, leaving `self` untouched.
    pub fn translated(&self, v: Vector) -> Piece {
        let mut clone = self.clone();
        clone.translate(v);
        clone
    }

    /// Rotates the shape by `degrees` (CCW) about its bbox centre and folds
    /// the angle into the cumulative rotation.
    ///
    /// Quarter-turn angles take an exact coordinate-permutation path:
    /// two consecutive 90° rotations must swap bbox width and height
    /// exactly, which naive trigonometry does not deliver.
    pub fn rotate(&mut self, degrees: f64) {
        if self.is_empty() {
            return;
        }
        self.rotation = (self.rotation + degrees).rem_euclid(360.0);

        let angle = degrees.rem_euclid(360.0);
        let c = self.bbox().centroid();

        let quarter_turns = angle / 90.0;
        self.shape = if quarter_turns.fract() == 0.0 {
            match quarter_turns as u32 {
                0 => return,
                1 => self.shape.map_coords(|p| Coord {
                    x: c.x - (p.y - c.y),
                    y: c.y + (p.x - c.x),
                }),
                2 => self.shape.map_coords(|p| Coord {
                    x: 2.0 * c.x - p.x,
                    y: 2.0 * c.y - p.y,
                }),
                _ => self.shape.map_coords(|p| Coord {
                    x: c.x + (p.y - c.y),
                    y: c.y - (p.x - c.x),
                }),
            }
        } else {
            let (sin, cos) = angle.to_radians().sin_cos();
            self.shape.map_coords(|p| {
                let (dx, dy) = (p.x - c.x, p.y - c.y);
                Coord {
                    x: c.x + dx * cos - dy * sin,
                    y: c.y + dx * sin + dy * cos,
                }
            })
        };
        self.bbox = self.shape.bounding_rect().map(Into::into);
    }

    /// Translates the piece so the min-corner of its bbox lands on (x, y).
    pub fn place_at(&mut self, x: f64, y: f64) {
        if self.is_empty() {
            return;
        }
        let bbox = self.bbox();
        self.translate(Vector(x - bbox.x_min, y - bbox.y_min));
    }

    /// Boolean union with `other`.
    pub fn add(&mut self, other: &Piece) {
        if other.is_empty() {
            return;
        }
        self.shape = if self.is_empty() {
            other.shape.clone()
        } else {
            self.shape.union(&other.shape)
        };
        self.update_cache();
    }

    /// Boolean difference: removes `other` from this piece.
    pub fn subtract(&mut self, other: &Piece) {
        if self.is_empty() || other.is_empty() {
            return;
        }
        self.shape = self.shape.difference(&other.shape);
        self.update_cache();
    }

    /// Boolean intersection with `other`.
    pub fn intersect_with(&mut self, other: &Piece) {
        if self.is_empty() || other.is_empty() {
            self.shape = MultiPolygon::new(vec![]);
        } else {
            self.shape = self.shape.intersection(&other.shape);
        }
        self.update_cache();
    }

    /// Boundary-inclusive intersection predicate.
    pub fn intersects(&self, other: &Piece) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.shape.intersects(&other.shape)
    }

    pub fn intersects_rect(&self, rect: &Rect) -> bool {
        if self.is_empty() {
            return false;
        }
        if !self.bbox().intersects(rect) {
            return false;
        }
        self.shape.intersects(&rect.to_polygon())
    }

    /// Collision predicate: true when the overlap with `other` has area
    /// strictly greater than `tolerance`. Shared boundary points and
    /// segments are not collisions.
    pub fn overlaps(&self, other: &Piece, tolerance: f64) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        if !self.bbox().intersects(&other.bbox()) {
            return false;
        }
        if !self.shape.intersects(&other.shape) {
            return false;
        }
        self.shape.intersection(&other.shape).unsigned_area() > tolerance
    }

    /// True when the piece's bbox lies within `rect` (closed containment).
    /// Empty pieces are inside everything.
    pub fn is_inside(&self, rect: &Rect) -> bool {
        match self.bbox {
            Some(bbox) => rect.contains(&bbox),
            None => true,
        }
    }

    fn update_cache(&mut self) {
        self.area = self.shape.unsigned_area();
        if self.area <= EPS {
            // near-degenerate boolean slivers collapse to the empty piece
            self.shape = MultiPolygon::new(vec![]);
            self.area = 0.0;
            self.bbox = None;
        } else {
            self.bbox = self.shape.bounding_rect().map(Into::into);
        }
    }
}

// counterclockwise = positive, clockwise = negative
fn shoelace(points: &[Coord<f64>]) -> f64 {
    let mut sigma = 0.0;
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        sigma += (points[i].y + points[j].y) * (points[i].x - points[j].x);
    }
    0.5 * sigma
}
