use anyhow::{ensure, Result};
use geo::{Coord, LineString, Polygon};

use crate::EPS;

/// Axis-aligned rectangle.
///
/// Non-empty rectangles satisfy `x_min < x_max` and `y_min < y_max`;
/// [`Rect::try_new`] enforces this. Degenerate rectangles only appear as
/// intermediate values (e.g. an inner-fit region of zero width) and are
/// never stored in bin state.
#[derive(Clone, Debug, PartialEq, Copy)]
pub struct Rect {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Rect {
    pub fn try_new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self> {
        ensure!(
            x_min < x_max && y_min < y_max,
            "invalid rectangle, x_min: {x_min}, x_max: {x_max}, y_min: {y_min}, y_max: {y_max}"
        );
        Ok(Rect {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    /// Min-corner x.
    pub fn x(&self) -> f64 {
        self.x_min
    }

    /// Min-corner y.
    pub fn y(&self) -> f64 {
        self.y_min
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn centroid(&self) -> Coord<f64> {
        Coord {
            x: (self.x_min + self.x_max) / 2.0,
            y: (self.y_min + self.y_max) / 2.0,
        }
    }

    /// True if `inner` fits into `outer` without rotation.
    pub fn fits(inner: &Rect, outer: &Rect) -> bool {
        inner.width() <= outer.width() && inner.height() <= outer.height()
    }

    /// True if `inner`, rotated a quarter turn, fits into `outer`.
    pub fn fits_rotated(inner: &Rect, outer: &Rect) -> bool {
        inner.height() <= outer.width() && inner.width() <= outer.height()
    }

    #[inline(always)]
    pub fn intersects(&self, other: &Rect) -> bool {
        f64::max(self.x_min, other.x_min) <= f64::min(self.x_max, other.x_max)
            && f64::max(self.y_min, other.y_min) <= f64::min(self.y_max, other.y_max)
    }

    /// Closed containment of `other` in `self`, tolerant up to [`EPS`].
    #[inline(always)]
    pub fn contains(&self, other: &Rect) -> bool {
        other.x_min >= self.x_min - EPS
            && other.y_min >= self.y_min - EPS
            && other.x_max <= self.x_max + EPS
            && other.y_max <= self.y_max + EPS
    }

    /// The largest rectangle contained in both `a` and `b`, or `None` when
    /// the overlap is empty or degenerate.
    pub fn intersection(a: &Rect, b: &Rect) -> Option<Rect> {
        let x_min = f64::max(a.x_min, b.x_min);
        let y_min = f64::max(a.y_min, b.y_min);
        let x_max = f64::min(a.x_max, b.x_max);
        let y_max = f64::min(a.y_max, b.y_max);
        if x_min < x_max && y_min < y_max {
            Some(Rect {
                x_min,
                y_min,
                x_max,
                y_max,
            })
        } else {
            None
        }
    }

    /// This rectangle as a CCW polygon.
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (self.x_min, self.y_min),
                (self.x_max, self.y_min),
                (self.x_max, self.y_max),
                (self.x_min, self.y_max),
            ]),
            vec![],
        )
    }
}

impl From<geo::Rect<f64>> for Rect {
    fn from(r: geo::Rect<f64>) -> Self {
        Rect {
            x_min: r.min().x,
            y_min: r.min().y,
            x_max: r.max().x,
            y_max: r.max().y,
        }
    }
}
