//! Minkowski-sum machinery behind the NFP computation.
//!
//! Possibly non-convex outer rings are ear-clipped into triangles, the
//! convex pairwise sums are taken, and the partial sums are unioned back
//! into one region.

use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon};

use crate::geometry::Piece;
use crate::EPS;

/// Computes the NFP of `orbiting` around `stationary`, with the stationary
/// piece normalised so its bbox min-corner is the origin.
///
/// The orbiting piece is normalised to the origin, reflected through it,
/// and Minkowski-summed with the stationary outline; the largest outer ring
/// of the sum is the NFP. Returns `None` when the sum is empty.
pub fn normalized_nfp(orbiting: &Piece, stationary: &Piece) -> Option<Polygon<f64>> {
    if orbiting.is_empty() || stationary.is_empty() {
        return None;
    }

    let orb_bbox = orbiting.bbox();
    let sta_bbox = stationary.bbox();

    // -A_n: A translated to the origin, reflected through it. Reflection
    // reverses orientation, so the ring order flips to stay CCW.
    let negated_orbiting: Vec<Vec<Coord<f64>>> = orbiting
        .outer_rings()
        .map(|ring| {
            let mut coords: Vec<Coord<f64>> = open_ring(ring)
                .iter()
                .map(|c| Coord {
                    x: -(c.x - orb_bbox.x_min),
                    y: -(c.y - orb_bbox.y_min),
                })
                .collect();
            coords.reverse();
            coords
        })
        .collect();

    let stationary_rings: Vec<Vec<Coord<f64>>> = stationary
        .outer_rings()
        .map(|ring| {
            open_ring(ring)
                .iter()
                .map(|c| Coord {
                    x: c.x - sta_bbox.x_min,
                    y: c.y - sta_bbox.y_min,
                })
                .collect()
        })
        .collect();

    let stationary_triangles: Vec<[Coord<f64>; 3]> =
        stationary_rings.iter().flat_map(|r| triangulate(r)).collect();
    let orbiting_triangles: Vec<[Coord<f64>; 3]> =
        negated_orbiting.iter().flat_map(|r| triangulate(r)).collect();

    let mut partial_sums: Vec<Polygon<f64>> = Vec::new();
    for sta_tri in &stationary_triangles {
        for orb_tri in &orbiting_triangles {
            let sum = convex_sum(sta_tri, orb_tri);
            if sum.len() >= 3 {
                let poly = Polygon::new(LineString::from(sum), vec![]);
                if poly.unsigned_area() > EPS {
                    partial_sums.push(poly);
                }
            }
        }
    }

    let mut union: MultiPolygon<f64> = MultiPolygon::new(vec![]);
    for poly in partial_sums {
        let mp = MultiPolygon::new(vec![poly]);
        union = if union.0.is_empty() {
            mp
        } else {
            union.union(&mp)
        };
    }

    // the main NFP boundary is the largest resulting outer ring
    union
        .0
        .into_iter()
        .max_by(|a, b| {
            a.unsigned_area()
                .partial_cmp(&b.unsigned_area())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .filter(|p| p.unsigned_area() > EPS)
        .map(|p| Polygon::new(p.exterior().clone(), vec![]))
}

/// The ring without its closing duplicate vertex.
fn open_ring(ring: &LineString<f64>) -> &[Coord<f64>] {
    let coords = &ring.0;
    match coords.len() {
        0 | 1 => coords,
        n if coords[0] == coords[n - 1] => &coords[..n - 1],
        _ => coords,
    }
}

fn cross(o: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn point_in_triangle(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> bool {
    cross(a, b, p) > EPS && cross(b, c, p) > EPS && cross(c, a, p) > EPS
}

/// Ear-clipping triangulation of a CCW simple ring.
pub fn triangulate(ring: &[Coord<f64>]) -> Vec<[Coord<f64>; 3]> {
    let mut verts: Vec<Coord<f64>> = ring.to_vec();
    let mut triangles = Vec::with_capacity(verts.len().saturating_sub(2));

    while verts.len() > 3 {
        let n = verts.len();
        let mut clipped = false;
        for i in 0..n {
            let prev = verts[(i + n - 1) % n];
            let cur = verts[i];
            let next = verts[(i + 1) % n];
            // reflex or collinear corners cannot be ears
            if cross(prev, cur, next) <= EPS {
                continue;
            }
            let is_ear = verts.iter().enumerate().all(|(j, &p)| {
                j == (i + n - 1) % n
                    || j == i
                    || j == (i + 1) % n
                    || !point_in_triangle(p, prev, cur, next)
            });
            if is_ear {
                triangles.push([prev, cur, next]);
                verts.remove(i);
                clipped = true;
                break;
            }
        }
        if !clipped {
            // numerically stuck ring: fall back to a fan, the union of the
            // partial sums absorbs the overlap
            break;
        }
    }

    if verts.len() == 3 {
        if cross(verts[0], verts[1], verts[2]).abs() > EPS {
            triangles.push([verts[0], verts[1], verts[2]]);
        }
    } else if verts.len() > 3 {
        for i in 1..verts.len() - 1 {
            if cross(verts[0], verts[i], verts[i + 1]).abs() > EPS {
                triangles.push([verts[0], verts[i], verts[i + 1]]);
            }
        }
    }

    triangles
}

/// Minkowski sum of two convex CCW polygons, by merging their edge fans.
pub fn convex_sum(a: &[Coord<f64>], b: &[Coord<f64>]) -> Vec<Coord<f64>> {
    if a.is_empty() || b.is_empty() {
        return vec![];
    }
    let a = rotate_to_lowest(a);
    let b = rotate_to_lowest(b);
    let (n, m) = (a.len(), b.len());

    let mut result = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0usize, 0usize);
    while i < n || j < m {
        result.push(Coord {
            x: a[i % n].x + b[j % m].x,
            y: a[i % n].y + b[j % m].y,
        });
        let edge_a = Coord {
            x: a[(i + 1) % n].x - a[i % n].x,
            y: a[(i + 1) % n].y - a[i % n].y,
        };
        let edge_b = Coord {
            x: b[(j + 1) % m].x - b[j % m].x,
            y: b[(j + 1) % m].y - b[j % m].y,
        };
        let turn = edge_a.x * edge_b.y - edge_a.y * edge_b.x;
        if j >= m || (i < n && turn > EPS) {
            i += 1;
        } else if i >= n || turn < -EPS {
            j += 1;
        } else {
            i += 1;
            j += 1;
        }
    }
    result
}

/// Reorders a convex ring to start at its bottom-most (then left-most)
/// vertex, preserving orientation.
fn rotate_to_lowest(ring: &[Coord<f64>]) -> Vec<Coord<f64>> {
    let start = ring
        .iter()
        .enumerate()
        .min_by(|(_, p), (_, q)| {
            (p.y, p.x)
                .partial_cmp(&(q.y, q.x))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut out = Vec::with_capacity(ring.len());
    out.extend_from_slice(&ring[start..]);
    out.extend_from_slice(&ring[..start]);
    out
}
