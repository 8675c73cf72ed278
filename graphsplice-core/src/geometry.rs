//! Polyline helpers for slicing and measuring edge geometry.
//!
//! An edge's `wayGeometry` is an ordered [`LineString`] of pillar points between its
//! two tower-node endpoints (exclusive of the endpoints themselves, unless a
//! [`WayGeometryMode`] says otherwise). Distances along the line follow the pillar
//! geometry, not the great-circle distance between endpoints.

use geo::{Coord, Distance, Haversine, LineString, Point};

/// Which endpoints to include when fetching an edge's way geometry.
///
/// Mirrors the base graph's own `fetchWayGeometry(mode)` contract; a virtual edge
/// that wraps a slice of a base edge's geometry is queried the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WayGeometryMode {
    /// Pillar points only, no tower-node endpoints.
    PillarOnly,
    /// Base-node endpoint plus pillars, excluding the adjacent-node endpoint.
    BaseAndPillars,
    /// Pillars plus the adjacent-node endpoint, excluding the base-node endpoint.
    PillarsAndAdj,
    /// Both endpoints plus pillars.
    All,
}

/// Total length of a line string, following its pillar geometry (not a straight line
/// between the two ends).
#[must_use]
pub fn length_along(line: &LineString<f64>) -> f64 {
    line.0
        .windows(2)
        .map(|w| Haversine.distance(Point::from(w[0]), Point::from(w[1])))
        .sum()
}

/// Reverses a line string in place, producing the geometry as seen from the other
/// direction.
#[must_use]
pub fn reversed(line: &LineString<f64>) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = line.0.clone();
    coords.reverse();
    LineString::new(coords)
}

/// Splits `line` at the point closest to `at` (which must lie on or very near the
/// line), returning `(prefix, suffix)` such that both include the split point, and
/// `prefix`'s last coordinate equals `suffix`'s first coordinate equals `at`.
///
/// `segment_index` is the index of the segment (as returned by a snap computation)
/// that `at` lies on, i.e. `at` lies between `line[segment_index]` and
/// `line[segment_index + 1]`.
#[must_use]
pub fn split_at(line: &LineString<f64>, segment_index: usize, at: Coord<f64>) -> (LineString<f64>, LineString<f64>) {
    let coords = &line.0;
    debug_assert!(segment_index + 1 < coords.len(), "segment_index out of range for line");

    let mut prefix: Vec<Coord<f64>> = coords[..=segment_index].to_vec();
    prefix.push(at);

    let mut suffix: Vec<Coord<f64>> = vec![at];
    suffix.extend_from_slice(&coords[segment_index + 1..]);

    (LineString::new(prefix), LineString::new(suffix))
}

/// Finds the closest point on `line` to `point`, returning `(segment_index, snapped,
/// distance_along_to_snap)` where `distance_along_to_snap` is the cumulative
/// pillar-geometry distance from `line`'s first coordinate to the snapped point.
///
/// Used to compute a snapped-point query result from a raw GPS fix (see the
/// `graphsplice-query` crate's `QueryResult`).
#[must_use]
pub fn closest_point_on_line(line: &LineString<f64>, point: Coord<f64>) -> (usize, Coord<f64>, f64) {
    let coords = &line.0;
    debug_assert!(coords.len() >= 2, "line must have at least two coordinates");

    let mut best_segment = 0;
    let mut best_point = coords[0];
    let mut best_dist_sq = f64::INFINITY;
    let mut best_dist_along = 0.0_f64;
    let mut cumulative = 0.0_f64;

    for (i, window) in coords.windows(2).enumerate() {
        let a = window[0];
        let b = window[1];
        let (proj, t) = project_onto_segment(a, b, point);
        let dist_sq = squared_distance(proj, point);

        if dist_sq < best_dist_sq {
            best_dist_sq = dist_sq;
            best_segment = i;
            best_point = proj;
            best_dist_along = cumulative
                + if t <= 0.0 {
                    0.0
                } else {
                    Haversine.distance(Point::from(a), Point::from(proj))
                };
        }

        cumulative += Haversine.distance(Point::from(a), Point::from(b));
    }

    (best_segment, best_point, best_dist_along)
}

fn project_onto_segment(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> (Coord<f64>, f64) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;

    if len_sq == 0.0 {
        return (a, 0.0);
    }

    let t = ((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq;
    let t_clamped = t.clamp(0.0, 1.0);
    (
        Coord {
            x: a.x + t_clamped * dx,
            y: a.y + t_clamped * dy,
        },
        t_clamped,
    )
}

fn squared_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(coords: &[(f64, f64)]) -> LineString<f64> {
        LineString::from(coords.iter().map(|&(x, y)| Coord { x, y }).collect::<Vec<_>>())
    }

    #[test]
    fn reversed_flips_order() {
        let l = line(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        let r = reversed(&l);
        assert_eq!(r.0, vec![Coord { x: 2.0, y: 2.0 }, Coord { x: 1.0, y: 1.0 }, Coord { x: 0.0, y: 0.0 }]);
    }

    #[test]
    fn split_at_includes_split_point_in_both_halves() {
        let l = line(&[(0.0, 0.0), (0.0, 1.0)]);
        let mid = Coord { x: 0.0, y: 0.5 };
        let (prefix, suffix) = split_at(&l, 0, mid);
        assert_eq!(prefix.0.last().copied(), Some(mid));
        assert_eq!(suffix.0.first().copied(), Some(mid));
    }

    #[test]
    fn closest_point_on_straight_line_at_midpoint() {
        let l = line(&[(0.0, 0.0), (0.0, 1.0)]);
        let (segment, snapped, dist_along) = closest_point_on_line(&l, Coord { x: 0.1, y: 0.5 });
        assert_eq!(segment, 0);
        assert!((snapped.x - 0.0).abs() < 1e-9);
        assert!((snapped.y - 0.5).abs() < 1e-9);
        let half_length = length_along(&l) / 2.0;
        assert!((dist_along - half_length).abs() < 1.0, "dist_along={dist_along} half_length={half_length}");
    }

    use proptest::{prop_assert, prop_assume, proptest};

    proptest! {
        #[test]
        fn closest_point_oracle(
            ax in -1.0f64..1.0, ay in -1.0f64..1.0,
            bx in -1.0f64..1.0, by in -1.0f64..1.0,
            px in -2.0f64..2.0, py in -2.0f64..2.0,
        ) {
            prop_assume!((ax - bx).abs() > 1e-6 || (ay - by).abs() > 1e-6);
            let l = line(&[(ax, ay), (bx, by)]);
            let (_, snapped, dist_along) = closest_point_on_line(&l, Coord { x: px, y: py });

            // The snapped point must lie on the segment, so it's bounded by the segment's own extent.
            let (min_x, max_x) = (ax.min(bx), ax.max(bx));
            let (min_y, max_y) = (ay.min(by), ay.max(by));
            prop_assert!(snapped.x >= min_x - 1e-9 && snapped.x <= max_x + 1e-9);
            prop_assert!(snapped.y >= min_y - 1e-9 && snapped.y <= max_y + 1e-9);

            let total = length_along(&l);
            prop_assert!(dist_along >= -1e-6 && dist_along <= total + 1e-6);
        }
    }
}
