//! Planar polygon helpers
//!
//! All polygons are closed rings given without repeating the first vertex.

use glam::DVec2;

/// Areas below this are treated as collapsed cells
pub const MIN_POLYGON_AREA: f64 = 1e-9;

/// Consecutive vertices closer than this are merged after clipping
const VERTEX_MERGE_DISTANCE: f64 = 1e-9;

/// Signed area of a polygon ring (positive for counter-clockwise winding)
pub fn signed_area(polygon: &[DVec2]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..polygon.len() {
        let v0 = polygon[i];
        let v1 = polygon[(i + 1) % polygon.len()];
        twice_area += v0.perp_dot(v1);
    }
    twice_area / 2.0
}

/// Area-weighted centroid of a polygon ring
///
/// Returns `None` for rings whose area is (near) zero; callers decide how a
/// collapsed cell is handled.
pub fn centroid(polygon: &[DVec2]) -> Option<DVec2> {
    if polygon.len() < 3 {
        return None;
    }
    let mut area = 0.0;
    let mut sum = DVec2::ZERO;
    for i in 0..polygon.len() {
        let v0 = polygon[i];
        let v1 = polygon[(i + 1) % polygon.len()];
        let cross = v0.perp_dot(v1);
        area += cross;
        sum += (v0 + v1) * cross;
    }
    area /= 2.0;
    if area.abs() < MIN_POLYGON_AREA {
        return None;
    }
    Some(sum / (6.0 * area))
}

/// Ray-crossing point-in-polygon test
///
/// Casts a horizontal ray from `point` and counts edge crossings.
pub fn contains_point(polygon: &[DVec2], point: DVec2) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Clip a convex polygon to the side of the perpendicular bisector nearer to `site`
///
/// Sutherland-Hodgman against the single half-plane
/// `{p : (p - midpoint) . (other - site) <= 0}`. Winding is preserved.
pub fn clip_to_bisector(polygon: &[DVec2], site: DVec2, other: DVec2) -> Vec<DVec2> {
    let direction = other - site;
    let midpoint = (site + other) * 0.5;
    let n = polygon.len();
    let mut clipped = Vec::with_capacity(n + 1);

    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        let da = (a - midpoint).dot(direction);
        let db = (b - midpoint).dot(direction);

        if da <= 0.0 {
            clipped.push(a);
        }
        if (da < 0.0 && db > 0.0) || (da > 0.0 && db < 0.0) {
            let t = da / (da - db);
            clipped.push(a + (b - a) * t);
        }
    }

    dedup_ring(clipped)
}

/// Remove consecutive (and wrap-around) duplicate vertices
fn dedup_ring(mut ring: Vec<DVec2>) -> Vec<DVec2> {
    ring.dedup_by(|a, b| a.distance_squared(*b) < VERTEX_MERGE_DISTANCE * VERTEX_MERGE_DISTANCE);
    while ring.len() > 1 {
        let first = ring[0];
        let last = ring[ring.len() - 1];
        if first.distance_squared(last) < VERTEX_MERGE_DISTANCE * VERTEX_MERGE_DISTANCE {
            ring.pop();
        } else {
            break;
        }
    }
    ring
}
