//! Voronoi cell construction from Delaunay triangulation
//!
//! Each cell starts as the bounding rectangle and is clipped by the
//! perpendicular bisector toward every Delaunay neighbor of its seed. The
//! result is the seed's Voronoi cell intersected with the rectangle.

use glam::DVec2;

use crate::config::Bounds;
use crate::error::{Result, TerritoryError};
use crate::geometry::{self, MIN_POLYGON_AREA};

use super::delaunay::compute_delaunay;

/// A Voronoi cell before it is frozen into a region (geometry only)
#[derive(Debug, Clone)]
pub struct RawCell {
    /// Index of the seed this cell belongs to
    pub id: usize,
    /// Seed point that generated the cell
    pub seed: DVec2,
    /// Cell boundary, counter-clockwise
    pub polygon: Vec<DVec2>,
    /// Area-weighted centroid of `polygon`
    pub centroid: DVec2,
    /// Area of `polygon`
    pub area: f64,
}

/// Partition `bounds` into one convex cell per seed point
///
/// # Errors
///
/// Returns `DegenerateCell` naming the first seed whose cell collapsed
/// (duplicate seed, seed outside the bounds). `GenerationFailed` is
/// returned for non-finite seeds.
pub fn generate_cells(points: &[DVec2], bounds: &Bounds) -> Result<Vec<RawCell>> {
    let delaunay = compute_delaunay(points)?;
    let frame = bounds.to_polygon();

    points
        .iter()
        .enumerate()
        .map(|(id, &seed)| {
            if !bounds.contains(seed) {
                return Err(TerritoryError::DegenerateCell { seed: id });
            }

            let mut polygon = frame.clone();
            for &other in &delaunay.neighbors[id] {
                polygon = geometry::clip_to_bisector(&polygon, seed, points[other]);
                if polygon.len() < 3 {
                    break;
                }
            }

            let area = geometry::signed_area(&polygon);
            if polygon.len() < 3 || area < MIN_POLYGON_AREA {
                return Err(TerritoryError::DegenerateCell { seed: id });
            }
            let centroid = geometry::centroid(&polygon)
                .ok_or(TerritoryError::DegenerateCell { seed: id })?;

            Ok(RawCell {
                id,
                seed,
                polygon,
                centroid,
                area,
            })
        })
        .collect()
}
