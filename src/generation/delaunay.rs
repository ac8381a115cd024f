//! Delaunay triangulation of planar seed points
//!
//! Thin wrapper around spade's incremental Delaunay triangulation. Only the
//! neighbor structure is needed downstream: a seed's Voronoi cell is bounded
//! exactly by the bisectors toward its Delaunay neighbors.

use glam::DVec2;
use spade::{DelaunayTriangulation, Point2, Triangulation};
use std::collections::HashMap;

use crate::error::{Result, TerritoryError};

/// Result of Delaunay triangulation
///
/// `neighbors[i]` lists the seeds connected to seed `i` by a Delaunay edge,
/// sorted ascending.
#[derive(Debug, Clone)]
pub struct DelaunayResult {
    pub neighbors: Vec<Vec<usize>>,
    /// Number of inner triangles (0 when all seeds are collinear)
    pub triangle_count: usize,
}

/// Compute the Delaunay neighbor lists of `points`
///
/// Points are inserted one at a time; expected cost is O(N log N).
///
/// # Errors
///
/// - `DegenerateCell` when a seed coincides with an earlier one (its cell
///   would be empty)
/// - `GenerationFailed` when spade rejects a coordinate (NaN or out of range)
pub fn compute_delaunay(points: &[DVec2]) -> Result<DelaunayResult> {
    let mut triangulation: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();

    // spade returns the existing handle when a position is inserted twice
    let mut seed_of_vertex: HashMap<usize, usize> = HashMap::with_capacity(points.len());
    let mut handles = Vec::with_capacity(points.len());

    for (seed, point) in points.iter().enumerate() {
        let handle = triangulation
            .insert(Point2::new(point.x, point.y))
            .map_err(|e| {
                TerritoryError::GenerationFailed(format!(
                    "seed {} at ({}, {}) rejected by triangulation: {:?}",
                    seed, point.x, point.y, e
                ))
            })?;

        if seed_of_vertex.insert(handle.index(), seed).is_some() {
            return Err(TerritoryError::DegenerateCell { seed });
        }
        handles.push(handle);
    }

    let neighbors = handles
        .iter()
        .map(|&handle| {
            let mut list: Vec<usize> = triangulation
                .vertex(handle)
                .out_edges()
                .filter_map(|edge| seed_of_vertex.get(&edge.to().fix().index()).copied())
                .collect();
            list.sort_unstable();
            list.dedup();
            list
        })
        .collect();

    Ok(DelaunayResult {
        neighbors,
        triangle_count: triangulation.num_inner_faces(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_delaunay_triangle() {
        let points = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(0.0, 1.0),
        ];

        let result = compute_delaunay(&points).unwrap();

        assert_eq!(result.triangle_count, 1);
        assert_eq!(result.neighbors[0], vec![1, 2]);
        assert_eq!(result.neighbors[1], vec![0, 2]);
        assert_eq!(result.neighbors[2], vec![0, 1]);
    }

    #[test]
    fn test_neighbor_symmetry() {
        let points: Vec<DVec2> = (0..40)
            .map(|i| {
                let t = i as f64;
                DVec2::new((t * 7.31).sin() * 10.0, (t * 3.17).cos() * 10.0)
            })
            .collect();
        let result = compute_delaunay(&points).unwrap();

        for (a, list) in result.neighbors.iter().enumerate() {
            for &b in list {
                assert!(result.neighbors[b].contains(&a));
            }
        }
    }

    #[test]
    fn test_collinear_points_still_connected() {
        let points: Vec<DVec2> = (0..5).map(|i| DVec2::new(i as f64, 0.0)).collect();
        let result = compute_delaunay(&points).unwrap();

        assert_eq!(result.triangle_count, 0);
        assert_eq!(result.neighbors[2], vec![1, 3]);
    }

    #[test]
    fn test_duplicate_point_is_degenerate() {
        let points = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(1.0, 0.0),
        ];
        assert_eq!(
            compute_delaunay(&points).unwrap_err(),
            TerritoryError::DegenerateCell { seed: 2 }
        );
    }

    #[test]
    fn test_nan_point_fails() {
        let points = vec![DVec2::new(f64::NAN, 0.0)];
        assert!(matches!(
            compute_delaunay(&points),
            Err(TerritoryError::GenerationFailed(_))
        ));
    }
}
