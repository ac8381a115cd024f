//! Region adjacency from shared boundary vertices
//!
//! Two regions are neighbors when any vertex of one lies within the tolerance
//! (per axis) of any vertex of the other. Every unordered pair is tested once,
//! which is O(N²·V²) but runs only when the partition freezes.
//!
//! Known approximation: cells clipped at the bounding rectangle can share a
//! rectangle corner without sharing an edge, and are then reported adjacent.
//! Faction contiguity is defined over exactly this relation, so it is kept.

use glam::DVec2;

use crate::region::{Region, RegionId};

/// Check whether two polygons share a vertex within `tolerance`
pub fn shares_vertex(a: &[DVec2], b: &[DVec2], tolerance: f64) -> bool {
    a.iter().any(|va| {
        b.iter()
            .any(|vb| (va.x - vb.x).abs() < tolerance && (va.y - vb.y).abs() < tolerance)
    })
}

/// Compute the symmetric neighbor lists of `polygons`
///
/// `result[i]` is sorted ascending. Both directions of a pair are inserted
/// together, so `j ∈ result[i] ⇔ i ∈ result[j]`.
pub fn build_adjacency(polygons: &[&[DVec2]], tolerance: f64) -> Vec<Vec<RegionId>> {
    let mut neighbors: Vec<Vec<RegionId>> = vec![Vec::new(); polygons.len()];

    for i in 0..polygons.len() {
        for j in (i + 1)..polygons.len() {
            if shares_vertex(polygons[i], polygons[j], tolerance) {
                neighbors[i].push(j);
                neighbors[j].push(i);
            }
        }
    }

    // Pairs are visited in (i, j) order, so each list is already ascending.
    neighbors
}

/// Fill in the `neighbors` of every region
pub fn assign_neighbors(regions: &mut [Region], tolerance: f64) {
    let adjacency = {
        let polygons: Vec<&[DVec2]> = regions.iter().map(|r| r.polygon()).collect();
        build_adjacency(&polygons, tolerance)
    };

    let mut edges = 0;
    for (region, list) in regions.iter_mut().zip(adjacency) {
        edges += list.len();
        region.neighbors = list;
    }

    tracing::debug!(
        "Adjacency built: {} regions, {} neighbor pairs",
        regions.len(),
        edges / 2
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bounds;
    use crate::generation::{generate_cells, generate_seed_points};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<DVec2> {
        vec![
            DVec2::new(x0, y0),
            DVec2::new(x1, y0),
            DVec2::new(x1, y1),
            DVec2::new(x0, y1),
        ]
    }

    #[test]
    fn test_shares_vertex_tolerance() {
        let a = rect(0.0, 0.0, 1.0, 1.0);
        let b = rect(1.005, 0.0, 2.0, 1.0);
        let c = rect(1.02, 0.0, 2.0, 1.0);
        assert!(shares_vertex(&a, &b, 0.01));
        assert!(!shares_vertex(&a, &c, 0.01));
    }

    #[test]
    fn test_corner_contact_counts_as_adjacent() {
        let a = rect(0.0, 0.0, 1.0, 1.0);
        let diagonal = rect(1.0, 1.0, 2.0, 2.0);
        let far = rect(3.0, 3.0, 4.0, 4.0);
        let adjacency = build_adjacency(&[&a, &diagonal, &far], 0.01);
        assert_eq!(adjacency[0], vec![1]);
        assert_eq!(adjacency[1], vec![0]);
        assert!(adjacency[2].is_empty());
    }

    #[test]
    fn test_adjacency_symmetric_on_voronoi_cells() {
        let bounds = Bounds::from_size(200.0, 200.0);
        let points = generate_seed_points(80, &bounds, &mut ChaCha8Rng::seed_from_u64(17));
        let cells = generate_cells(&points, &bounds).unwrap();
        let polygons: Vec<&[DVec2]> = cells.iter().map(|c| c.polygon.as_slice()).collect();

        let adjacency = build_adjacency(&polygons, 0.01);

        for (a, list) in adjacency.iter().enumerate() {
            assert!(!list.is_empty(), "cell {} has no neighbors", a);
            assert!(!list.contains(&a));
            assert!(list.windows(2).all(|w| w[0] < w[1]));
            for &b in list {
                assert!(adjacency[b].contains(&a), "{} -> {} not mirrored", a, b);
            }
        }
    }
}
