//! Spatial indexing for fast point-to-region lookups
//!
//! This module is only available with the `spatial-index` feature.

use glam::DVec2;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;

use crate::region::RegionId;

/// KD-tree over the final seed positions
///
/// A point's nearest seed is the seed of the Voronoi cell containing it, so
/// one nearest-neighbor query gives the candidate region for hit testing.
#[derive(Clone)]
pub struct SpatialIndex {
    tree: ImmutableKdTree<f64, usize, 2, 32>,
    len: usize,
}

impl SpatialIndex {
    /// Build the index from seed positions, indexed by region id
    ///
    /// # Example
    ///
    /// ```
    /// use voronoi_territory::SpatialIndex;
    /// use glam::DVec2;
    ///
    /// let seeds = vec![DVec2::new(10.0, 10.0), DVec2::new(90.0, 10.0), DVec2::new(50.0, 80.0)];
    /// let index = SpatialIndex::new(&seeds);
    /// assert_eq!(index.find_nearest(DVec2::new(85.0, 20.0)), Some(1));
    /// ```
    pub fn new(seeds: &[DVec2]) -> Self {
        let points: Vec<[f64; 2]> = seeds.iter().map(|s| [s.x, s.y]).collect();
        Self {
            tree: ImmutableKdTree::new_from_slice(&points),
            len: seeds.len(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Region whose seed is nearest to `position`
    pub fn find_nearest(&self, position: DVec2) -> Option<RegionId> {
        if self.is_empty() || !position.is_finite() {
            return None;
        }
        let result = self.tree.nearest_one::<SquaredEuclidean>(&[position.x, position.y]);
        Some(result.item as RegionId)
    }
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex").field("len", &self.len).finish()
    }
}
