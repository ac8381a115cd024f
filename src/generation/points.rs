//! Seed point placement
//!
//! Seeds start uniformly at random inside the bounding rectangle; relaxation
//! evens them out afterwards. Degenerate seeds are nudged by a small random
//! offset proportional to the average seed spacing.

use glam::DVec2;
use rand::Rng;
use std::f64::consts::TAU;

use crate::config::Bounds;

/// Perturbation strength as fraction of the average seed spacing
const PERTURB_STRENGTH: f64 = 0.05;

/// Generate `count` uniformly random seed points inside `bounds`
///
/// # Example
///
/// ```rust
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use voronoi_territory::Bounds;
/// use voronoi_territory::generation::generate_seed_points;
///
/// let mut rng = ChaCha8Rng::seed_from_u64(42);
/// let points = generate_seed_points(100, &Bounds::from_size(10.0, 10.0), &mut rng);
/// assert_eq!(points.len(), 100);
/// ```
pub fn generate_seed_points<R: Rng + ?Sized>(count: usize, bounds: &Bounds, rng: &mut R) -> Vec<DVec2> {
    (0..count)
        .map(|_| {
            DVec2::new(
                rng.gen_range(bounds.min.x..bounds.max.x),
                rng.gen_range(bounds.min.y..bounds.max.y),
            )
        })
        .collect()
}

/// Average distance between seeds if they were spread evenly
pub fn average_spacing(count: usize, bounds: &Bounds) -> f64 {
    (bounds.area() / count.max(1) as f64).sqrt()
}

/// Move a seed by a small random offset, staying inside `bounds`
pub fn perturb_point<R: Rng + ?Sized>(point: DVec2, spacing: f64, bounds: &Bounds, rng: &mut R) -> DVec2 {
    let angle: f64 = rng.gen_range(0.0..TAU);
    let magnitude: f64 = rng.gen_range(0.25..1.0) * spacing * PERTURB_STRENGTH;
    let moved = point + DVec2::from_angle(angle) * magnitude;
    if moved.is_finite() {
        bounds.clamp(moved)
    } else {
        bounds.clamp(DVec2::new(
            rng.gen_range(bounds.min.x..bounds.max.x),
            rng.gen_range(bounds.min.y..bounds.max.y),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_point_count_and_bounds() {
        let bounds = Bounds::from_size(30.0, 20.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for count in [0, 1, 10, 500] {
            let points = generate_seed_points(count, &bounds, &mut rng);
            assert_eq!(points.len(), count);
            assert!(points.iter().all(|p| bounds.contains(*p)));
        }
    }

    #[test]
    fn test_points_deterministic() {
        let bounds = Bounds::default();
        let a = generate_seed_points(50, &bounds, &mut ChaCha8Rng::seed_from_u64(7));
        let b = generate_seed_points(50, &bounds, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_perturb_moves_but_stays_inside() {
        let bounds = Bounds::from_size(10.0, 10.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let corner = DVec2::ZERO;
        for _ in 0..50 {
            let moved = perturb_point(corner, 1.0, &bounds, &mut rng);
            assert!(bounds.contains(moved));
        }
        let center = DVec2::splat(5.0);
        let moved = perturb_point(center, 1.0, &bounds, &mut rng);
        assert!(moved != center);
        assert!(moved.distance(center) <= PERTURB_STRENGTH + 1e-12);
    }

    #[test]
    fn test_perturb_recovers_from_nan() {
        let bounds = Bounds::from_size(10.0, 10.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let moved = perturb_point(DVec2::new(f64::NAN, 1.0), 1.0, &bounds, &mut rng);
        assert!(moved.is_finite());
        assert!(bounds.contains(moved));
    }
}
