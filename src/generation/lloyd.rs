//! Bounded Lloyd's relaxation
//!
//! Each step moves every seed a fixed fraction of the way toward the centroid
//! of its current Voronoi cell and rebuilds the tessellation. The driver runs
//! a fixed number of steps and then freezes; there is no convergence test, so
//! region identity is settled by the budget alone.

use glam::DVec2;
use rand::Rng;
use std::time::Instant;

use crate::config::{Bounds, SimulationConfig};
use crate::error::{Result, TerritoryError};

use super::points::{average_spacing, generate_seed_points, perturb_point};
use super::voronoi::{generate_cells, RawCell};

/// Rebuild attempts per step before the step is skipped
const MAX_DEGENERATE_RETRIES: usize = 16;

/// Options for the relaxation driver
#[derive(Debug, Clone, Copy)]
pub struct LloydOptions {
    /// Number of steps before the partition freezes
    pub max_iterations: usize,
    /// Fraction of the seed-to-centroid distance covered per step
    pub lerp_factor: f64,
}

impl Default for LloydOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            lerp_factor: 0.1,
        }
    }
}

impl From<&SimulationConfig> for LloydOptions {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            max_iterations: config.relaxation_iterations,
            lerp_factor: config.relaxation_factor,
        }
    }
}

/// Relaxation progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxationState {
    /// Seeds still move each step
    Unstabilized,
    /// Budget exhausted; the current cells are final
    Stabilized,
}

/// Relaxation driver holding the seeds and their current tessellation
///
/// The driver only moves forward: once [`Relaxation::state`] reports
/// `Stabilized`, [`Relaxation::step`] is a no-op and [`Relaxation::freeze`]
/// hands out the final cells.
#[derive(Debug, Clone)]
pub struct Relaxation {
    seeds: Vec<DVec2>,
    cells: Vec<RawCell>,
    bounds: Bounds,
    options: LloydOptions,
    iteration: usize,
    skipped_steps: usize,
}

impl Relaxation {
    /// Place `count` random seeds and build the first tessellation
    ///
    /// # Errors
    ///
    /// `GenerationFailed` if no valid initial tessellation can be found.
    pub fn new<R: Rng + ?Sized>(
        count: usize,
        bounds: Bounds,
        options: LloydOptions,
        rng: &mut R,
    ) -> Result<Self> {
        let seeds = generate_seed_points(count, &bounds, rng);
        Self::from_seeds(seeds, bounds, options, rng)
    }

    /// Start relaxation from caller-provided seeds
    ///
    /// Degenerate seeds (duplicates, seeds outside the bounds) are perturbed
    /// until the tessellation succeeds.
    pub fn from_seeds<R: Rng + ?Sized>(
        mut seeds: Vec<DVec2>,
        bounds: Bounds,
        options: LloydOptions,
        rng: &mut R,
    ) -> Result<Self> {
        if seeds.is_empty() {
            return Err(TerritoryError::GenerationFailed(
                "relaxation needs at least one seed".to_string(),
            ));
        }
        let spacing = average_spacing(seeds.len(), &bounds);

        // Out-of-range seeds are pulled in first; perturbation handles the rest.
        for seed in seeds.iter_mut() {
            if seed.is_finite() {
                *seed = bounds.clamp(*seed);
            }
        }

        let retries = seeds.len() * 4;
        let cells = tessellate_with_retries(&mut seeds, &bounds, spacing, retries, rng)
            .map_err(|e| TerritoryError::GenerationFailed(format!("initial tessellation: {}", e)))?;

        Ok(Self {
            seeds,
            cells,
            bounds,
            options,
            iteration: 0,
            skipped_steps: 0,
        })
    }

    #[inline]
    pub fn state(&self) -> RelaxationState {
        if self.iteration >= self.options.max_iterations {
            RelaxationState::Stabilized
        } else {
            RelaxationState::Unstabilized
        }
    }

    #[inline]
    pub fn is_stabilized(&self) -> bool {
        self.state() == RelaxationState::Stabilized
    }

    /// Steps taken so far
    #[inline]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Total step budget
    #[inline]
    pub fn budget(&self) -> usize {
        self.options.max_iterations
    }

    /// Steps that were skipped because retries ran out
    #[inline]
    pub fn skipped_steps(&self) -> usize {
        self.skipped_steps
    }

    #[inline]
    pub fn seeds(&self) -> &[DVec2] {
        &self.seeds
    }

    /// Current tessellation, one cell per seed
    #[inline]
    pub fn cells(&self) -> &[RawCell] {
        &self.cells
    }

    #[inline]
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Advance one relaxation step
    ///
    /// Returns the state after the step. A step whose rebuild keeps failing
    /// is skipped: the seeds revert and the previous tessellation is kept.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> RelaxationState {
        if self.is_stabilized() {
            return RelaxationState::Stabilized;
        }
        let step_start = Instant::now();

        let previous = self.seeds.clone();
        let mut max_displacement: f64 = 0.0;
        for (seed, cell) in self.seeds.iter_mut().zip(&self.cells) {
            let moved = seed.lerp(cell.centroid, self.options.lerp_factor);
            max_displacement = max_displacement.max(moved.distance(*seed));
            *seed = moved;
        }

        let spacing = average_spacing(self.seeds.len(), &self.bounds);
        match tessellate_with_retries(&mut self.seeds, &self.bounds, spacing, MAX_DEGENERATE_RETRIES, rng) {
            Ok(cells) => self.cells = cells,
            Err(e) => {
                tracing::warn!(
                    "[Lloyd] Step {} skipped after {} retries: {}",
                    self.iteration + 1,
                    MAX_DEGENERATE_RETRIES,
                    e
                );
                self.seeds = previous;
                self.skipped_steps += 1;
            }
        }
        self.iteration += 1;

        tracing::debug!(
            "[Lloyd] Iter {}/{}: max_disp={:.4}, total={:?}",
            self.iteration,
            self.options.max_iterations,
            max_displacement,
            step_start.elapsed()
        );

        self.state()
    }

    /// Run the remaining budget in one go
    pub fn run_to_completion<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let start = Instant::now();
        while self.step(rng) == RelaxationState::Unstabilized {}
        tracing::debug!(
            "[Lloyd] Finished: {} iterations, skipped={}, total={:?}",
            self.iteration,
            self.skipped_steps,
            start.elapsed()
        );
    }

    /// Consume the driver and return the final cells and seeds
    ///
    /// Callable in any state; freezing early yields the current partition.
    pub fn freeze(self) -> (Vec<RawCell>, Vec<DVec2>) {
        (self.cells, self.seeds)
    }
}

/// Apply Lloyd's relaxation to `points` for `options.max_iterations` steps
///
/// Convenience wrapper returning the relaxed seed positions.
pub fn lloyd_relaxation_with_options<R: Rng + ?Sized>(
    points: Vec<DVec2>,
    bounds: Bounds,
    options: LloydOptions,
    rng: &mut R,
) -> Result<Vec<DVec2>> {
    let mut relaxation = Relaxation::from_seeds(points, bounds, options, rng)?;
    relaxation.run_to_completion(rng);
    Ok(relaxation.freeze().1)
}

/// Rebuild the tessellation, perturbing the offending seed on each failure
fn tessellate_with_retries<R: Rng + ?Sized>(
    seeds: &mut [DVec2],
    bounds: &Bounds,
    spacing: f64,
    retries: usize,
    rng: &mut R,
) -> Result<Vec<RawCell>> {
    let mut attempt = 0;
    loop {
        match generate_cells(seeds, bounds) {
            Ok(cells) => return Ok(cells),
            Err(TerritoryError::DegenerateCell { seed }) if attempt < retries => {
                tracing::debug!("[Lloyd] Degenerate cell for seed {}, perturbing", seed);
                seeds[seed] = perturb_point(seeds[seed], spacing, bounds, rng);
                attempt += 1;
            }
            Err(TerritoryError::GenerationFailed(msg)) if attempt < retries => {
                // Non-finite seeds cannot be traced to an index by the triangulation.
                let Some(bad) = seeds.iter().position(|s| !s.is_finite()) else {
                    return Err(TerritoryError::GenerationFailed(msg));
                };
                seeds[bad] = perturb_point(seeds[bad], spacing, bounds, rng);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn cell_area_spread(cells: &[RawCell]) -> f64 {
        let max = cells.iter().map(|c| c.area).fold(f64::MIN, f64::max);
        let min = cells.iter().map(|c| c.area).fold(f64::MAX, f64::min);
        max / min
    }

    #[test]
    fn test_relaxation_runs_fixed_budget() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let options = LloydOptions {
            max_iterations: 7,
            lerp_factor: 0.1,
        };
        let mut relaxation = Relaxation::new(40, Bounds::from_size(100.0, 100.0), options, &mut rng).unwrap();

        let mut steps = 0;
        while relaxation.state() == RelaxationState::Unstabilized {
            relaxation.step(&mut rng);
            steps += 1;
        }
        assert_eq!(steps, 7);
        assert_eq!(relaxation.iteration(), 7);

        // Further steps do nothing
        let seeds = relaxation.seeds().to_vec();
        assert_eq!(relaxation.step(&mut rng), RelaxationState::Stabilized);
        assert_eq!(relaxation.seeds(), seeds.as_slice());
    }

    #[test]
    fn test_relaxation_evens_out_cells() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let bounds = Bounds::from_size(100.0, 100.0);
        let mut relaxation = Relaxation::new(60, bounds, LloydOptions::default(), &mut rng).unwrap();
        let before = cell_area_spread(relaxation.cells());

        relaxation.run_to_completion(&mut rng);
        let after = cell_area_spread(relaxation.cells());

        assert!(after < before, "spread {} should shrink below {}", after, before);
        let (cells, seeds) = relaxation.freeze();
        assert_eq!(cells.len(), 60);
        assert_eq!(seeds.len(), 60);
    }

    #[test]
    fn test_seed_moves_ten_percent_toward_centroid() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let bounds = Bounds::from_size(4.0, 2.0);
        let options = LloydOptions {
            max_iterations: 1,
            lerp_factor: 0.1,
        };
        let mut relaxation = Relaxation::from_seeds(vec![DVec2::new(0.0, 0.0)], bounds, options, &mut rng).unwrap();
        relaxation.step(&mut rng);

        // Lone cell centroid is (2, 1)
        assert!((relaxation.seeds()[0] - DVec2::new(0.2, 0.1)).length() < 1e-12);
    }

    #[test]
    fn test_duplicate_seeds_are_perturbed() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let bounds = Bounds::from_size(10.0, 10.0);
        let seeds = vec![DVec2::new(5.0, 5.0); 4];
        let relaxation = Relaxation::from_seeds(seeds, bounds, LloydOptions::default(), &mut rng).unwrap();

        assert_eq!(relaxation.cells().len(), 4);
        let total: f64 = relaxation.cells().iter().map(|c| c.area).sum();
        assert!((total - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_budget_is_already_stable() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let options = LloydOptions {
            max_iterations: 0,
            lerp_factor: 0.1,
        };
        let relaxation = Relaxation::new(10, Bounds::default(), options, &mut rng).unwrap();
        assert!(relaxation.is_stabilized());
    }

    #[test]
    fn test_empty_seed_set_fails() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(Relaxation::from_seeds(Vec::new(), Bounds::default(), LloydOptions::default(), &mut rng).is_err());
    }

    #[test]
    fn test_lloyd_relaxation_determinism() {
        let bounds = Bounds::from_size(50.0, 50.0);
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let points = generate_seed_points(30, &bounds, &mut rng);
            lloyd_relaxation_with_options(points, bounds, LloydOptions::default(), &mut rng).unwrap()
        };
        assert_eq!(run(12345), run(12345));
    }
}
