//! Territory Simulation Configuration and Builder
//!
//! This module provides configuration types for deterministic territory generation
//! and the timing/rate constants that drive the simulation afterwards.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use glam::DVec2;
use rand::Rng;

use crate::error::{Result, TerritoryError};

/// Axis-aligned bounding rectangle of the territory
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum corner (inclusive)
    pub min: DVec2,
    /// Maximum corner (inclusive)
    pub max: DVec2,
}

impl Bounds {
    /// Create bounds spanning `[0, width] x [0, height]`
    pub fn from_size(width: f64, height: f64) -> Self {
        Self {
            min: DVec2::ZERO,
            max: DVec2::new(width, height),
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Check if a point lies inside (or on the edge of) the rectangle
    #[inline]
    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Clamp a point into the rectangle
    #[inline]
    pub fn clamp(&self, point: DVec2) -> DVec2 {
        point.clamp(self.min, self.max)
    }

    /// The rectangle as a counter-clockwise polygon ring
    pub fn to_polygon(&self) -> Vec<DVec2> {
        vec![
            self.min,
            DVec2::new(self.max.x, self.min.y),
            self.max,
            DVec2::new(self.min.x, self.max.y),
        ]
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds::from_size(1000.0, 800.0)
    }
}

/// Inclusive `[min, max]` range of a rate or duration
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateRange {
    pub min: f64,
    pub max: f64,
}

impl RateRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Linear interpolation between `min` and `max`; `t` is clamped to `[0, 1]`
    #[inline]
    pub fn lerp(&self, t: f64) -> f64 {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        self.min + (self.max - self.min) * t
    }

    /// Uniform sample from the range
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.max > self.min {
            rng.gen_range(self.min..=self.max)
        } else {
            self.min
        }
    }

    /// Scale both ends by a random factor in `[1 - jitter, 1 + jitter]`
    ///
    /// Each end is scaled independently and the result reordered, so the
    /// returned range is always valid.
    pub fn jittered<R: Rng + ?Sized>(&self, jitter: f64, rng: &mut R) -> Self {
        if jitter <= 0.0 {
            return *self;
        }
        let a = self.min * rng.gen_range(1.0 - jitter..=1.0 + jitter);
        let b = self.max * rng.gen_range(1.0 - jitter..=1.0 + jitter);
        Self::new(a.min(b), a.max(b))
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min < 0.0 || self.min > self.max {
            return Err(TerritoryError::InvalidConfig(format!(
                "{} must satisfy 0 <= min <= max (got {}..{})",
                name, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// How a region with no friendly neighbors decides whether to attack
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggressionPolicy {
    /// Isolated regions always attack an enemy neighbor
    Always,
    /// Isolated regions attack with the given probability, otherwise hold
    Chance(f64),
}

impl Default for AggressionPolicy {
    fn default() -> Self {
        AggressionPolicy::Always
    }
}

/// Configuration for a deterministic territory simulation
///
/// The same configuration, driven with the same tick timestamps, always
/// produces the same regions, factions and transfers.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    /// Random seed for every random decision (placement, formation, actors)
    pub seed: u64,

    /// Number of seed points, and therefore regions
    pub cell_count: usize,

    /// Rectangle the territory is partitioned from
    pub bounds: Bounds,

    /// Number of relaxation ticks before the partition freezes
    pub relaxation_iterations: usize,

    /// Fraction of the way a seed moves toward its cell centroid per tick
    pub relaxation_factor: f64,

    /// Per-axis vertex distance under which two regions count as adjacent
    pub adjacency_tolerance: f64,

    /// Target faction count for initial formation (soft goal)
    pub faction_count: usize,

    /// Smallest group committed as a faction during formation
    pub min_faction_size: usize,

    /// Growth stops adding regions to a forming faction at this size
    pub max_faction_size: usize,

    /// Global population limit baseline
    pub population_limit: f64,

    /// Relative jitter applied to each region's population limit
    pub population_limit_jitter: f64,

    /// Starting resource of every region
    pub initial_resource: RateRange,

    /// Resource added per action, interpolated by relative resource level
    pub growth_rate: RateRange,

    /// Fraction of resources given away, interpolated by relative resource level
    pub give_rate: RateRange,

    /// Fraction of resources committed to an attack, sampled per attack
    pub attack_rate: RateRange,

    /// Relative jitter used when sampling each region's rate bounds
    pub rate_jitter: f64,

    /// Simulated seconds between two actions of a region
    pub action_interval: RateRange,

    /// Simulated seconds a transfer travels before it settles
    pub transfer_duration: f64,

    /// Simulated seconds a settled transfer stays visible
    pub transfer_display_hold: f64,

    /// Global speed multiplier; intervals and durations are divided by it
    pub time_scale: f64,

    /// Attack gating for regions without friendly neighbors
    pub aggression: AggressionPolicy,
}

impl SimulationConfig {
    /// Interval to the next action, already scaled by `time_scale`
    pub fn sample_action_interval<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.action_interval.sample(rng) / self.time_scale
    }

    /// Travel time of a transfer, scaled by `time_scale`
    #[inline]
    pub fn scaled_transfer_duration(&self) -> f64 {
        self.transfer_duration / self.time_scale
    }

    /// Display hold of a settled transfer, scaled by `time_scale`
    #[inline]
    pub fn scaled_display_hold(&self) -> f64 {
        self.transfer_display_hold / self.time_scale
    }

    /// Re-run every builder check against this value
    ///
    /// Fields are public, so a config edited after `build()` is checked again
    /// before a simulation accepts it.
    pub fn validate(&self) -> Result<()> {
        SimulationConfigBuilder::new()
            .seed(self.seed)
            .cell_count(self.cell_count)?
            .bounds(self.bounds)?
            .relaxation_factor(self.relaxation_factor)?
            .adjacency_tolerance(self.adjacency_tolerance)?
            .faction_size(self.min_faction_size, self.max_faction_size)?
            .population_limit(self.population_limit, self.population_limit_jitter)?
            .initial_resource(self.initial_resource)?
            .growth_rate(self.growth_rate)?
            .give_rate(self.give_rate)?
            .attack_rate(self.attack_rate)?
            .rate_jitter(self.rate_jitter)?
            .action_interval(self.action_interval)?
            .transfer_timing(self.transfer_duration, self.transfer_display_hold)?
            .time_scale(self.time_scale)?
            .aggression(self.aggression)?
            .faction_count(self.faction_count)
            .build()
            .map(|_| ())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfigBuilder::new().build().unwrap_or_else(|_| unreachable!("defaults are valid"))
    }
}

/// Builder for creating SimulationConfig with validation
///
/// # Example
///
/// ```rust
/// use voronoi_territory::*;
///
/// let config = SimulationConfigBuilder::new()
///     .seed(7)
///     .cell_count(60)
///     .unwrap()
///     .bounds(Bounds::from_size(600.0, 400.0))
///     .unwrap()
///     .relaxation_iterations(20)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.faction_count, 12);
/// ```
#[derive(Debug, Clone)]
pub struct SimulationConfigBuilder {
    seed: Option<u64>,
    cell_count: usize,
    bounds: Bounds,
    relaxation_iterations: usize,
    relaxation_factor: f64,
    adjacency_tolerance: f64,
    faction_count: Option<usize>,
    min_faction_size: usize,
    max_faction_size: usize,
    population_limit: f64,
    population_limit_jitter: f64,
    initial_resource: RateRange,
    growth_rate: RateRange,
    give_rate: RateRange,
    attack_rate: RateRange,
    rate_jitter: f64,
    action_interval: RateRange,
    transfer_duration: f64,
    transfer_display_hold: f64,
    time_scale: f64,
    aggression: AggressionPolicy,
}

impl SimulationConfigBuilder {
    /// Create a new builder with default values
    ///
    /// Defaults:
    /// - seed: random (generated from thread_rng)
    /// - cell_count: 100, bounds: 1000 x 800
    /// - relaxation: 50 iterations at factor 0.1
    /// - faction_count: cell_count / 5, group sizes 3..=5
    /// - actions every 3-5 simulated seconds, transfers travel 1 second
    pub fn new() -> Self {
        Self {
            seed: None,
            cell_count: 100,
            bounds: Bounds::default(),
            relaxation_iterations: 50,
            relaxation_factor: 0.1,
            adjacency_tolerance: 0.01,
            faction_count: None,
            min_faction_size: 3,
            max_faction_size: 5,
            population_limit: 1000.0,
            population_limit_jitter: 0.25,
            initial_resource: RateRange::new(20.0, 60.0),
            growth_rate: RateRange::new(2.0, 12.0),
            give_rate: RateRange::new(0.1, 0.3),
            attack_rate: RateRange::new(0.3, 0.6),
            rate_jitter: 0.2,
            action_interval: RateRange::new(3.0, 5.0),
            transfer_duration: 1.0,
            transfer_display_hold: 0.5,
            time_scale: 1.0,
            aggression: AggressionPolicy::Always,
        }
    }

    /// Set the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the number of regions
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `count` is zero
    pub fn cell_count(mut self, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(TerritoryError::InvalidConfig(
                "cell count must be at least 1".to_string(),
            ));
        }
        self.cell_count = count;
        Ok(self)
    }

    /// Set the bounding rectangle
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the rectangle has no positive area
    pub fn bounds(mut self, bounds: Bounds) -> Result<Self> {
        if !(bounds.width() > 0.0 && bounds.height() > 0.0) || !bounds.area().is_finite() {
            return Err(TerritoryError::InvalidConfig(format!(
                "bounds must have positive finite size (got {} x {})",
                bounds.width(),
                bounds.height()
            )));
        }
        self.bounds = bounds;
        Ok(self)
    }

    /// Set the relaxation budget (0 freezes the initial random partition)
    pub fn relaxation_iterations(mut self, iterations: usize) -> Self {
        self.relaxation_iterations = iterations;
        self
    }

    /// Set how far a seed moves toward its centroid per relaxation tick
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` unless `0 < factor <= 1`
    pub fn relaxation_factor(mut self, factor: f64) -> Result<Self> {
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(TerritoryError::InvalidConfig(format!(
                "relaxation factor must be in (0, 1] (got {})",
                factor
            )));
        }
        self.relaxation_factor = factor;
        Ok(self)
    }

    /// Set the shared-vertex tolerance of the adjacency test
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `tolerance` is not positive
    pub fn adjacency_tolerance(mut self, tolerance: f64) -> Result<Self> {
        if !(tolerance > 0.0) {
            return Err(TerritoryError::InvalidConfig(format!(
                "adjacency tolerance must be positive (got {})",
                tolerance
            )));
        }
        self.adjacency_tolerance = tolerance;
        Ok(self)
    }

    /// Set the target faction count; defaults to `cell_count / 5`
    ///
    /// Checked against the cell count in [`build`](Self::build).
    pub fn faction_count(mut self, count: usize) -> Self {
        self.faction_count = Some(count);
        self
    }

    /// Set the committed group size range of initial formation
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` unless `1 <= min <= max`
    pub fn faction_size(mut self, min: usize, max: usize) -> Result<Self> {
        if min == 0 || min > max {
            return Err(TerritoryError::InvalidConfig(format!(
                "faction size must satisfy 1 <= min <= max (got {}..{})",
                min, max
            )));
        }
        self.min_faction_size = min;
        self.max_faction_size = max;
        Ok(self)
    }

    /// Set the population limit baseline and its per-region jitter
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the limit is not positive or jitter is outside `[0, 1)`
    pub fn population_limit(mut self, limit: f64, jitter: f64) -> Result<Self> {
        if !(limit > 0.0) || !limit.is_finite() || !(0.0..1.0).contains(&jitter) {
            return Err(TerritoryError::InvalidConfig(format!(
                "population limit must be positive with jitter in [0, 1) (got {}, {})",
                limit, jitter
            )));
        }
        self.population_limit = limit;
        self.population_limit_jitter = jitter;
        Ok(self)
    }

    /// Set the starting resource range
    pub fn initial_resource(mut self, range: RateRange) -> Result<Self> {
        range.validate("initial resource")?;
        self.initial_resource = range;
        Ok(self)
    }

    /// Set the growth bounds (resource per action)
    pub fn growth_rate(mut self, range: RateRange) -> Result<Self> {
        range.validate("growth rate")?;
        self.growth_rate = range;
        Ok(self)
    }

    /// Set the give bounds (fraction of resources)
    pub fn give_rate(mut self, range: RateRange) -> Result<Self> {
        validate_fraction(&range, "give rate")?;
        self.give_rate = range;
        Ok(self)
    }

    /// Set the attack bounds (fraction of resources)
    pub fn attack_rate(mut self, range: RateRange) -> Result<Self> {
        validate_fraction(&range, "attack rate")?;
        self.attack_rate = range;
        Ok(self)
    }

    /// Set the per-region jitter applied to growth/give/attack bounds
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if jitter is outside `[0, 1)`
    pub fn rate_jitter(mut self, jitter: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&jitter) {
            return Err(TerritoryError::InvalidConfig(format!(
                "rate jitter must be in [0, 1) (got {})",
                jitter
            )));
        }
        self.rate_jitter = jitter;
        Ok(self)
    }

    /// Set the bounds of the action interval in simulated seconds
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` unless `0 < min <= max`
    pub fn action_interval(mut self, range: RateRange) -> Result<Self> {
        range.validate("action interval")?;
        if range.min <= 0.0 {
            return Err(TerritoryError::InvalidConfig(
                "action interval must be positive".to_string(),
            ));
        }
        self.action_interval = range;
        Ok(self)
    }

    /// Set transfer travel time and post-settlement display hold (seconds)
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if duration is not positive or hold is negative
    pub fn transfer_timing(mut self, duration: f64, display_hold: f64) -> Result<Self> {
        if !(duration > 0.0) || !duration.is_finite() || !(display_hold >= 0.0) {
            return Err(TerritoryError::InvalidConfig(format!(
                "transfer duration must be positive and hold non-negative (got {}, {})",
                duration, display_hold
            )));
        }
        self.transfer_duration = duration;
        self.transfer_display_hold = display_hold;
        Ok(self)
    }

    /// Set the global time scale (2.0 runs twice as fast)
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `scale` is not positive
    pub fn time_scale(mut self, scale: f64) -> Result<Self> {
        if !(scale > 0.0) || !scale.is_finite() {
            return Err(TerritoryError::InvalidConfig(format!(
                "time scale must be positive (got {})",
                scale
            )));
        }
        self.time_scale = scale;
        Ok(self)
    }

    /// Set the attack gating for isolated regions
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a `Chance` probability is outside `[0, 1]`
    pub fn aggression(mut self, policy: AggressionPolicy) -> Result<Self> {
        if let AggressionPolicy::Chance(p) = policy {
            if !(0.0..=1.0).contains(&p) {
                return Err(TerritoryError::InvalidConfig(format!(
                    "aggression chance must be in [0, 1] (got {})",
                    p
                )));
            }
        }
        self.aggression = policy;
        Ok(self)
    }

    /// Build the configuration
    ///
    /// If no seed was provided, generates a random seed using thread_rng.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the faction count exceeds the cell count
    pub fn build(self) -> Result<SimulationConfig> {
        let faction_count = self
            .faction_count
            .unwrap_or(self.cell_count / 5)
            .max(1);
        if faction_count > self.cell_count {
            return Err(TerritoryError::InvalidConfig(format!(
                "faction count must not exceed the cell count (got {} for {} cells)",
                faction_count, self.cell_count
            )));
        }
        let seed = self.seed.unwrap_or_else(rand::random);

        Ok(SimulationConfig {
            seed,
            cell_count: self.cell_count,
            bounds: self.bounds,
            relaxation_iterations: self.relaxation_iterations,
            relaxation_factor: self.relaxation_factor,
            adjacency_tolerance: self.adjacency_tolerance,
            faction_count,
            min_faction_size: self.min_faction_size,
            max_faction_size: self.max_faction_size,
            population_limit: self.population_limit,
            population_limit_jitter: self.population_limit_jitter,
            initial_resource: self.initial_resource,
            growth_rate: self.growth_rate,
            give_rate: self.give_rate,
            attack_rate: self.attack_rate,
            rate_jitter: self.rate_jitter,
            action_interval: self.action_interval,
            transfer_duration: self.transfer_duration,
            transfer_display_hold: self.transfer_display_hold,
            time_scale: self.time_scale,
            aggression: self.aggression,
        })
    }
}

impl Default for SimulationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_fraction(range: &RateRange, name: &str) -> Result<()> {
    range.validate(name)?;
    if range.max > 1.0 {
        return Err(TerritoryError::InvalidConfig(format!(
            "{} is a fraction and must be <= 1 (got {})",
            name, range.max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_builder_defaults() {
        let config = SimulationConfigBuilder::new().build().unwrap();
        assert_eq!(config.cell_count, 100);
        assert_eq!(config.relaxation_iterations, 50);
        assert_eq!(config.faction_count, 20);
        assert_eq!(config.min_faction_size, 3);
        assert_eq!(config.max_faction_size, 5);
        assert!((config.relaxation_factor - 0.1).abs() < 1e-12);
        assert!((config.adjacency_tolerance - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_builder_custom() {
        let config = SimulationConfigBuilder::new()
            .seed(42)
            .cell_count(30)
            .unwrap()
            .faction_count(4)
            .time_scale(2.0)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.seed, 42);
        assert_eq!(config.cell_count, 30);
        assert_eq!(config.faction_count, 4);
        assert!((config.scaled_transfer_duration() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_faction_count_never_zero() {
        let config = SimulationConfigBuilder::new()
            .cell_count(3)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.faction_count, 1);
    }

    #[test]
    fn test_faction_count_bounded_by_cells() {
        let build = |factions| {
            SimulationConfigBuilder::new()
                .seed(1)
                .cell_count(20)
                .unwrap()
                .faction_count(factions)
                .build()
        };
        assert!(build(20).is_ok());
        assert!(matches!(build(21), Err(TerritoryError::InvalidConfig(_))));
        assert!(build(usize::MAX).is_err());

        // setter order does not matter
        assert!(SimulationConfigBuilder::new()
            .faction_count(50)
            .cell_count(60)
            .unwrap()
            .build()
            .is_ok());

        let mut config = build(4).unwrap();
        config.faction_count = usize::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        assert!(SimulationConfigBuilder::new().cell_count(0).is_err());
        assert!(SimulationConfigBuilder::new()
            .bounds(Bounds::from_size(0.0, 10.0))
            .is_err());
        assert!(SimulationConfigBuilder::new().relaxation_factor(0.0).is_err());
        assert!(SimulationConfigBuilder::new().relaxation_factor(1.5).is_err());
        assert!(SimulationConfigBuilder::new().faction_size(4, 3).is_err());
        assert!(SimulationConfigBuilder::new()
            .attack_rate(RateRange::new(0.5, 1.2))
            .is_err());
        assert!(SimulationConfigBuilder::new()
            .growth_rate(RateRange::new(5.0, 1.0))
            .is_err());
        assert!(SimulationConfigBuilder::new().time_scale(-1.0).is_err());
        assert!(SimulationConfigBuilder::new()
            .aggression(AggressionPolicy::Chance(1.5))
            .is_err());
        assert!(SimulationConfigBuilder::new().transfer_timing(0.0, 1.0).is_err());
    }

    #[test]
    fn test_rate_range_lerp_clamps() {
        let range = RateRange::new(2.0, 4.0);
        assert_eq!(range.lerp(0.0), 2.0);
        assert_eq!(range.lerp(0.5), 3.0);
        assert_eq!(range.lerp(7.0), 4.0);
        assert_eq!(range.lerp(f64::NAN), 2.0);
    }

    #[test]
    fn test_rate_range_jitter_stays_ordered() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let range = RateRange::new(0.3, 0.35);
        for _ in 0..100 {
            let jittered = range.jittered(0.5, &mut rng);
            assert!(jittered.min <= jittered.max);
            assert!(jittered.min >= 0.3 * 0.5 - 1e-12);
        }
    }

    #[test]
    fn test_bounds_polygon_is_counter_clockwise() {
        let bounds = Bounds::from_size(2.0, 3.0);
        let ring = bounds.to_polygon();
        let twice_area: f64 = (0..ring.len())
            .map(|i| {
                let a = ring[i];
                let b = ring[(i + 1) % ring.len()];
                a.x * b.y - b.x * a.y
            })
            .sum();
        assert!((twice_area / 2.0 - 6.0).abs() < 1e-12);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_config_serialization() {
        let config = SimulationConfigBuilder::new().seed(12345).build().unwrap();

        let json = serde_json::to_string(&config).unwrap();
        let restored: SimulationConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, restored);
    }
}
