//! Region Structure
//!
//! A region is one frozen Voronoi cell of the territory together with its
//! mutable resource, ownership and decision-timer state.

use glam::DVec2;
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{RateRange, SimulationConfig};
use crate::faction::FactionId;
use crate::geometry;
use crate::simulation::Timestamp;

/// Region identifier: the index of the seed that generated the region
pub type RegionId = usize;

/// Per-region rate bounds, sampled once when the region is created
///
/// Regions share one shape; only these parameters differ between them.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionRates {
    /// Resource added per action
    pub growth: RateRange,
    /// Fraction of resources given to a friendly neighbor
    pub give: RateRange,
    /// Fraction of resources committed to an attack
    pub attack: RateRange,
}

impl RegionRates {
    /// Sample rates around the global bounds of `config`
    pub fn sample<R: Rng + ?Sized>(config: &SimulationConfig, rng: &mut R) -> Self {
        let jitter = config.rate_jitter;
        let clamp_fraction = |r: RateRange| RateRange::new(r.min.min(1.0), r.max.min(1.0));
        Self {
            growth: config.growth_rate.jittered(jitter, rng),
            give: clamp_fraction(config.give_rate.jittered(jitter, rng)),
            attack: clamp_fraction(config.attack_rate.jittered(jitter, rng)),
        }
    }

    /// Rates equal to the global bounds, without jitter
    pub fn uniform(config: &SimulationConfig) -> Self {
        Self {
            growth: config.growth_rate,
            give: config.give_rate,
            attack: config.attack_rate,
        }
    }
}

/// When a region last acted and when it acts next
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionTimer {
    pub last_action_at: Option<Timestamp>,
    pub next_action_at: Timestamp,
}

impl ActionTimer {
    pub fn new(next_action_at: Timestamp) -> Self {
        Self {
            last_action_at: None,
            next_action_at,
        }
    }

    #[inline]
    pub fn is_due(&self, now: Timestamp) -> bool {
        now >= self.next_action_at
    }

    pub(crate) fn reschedule(&mut self, now: Timestamp, interval: f64) {
        self.last_action_at = Some(now);
        self.next_action_at = now + interval;
    }
}

/// A single region of the territory
///
/// Geometry (`polygon`, `centroid`, `neighbors`) is fixed once the partition
/// freezes. `resource` and `timer` change every tick; `faction` changes only
/// through [`crate::FactionRegistry`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Region {
    /// Unique identifier (0 to cell_count-1), stable across the run
    pub id: RegionId,

    /// Boundary ring, counter-clockwise, at least three vertices
    polygon: Vec<DVec2>,

    /// Area-weighted centroid of the polygon
    centroid: DVec2,

    area: f64,

    pub(crate) resource: f64,

    pub(crate) population_limit: f64,

    /// Owning faction; `None` only before formation completes
    pub(crate) faction: Option<FactionId>,

    /// Adjacent region IDs, sorted ascending
    pub(crate) neighbors: Vec<RegionId>,

    rates: RegionRates,

    pub(crate) timer: ActionTimer,
}

impl Region {
    /// Create a new region
    ///
    /// This is typically called when the partition freezes, not by user code.
    /// The centroid and area are derived from `polygon`.
    pub fn new(
        id: RegionId,
        polygon: Vec<DVec2>,
        resource: f64,
        population_limit: f64,
        rates: RegionRates,
        timer: ActionTimer,
    ) -> Self {
        let area = geometry::signed_area(&polygon).abs();
        let centroid = geometry::centroid(&polygon).unwrap_or_else(|| vertex_average(&polygon));
        Self {
            id,
            polygon,
            centroid,
            area,
            resource: resource.max(0.0),
            population_limit,
            faction: None,
            neighbors: Vec::new(),
            rates,
            timer,
        }
    }

    #[inline]
    pub fn polygon(&self) -> &[DVec2] {
        &self.polygon
    }

    #[inline]
    pub fn centroid(&self) -> DVec2 {
        self.centroid
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Current resource level (never negative)
    #[inline]
    pub fn resource(&self) -> f64 {
        self.resource
    }

    #[inline]
    pub fn population_limit(&self) -> f64 {
        self.population_limit
    }

    /// Owning faction (always `Some` once formation has completed)
    #[inline]
    pub fn faction(&self) -> Option<FactionId> {
        self.faction
    }

    #[inline]
    pub fn neighbors(&self) -> &[RegionId] {
        &self.neighbors
    }

    #[inline]
    pub fn rates(&self) -> &RegionRates {
        &self.rates
    }

    #[inline]
    pub fn timer(&self) -> &ActionTimer {
        &self.timer
    }

    #[inline]
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Check if this region is a neighbor of another region
    #[inline]
    pub fn is_neighbor_of(&self, other: RegionId) -> bool {
        self.neighbors.binary_search(&other).is_ok()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.polygon.len()
    }

    #[inline]
    pub fn is_at_limit(&self) -> bool {
        self.resource >= self.population_limit
    }

    /// Ray-crossing containment test against the region polygon
    #[inline]
    pub fn contains_point(&self, point: DVec2) -> bool {
        geometry::contains_point(&self.polygon, point)
    }

    /// Add to the resource level, clamping the result at zero
    pub(crate) fn add_resource(&mut self, delta: f64) {
        self.resource = (self.resource + delta).max(0.0);
    }
}

fn vertex_average(polygon: &[DVec2]) -> DVec2 {
    if polygon.is_empty() {
        return DVec2::ZERO;
    }
    polygon.iter().copied().sum::<DVec2>() / polygon.len() as f64
}
