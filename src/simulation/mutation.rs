//! Pluggable faction mutation
//!
//! A mutation policy runs before a region decides its action. When it
//! proposes a region set, that set founds a new faction and the region holds
//! for the action.

use std::collections::BTreeSet;
use std::fmt;

use rand::RngCore;

use crate::region::{Region, RegionId};

/// Hook that may split regions off into new factions
pub trait MutationPolicy: fmt::Debug {
    /// Regions that should found a new faction, if any
    ///
    /// Called once per due region, before its decision. Returning `None`
    /// leaves the region to its normal decision.
    fn propose(&mut self, regions: &[Region], region: RegionId, rng: &mut dyn RngCore) -> Option<BTreeSet<RegionId>>;
}

/// The default policy: factions only change through conquest and commands
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMutation;

impl MutationPolicy for NoMutation {
    fn propose(&mut self, _regions: &[Region], _region: RegionId, _rng: &mut dyn RngCore) -> Option<BTreeSet<RegionId>> {
        None
    }
}

/// Random secession of a region, optionally with its friendly neighbors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Secession {
    /// Probability per action that the region secedes
    pub chance: f64,
    /// Take every neighbor of the same faction along
    pub with_friendly_neighbors: bool,
}

impl MutationPolicy for Secession {
    fn propose(&mut self, regions: &[Region], region: RegionId, rng: &mut dyn RngCore) -> Option<BTreeSet<RegionId>> {
        let origin = regions.get(region)?;
        let roll = rng.next_u64() as f64 / u64::MAX as f64;
        if roll >= self.chance {
            return None;
        }

        let mut set = BTreeSet::from([region]);
        if self.with_friendly_neighbors {
            set.extend(
                origin
                    .neighbors()
                    .iter()
                    .copied()
                    .filter(|&n| regions[n].faction() == origin.faction()),
            );
        }

        // Seceding with the whole faction would only rename it.
        let whole_faction = regions
            .iter()
            .filter(|r| r.faction() == origin.faction())
            .count()
            == set.len();
        if whole_faction {
            return None;
        }
        Some(set)
    }
}
