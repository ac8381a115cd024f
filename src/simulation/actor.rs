//! Per-region growth and action decisions

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::AggressionPolicy;
use crate::region::{Region, RegionId};

use super::transfer::TransferKind;

/// What a region does when its timer fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Hold,
    Give { target: RegionId, amount: f64 },
    Attack { target: RegionId, amount: f64 },
}

impl Action {
    /// Target, amount and kind of the transfer this action starts
    pub fn transfer(&self) -> Option<(RegionId, f64, TransferKind)> {
        match *self {
            Action::Hold => None,
            Action::Give { target, amount } => Some((target, amount, TransferKind::Give)),
            Action::Attack { target, amount } => Some((target, amount, TransferKind::Attack)),
        }
    }
}

/// Resource level of `resource` relative to the richest region
#[inline]
pub fn relative_level(resource: f64, global_max: f64) -> f64 {
    if global_max > 0.0 {
        resource / global_max
    } else {
        0.0
    }
}

/// Grow a region toward its population limit
///
/// Poorer regions grow at the low end of their growth range, the richest at
/// the high end. Returns the amount added.
pub fn grow(region: &mut Region, global_max: f64) -> f64 {
    if region.is_at_limit() {
        return 0.0;
    }
    let growth = region
        .rates()
        .growth
        .lerp(relative_level(region.resource, global_max));
    let grown = (region.resource + growth).min(region.population_limit);
    let added = grown - region.resource;
    region.resource = grown;
    added
}

/// Choose the action of `id` from the membership of its neighbors
///
/// - no friendly neighbors: attack a random enemy, gated by `aggression`
/// - mixed neighbors: attack a random enemy
/// - only friendly neighbors: give to the poorest one below its limit
pub fn decide<R: Rng + ?Sized>(
    regions: &[Region],
    id: RegionId,
    global_max: f64,
    aggression: AggressionPolicy,
    rng: &mut R,
) -> Action {
    let region = &regions[id];
    let (friendly, enemies): (Vec<RegionId>, Vec<RegionId>) = region
        .neighbors()
        .iter()
        .copied()
        .partition(|&n| regions[n].faction == region.faction);

    let action = if enemies.is_empty() {
        match poorest_below_limit(regions, &friendly) {
            Some(target) => {
                let fraction = region
                    .rates()
                    .give
                    .lerp(relative_level(region.resource, global_max));
                Action::Give {
                    target,
                    amount: region.resource * fraction,
                }
            }
            None => Action::Hold,
        }
    } else {
        let attacks = !friendly.is_empty()
            || match aggression {
                AggressionPolicy::Always => true,
                AggressionPolicy::Chance(p) => rng.gen::<f64>() < p,
            };
        match enemies.choose(rng) {
            Some(&target) if attacks => Action::Attack {
                target,
                amount: region.resource * region.rates().attack.sample(rng),
            },
            _ => Action::Hold,
        }
    };

    match action {
        Action::Give { amount, .. } | Action::Attack { amount, .. } if amount <= f64::EPSILON => Action::Hold,
        action => action,
    }
}

/// Poorest region of `candidates` that is below its limit; ties go to the lowest id
fn poorest_below_limit(regions: &[Region], candidates: &[RegionId]) -> Option<RegionId> {
    candidates
        .iter()
        .map(|&id| &regions[id])
        .filter(|r| !r.is_at_limit())
        .min_by(|a, b| a.resource.total_cmp(&b.resource).then(a.id.cmp(&b.id)))
        .map(|r| r.id)
}
