//! Initial faction formation
//!
//! Factions are grown from random unassigned start regions over the adjacency
//! graph. Each committed group is contiguous; regions left over once the
//! target count or the attempt cap is reached join a random existing faction.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::region::{Region, RegionId};

use super::colors::{distinct_palette, random_color};
use super::{FactionId, FactionOrigin, FactionRegistry};

/// Parameters of the formation pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormationOptions {
    /// Soft goal for the number of factions
    pub target_count: usize,
    /// Groups smaller than this are discarded
    pub min_size: usize,
    /// Growth stops at this many regions
    pub max_size: usize,
    /// Maximum number of start-region draws
    pub attempt_cap: usize,
}

impl FormationOptions {
    /// Options for `region_count` regions with default group sizes
    pub fn for_region_count(region_count: usize) -> Self {
        Self {
            target_count: (region_count / 5).max(1),
            min_size: 3,
            max_size: 5,
            attempt_cap: region_count * 10,
        }
    }
}

impl From<&SimulationConfig> for FormationOptions {
    fn from(config: &SimulationConfig) -> Self {
        // more factions than disjoint minimum-size groups can never be grown
        let reachable = config.cell_count / config.min_faction_size.max(1);
        Self {
            target_count: config.faction_count.min(reachable).max(1),
            min_size: config.min_faction_size,
            max_size: config.max_faction_size,
            attempt_cap: config.cell_count * 10,
        }
    }
}

/// Summary of a formation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormationReport {
    /// Factions committed from grown groups
    pub grown: Vec<FactionId>,
    /// Start-region draws used
    pub attempts: usize,
    /// Regions assigned after growth stopped
    pub leftovers: usize,
    /// No group reached the minimum size and one faction took every region
    pub single_faction_fallback: bool,
}

/// Partition every region into factions
///
/// After this returns `Ok`, every region has exactly one faction.
pub fn form_factions<R: Rng + ?Sized>(
    regions: &mut [Region],
    registry: &mut FactionRegistry,
    options: &FormationOptions,
    rng: &mut R,
) -> Result<FormationReport> {
    let palette = distinct_palette(options.target_count.min(regions.len()), rng);
    let mut unassigned: BTreeSet<RegionId> = regions
        .iter()
        .filter(|r| r.faction.is_none())
        .map(|r| r.id)
        .collect();

    let mut report = FormationReport {
        grown: Vec::new(),
        attempts: 0,
        leftovers: 0,
        single_faction_fallback: false,
    };

    while !unassigned.is_empty()
        && report.grown.len() < options.target_count
        && report.attempts < options.attempt_cap
    {
        report.attempts += 1;

        let pick = rng.gen_range(0..unassigned.len());
        let Some(&start) = unassigned.iter().nth(pick) else {
            break;
        };

        let group = grow_group(regions, &unassigned, start, options.max_size, rng);
        if group.len() < options.min_size {
            continue;
        }

        let color = match palette.get(report.grown.len()) {
            Some(&color) => color,
            None => random_color(rng),
        };
        let id = registry.create_faction(regions, &group, color, FactionOrigin::Formation)?;
        for region in &group {
            unassigned.remove(region);
        }
        report.grown.push(id);
    }

    report.leftovers = unassigned.len();
    if !unassigned.is_empty() && report.grown.is_empty() {
        tracing::warn!(
            "[Formation] No group reached {} regions, one faction takes all {}",
            options.min_size,
            unassigned.len()
        );
        let members: Vec<RegionId> = unassigned.iter().copied().collect();
        let color = match palette.first() {
            Some(&color) => color,
            None => random_color(rng),
        };
        registry.create_faction(regions, &members, color, FactionOrigin::Formation)?;
        report.single_faction_fallback = true;
    } else if !unassigned.is_empty() {
        if report.attempts >= options.attempt_cap {
            tracing::warn!(
                "[Formation] Attempt cap {} reached with {} regions unassigned",
                options.attempt_cap,
                unassigned.len()
            );
        }
        for &region in &unassigned {
            if let Some(&faction) = report.grown.choose(rng) {
                registry.add_region(regions, faction, region)?;
            }
        }
    }

    tracing::info!(
        "[Formation] {} factions from {} regions ({} attempts, {} leftovers)",
        registry.len(),
        regions.len(),
        report.attempts,
        report.leftovers
    );

    Ok(report)
}

/// Grow a contiguous candidate group from `start`
///
/// The frontier holds unassigned neighbors of every region claimed so far;
/// one frontier region is drawn at random per step.
fn grow_group<R: Rng + ?Sized>(
    regions: &[Region],
    unassigned: &BTreeSet<RegionId>,
    start: RegionId,
    max_size: usize,
    rng: &mut R,
) -> Vec<RegionId> {
    let mut group = vec![start];
    let mut seen: BTreeSet<RegionId> = BTreeSet::from([start]);
    let mut frontier: Vec<RegionId> = Vec::new();

    let extend = |from: RegionId, seen: &mut BTreeSet<RegionId>, frontier: &mut Vec<RegionId>| {
        for &n in regions[from].neighbors() {
            if unassigned.contains(&n) && seen.insert(n) {
                frontier.push(n);
            }
        }
    };
    extend(start, &mut seen, &mut frontier);

    while group.len() < max_size && !frontier.is_empty() {
        let next = frontier.swap_remove(rng.gen_range(0..frontier.len()));
        group.push(next);
        extend(next, &mut seen, &mut frontier);
    }

    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::assign_neighbors;
    use crate::config::{Bounds, SimulationConfig};
    use crate::generation::{generate_cells, generate_seed_points};
    use crate::region::{ActionTimer, RegionRates};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn build_regions(count: usize, seed: u64) -> Vec<Region> {
        let bounds = Bounds::from_size(400.0, 300.0);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let points = generate_seed_points(count, &bounds, &mut rng);
        let cells = generate_cells(&points, &bounds).unwrap();
        let rates = RegionRates::uniform(&SimulationConfig::default());
        let mut regions: Vec<Region> = cells
            .into_iter()
            .map(|c| Region::new(c.id, c.polygon, 10.0, 100.0, rates, ActionTimer::new(0.0)))
            .collect();
        assign_neighbors(&mut regions, 0.01);
        regions
    }

    #[test]
    fn test_every_region_assigned_once() {
        for seed in 0..5 {
            let mut regions = build_regions(60, seed);
            let mut registry = FactionRegistry::new();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let options = FormationOptions::for_region_count(60);

            form_factions(&mut regions, &mut registry, &options, &mut rng).unwrap();

            registry.verify(&regions, true).unwrap();
            let total: usize = registry.iter().map(|f| f.member_count()).sum();
            assert_eq!(total, 60);
            assert!(registry.len() <= options.target_count);
        }
    }

    #[test]
    fn test_target_clamped_to_reachable_groups() {
        let mut config = SimulationConfig::default();
        config.cell_count = 20;
        config.faction_count = 19;
        assert_eq!(FormationOptions::from(&config).target_count, 6);

        config.cell_count = 2;
        config.faction_count = 2;
        assert_eq!(FormationOptions::from(&config).target_count, 1);
    }

    #[test]
    fn test_oversized_target_does_not_blow_up_palette() {
        let mut regions = build_regions(20, 4);
        let mut registry = FactionRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let options = FormationOptions {
            target_count: usize::MAX,
            ..FormationOptions::for_region_count(20)
        };

        form_factions(&mut regions, &mut registry, &options, &mut rng).unwrap();

        registry.verify(&regions, true).unwrap();
        assert!(registry.len() <= 20 / options.min_size);
    }

    #[test]
    fn test_factions_meet_minimum_size() {
        let mut regions = build_regions(80, 3);
        let mut registry = FactionRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let options = FormationOptions::for_region_count(80);

        let report = form_factions(&mut regions, &mut registry, &options, &mut rng).unwrap();

        assert!(!report.single_faction_fallback);
        assert_eq!(report.grown.len(), registry.len());
        for faction in registry.iter() {
            assert!(faction.member_count() >= options.min_size);
        }
    }

    #[test]
    fn test_grown_group_is_contiguous() {
        let regions = build_regions(50, 9);
        let unassigned: BTreeSet<RegionId> = (0..50).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let group = grow_group(&regions, &unassigned, 0, 5, &mut rng);

        assert!(group.len() <= 5);
        for &member in &group[1..] {
            let touches = group.iter().any(|&other| other != member && regions[member].is_neighbor_of(other));
            assert!(touches, "region {} is detached from {:?}", member, group);
        }
    }

    #[test]
    fn test_too_few_regions_form_single_faction() {
        let mut regions = build_regions(2, 4);
        let mut registry = FactionRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        let report = form_factions(
            &mut regions,
            &mut registry,
            &FormationOptions::for_region_count(2),
            &mut rng,
        )
        .unwrap();

        assert!(report.single_faction_fallback);
        assert_eq!(registry.len(), 1);
        registry.verify(&regions, true).unwrap();
    }

    #[test]
    fn test_formation_deterministic() {
        let run = || {
            let mut regions = build_regions(40, 12);
            let mut registry = FactionRegistry::new();
            let mut rng = ChaCha8Rng::seed_from_u64(12);
            form_factions(&mut regions, &mut registry, &FormationOptions::for_region_count(40), &mut rng).unwrap();
            regions.iter().map(|r| r.faction()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
