//! Factions and the registry that owns them
//!
//! The registry is the only place where region ownership changes. Each
//! faction keeps a member set and each region keeps its faction id; every
//! mutation goes through [`FactionRegistry`] so both sides stay in sync.

mod colors;
mod formation;

pub use colors::{distinct_palette, hsl_to_rgba, hue_of, random_color, FactionColor};
pub use formation::{form_factions, FormationOptions, FormationReport};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, TerritoryError};
use crate::region::{Region, RegionId};

/// Faction identifier; never reused within one simulation
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FactionId(pub u32);

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// How a faction came to exist
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactionOrigin {
    /// Created by initial formation
    Formation,
    /// Created by a found-faction command
    Command,
    /// Split off by a mutation policy
    Mutation,
}

/// A colored group of regions under common control
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Faction {
    pub id: FactionId,
    pub color: FactionColor,
    pub origin: FactionOrigin,
    members: BTreeSet<RegionId>,
}

impl Faction {
    #[inline]
    pub fn members(&self) -> &BTreeSet<RegionId> {
        &self.members
    }

    #[inline]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn contains(&self, region: RegionId) -> bool {
        self.members.contains(&region)
    }
}

/// Owner of every faction and of region membership
#[derive(Debug, Clone, Default)]
pub struct FactionRegistry {
    factions: BTreeMap<FactionId, Faction>,
    next_id: u32,
}

impl FactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live factions
    #[inline]
    pub fn len(&self) -> usize {
        self.factions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.factions.is_empty()
    }

    #[inline]
    pub fn get(&self, id: FactionId) -> Option<&Faction> {
        self.factions.get(&id)
    }

    #[inline]
    pub fn contains(&self, id: FactionId) -> bool {
        self.factions.contains_key(&id)
    }

    /// Live factions in id order
    pub fn iter(&self) -> impl Iterator<Item = &Faction> {
        self.factions.values()
    }

    pub fn ids(&self) -> Vec<FactionId> {
        self.factions.keys().copied().collect()
    }

    /// Sum of member resources
    pub fn aggregate_resource(&self, regions: &[Region], id: FactionId) -> Result<f64> {
        let faction = self.get(id).ok_or(TerritoryError::FactionNotFound(id))?;
        Ok(faction
            .members
            .iter()
            .filter_map(|&r| regions.get(r))
            .map(Region::resource)
            .sum())
    }

    /// Create a faction owning `members`
    ///
    /// Every member must currently be unowned. Used by formation, where the
    /// members come straight from the unassigned pool.
    pub fn create_faction(
        &mut self,
        regions: &mut [Region],
        members: &[RegionId],
        color: FactionColor,
        origin: FactionOrigin,
    ) -> Result<FactionId> {
        if members.is_empty() {
            return Err(TerritoryError::InvalidCommand(
                "a faction needs at least one region".to_string(),
            ));
        }
        for &region in members {
            let owner = regions
                .get(region)
                .ok_or(TerritoryError::RegionNotFound(region))?
                .faction;
            if let Some(owner) = owner {
                return Err(TerritoryError::MembershipConflict(format!(
                    "region {} already belongs to {}",
                    region, owner
                )));
            }
        }

        let id = self.allocate(color, origin);
        for &region in members {
            self.attach(regions, id, region);
        }
        Ok(id)
    }

    /// Insert an unowned region into a faction
    ///
    /// # Errors
    ///
    /// `MembershipConflict` if the region already has a faction.
    pub fn add_region(&mut self, regions: &mut [Region], faction: FactionId, region: RegionId) -> Result<()> {
        if !self.contains(faction) {
            return Err(TerritoryError::FactionNotFound(faction));
        }
        let current = regions
            .get(region)
            .ok_or(TerritoryError::RegionNotFound(region))?
            .faction;
        if let Some(owner) = current {
            return Err(TerritoryError::MembershipConflict(format!(
                "region {} already belongs to {}",
                region, owner
            )));
        }
        self.attach(regions, faction, region);
        Ok(())
    }

    /// Remove a region from a faction, dissolving the faction if it empties
    ///
    /// Returns `true` when the faction was dissolved. The region is left
    /// unowned; callers outside the registry should prefer [`Self::reassign`].
    pub fn remove_region(&mut self, regions: &mut [Region], faction: FactionId, region: RegionId) -> Result<bool> {
        let entry = self
            .factions
            .get_mut(&faction)
            .ok_or(TerritoryError::FactionNotFound(faction))?;
        let slot = regions.get_mut(region).ok_or(TerritoryError::RegionNotFound(region))?;
        if !entry.members.remove(&region) {
            return Err(TerritoryError::MembershipConflict(format!(
                "region {} is not a member of {}",
                region, faction
            )));
        }
        slot.faction = None;

        Ok(self.dissolve_if_empty(faction))
    }

    /// Move a region into `to` as one transaction
    ///
    /// Returns the faction dissolved by the move, if any. Moving a region
    /// into the faction it already belongs to is a no-op.
    pub fn reassign(&mut self, regions: &mut [Region], region: RegionId, to: FactionId) -> Result<Option<FactionId>> {
        if !self.contains(to) {
            return Err(TerritoryError::FactionNotFound(to));
        }
        let from = regions
            .get(region)
            .ok_or(TerritoryError::RegionNotFound(region))?
            .faction;

        match from {
            Some(from) if from == to => Ok(None),
            Some(from) => {
                let dissolved = self.remove_region(regions, from, region)?;
                self.attach(regions, to, region);
                Ok(dissolved.then_some(from))
            }
            None => {
                self.attach(regions, to, region);
                Ok(None)
            }
        }
    }

    /// Found a new faction from `region_set`
    ///
    /// Every region leaves its current faction (empty factions are
    /// dissolved), joins the new one, and gains `bonus` resources. Input is
    /// validated before anything changes.
    ///
    /// Returns the new faction and the factions dissolved along the way.
    pub fn found_faction(
        &mut self,
        regions: &mut [Region],
        region_set: &BTreeSet<RegionId>,
        bonus: f64,
        color: FactionColor,
        origin: FactionOrigin,
    ) -> Result<(FactionId, Vec<FactionId>)> {
        Self::check_founding(regions, region_set, bonus)?;

        let id = self.allocate(color, origin);
        let mut dissolved = Vec::new();
        for &region in region_set {
            if let Some(old) = self.reassign(regions, region, id)? {
                dissolved.push(old);
            }
            regions[region].add_resource(bonus);
        }

        tracing::debug!(
            "Founded {} with {} regions, dissolved {:?}",
            id,
            region_set.len(),
            dissolved
        );
        Ok((id, dissolved))
    }

    /// Validate a found-faction request without changing anything
    pub fn check_founding(regions: &[Region], region_set: &BTreeSet<RegionId>, bonus: f64) -> Result<()> {
        if region_set.is_empty() {
            return Err(TerritoryError::InvalidCommand(
                "cannot found a faction from an empty region set".to_string(),
            ));
        }
        if !bonus.is_finite() || bonus < 0.0 {
            return Err(TerritoryError::InvalidCommand(format!(
                "bonus must be a non-negative number (got {})",
                bonus
            )));
        }
        if let Some(&missing) = region_set.iter().find(|&&r| r >= regions.len()) {
            return Err(TerritoryError::InvalidCommand(format!(
                "region {} does not exist",
                missing
            )));
        }
        Ok(())
    }

    /// Check membership consistency from both sides
    ///
    /// Verifies that every region is owned by exactly the faction whose
    /// member set contains it, that no member set overlaps another, and that
    /// no empty faction is registered. With `require_owner`, unowned regions
    /// are an error too.
    pub fn verify(&self, regions: &[Region], require_owner: bool) -> Result<()> {
        let mut seen = vec![None; regions.len()];
        for faction in self.factions.values() {
            if faction.members.is_empty() {
                return Err(TerritoryError::MembershipConflict(format!(
                    "{} has no members",
                    faction.id
                )));
            }
            for &member in &faction.members {
                let slot = seen.get_mut(member).ok_or(TerritoryError::RegionNotFound(member))?;
                if let Some(other) = slot.replace(faction.id) {
                    return Err(TerritoryError::MembershipConflict(format!(
                        "region {} listed by {} and {}",
                        member, other, faction.id
                    )));
                }
            }
        }
        for (region, owner) in regions.iter().zip(&seen) {
            if region.faction != *owner {
                return Err(TerritoryError::MembershipConflict(format!(
                    "region {} points at {:?} but is listed by {:?}",
                    region.id, region.faction, owner
                )));
            }
            if require_owner && owner.is_none() {
                return Err(TerritoryError::MembershipConflict(format!(
                    "region {} has no faction",
                    region.id
                )));
            }
        }
        Ok(())
    }

    fn allocate(&mut self, color: FactionColor, origin: FactionOrigin) -> FactionId {
        let id = FactionId(self.next_id);
        self.next_id += 1;
        self.factions.insert(
            id,
            Faction {
                id,
                color,
                origin,
                members: BTreeSet::new(),
            },
        );
        id
    }

    /// Link an unowned region and an existing faction on both sides
    fn attach(&mut self, regions: &mut [Region], faction: FactionId, region: RegionId) {
        if let Some(entry) = self.factions.get_mut(&faction) {
            entry.members.insert(region);
            regions[region].faction = Some(faction);
        }
    }

    fn dissolve_if_empty(&mut self, faction: FactionId) -> bool {
        let empty = self
            .factions
            .get(&faction)
            .map(|f| f.members.is_empty())
            .unwrap_or(false);
        if empty {
            self.factions.remove(&faction);
            tracing::debug!("Dissolved {}", faction);
        }
        empty
    }
}
