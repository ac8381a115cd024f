//! In-flight resource transfers and their settlement
//!
//! A transfer carries an amount that was already deducted from its origin.
//! It settles exactly once, after its duration has elapsed, against the
//! faction membership that is current at settlement time.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::faction::{FactionId, FactionRegistry};
use crate::region::{Region, RegionId};

use super::Timestamp;

/// Transfer identifier, increasing in creation order
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransferId(pub u64);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Give,
    Attack,
}

/// What a settlement did to its target
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferOutcome {
    /// Give reached a region of the same faction
    Delivered,
    /// Give arrived after origin and target stopped sharing a faction
    Forfeited,
    /// Attack reduced the target, which keeps its owner
    Damaged { remaining: f64 },
    /// Attack drove the target to zero or below and it changed owner
    Conquered {
        from: Option<FactionId>,
        to: FactionId,
        /// Old faction, if the conquest emptied it
        dissolved: Option<FactionId>,
    },
}

/// A timed resource movement between two regions
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub id: TransferId,
    pub origin: RegionId,
    pub target: RegionId,
    /// Fixed at creation
    pub amount: f64,
    pub kind: TransferKind,
    pub start_time: Timestamp,
    pub duration: f64,
    settled_at: Option<Timestamp>,
    outcome: Option<TransferOutcome>,
}

impl Transfer {
    pub fn new(
        id: TransferId,
        origin: RegionId,
        target: RegionId,
        amount: f64,
        kind: TransferKind,
        start_time: Timestamp,
        duration: f64,
    ) -> Self {
        Self {
            id,
            origin,
            target,
            amount,
            kind,
            start_time,
            duration,
            settled_at: None,
            outcome: None,
        }
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.settled_at.is_some()
    }

    #[inline]
    pub fn settled_at(&self) -> Option<Timestamp> {
        self.settled_at
    }

    #[inline]
    pub fn outcome(&self) -> Option<TransferOutcome> {
        self.outcome
    }

    /// Whether the transfer has arrived and is still waiting to settle
    #[inline]
    pub fn is_due(&self, now: Timestamp) -> bool {
        !self.is_settled() && now - self.start_time >= self.duration
    }

    /// Travel progress in `[0, 1]`
    pub fn progress(&self, now: Timestamp) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start_time) / self.duration).clamp(0.0, 1.0)
    }

    /// Apply the transfer to its target
    ///
    /// Returns `None` if the transfer is not due or was already settled, so
    /// calling this every tick applies the effect exactly once.
    pub fn settle(
        &mut self,
        regions: &mut [Region],
        registry: &mut FactionRegistry,
        now: Timestamp,
    ) -> Option<TransferOutcome> {
        if !self.is_due(now) || self.target >= regions.len() || self.origin >= regions.len() {
            return None;
        }

        let origin_faction = regions[self.origin].faction;
        let target_faction = regions[self.target].faction;

        let outcome = match self.kind {
            TransferKind::Give => {
                if origin_faction.is_some() && origin_faction == target_faction {
                    regions[self.target].add_resource(self.amount);
                    TransferOutcome::Delivered
                } else {
                    TransferOutcome::Forfeited
                }
            }
            TransferKind::Attack => {
                let result = regions[self.target].resource - self.amount;
                regions[self.target].resource = result.abs();
                match origin_faction {
                    Some(to) if result <= 0.0 && target_faction != Some(to) => {
                        match registry.reassign(regions, self.target, to) {
                            Ok(dissolved) => TransferOutcome::Conquered {
                                from: target_faction,
                                to,
                                dissolved,
                            },
                            Err(e) => {
                                tracing::warn!("[Transfer] {} conquest rejected: {}", self.id, e);
                                TransferOutcome::Damaged {
                                    remaining: result.abs(),
                                }
                            }
                        }
                    }
                    _ => TransferOutcome::Damaged {
                        remaining: result.abs(),
                    },
                }
            }
        };

        tracing::debug!(
            "[Transfer] {} {:?} {} -> {} ({:.2}) settled: {:?}",
            self.id,
            self.kind,
            self.origin,
            self.target,
            self.amount,
            outcome
        );

        self.settled_at = Some(now);
        self.outcome = Some(outcome);
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::faction::FactionOrigin;
    use crate::region::{ActionTimer, RegionRates};
    use glam::DVec2;

    const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
    const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

    fn regions(resources: &[f64]) -> Vec<Region> {
        let rates = RegionRates::uniform(&SimulationConfig::default());
        resources
            .iter()
            .enumerate()
            .map(|(i, &resource)| {
                let x = i as f64;
                Region::new(
                    i,
                    vec![
                        DVec2::new(x, 0.0),
                        DVec2::new(x + 1.0, 0.0),
                        DVec2::new(x + 1.0, 1.0),
                        DVec2::new(x, 1.0),
                    ],
                    resource,
                    1000.0,
                    rates,
                    ActionTimer::new(0.0),
                )
            })
            .collect()
    }

    fn attack(origin: RegionId, target: RegionId, amount: f64) -> Transfer {
        Transfer::new(TransferId(0), origin, target, amount, TransferKind::Attack, 0.0, 1.0)
    }

    #[test]
    fn test_not_due_before_duration() {
        let mut regions = regions(&[10.0, 10.0]);
        let mut registry = FactionRegistry::new();
        let mut transfer = Transfer::new(TransferId(1), 0, 1, 5.0, TransferKind::Give, 2.0, 1.0);

        assert_eq!(transfer.progress(2.5), 0.5);
        assert!(transfer.settle(&mut regions, &mut registry, 2.9).is_none());
        assert!(!transfer.is_settled());
        assert_eq!(regions[1].resource(), 10.0);
    }

    #[test]
    fn test_give_within_faction_delivers_once() {
        let mut regions = regions(&[30.0, 50.0]);
        let mut registry = FactionRegistry::new();
        registry
            .create_faction(&mut regions, &[0, 1], RED, FactionOrigin::Formation)
            .unwrap();
        let mut transfer = Transfer::new(TransferId(1), 0, 1, 10.0, TransferKind::Give, 0.0, 1.0);

        assert_eq!(
            transfer.settle(&mut regions, &mut registry, 1.0),
            Some(TransferOutcome::Delivered)
        );
        assert_eq!(transfer.settle(&mut regions, &mut registry, 2.0), None);
        assert_eq!(regions[1].resource(), 60.0);
        assert_eq!(transfer.settled_at(), Some(1.0));
    }

    #[test]
    fn test_give_across_factions_is_forfeited() {
        let mut regions = regions(&[30.0, 50.0]);
        let mut registry = FactionRegistry::new();
        registry
            .create_faction(&mut regions, &[0], RED, FactionOrigin::Formation)
            .unwrap();
        registry
            .create_faction(&mut regions, &[1], BLUE, FactionOrigin::Formation)
            .unwrap();
        let mut transfer = Transfer::new(TransferId(1), 0, 1, 10.0, TransferKind::Give, 0.0, 1.0);

        assert_eq!(
            transfer.settle(&mut regions, &mut registry, 1.0),
            Some(TransferOutcome::Forfeited)
        );
        assert_eq!(regions[1].resource(), 50.0);
    }

    #[test]
    fn test_attack_damages_without_conquest() {
        let mut regions = regions(&[20.0, 12.0]);
        let mut registry = FactionRegistry::new();
        registry
            .create_faction(&mut regions, &[0], RED, FactionOrigin::Formation)
            .unwrap();
        let b = registry
            .create_faction(&mut regions, &[1], BLUE, FactionOrigin::Formation)
            .unwrap();

        let outcome = attack(0, 1, 8.0).settle(&mut regions, &mut registry, 1.0);

        assert_eq!(outcome, Some(TransferOutcome::Damaged { remaining: 4.0 }));
        assert_eq!(regions[1].faction(), Some(b));
    }

    #[test]
    fn test_attack_conquers_and_dissolves() {
        let mut regions = regions(&[20.0, 5.0]);
        let mut registry = FactionRegistry::new();
        let a = registry
            .create_faction(&mut regions, &[0], RED, FactionOrigin::Formation)
            .unwrap();
        let b = registry
            .create_faction(&mut regions, &[1], BLUE, FactionOrigin::Formation)
            .unwrap();

        let outcome = attack(0, 1, 8.0).settle(&mut regions, &mut registry, 1.0);

        assert_eq!(
            outcome,
            Some(TransferOutcome::Conquered {
                from: Some(b),
                to: a,
                dissolved: Some(b),
            })
        );
        assert_eq!(regions[1].resource(), 3.0);
        assert_eq!(regions[1].faction(), Some(a));
        assert!(!registry.contains(b));
        registry.verify(&regions, true).unwrap();
    }

    #[test]
    fn test_attack_uses_live_origin_faction() {
        let mut regions = regions(&[20.0, 5.0, 40.0]);
        let mut registry = FactionRegistry::new();
        registry
            .create_faction(&mut regions, &[0], RED, FactionOrigin::Formation)
            .unwrap();
        let b = registry
            .create_faction(&mut regions, &[1], BLUE, FactionOrigin::Formation)
            .unwrap();
        let c = registry
            .create_faction(&mut regions, &[2], BLUE, FactionOrigin::Formation)
            .unwrap();
        let mut transfer = attack(0, 1, 6.0);

        // origin is conquered while the attack is in flight
        registry.reassign(&mut regions, 0, c).unwrap();
        let outcome = transfer.settle(&mut regions, &mut registry, 1.0);

        assert_eq!(
            outcome,
            Some(TransferOutcome::Conquered {
                from: Some(b),
                to: c,
                dissolved: Some(b),
            })
        );
        assert_eq!(registry.get(c).unwrap().member_count(), 3);
    }

    #[test]
    fn test_attack_on_own_faction_never_conquers() {
        let mut regions = regions(&[20.0, 5.0]);
        let mut registry = FactionRegistry::new();
        let a = registry
            .create_faction(&mut regions, &[0, 1], RED, FactionOrigin::Formation)
            .unwrap();

        let outcome = attack(0, 1, 8.0).settle(&mut regions, &mut registry, 1.0);

        assert_eq!(outcome, Some(TransferOutcome::Damaged { remaining: 3.0 }));
        assert_eq!(regions[1].faction(), Some(a));
    }
}
