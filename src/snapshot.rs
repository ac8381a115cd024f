//! Read-only view of the simulation returned by every tick
//!
//! Renderers and UI code consume these values; nothing in here refers back
//! into the live simulation.

use glam::DVec2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::faction::{FactionColor, FactionId, FactionOrigin};
use crate::region::RegionId;
use crate::simulation::transfer::{TransferId, TransferKind, TransferOutcome};
use crate::simulation::Timestamp;

/// Lifecycle stage of a simulation
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Seeds are still being relaxed
    Relaxing { iteration: usize, budget: usize },
    /// The partition is frozen and factions are active
    Running,
}

/// Something that happened during a tick or a command
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    /// Relaxation finished, regions and factions exist
    Stabilized {
        regions: usize,
        factions: usize,
        skipped_steps: usize,
    },
    TransferStarted {
        transfer: TransferId,
        kind: TransferKind,
        origin: RegionId,
        target: RegionId,
        amount: f64,
    },
    TransferSettled {
        transfer: TransferId,
        outcome: TransferOutcome,
    },
    /// A region changed owner through an attack
    Conquest {
        region: RegionId,
        from: Option<FactionId>,
        to: FactionId,
    },
    FactionFounded {
        faction: FactionId,
        origin: FactionOrigin,
        members: usize,
    },
    FactionDissolved { faction: FactionId },
}

/// Render data of one region
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RegionView {
    pub id: RegionId,
    pub polygon: Vec<DVec2>,
    pub centroid: DVec2,
    pub resource: f64,
    pub population_limit: f64,
    /// `None` while relaxing
    pub faction: Option<FactionId>,
    pub color: Option<FactionColor>,
}

/// Aggregate data of one faction
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FactionView {
    pub id: FactionId,
    pub color: FactionColor,
    pub origin: FactionOrigin,
    /// Member region ids, ascending
    pub members: Vec<RegionId>,
    pub member_count: usize,
    /// Sum of member resources
    pub total_resource: f64,
    /// Fraction of all regions held by this faction
    pub share: f64,
}

/// An in-flight (or recently settled) transfer
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TransferView {
    pub id: TransferId,
    pub kind: TransferKind,
    pub origin: RegionId,
    pub target: RegionId,
    /// Origin centroid
    pub from: DVec2,
    /// Target centroid
    pub to: DVec2,
    /// Travel progress in `[0, 1]`
    pub progress: f64,
    pub amount: f64,
    pub settled: bool,
}

impl TransferView {
    /// Current position along the straight line between the centroids
    #[inline]
    pub fn position(&self) -> DVec2 {
        self.from.lerp(self.to, self.progress)
    }
}

/// Full state of a simulation at one timestamp
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub now: Timestamp,
    pub stage: Stage,
    pub regions: Vec<RegionView>,
    /// Live factions in id order
    pub factions: Vec<FactionView>,
    pub transfers: Vec<TransferView>,
    /// Events since the previous snapshot, in order
    pub events: Vec<SimulationEvent>,
}

impl Snapshot {
    #[inline]
    pub fn is_running(&self) -> bool {
        self.stage == Stage::Running
    }

    pub fn faction(&self, id: FactionId) -> Option<&FactionView> {
        self.factions.iter().find(|f| f.id == id)
    }

    /// Sum of every region's resource
    pub fn total_resource(&self) -> f64 {
        self.regions.iter().map(|r| r.resource).sum()
    }

    /// Faction holding the most regions (ties go to the lowest id)
    pub fn largest_faction(&self) -> Option<&FactionView> {
        self.factions
            .iter()
            .max_by(|a, b| a.member_count.cmp(&b.member_count).then(b.id.cmp(&a.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faction(id: u32, members: Vec<RegionId>) -> FactionView {
        FactionView {
            id: FactionId(id),
            color: [1.0; 4],
            origin: FactionOrigin::Formation,
            member_count: members.len(),
            members,
            total_resource: 0.0,
            share: 0.0,
        }
    }

    #[test]
    fn test_transfer_position_interpolates() {
        let view = TransferView {
            id: TransferId(0),
            kind: TransferKind::Give,
            origin: 0,
            target: 1,
            from: DVec2::ZERO,
            to: DVec2::new(10.0, 4.0),
            progress: 0.5,
            amount: 1.0,
            settled: false,
        };
        assert_eq!(view.position(), DVec2::new(5.0, 2.0));
    }

    #[test]
    fn test_largest_faction_tie_break() {
        let snapshot = Snapshot {
            now: 0.0,
            stage: Stage::Running,
            regions: Vec::new(),
            factions: vec![faction(0, vec![0, 1]), faction(1, vec![2, 3]), faction(2, vec![4])],
            transfers: Vec::new(),
            events: Vec::new(),
        };
        assert_eq!(snapshot.largest_faction().map(|f| f.id), Some(FactionId(0)));
        assert!(snapshot.faction(FactionId(2)).is_some());
        assert!(snapshot.faction(FactionId(7)).is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_snapshot_serialization() {
        use crate::{Simulation, SimulationConfigBuilder};

        let config = SimulationConfigBuilder::new()
            .seed(3)
            .cell_count(12)
            .unwrap()
            .relaxation_iterations(2)
            .build()
            .unwrap();
        let mut simulation = Simulation::generate(config).unwrap();
        let snapshot = simulation.tick(10.0).unwrap();

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.regions.len(), snapshot.regions.len());
        assert_eq!(restored.stage, snapshot.stage);
        for (a, b) in restored.factions.iter().zip(&snapshot.factions) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.members, b.members);
        }
        assert_eq!(restored.events.len(), snapshot.events.len());
    }
}
