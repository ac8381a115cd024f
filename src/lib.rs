//! Voronoi territory simulation
//!
//! A rectangle is partitioned into Voronoi regions by a bounded Lloyd
//! relaxation, the regions are grouped into contiguous factions, and each
//! tick regions grow, give resources to friends and attack enemies until
//! conquest redraws the map.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use voronoi_territory::*;
//!
//! let config = SimulationConfigBuilder::new()
//!     .seed(42)
//!     .cell_count(100)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! // Relax one step per tick, as a renderer would
//! let mut simulation = Simulation::new(config).unwrap();
//! let mut now = 0.0;
//! loop {
//!     let snapshot = simulation.tick(now).unwrap();
//!     if snapshot.is_running() && now > 60.0 {
//!         for faction in &snapshot.factions {
//!             println!("{}: {:.0}% of the map", faction.id, faction.share * 100.0);
//!         }
//!         break;
//!     }
//!     now += 1.0 / 60.0;
//! }
//! ```
//!
//! # Features
//!
//! - `spatial-index` (default): KD-tree lookup of the candidate region in `point_in_region`
//! - `serde`: serialization of configuration, snapshots and events

// Modules
pub mod error;
pub mod config;
pub mod geometry;
pub mod generation;
pub mod region;
pub mod adjacency;
pub mod faction;
pub mod simulation;
pub mod snapshot;

#[cfg(feature = "spatial-index")]
pub mod spatial;

// Re-export core types for convenience
pub use error::{TerritoryError, Result};
pub use config::{AggressionPolicy, Bounds, RateRange, SimulationConfig, SimulationConfigBuilder};
pub use region::{ActionTimer, Region, RegionId, RegionRates};
pub use faction::{Faction, FactionColor, FactionId, FactionOrigin, FactionRegistry};
pub use simulation::{Simulation, Timestamp, World};
pub use simulation::actor::Action;
pub use simulation::mutation::{MutationPolicy, NoMutation, Secession};
pub use simulation::transfer::{Transfer, TransferId, TransferKind, TransferOutcome};
pub use snapshot::{FactionView, RegionView, SimulationEvent, Snapshot, Stage, TransferView};
pub use generation::{LloydOptions, RawCell, Relaxation, RelaxationState};

#[cfg(feature = "spatial-index")]
pub use spatial::SpatialIndex;

// Re-export glam::DVec2 for convenience
pub use glam::DVec2;
