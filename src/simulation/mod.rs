//! Simulation driver
//!
//! [`Simulation`] owns every piece of mutable state: the relaxation while the
//! partition is forming, then the frozen regions, the faction registry and
//! the in-flight transfers. It is advanced by [`Simulation::tick`] with a
//! caller-supplied timestamp and never reads a clock itself.

pub mod actor;
pub mod mutation;
pub mod transfer;

use std::collections::BTreeSet;

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::adjacency::assign_neighbors;
use crate::config::SimulationConfig;
use crate::error::{Result, TerritoryError};
use crate::faction::{form_factions, random_color, FactionId, FactionOrigin, FactionRegistry, FormationOptions};
use crate::generation::{LloydOptions, RawCell, Relaxation};
use crate::region::{ActionTimer, Region, RegionId, RegionRates};
use crate::snapshot::{FactionView, RegionView, SimulationEvent, Snapshot, Stage, TransferView};

#[cfg(feature = "spatial-index")]
use crate::spatial::SpatialIndex;

use mutation::{MutationPolicy, NoMutation};
use transfer::{Transfer, TransferId, TransferOutcome};

/// Simulated time in seconds
pub type Timestamp = f64;

/// Shared inputs of the per-tick phases
pub(crate) struct TickContext<'a> {
    pub config: &'a SimulationConfig,
    pub rng: &'a mut ChaCha8Rng,
    pub now: Timestamp,
}

/// The frozen territory and everything that changes on it
#[derive(Debug, Clone)]
pub struct World {
    regions: Vec<Region>,
    registry: FactionRegistry,
    transfers: Vec<Transfer>,
    next_transfer_id: u64,
    /// Final seed positions, indexed by region id
    seeds: Vec<DVec2>,
    #[cfg(feature = "spatial-index")]
    spatial_index: SpatialIndex,
}

impl World {
    /// Freeze relaxed cells into regions and form the initial factions
    fn build(
        cells: &[RawCell],
        seeds: &[DVec2],
        ctx: &mut TickContext<'_>,
        events: &mut Vec<SimulationEvent>,
    ) -> Result<Self> {
        let config = ctx.config;
        let jitter = config.population_limit_jitter;

        let mut regions: Vec<Region> = cells
            .iter()
            .map(|cell| {
                let limit = config.population_limit * ctx.rng.gen_range(1.0 - jitter..=1.0 + jitter);
                let resource = config.initial_resource.sample(ctx.rng).min(limit);
                let rates = RegionRates::sample(config, ctx.rng);
                let timer = ActionTimer::new(ctx.now + config.sample_action_interval(ctx.rng));
                Region::new(cell.id, cell.polygon.clone(), resource, limit, rates, timer)
            })
            .collect();

        assign_neighbors(&mut regions, config.adjacency_tolerance);

        let mut registry = FactionRegistry::new();
        form_factions(&mut regions, &mut registry, &FormationOptions::from(config), ctx.rng)?;
        for faction in registry.iter() {
            events.push(SimulationEvent::FactionFounded {
                faction: faction.id,
                origin: faction.origin,
                members: faction.member_count(),
            });
        }

        Ok(Self {
            #[cfg(feature = "spatial-index")]
            spatial_index: SpatialIndex::new(seeds),
            seeds: seeds.to_vec(),
            regions,
            registry,
            transfers: Vec::new(),
            next_transfer_id: 0,
        })
    }

    #[inline]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    #[inline]
    pub fn registry(&self) -> &FactionRegistry {
        &self.registry
    }

    /// Transfers in flight or inside their display hold, in creation order
    #[inline]
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    #[inline]
    pub fn seeds(&self) -> &[DVec2] {
        &self.seeds
    }

    /// Highest resource of any region
    pub fn global_max_resource(&self) -> f64 {
        self.regions.iter().map(Region::resource).fold(0.0, f64::max)
    }

    /// Run growth, decisions, settlement and pruning for one tick
    fn advance(
        &mut self,
        ctx: &mut TickContext<'_>,
        mutation: &mut dyn MutationPolicy,
        events: &mut Vec<SimulationEvent>,
    ) {
        let due: Vec<RegionId> = self
            .regions
            .iter()
            .filter(|r| r.timer.is_due(ctx.now))
            .map(|r| r.id)
            .collect();

        let global_max = self.global_max_resource();
        for &id in &due {
            actor::grow(&mut self.regions[id], global_max);
        }
        for &id in &due {
            self.act(ctx, mutation, id, global_max, events);
        }

        self.settle_transfers(ctx.now, events);
        self.prune_transfers(ctx.now, ctx.config.scaled_display_hold());

        debug_assert!(self.registry.verify(&self.regions, true).is_ok());
    }

    fn act(
        &mut self,
        ctx: &mut TickContext<'_>,
        mutation: &mut dyn MutationPolicy,
        id: RegionId,
        global_max: f64,
        events: &mut Vec<SimulationEvent>,
    ) {
        if let Some(set) = mutation.propose(&self.regions, id, &mut *ctx.rng) {
            let color = random_color(ctx.rng);
            match self
                .registry
                .found_faction(&mut self.regions, &set, 0.0, color, FactionOrigin::Mutation)
            {
                Ok((faction, dissolved)) => {
                    push_founded(events, faction, FactionOrigin::Mutation, set.len(), dissolved);
                }
                Err(e) => tracing::warn!("[Mutation] Region {} proposal rejected: {}", id, e),
            }
        } else {
            let action = actor::decide(&self.regions, id, global_max, ctx.config.aggression, ctx.rng);
            if let Some((target, amount, kind)) = action.transfer() {
                self.regions[id].add_resource(-amount);
                let transfer = Transfer::new(
                    TransferId(self.next_transfer_id),
                    id,
                    target,
                    amount,
                    kind,
                    ctx.now,
                    ctx.config.scaled_transfer_duration(),
                );
                self.next_transfer_id += 1;
                events.push(SimulationEvent::TransferStarted {
                    transfer: transfer.id,
                    kind,
                    origin: id,
                    target,
                    amount,
                });
                self.transfers.push(transfer);
            }
        }

        let interval = ctx.config.sample_action_interval(ctx.rng);
        self.regions[id].timer.reschedule(ctx.now, interval);
    }

    fn settle_transfers(&mut self, now: Timestamp, events: &mut Vec<SimulationEvent>) {
        for transfer in &mut self.transfers {
            let Some(outcome) = transfer.settle(&mut self.regions, &mut self.registry, now) else {
                continue;
            };
            events.push(SimulationEvent::TransferSettled {
                transfer: transfer.id,
                outcome,
            });
            if let TransferOutcome::Conquered { from, to, dissolved } = outcome {
                events.push(SimulationEvent::Conquest {
                    region: transfer.target,
                    from,
                    to,
                });
                if let Some(faction) = dissolved {
                    events.push(SimulationEvent::FactionDissolved { faction });
                }
            }
        }
    }

    fn prune_transfers(&mut self, now: Timestamp, hold: f64) {
        self.transfers
            .retain(|t| t.settled_at().map_or(true, |at| now - at <= hold));
    }

    /// Region containing `point`, by ray crossing
    ///
    /// Polygon edges are half-open, so a point on the maximum edges of the
    /// bounds is claimed by no polygon. See [`World::nearest_region`].
    pub fn point_in_region(&self, point: DVec2) -> Option<RegionId> {
        #[cfg(feature = "spatial-index")]
        if let Some(candidate) = self.spatial_index.find_nearest(point) {
            if self.regions[candidate].contains_point(point) {
                return Some(candidate);
            }
        }
        self.regions
            .iter()
            .find(|r| r.contains_point(point))
            .map(|r| r.id)
    }

    /// Region whose seed is closest to `point`
    pub fn nearest_region(&self, point: DVec2) -> Option<RegionId> {
        #[cfg(feature = "spatial-index")]
        {
            self.spatial_index.find_nearest(point)
        }
        #[cfg(not(feature = "spatial-index"))]
        {
            self.seeds
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.distance_squared(point).total_cmp(&b.distance_squared(point)))
                .map(|(id, _)| id)
        }
    }

    fn region_views(&self) -> Vec<RegionView> {
        self.regions
            .iter()
            .map(|r| RegionView {
                id: r.id,
                polygon: r.polygon().to_vec(),
                centroid: r.centroid(),
                resource: r.resource(),
                population_limit: r.population_limit(),
                faction: r.faction(),
                color: r.faction().and_then(|f| self.registry.get(f)).map(|f| f.color),
            })
            .collect()
    }

    fn faction_views(&self) -> Vec<FactionView> {
        let region_count = self.regions.len().max(1) as f64;
        self.registry
            .iter()
            .map(|f| FactionView {
                id: f.id,
                color: f.color,
                origin: f.origin,
                members: f.members().iter().copied().collect(),
                member_count: f.member_count(),
                total_resource: self.registry.aggregate_resource(&self.regions, f.id).unwrap_or(0.0),
                share: f.member_count() as f64 / region_count,
            })
            .collect()
    }

    fn transfer_views(&self, now: Timestamp) -> Vec<TransferView> {
        self.transfers
            .iter()
            .map(|t| TransferView {
                id: t.id,
                kind: t.kind,
                origin: t.origin,
                target: t.target,
                from: self.regions[t.origin].centroid(),
                to: self.regions[t.target].centroid(),
                progress: t.progress(now),
                amount: t.amount,
                settled: t.is_settled(),
            })
            .collect()
    }
}

#[derive(Debug)]
enum Phase {
    Relaxing(Relaxation),
    Running(World),
}

/// A deterministic territory simulation
///
/// # Examples
///
/// ```
/// use voronoi_territory::*;
///
/// let config = SimulationConfigBuilder::new()
///     .seed(42)
///     .cell_count(40)
///     .unwrap()
///     .relaxation_iterations(10)
///     .build()
///     .unwrap();
///
/// let mut simulation = Simulation::generate(config).unwrap();
/// assert!(simulation.is_stabilized());
///
/// let snapshot = simulation.tick(12.0).unwrap();
/// assert_eq!(snapshot.regions.len(), 40);
/// assert!(snapshot.regions.iter().all(|r| r.faction.is_some()));
/// ```
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    rng: ChaCha8Rng,
    phase: Phase,
    last_tick: Option<Timestamp>,
    mutation: Box<dyn MutationPolicy>,
    /// Events not yet handed out in a snapshot
    pending_events: Vec<SimulationEvent>,
}

impl Simulation {
    /// Create a simulation that relaxes one step per tick
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a config that fails validation, `GenerationFailed`
    /// if no initial tessellation can be built.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let relaxation = Relaxation::new(config.cell_count, config.bounds, LloydOptions::from(&config), &mut rng)?;

        tracing::info!(
            "Simulation created: {} regions, seed {}, {} relaxation steps",
            config.cell_count,
            config.seed,
            config.relaxation_iterations
        );

        Ok(Self {
            config,
            rng,
            phase: Phase::Relaxing(relaxation),
            last_tick: None,
            mutation: Box::new(NoMutation),
            pending_events: Vec::new(),
        })
    }

    /// Create a simulation and run the whole relaxation budget at time 0
    pub fn generate(config: SimulationConfig) -> Result<Self> {
        let mut simulation = Self::new(config)?;
        if let Phase::Relaxing(relaxation) = &mut simulation.phase {
            relaxation.run_to_completion(&mut simulation.rng);
        }
        simulation.stabilize(0.0)?;
        simulation.last_tick = Some(0.0);
        Ok(simulation)
    }

    /// Replace the mutation policy
    pub fn with_mutation_policy<P: MutationPolicy + 'static>(mut self, policy: P) -> Self {
        self.mutation = Box::new(policy);
        self
    }

    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn stage(&self) -> Stage {
        match &self.phase {
            Phase::Relaxing(relaxation) => Stage::Relaxing {
                iteration: relaxation.iteration(),
                budget: relaxation.budget(),
            },
            Phase::Running(_) => Stage::Running,
        }
    }

    #[inline]
    pub fn is_stabilized(&self) -> bool {
        matches!(self.phase, Phase::Running(_))
    }

    /// Timestamp of the latest tick
    #[inline]
    pub fn last_tick(&self) -> Option<Timestamp> {
        self.last_tick
    }

    /// The relaxation in progress, while relaxing
    pub fn relaxation(&self) -> Option<&Relaxation> {
        match &self.phase {
            Phase::Relaxing(relaxation) => Some(relaxation),
            Phase::Running(_) => None,
        }
    }

    /// The frozen territory, once stabilized
    pub fn world(&self) -> Option<&World> {
        match &self.phase {
            Phase::Relaxing(_) => None,
            Phase::Running(world) => Some(world),
        }
    }

    /// Frozen regions (empty while relaxing)
    pub fn regions(&self) -> &[Region] {
        self.world().map(World::regions).unwrap_or(&[])
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions().get(id)
    }

    pub fn registry(&self) -> Option<&FactionRegistry> {
        self.world().map(World::registry)
    }

    /// Advance the simulation to `now`
    ///
    /// While relaxing, each tick runs one relaxation step; the tick that
    /// exhausts the budget freezes the regions and forms factions. After
    /// that each tick runs growth, decisions, settlement and pruning.
    /// A `now` earlier than the previous tick is treated as the previous
    /// timestamp.
    ///
    /// # Errors
    ///
    /// `InvalidCommand` for a non-finite `now`.
    pub fn tick(&mut self, now: Timestamp) -> Result<Snapshot> {
        if !now.is_finite() {
            return Err(TerritoryError::InvalidCommand(format!(
                "tick time must be finite (got {})",
                now
            )));
        }
        let now = match self.last_tick {
            Some(previous) if now < previous => previous,
            _ => now,
        };
        self.last_tick = Some(now);

        let freeze = match &mut self.phase {
            Phase::Relaxing(relaxation) => {
                relaxation.step(&mut self.rng);
                relaxation.is_stabilized()
            }
            Phase::Running(world) => {
                let mut ctx = TickContext {
                    config: &self.config,
                    rng: &mut self.rng,
                    now,
                };
                world.advance(&mut ctx, self.mutation.as_mut(), &mut self.pending_events);
                false
            }
        };
        if freeze {
            self.stabilize(now)?;
        }

        let events = std::mem::take(&mut self.pending_events);
        Ok(self.capture(now, events))
    }

    /// Current state without advancing; pending events are included but kept
    pub fn snapshot(&self) -> Snapshot {
        self.capture(self.last_tick.unwrap_or(0.0), self.pending_events.clone())
    }

    /// Found a faction from `region_ids`, each gaining `bonus` resources
    ///
    /// # Errors
    ///
    /// `InvalidCommand` for an empty set, an unknown region id, a negative or
    /// non-finite bonus, or a territory that has not stabilized. Nothing is
    /// changed when an error is returned.
    pub fn found_faction<I>(&mut self, region_ids: I, bonus: f64) -> Result<FactionId>
    where
        I: IntoIterator<Item = RegionId>,
    {
        let Phase::Running(world) = &mut self.phase else {
            return Err(TerritoryError::InvalidCommand(
                "territory has not stabilized yet".to_string(),
            ));
        };
        let set: BTreeSet<RegionId> = region_ids.into_iter().collect();
        FactionRegistry::check_founding(&world.regions, &set, bonus)?;

        let color = random_color(&mut self.rng);
        let (faction, dissolved) =
            world
                .registry
                .found_faction(&mut world.regions, &set, bonus, color, FactionOrigin::Command)?;
        push_founded(&mut self.pending_events, faction, FactionOrigin::Command, set.len(), dissolved);

        tracing::info!("Faction {} founded by command with {} regions", faction, set.len());
        Ok(faction)
    }

    /// Region containing the point `(x, y)`, if any
    ///
    /// Every point inside the closed bounds maps to a region; points on the
    /// outer edges go to the region with the nearest seed.
    pub fn point_in_region(&self, x: f64, y: f64) -> Option<RegionId> {
        let point = DVec2::new(x, y);
        if !point.is_finite() || !self.config.bounds.contains(point) {
            return None;
        }
        let world = self.world()?;
        world
            .point_in_region(point)
            .or_else(|| world.nearest_region(point))
    }

    fn stabilize(&mut self, now: Timestamp) -> Result<()> {
        let Phase::Relaxing(relaxation) = &self.phase else {
            return Ok(());
        };
        let skipped_steps = relaxation.skipped_steps();

        let mut ctx = TickContext {
            config: &self.config,
            rng: &mut self.rng,
            now,
        };
        let mut events = Vec::new();
        let world = World::build(relaxation.cells(), relaxation.seeds(), &mut ctx, &mut events)?;

        tracing::info!(
            "Territory stabilized: {} regions, {} factions ({} relaxation steps skipped)",
            world.regions.len(),
            world.registry.len(),
            skipped_steps
        );
        events.push(SimulationEvent::Stabilized {
            regions: world.regions.len(),
            factions: world.registry.len(),
            skipped_steps,
        });

        self.pending_events.extend(events);
        self.phase = Phase::Running(world);
        Ok(())
    }

    fn capture(&self, now: Timestamp, events: Vec<SimulationEvent>) -> Snapshot {
        let stage = self.stage();
        match &self.phase {
            Phase::Relaxing(relaxation) => Snapshot {
                now,
                stage,
                regions: relaxation
                    .cells()
                    .iter()
                    .map(|cell| RegionView {
                        id: cell.id,
                        polygon: cell.polygon.clone(),
                        centroid: cell.centroid,
                        resource: 0.0,
                        population_limit: 0.0,
                        faction: None,
                        color: None,
                    })
                    .collect(),
                factions: Vec::new(),
                transfers: Vec::new(),
                events,
            },
            Phase::Running(world) => Snapshot {
                now,
                stage,
                regions: world.region_views(),
                factions: world.faction_views(),
                transfers: world.transfer_views(now),
                events,
            },
        }
    }
}

fn push_founded(
    events: &mut Vec<SimulationEvent>,
    faction: FactionId,
    origin: FactionOrigin,
    members: usize,
    dissolved: Vec<FactionId>,
) {
    events.push(SimulationEvent::FactionFounded {
        faction,
        origin,
        members,
    });
    events.extend(
        dissolved
            .into_iter()
            .map(|faction| SimulationEvent::FactionDissolved { faction }),
    );
}
