//! Run a territory simulation and report how the map changes hands
//!
//! ```text
//! cargo run --example territory_demo
//! RUST_LOG=voronoi_territory=debug cargo run --example territory_demo
//! ```

use voronoi_territory::*;

const SIMULATED_SECONDS: f64 = 180.0;
const FRAME: f64 = 1.0 / 30.0;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = SimulationConfigBuilder::new()
        .seed(12345)
        .cell_count(120)?
        .bounds(Bounds::from_size(1200.0, 800.0))?
        .relaxation_iterations(50)
        .aggression(AggressionPolicy::Chance(0.8))?
        .build()?;

    // Relax one step per frame, the way a renderer would drive it
    let mut simulation = Simulation::new(config)?;
    let mut now = 0.0;
    let mut frames = 0;
    while !simulation.is_stabilized() {
        simulation.tick(now)?;
        now += FRAME;
        frames += 1;
    }
    tracing::info!("Partition frozen after {} frames", frames);

    let start = now;
    let mut conquests = 0;
    let mut dissolved = 0;
    let mut next_report = start;
    while now - start < SIMULATED_SECONDS {
        let snapshot = simulation.tick(now)?;
        for event in &snapshot.events {
            match event {
                SimulationEvent::Conquest { .. } => conquests += 1,
                SimulationEvent::FactionDissolved { .. } => dissolved += 1,
                _ => {}
            }
        }

        if now >= next_report {
            report(&snapshot);
            next_report += 30.0;
        }
        now += FRAME;
    }

    // Click in the middle of the map and found a faction there
    if let Some(region) = simulation.point_in_region(600.0, 400.0) {
        let mut claim = vec![region];
        claim.extend(simulation.regions()[region].neighbors().iter().copied().take(2));
        let faction = simulation.found_faction(claim, 300.0)?;
        tracing::info!("Founded {} around region {}", faction, region);
    }

    let snapshot = simulation.tick(now)?;
    report(&snapshot);
    tracing::info!(
        "{} conquests, {} factions dissolved, {} in flight",
        conquests,
        dissolved,
        snapshot.transfers.iter().filter(|t| !t.settled).count()
    );
    Ok(())
}

fn report(snapshot: &Snapshot) {
    let mut factions: Vec<&FactionView> = snapshot.factions.iter().collect();
    factions.sort_by(|a, b| b.member_count.cmp(&a.member_count).then(a.id.cmp(&b.id)));

    let top: Vec<String> = factions
        .iter()
        .take(5)
        .map(|f| format!("{} {:.0}%", f.id, f.share * 100.0))
        .collect();
    tracing::info!(
        "t={:>6.1}s  {} factions, total resource {:.0}  [{}]",
        snapshot.now,
        snapshot.factions.len(),
        snapshot.total_resource(),
        top.join(", ")
    );
}
