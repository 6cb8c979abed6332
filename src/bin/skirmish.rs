//! Skirmish - local harness for the fleet controller
//!
//! Generates a seeded random map, drives the controller through a full
//! game against the built-in simulator, and reports the final bank.
//! Useful for eyeballing policy changes without a real game host.

use clap::Parser;

use harvest_fleet::control::FleetController;
use harvest_fleet::core::config::FleetConfig;
use harvest_fleet::core::error::Result;
use harvest_fleet::sim::Simulation;
use harvest_fleet::world::snapshot::GameRules;

#[derive(Parser, Debug)]
#[command(name = "skirmish", about = "Run the fleet controller on a generated map")]
struct Args {
    /// Map width in cells
    #[arg(long, default_value_t = 48)]
    width: i32,

    /// Map height in cells
    #[arg(long, default_value_t = 48)]
    height: i32,

    /// Game length in ticks
    #[arg(long, default_value_t = 400)]
    ticks: u32,

    /// Seed for map generation and controller tie-breaks
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Optional TOML file overriding controller tuning
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harvest_fleet=info,skirmish=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FleetConfig::from_toml(&std::fs::read_to_string(path)?)?,
        None => FleetConfig::default(),
    };

    let rules = GameRules::default();
    let mut sim = Simulation::generate(args.width, args.height, args.seed, rules, args.ticks);
    let mut controller = FleetController::new(config, args.seed, &sim.snapshot())?;

    tracing::info!(
        width = args.width,
        height = args.height,
        ticks = args.ticks,
        seed = args.seed,
        "skirmish starting"
    );

    while !sim.is_over() {
        let snapshot = sim.snapshot();
        let commands = controller.plan_tick(&snapshot);
        sim.apply(&commands);

        if sim.tick() % 50 == 0 {
            tracing::info!(
                tick = sim.tick(),
                bank = sim.bank(),
                units = sim.unit_count(),
                nodes = sim.node_count(),
                "progress"
            );
        }
    }

    tracing::info!(
        bank = sim.bank(),
        units = sim.unit_count(),
        nodes = sim.node_count(),
        "game over"
    );
    println!(
        "final bank: {} ({} units, {} nodes)",
        sim.bank(),
        sim.unit_count(),
        sim.node_count()
    );
    Ok(())
}
