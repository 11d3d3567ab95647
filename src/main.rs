use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use raahn_core::{MapConfig, Simulation};

mod report;

use report::RunSummary;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Map file (RON)
    #[arg(long)]
    map: PathBuf,

    /// Sensor config file (RON)
    #[arg(long)]
    sensors: Option<PathBuf>,

    /// Network config file (RON)
    #[arg(long)]
    network: Option<PathBuf>,

    /// Number of ticks to simulate
    #[arg(long, default_value = "1000")]
    ticks: u64,

    /// Log a progress line every N ticks (0 disables)
    #[arg(long, default_value = "100")]
    report_every: u64,

    /// Reset the brain every N ticks to start a new episode (0 disables)
    #[arg(long, default_value = "0")]
    episode_length: u64,

    /// Write a RON run summary to this file
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let map = MapConfig::from_file(&args.map)?;
    let mut simulation = Simulation::from_map(&map);

    let status = simulation
        .load_config(args.sensors.as_deref(), args.network.as_deref())
        .context("Failed to load car configuration")?;
    if !status.is_complete() {
        log::warn!("Running with a reduced network: {:?}", status);
    }

    log::info!("Starting RAAHN simulation for {} ticks", args.ticks);
    let mut summary = RunSummary::default();
    for tick in 1..=args.ticks {
        let outcome = simulation.tick();
        summary.record(&simulation, outcome);

        if args.report_every > 0 && tick % args.report_every == 0 {
            summary.log_progress(&simulation);
        }
        if args.episode_length > 0 && tick % args.episode_length == 0 {
            log::info!("Episode boundary at tick {}, resetting brain", tick);
            simulation.reset_brain();
        }
    }

    log::info!(
        "Finished: {} ticks, {} blocked moves, {:.1} units travelled, {} ticks on road",
        summary.ticks,
        summary.blocked_moves,
        summary.distance_travelled,
        summary.ticks_on_road
    );

    if let Some(path) = &args.summary {
        summary.write(path)?;
    }
    Ok(())
}
