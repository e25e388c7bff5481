//! Recovery Runner
//!
//! Replays an event file through the dead tower recovery of every configured
//! detector and logs a per-event summary.
//!
//! Usage:
//!   recovery_runner --config detectors.toml --events events.jsonl
//!
//! Logging follows `RUST_LOG` (e.g. `RUST_LOG=tower_recovery=debug` for per-cycle
//! summaries) and defaults to `info`.

mod events;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tower_recovery::config::RecoveryConfig;
use tower_recovery::core_modules::utils::snapshot;
use tower_recovery::parallel_pipeline::DetectorPool;

use crate::events::{EventDecoder, check_outcomes};

#[derive(Parser, Debug)]
#[command(name = "recovery_runner")]
#[command(about = "Fill dead calorimeter towers from their live neighbors")]
struct Args {
    /// Detector configuration (TOML)
    #[arg(long, env = "RECOVERY_CONFIG")]
    config: PathBuf,

    /// Event readings, one JSON object per line
    #[arg(long, env = "RECOVERY_EVENTS")]
    events: PathBuf,

    /// Write a PNG heatmap per detector and event (overrides the config file)
    #[arg(long, env = "RECOVERY_SNAPSHOT_DIR")]
    snapshot_dir: Option<PathBuf>,
}

/// `RUST_LOG` directives when set and valid, `info` otherwise.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let args = Args::parse();

    let config = RecoveryConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let snapshot_dir = args.snapshot_dir.clone().or_else(|| config.snapshot_dir.clone());
    if let Some(dir) = &snapshot_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let decoder = EventDecoder::new(&config)?;

    // Geometries are rebuilt here only for snapshots; the pool owns its own.
    let mut snapshot_inputs = HashMap::new();
    if snapshot_dir.is_some() {
        for detector in &config.detectors {
            snapshot_inputs.insert(detector.name.clone(), (detector.geometry()?, detector.dead_map()?));
        }
    }

    info!("Starting recovery run");
    info!("  Config: {}", args.config.display());
    info!("  Events: {}", args.events.display());
    info!("  Detectors: {}", config.detectors.len());

    let pool = DetectorPool::from_config(&config)?;

    let reader = BufReader::new(
        File::open(&args.events).with_context(|| format!("opening {}", args.events.display()))?,
    );

    let mut events = 0u64;
    let mut total_recovered_towers = 0usize;
    let mut total_recovered_energy = 0.0;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let (event, stores) = decoder
            .decode(&line)
            .with_context(|| format!("{}:{}", args.events.display(), line_no + 1))?;

        let outcomes = pool.process_event(stores).await?;

        for (name, stats) in check_outcomes(event, &outcomes)? {
            let outcome = &outcomes[&name];
            total_recovered_towers += stats.recovered_towers;
            total_recovered_energy += stats.recovered_energy;

            info!(
                event,
                detector = %name,
                recovery_energy = stats.recovered_energy,
                recovered_towers = stats.recovered_towers,
                output_sum_energy = outcome.towers.total_energy(),
                "event processed"
            );

            if let (Some(dir), Some((geometry, dead_map))) = (&snapshot_dir, snapshot_inputs.get(&name)) {
                let path = dir.join(format!("{}_{}.png", name, event));
                if let Err(err) = snapshot::save_heatmap(&path, &outcome.towers, geometry, dead_map.as_ref()) {
                    warn!("Failed to write snapshot {}: {}", path.display(), err);
                }
            }
        }
        events += 1;
    }

    pool.shutdown().await;

    info!(
        "Processing complete: {} events, {} towers recovered, {:.3} recovered energy",
        events, total_recovered_towers, total_recovered_energy
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_directives_are_kept() {
        let filter = log_filter(Some("tower_recovery=debug"));
        assert_eq!(filter.to_string(), "tower_recovery=debug");
    }

    #[test]
    fn unset_or_invalid_rust_log_falls_back_to_info() {
        assert_eq!(log_filter(None).to_string(), "info");
        assert_eq!(log_filter(Some("tower_recovery=notalevel")).to_string(), "info");
    }
}
