//! mm1 — single-teller bank counter for the rust_qn queueing-network core.
//!
//! Runs independent replications of an M/M/1 queue with impatient customers
//! and writes per-replication summaries as CSV.
//!
//! ```text
//! mm1 [config.json] [output-dir]
//! ```
//!
//! The optional JSON file holds a `SimConfig`; omitted fields keep their
//! defaults.  Output goes to `output/mm1` unless a directory is given.
//! Set `MM1_LOG_JSON` for JSON log lines; `RUST_LOG` overrides the level.

mod logging;
mod network;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{error, info, Level};

use qn_core::{SimConfig, Tick, TICKS_PER_SECOND};
use qn_output::{CsvWriter, OutputWriter, ReplicationRow, StatisticsRecorder};
use qn_sim::SimBuilder;

use logging::LoggingConfig;
use network::{build_network, MEAN_INTERARRIVAL_SECS, MEAN_SERVICE_SECS};

// ── Constants ─────────────────────────────────────────────────────────────────

const DEFAULT_OUTPUT_DIR: &str = "output/mm1";
const SHIFT_HOURS:        u64  = 8;

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig {
            seed:            42,
            replications:    8,
            max_ticks:       Some(Tick(SHIFT_HOURS * 3_600 * TICKS_PER_SECOND)),
            warm_up_clients: 50,
            ..SimConfig::default()
        });
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let mut logging = LoggingConfig::new().with_level(Level::INFO);
    if std::env::var_os("MM1_LOG_JSON").is_some() {
        logging = logging.with_json_format().without_ansi();
    }
    logging.init()?;

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let output_dir = args.next().map_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR), PathBuf::from);

    let config = load_config(config_path.as_deref())?;
    let rho = MEAN_SERVICE_SECS / MEAN_INTERARRIVAL_SECS;
    println!("=== mm1 — rust_qn bank counter ===");
    println!(
        "Replications: {}  |  Seed: {}  |  Utilisation: {rho:.2}  |  Warm-up: {} clients",
        config.replications, config.seed, config.warm_up_clients
    );
    println!();

    // 1. Build the model.
    let (net, counter) = build_network();
    let sim = SimBuilder::new(config, net).build()?;
    info!(stations = sim.network.stations().len(), "model ready");

    // 2. Run every replication, each into its own recorder.
    let t0 = Instant::now();
    let results = sim.run_replications(|_| StatisticsRecorder::new())?;
    let elapsed = t0.elapsed();

    // 3. Write summaries.
    let mut writer = CsvWriter::new(&output_dir)?;
    let mut failed = 0usize;
    for (index, (recorder, result)) in results.iter().enumerate() {
        match result {
            Ok(summary) => writer.write_replication(&ReplicationRow::from(summary))?,
            Err(e) => {
                failed += 1;
                error!(replication = index, error = %e, "replication failed");
            }
        }
        recorder.write_to(&mut writer, index, &sim.network)?;
    }
    writer.finish()?;

    // 4. Console report.
    println!("Simulation complete in {:.3} s  ({failed} failed)", elapsed.as_secs_f64());
    println!("Output: {}", output_dir.display());
    println!();
    println!("{:<6} {:>9} {:>9} {:>9} {:>12} {:>9}", "Rep", "Arrivals", "Served", "Reneged", "Mean wait s", "Max queue");
    println!("{}", "-".repeat(60));
    for (index, (recorder, _)) in results.iter().enumerate() {
        let rows = recorder.station_rows(index, &sim.network);
        let Some(row) = rows.get(counter.index()) else { continue };
        println!(
            "{:<6} {:>9} {:>9} {:>9} {:>12.1} {:>9}",
            index,
            row.arrivals,
            row.leaves.saturating_sub(row.reneged),
            row.reneged,
            row.mean_waiting_secs,
            row.max_queue_length
        );
    }

    Ok(())
}
