//! harvest-ops - fleet telemetry segmentation and aggregation
//!
//! Command-line adapter over the `harvest_ops` library: reads a telemetry
//! extract, runs the pipeline, and prints JSON to stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Per-machine aggregates and fleet summary
//! harvest-ops fleet --records extracts/2024-05-10.csv
//!
//! # Panel for one machine on one day, with production figures
//! harvest-ops panel --records extracts/2024-05-10.csv --machine 7034 \
//!     --date 2024-05-10 --production extracts/producao.csv
//!
//! # Validate a config file
//! harvest-ops check-config --config harvest_ops.toml
//! ```
//!
//! # Environment Variables
//!
//! - `HARVEST_OPS_CONFIG`: Path to the engine config TOML
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use harvest_ops::config::{self, EngineConfig};
use harvest_ops::{ingest, FleetProcessor, PanelComposer, PanelScope, SideTableExtractor};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "harvest-ops")]
#[command(about = "Harvest fleet telemetry segmentation and aggregation")]
#[command(version)]
struct CliArgs {
    /// Engine config TOML (overrides HARVEST_OPS_CONFIG and ./harvest_ops.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Aggregate every machine in an extract and print the fleet summary
    Fleet {
        /// Telemetry extract (CSV, `;` or `,` delimited)
        #[arg(long, value_name = "FILE")]
        records: PathBuf,
    },

    /// Compose the panel of one machine
    Panel {
        /// Telemetry extract (CSV, `;` or `,` delimited)
        #[arg(long, value_name = "FILE")]
        records: PathBuf,
        /// Fleet code of the machine
        #[arg(long)]
        machine: u32,
        /// Restrict to one day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Production table (`equipamento;toneladas[;data]`)
        #[arg(long, value_name = "FILE")]
        production: Option<PathBuf>,
        /// Offender ranking size (overrides offenders.top_n)
        #[arg(long)]
        top: Option<usize>,
    },

    /// Validate a config file and print the effective configuration
    CheckConfig,
}

// ============================================================================
// Output Shapes
// ============================================================================

#[derive(Serialize)]
struct FleetReport<'a> {
    summary: &'a harvest_ops::FleetSummary,
    machines: &'a BTreeMap<u32, harvest_ops::MachineAggregate>,
}

// ============================================================================
// Commands
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(EngineConfig::load()),
    }
}

fn run_fleet(records: &Path) -> Result<()> {
    let raw = ingest::load_records(records)
        .with_context(|| format!("Failed to read extract {}", records.display()))?;
    let run = FleetProcessor::from_global().run(raw);
    let report = FleetReport {
        summary: &run.summary,
        machines: &run.aggregates,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_panel(
    records: &Path,
    machine: u32,
    date: Option<NaiveDate>,
    production: Option<&Path>,
    top: Option<usize>,
) -> Result<()> {
    let raw = ingest::load_records(records)
        .with_context(|| format!("Failed to read extract {}", records.display()))?;

    let engine_config = match top {
        Some(n) => config::get()
            .clone()
            .with_offender_top_n(n)
            .context("Invalid --top")?,
        None => config::get().clone(),
    };

    let processor = FleetProcessor::new(&engine_config);
    let run = processor.run(raw);
    if !run.intervals.contains_key(&machine) {
        warn!(machine_id = machine, "Machine not present in extract, panel will be empty");
    }

    let mut tables = SideTableExtractor::new(&engine_config).extract(&run);
    if let Some(path) = production {
        tables.production = ingest::load_production(path)
            .with_context(|| format!("Failed to read production table {}", path.display()))?;
    }

    let scope = PanelScope::new(machine, date);
    let aggregate = run.aggregate_for(machine, date, processor.diagnostics());
    let panel = PanelComposer::new().compose(&scope, Some(&aggregate), &tables);

    println!("{}", serde_json::to_string_pretty(&panel)?);
    Ok(())
}

fn run_check_config(engine_config: &EngineConfig) -> Result<()> {
    let (_, warnings) = config::validation::validate_ranges(engine_config);
    for w in &warnings {
        warn!("{}", w);
    }
    print!("{}", engine_config.to_toml()?);
    info!(warnings = warnings.len(), "Config OK");
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let engine_config = load_config(args.config.as_deref())?;
    info!(
        outlier_threshold_hours = engine_config.intervals.outlier_threshold_hours,
        top_n = engine_config.offenders.top_n,
        "Engine config ready"
    );

    match args.command {
        SubCommand::CheckConfig => run_check_config(&engine_config),
        SubCommand::Fleet { records } => {
            config::init(engine_config);
            run_fleet(&records)
        }
        SubCommand::Panel {
            records,
            machine,
            date,
            production,
            top,
        } => {
            config::init(engine_config);
            run_panel(&records, machine, date, production.as_deref(), top)
        }
    }
}
