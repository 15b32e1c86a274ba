//! BOATS command-line driver
//!
//! Runs the bioeconomic size-spectrum model on the idealised scenario described in a
//! TOML run file and optionally writes the outputs, the restart state and the
//! regulation diagnostics as JSON.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug boats --config run.toml --output results.json
//! ```

mod scenario;

use anyhow::Context;
use boats_core::parameters::BoatsConfig;
use boats_core::SimulationBuilder;
use clap::Parser;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::scenario::Scenario;

/// Bioeconomic size-spectrum fishery model
#[derive(Parser, Debug)]
#[command(name = "boats")]
#[command(about = "Run the BOATS bioeconomic fish community model")]
struct Args {
    /// Run configuration (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Where to write outputs, restart state and diagnostics (JSON)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();

    let contents = fs::read_to_string(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    let config = BoatsConfig::from_toml_str(&contents)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    let scenario = Scenario::from_toml_str(&contents).context("parsing [scenario]")?;
    info!(
        n_years = config.run.n_years,
        mode = ?config.run.mode,
        n_lat = scenario.n_lat,
        n_lon = scenario.n_lon,
        n_mass = scenario.n_mass,
        "configuration loaded"
    );

    let grid = scenario.grid()?;
    let n_groups = config.ecology.n_groups();
    let mut simulation = SimulationBuilder::new(grid.clone(), config)
        .with_forcing(scenario.forcing(&grid, n_groups))
        .with_initial_biomass(scenario.initial_biomass(&grid, n_groups))
        .with_initial_effort(scenario.initial_effort(&grid, n_groups))
        .build()
        .context("setting up the simulation")?;

    simulation.run();

    let total_biomass = simulation.total_biomass();
    let total_catch = simulation.cumulative_catch();
    let result = simulation.finish();
    info!(
        total_biomass,
        total_catch,
        regulated = result.diagnostics.as_ref().map_or(0, |d| d.n_regulated()),
        "run summary"
    );

    if let Some(path) = args.output {
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &result)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "results written");
    }

    Ok(())
}
