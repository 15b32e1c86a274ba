//! Time loop
//!
//! A [`Simulation`] owns every piece of persistent state (biomass, effort, rolling
//! memories, regulation state and output buffers) and advances it one month per
//! [`Simulation::step`]. Each step of a bioeconomic run:
//!
//! 1. computes the ecological tendencies and the provisional biomass,
//! 2. evaluates regulation at the start of every year but the first,
//! 3. computes harvest, revenue and cost from the provisional biomass,
//! 4. updates the rolling memories and integrates effort,
//! 5. removes the harvest from the provisional biomass,
//! 6. adds the step to the output buffers.
//!
//! A run continued from a [`RestartState`] keeps counting months from the start of the
//! original run for the regulation schedule and the harvest start. Forcing and output
//! buckets are indexed by the months of the current run.

use crate::constants::{DT, MONTHS_PER_YEAR};
use crate::ecology::{apply_harvest, integrate_biomass, provisional_biomass, FluxEngine};
use crate::economy::{nan_sum, EconomicMemories, EconomicState, EconomicStep, EffortEngine};
use crate::errors::{check_shape, BoatsError, BoatsResult};
use crate::forcing::Forcing;
use crate::grid::Grid;
use crate::output::{LiveFields, ModeOutput, OutputAggregator, OutputConfig};
use crate::parameters::{BoatsConfig, RegulationStrategy, RunMode};
use crate::regulation::{RegulationDiagnostics, RegulationDrivers, RegulationRestart, Regulator};
use ndarray::{Array1, Array3, Array4, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// State needed to continue a run.
///
/// Non-applicable entries are stored as zero and masked again when a run is built
/// from the state, so the fields survive formats without NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestartState {
    /// `[lat, lon, group, mass]`
    pub biomass: Array4<f64>,
    /// `[lat, lon, group]`, absent for ecology-only runs.
    pub effort: Option<Array3<f64>>,
    /// Months simulated since the start of the original run.
    #[serde(default)]
    pub elapsed_steps: usize,
    /// Effort, revenue and cost memories of a bioeconomic run.
    #[serde(default)]
    pub memories: Option<EconomicMemories>,
    #[serde(default)]
    pub regulation: Option<RegulationRestart>,
}

impl RestartState {
    /// Restart from biomass and effort alone, with empty memories.
    pub fn new(biomass: &Array4<f64>, effort: Option<&Array3<f64>>) -> Self {
        let finite = |v: f64| if v.is_nan() { 0.0 } else { v };
        Self {
            biomass: biomass.mapv(finite),
            effort: effort.map(|e| e.mapv(finite)),
            elapsed_steps: 0,
            memories: None,
            regulation: None,
        }
    }
}

/// Everything a finished run hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub outputs: BTreeMap<String, ModeOutput>,
    pub restart: RestartState,
    pub diagnostics: Option<RegulationDiagnostics>,
}

pub struct SimulationBuilder {
    grid: Grid,
    config: BoatsConfig,
    forcing: Option<Forcing>,
    biomass: Option<Array4<f64>>,
    effort: Option<Array3<f64>>,
    elapsed_steps: usize,
    memories: Option<EconomicMemories>,
    regulation: Option<RegulationRestart>,
}

impl SimulationBuilder {
    pub fn new(grid: Grid, config: BoatsConfig) -> Self {
        Self {
            grid,
            config,
            forcing: None,
            biomass: None,
            effort: None,
            elapsed_steps: 0,
            memories: None,
            regulation: None,
        }
    }

    pub fn with_forcing(mut self, forcing: Forcing) -> Self {
        self.forcing = Some(forcing);
        self
    }

    pub fn with_initial_biomass(mut self, biomass: Array4<f64>) -> Self {
        self.biomass = Some(biomass);
        self
    }

    pub fn with_initial_effort(mut self, effort: Array3<f64>) -> Self {
        self.effort = Some(effort);
        self
    }

    /// Replace the output modes of the configuration.
    pub fn with_output_modes(mut self, output: OutputConfig) -> Self {
        self.config.output = output;
        self
    }

    /// Start from the final state of an earlier run.
    pub fn with_restart(mut self, restart: RestartState) -> Self {
        self.biomass = Some(restart.biomass);
        if restart.effort.is_some() {
            self.effort = restart.effort;
        }
        self.elapsed_steps = restart.elapsed_steps;
        self.memories = restart.memories;
        self.regulation = restart.regulation;
        self
    }

    /// Validate the setup and allocate every engine and buffer.
    pub fn build(self) -> BoatsResult<Simulation> {
        let Self {
            grid,
            config,
            forcing,
            biomass,
            effort,
            elapsed_steps,
            memories,
            regulation,
        } = self;
        config.validate()?;

        let n_groups = config.ecology.n_groups();
        let n_steps = config.run.n_steps();
        let fishing = config.run.mode == RunMode::Bioeconomic;

        let forcing = forcing.ok_or_else(|| BoatsError::Error("no forcing supplied".to_string()))?;
        forcing.validate(&grid, n_groups, n_steps)?;

        let full_shape = grid.full_shape(n_groups);
        let mut biomass = biomass
            .ok_or_else(|| BoatsError::Error("no initial biomass supplied".to_string()))?;
        check_shape(
            "initial_biomass",
            &[full_shape.0, full_shape.1, full_shape.2, full_shape.3],
            biomass.shape(),
        )?;
        let applicable = grid.applicability(&config.ecology.asymptotic_masses());
        Zip::from(&mut biomass).and(&applicable).for_each(|b, &valid| {
            if !valid {
                *b = f64::NAN;
            } else if !(*b > 0.0) {
                *b = 0.0;
            }
        });

        let spatial_shape = grid.spatial_shape(n_groups);
        let (effort_engine, economic, regulator) = if fishing {
            let mut effort = effort.unwrap_or_else(|| Array3::zeros(spatial_shape));
            check_shape(
                "initial_effort",
                &[spatial_shape.0, spatial_shape.1, spatial_shape.2],
                effort.shape(),
            )?;
            Zip::indexed(&mut effort).for_each(|(i, j, _), e| {
                if !grid.ocean()[[i, j]] {
                    *e = f64::NAN;
                } else if !(*e > 0.0) {
                    *e = 0.0;
                }
            });

            let regulator = match (&config.regulation, regulation) {
                (Some(params), restored) => {
                    if params.strategy == RegulationStrategy::Omniscient
                        && forcing.target_effort.is_none()
                    {
                        return Err(BoatsError::InvalidParameter {
                            name: "target_effort".to_string(),
                            reason: "the omnT strategy needs an external target effort".to_string(),
                        });
                    }
                    Some(match restored {
                        Some(state) => Regulator::restore(
                            params.clone(),
                            &state,
                            spatial_shape,
                            grid.ocean(),
                        )?,
                        None => Regulator::new(params.clone(), spatial_shape),
                    })
                }
                (None, Some(_)) => {
                    warn!("restart carries regulation state but regulation is disabled");
                    None
                }
                (None, None) => None,
            };
            let economic = match memories {
                Some(memories) => EconomicState::restore(effort, &memories, grid.ocean())?,
                None => EconomicState::new(effort),
            };
            (
                Some(EffortEngine::new(&grid, &config.ecology, &config.economy)),
                Some(economic),
                regulator,
            )
        } else {
            (None, None, None)
        };

        let outputs = OutputAggregator::new(&config.output, &grid, n_groups, n_steps, fishing)?;

        Ok(Simulation {
            flux_engine: FluxEngine::new(&grid, &config.ecology),
            harvest_start_step: config.run.harvest_start_step(),
            n_steps,
            step: 0,
            elapsed_steps,
            cumulative_catch: 0.0,
            grid,
            config,
            forcing,
            biomass,
            effort_engine,
            economic,
            regulator,
            outputs,
        })
    }
}

pub struct Simulation {
    grid: Grid,
    config: BoatsConfig,
    forcing: Forcing,
    flux_engine: FluxEngine,
    effort_engine: Option<EffortEngine>,
    economic: Option<EconomicState>,
    regulator: Option<Regulator>,
    outputs: OutputAggregator,
    biomass: Array4<f64>,
    /// Area-integrated catch since the start of the run (g).
    cumulative_catch: f64,
    step: usize,
    /// Months simulated before this run started.
    elapsed_steps: usize,
    n_steps: usize,
    harvest_start_step: usize,
}

impl Simulation {
    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    pub fn finished(&self) -> bool {
        self.step >= self.n_steps
    }

    pub fn config(&self) -> &BoatsConfig {
        &self.config
    }

    pub fn biomass(&self) -> &Array4<f64> {
        &self.biomass
    }

    /// Effort of a bioeconomic run.
    pub fn effort(&self) -> Option<&Array3<f64>> {
        self.economic.as_ref().map(|e| &e.effort)
    }

    pub fn economic_state(&self) -> Option<&EconomicState> {
        self.economic.as_ref()
    }

    pub fn regulation_diagnostics(&self) -> Option<RegulationDiagnostics> {
        self.regulator.as_ref().map(Regulator::diagnostics)
    }

    /// Biomass integrated over mass classes and area (g).
    pub fn total_biomass(&self) -> f64 {
        let width = self.grid.mass_classes().width();
        let per_area = self
            .biomass
            .map_axis(Axis(3), |lane| nan_sum(lane.iter().zip(width.iter()).map(|(b, dm)| b * dm)));
        area_total(&self.grid, &per_area)
    }

    pub fn cumulative_catch(&self) -> f64 {
        self.cumulative_catch
    }

    /// Advance one month. Returns `false` once the run is complete.
    pub fn step(&mut self) -> bool {
        if self.finished() {
            return false;
        }
        let t = self.step;
        let elapsed = self.elapsed_steps + t;
        let forcing = self.forcing.snapshot(t);
        let fluxes = self.flux_engine.compute(&self.biomass, &forcing);

        let economics: Option<EconomicStep> = match (&self.effort_engine, &mut self.economic) {
            (Some(engine), Some(state)) => {
                let provisional = provisional_biomass(&self.biomass, &fluxes, DT);
                let catchability = if elapsed < self.harvest_start_step {
                    Array1::zeros(forcing.catchability.len())
                } else {
                    forcing.catchability.to_owned()
                };

                if let Some(regulator) = self.regulator.as_mut() {
                    if Regulator::is_due(elapsed) {
                        let drivers = RegulationDrivers {
                            effort: state.effort.view(),
                            catchability: catchability.view(),
                            societal_enforcement: forcing.societal_enforcement.view(),
                            enforcement_is_time_varying: forcing.enforcement_is_time_varying,
                            target_effort: forcing.target_effort.as_ref().map(|t| t.view()),
                            dt: DT,
                        };
                        regulator.evaluate(elapsed, &drivers);
                    }
                }

                let month = engine.step(
                    &provisional,
                    &state.effort,
                    catchability.view(),
                    forcing.price,
                    forcing.cost_per_effort,
                    DT,
                );
                state.remember(&month.revenue, &month.cost);
                let mut change = engine.effort_change(&month.revenue, &month.cost, &state.effort);
                if let Some(regulator) = self.regulator.as_mut() {
                    regulator.record(&month.catch, &state.effort, catchability.view());
                    regulator.blend_effort_change(
                        &mut change,
                        &state.annual_mean_effort(),
                        forcing.societal_enforcement,
                    );
                }
                state.integrate(&change, DT);
                self.cumulative_catch += area_total(&self.grid, &month.catch);
                self.biomass = apply_harvest(&provisional, &month.harvest, DT);
                Some(month)
            }
            _ => {
                self.biomass = integrate_biomass(&self.biomass, &fluxes, DT);
                None
            }
        };

        let live = LiveFields {
            biomass: &self.biomass,
            fluxes: &fluxes,
            harvest: economics.as_ref().map(|m| &m.harvest),
            effort: self.economic.as_ref().map(|e| &e.effort),
            revenue: economics.as_ref().map(|m| &m.revenue),
            cost: economics.as_ref().map(|m| &m.cost),
        };
        self.outputs.accumulate(t, &live);

        if (elapsed + 1) % MONTHS_PER_YEAR == 0 {
            debug!(
                year = (elapsed + 1) / MONTHS_PER_YEAR,
                total_biomass = self.total_biomass(),
                cumulative_catch = self.cumulative_catch,
                regulated = self.regulator.as_ref().map_or(0, Regulator::n_regulated),
                "year complete"
            );
        }
        self.step += 1;
        true
    }

    /// Run every remaining step.
    pub fn run(&mut self) {
        let regulation = self
            .regulator
            .as_ref()
            .map_or("none".to_string(), |r| r.parameters().strategy.to_string());
        info!(
            steps = self.n_steps - self.step,
            mode = ?self.config.run.mode,
            groups = self.config.ecology.n_groups(),
            regulation = %regulation,
            "starting simulation"
        );
        while self.step() {}
        info!(
            total_biomass = self.total_biomass(),
            regulated = self.regulator.as_ref().map_or(0, Regulator::n_regulated),
            "simulation finished"
        );
    }

    pub fn restart_state(&self) -> RestartState {
        RestartState {
            elapsed_steps: self.elapsed_steps + self.step,
            memories: self.economic.as_ref().map(EconomicState::memories),
            regulation: self.regulator.as_ref().map(Regulator::restart_state),
            ..RestartState::new(&self.biomass, self.effort())
        }
    }

    /// Final state, output buffers and regulation diagnostics.
    pub fn finish(self) -> SimulationResult {
        SimulationResult {
            diagnostics: self.regulation_diagnostics(),
            restart: self.restart_state(),
            outputs: self.outputs.finish(),
        }
    }
}

/// Area-weighted sum of a `[lat, lon, group]` field over ocean cells.
pub fn area_total(grid: &Grid, field: &Array3<f64>) -> f64 {
    let mut total = 0.0;
    for ((i, j, _), &v) in field.indexed_iter() {
        if grid.ocean()[[i, j]] && !v.is_nan() {
            total += v * grid.area()[[i, j]];
        }
    }
    total
}
