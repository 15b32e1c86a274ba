//! Output Aggregator
//!
//! Every output mode owns one buffer per variable with a leading bucket axis. At each
//! timestep that falls inside a bucket, the reduced live value divided by the bucket
//! length is added to that bucket's slot, so a finished buffer holds bucket means.
//! Derived variables are group sums of another output of the same mode and are filled
//! in once the run is over.

mod config;
mod processing;

pub use config::{OutputConfig, OutputModeConfig, VariableConfig};
pub use processing::{Processing, Reduction, ReductionWeights, StateVariable, VariableKind};

use crate::constants::MONTHS_PER_YEAR;
use crate::ecology::FluxFields;
use crate::economy::nan_sum;
use crate::errors::{BoatsError, BoatsResult};
use crate::grid::Grid;
use ndarray::{Array3, Array4, ArrayD, Axis, CowArray, IxDyn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Live fields at the end of a timestep.
#[derive(Debug, Clone, Copy)]
pub struct LiveFields<'a> {
    pub biomass: &'a Array4<f64>,
    pub fluxes: &'a FluxFields,
    pub harvest: Option<&'a Array4<f64>>,
    pub effort: Option<&'a Array3<f64>>,
    pub revenue: Option<&'a Array3<f64>>,
    pub cost: Option<&'a Array3<f64>>,
}

impl<'a> LiveFields<'a> {
    fn get(&self, variable: StateVariable) -> Option<CowArray<'a, f64, IxDyn>> {
        let full = |a: &'a Array4<f64>| CowArray::from(a.view().into_dyn());
        let spatial = |a: &'a Array3<f64>| CowArray::from(a.view().into_dyn());
        Some(match variable {
            StateVariable::Biomass => full(self.biomass),
            StateVariable::FluxIn => full(&self.fluxes.flux_in),
            StateVariable::FluxOut => full(&self.fluxes.flux_out),
            StateVariable::FluxGrowth => full(&self.fluxes.flux_growth),
            StateVariable::Mortality => full(&self.fluxes.mortality),
            StateVariable::Growth => full(&self.fluxes.growth),
            StateVariable::Energy => full(&self.fluxes.energy),
            StateVariable::Harvest => full(self.harvest?),
            StateVariable::Effort => spatial(self.effort?),
            StateVariable::Revenue => spatial(self.revenue?),
            StateVariable::Cost => spatial(self.cost?),
            StateVariable::Profit => {
                CowArray::from((self.revenue? - self.cost?).into_dyn())
            }
        })
    }
}

#[derive(Debug, Clone)]
enum Source {
    Live(StateVariable),
    Derived(String),
}

#[derive(Debug, Clone)]
struct OutputVariable {
    output: String,
    source: Source,
    processing: Processing,
    unit_conversion: f64,
    buffer: ArrayD<f64>,
}

/// One resolved output mode.
#[derive(Debug, Clone)]
pub struct OutputMode {
    name: String,
    /// Half-open step ranges.
    buckets: Vec<(usize, usize)>,
    years: Vec<[f64; 2]>,
    variables: Vec<OutputVariable>,
}

impl OutputMode {
    fn invalid(&self, reason: impl Into<String>) -> BoatsError {
        BoatsError::InvalidOutputMode {
            mode: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Resolve a configured mode against the grid and run length.
    pub fn new(
        config: &OutputModeConfig,
        grid: &Grid,
        n_groups: usize,
        n_steps: usize,
        fishing: bool,
    ) -> BoatsResult<Self> {
        let mut mode = Self {
            name: config.name.clone(),
            buckets: Vec::with_capacity(config.buckets.len()),
            years: config.buckets.clone(),
            variables: Vec::with_capacity(config.variables.len()),
        };
        if config.buckets.is_empty() {
            return Err(mode.invalid("no time buckets"));
        }
        for &[start, end] in &config.buckets {
            let to_step = |year: f64| (year * MONTHS_PER_YEAR as f64).round();
            let (first, last) = (to_step(start), to_step(end));
            if !(first >= 0.0 && last > first) {
                return Err(mode.invalid(format!("empty bucket [{start}, {end})")));
            }
            if last as usize > n_steps {
                return Err(mode.invalid(format!("bucket [{start}, {end}) ends after the run")));
            }
            mode.buckets.push((first as usize, last as usize));
        }

        let (n_lat, n_lon, _, n_mass) = grid.full_shape(n_groups);
        let full_shape = [n_lat, n_lon, n_groups, n_mass];
        for variable in &config.variables {
            if mode.variables.iter().any(|v| v.output == variable.output) {
                return Err(mode.invalid(format!("duplicate output {}", variable.output)));
            }
            let kind: VariableKind = variable.kind.parse()?;
            let processing = Processing::parse(&variable.processing, variable.region.as_deref())?;
            if let Some(Reduction::RegionalIntegral(region)) = processing.spatial() {
                grid.region(region)?;
            }

            let (source, shape) = match kind {
                VariableKind::Derived => {
                    let from = variable
                        .derive_from
                        .as_deref()
                        .ok_or_else(|| mode.invalid(format!("{} has no derive_from", variable.output)))?;
                    let base = mode
                        .variables
                        .iter()
                        .find(|v| v.output == from && matches!(v.source, Source::Live(_)))
                        .ok_or_else(|| mode.invalid(format!("{from} is not a live output of this mode")))?;
                    let axis = base
                        .processing
                        .group_axis()
                        .ok_or_else(|| mode.invalid(format!("{from} has no group dimension")))?;
                    let mut shape = base.buffer.shape().to_vec();
                    shape.remove(axis + 1);
                    (Source::Derived(from.to_string()), shape)
                }
                declared => {
                    let live: StateVariable = variable.source.parse()?;
                    if live.kind() != declared {
                        return Err(BoatsError::KindMismatch {
                            variable: variable.source.clone(),
                            declared: declared.to_string(),
                            actual: live.kind().to_string(),
                        });
                    }
                    if declared == VariableKind::Spatial && processing.size_integral() {
                        return Err(mode.invalid(format!(
                            "size_integral of spatial variable {}",
                            variable.source
                        )));
                    }
                    if live.is_economic() && !fishing {
                        return Err(mode.invalid(format!(
                            "{} needs a bioeconomic run",
                            variable.source
                        )));
                    }
                    let mut shape = vec![mode.buckets.len()];
                    shape.extend(processing.output_shape(declared, full_shape));
                    (Source::Live(live), shape)
                }
            };

            mode.variables.push(OutputVariable {
                output: variable.output.clone(),
                source,
                processing,
                unit_conversion: variable.unit_conversion,
                buffer: ArrayD::zeros(IxDyn(&shape)),
            });
        }
        Ok(mode)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn accumulate(&mut self, step: usize, live: &LiveFields, weights: &ReductionWeights) {
        let active: Vec<(usize, f64)> = self
            .buckets
            .iter()
            .enumerate()
            .filter(|(_, (start, end))| (*start..*end).contains(&step))
            .map(|(b, (start, end))| (b, 1.0 / (end - start) as f64))
            .collect();
        if active.is_empty() {
            return;
        }
        for variable in &mut self.variables {
            let Source::Live(source) = variable.source else {
                continue;
            };
            let Some(field) = live.get(source) else {
                continue;
            };
            let value = variable.processing.apply(field.view(), weights) * variable.unit_conversion;
            for &(bucket, share) in &active {
                variable
                    .buffer
                    .index_axis_mut(Axis(0), bucket)
                    .scaled_add(share, &value);
            }
        }
    }

    fn finalize(&mut self) {
        let derived: Vec<(usize, ArrayD<f64>)> = self
            .variables
            .iter()
            .enumerate()
            .filter_map(|(index, variable)| {
                let Source::Derived(from) = &variable.source else {
                    return None;
                };
                let base = self.variables.iter().find(|v| &v.output == from)?;
                let axis = base.processing.group_axis()? + 1;
                let summed = base
                    .buffer
                    .map_axis(Axis(axis), |lane| nan_sum(lane.iter().copied()));
                Some((index, summed * variable.unit_conversion))
            })
            .collect();
        for (index, buffer) in derived {
            self.variables[index].buffer = buffer;
        }
    }

    fn into_output(self) -> ModeOutput {
        ModeOutput {
            buckets: self.years,
            variables: self
                .variables
                .into_iter()
                .map(|v| (v.output, v.buffer))
                .collect(),
        }
    }
}

/// Finished buffers of one mode, keyed by output name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeOutput {
    pub buckets: Vec<[f64; 2]>,
    pub variables: BTreeMap<String, ArrayD<f64>>,
}

/// All output modes of a run.
#[derive(Debug, Clone)]
pub struct OutputAggregator {
    modes: Vec<OutputMode>,
    weights: ReductionWeights,
}

impl OutputAggregator {
    /// Resolve every configured mode. Any configuration error aborts the setup.
    pub fn new(
        config: &OutputConfig,
        grid: &Grid,
        n_groups: usize,
        n_steps: usize,
        fishing: bool,
    ) -> BoatsResult<Self> {
        let mut modes: Vec<OutputMode> = Vec::with_capacity(config.modes.len());
        for mode in &config.modes {
            if modes.iter().any(|m| m.name == mode.name) {
                return Err(BoatsError::InvalidOutputMode {
                    mode: mode.name.clone(),
                    reason: "duplicate mode name".to_string(),
                });
            }
            modes.push(OutputMode::new(mode, grid, n_groups, n_steps, fishing)?);
        }
        let regions = modes
            .iter()
            .flat_map(|m| m.variables.iter())
            .filter_map(|v| match v.processing.spatial() {
                Some(Reduction::RegionalIntegral(name)) => Some(name.clone()),
                _ => None,
            })
            .map(|name| grid.region(&name).map(|mask| (name, mask.clone())))
            .collect::<BoatsResult<BTreeMap<_, _>>>()?;
        Ok(Self {
            modes,
            weights: ReductionWeights {
                width: grid.mass_classes().width().clone(),
                area: grid.area().clone(),
                ocean: grid.ocean().clone(),
                regions,
            },
        })
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn modes(&self) -> &[OutputMode] {
        &self.modes
    }

    /// Add this timestep's contribution to every active bucket.
    pub fn accumulate(&mut self, step: usize, live: &LiveFields) {
        let weights = &self.weights;
        self.modes
            .par_iter_mut()
            .for_each(|mode| mode.accumulate(step, live, weights));
    }

    /// Fill derived variables and hand out the buffers.
    pub fn finish(self) -> BTreeMap<String, ModeOutput> {
        self.modes
            .into_iter()
            .map(|mut mode| {
                mode.finalize();
                (mode.name.clone(), mode.into_output())
            })
            .collect()
    }
}
