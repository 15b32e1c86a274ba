//! Regulation State Machine
//!
//! Each `(lat, lon, group)` triple starts unregulated. Once per simulated year (the
//! first month of every year after the first) the annual catch of the previous year is
//! compared with the largest annual catch seen so far. A decline below
//! `reg_threshold` of that maximum (or a positive, time-varying societal enforcement)
//! triggers the configured strategy, which has to produce an acceptable target effort
//! before the triple becomes regulated. Regulation is never lifted.
//!
//! Regulated triples add an enforcement-weighted pull towards the target to the
//! open-access effort tendency:
//!
//! $$\dot E = k_e \frac{R - C}{E + \epsilon} (1 - s_e) + k_s s_e (E_{target} - \bar E)$$

mod regression;

pub use regression::{linear_regression, student_t_two_sided, LinearFit};

use crate::constants::{EPSILON, MIN_ANNUAL_HARVEST, MONTHS_PER_YEAR};
use crate::errors::{check_shape, BoatsResult};
use crate::memory::RollingWindow;
use crate::parameters::{RegulationParameters, RegulationStrategy};
use ndarray::{Array2, Array3, Array4, ArrayView1, ArrayView2, ArrayView3, Zip};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegulationStatus {
    #[default]
    Unregulated,
    Regulated,
}

/// What an annual evaluation did to one triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Not due, no trigger, or already regulated.
    Unchanged,
    /// Became regulated this year.
    Onset,
    /// Triggered, but no acceptable target could be estimated yet.
    NoTarget,
}

/// Everything a triple needs from the rest of the grid to be evaluated.
#[derive(Debug, Clone)]
pub struct CellInputs {
    pub step: usize,
    /// Catch summed over the previous 12 months (g m^-2).
    pub annual_catch: f64,
    /// Mean effort over the previous 12 months.
    pub annual_effort: f64,
    /// Effort at the time of the evaluation.
    pub effort: f64,
    /// Monthly catch over the regulation window, oldest first.
    pub catch_series: Vec<f64>,
    /// Monthly effort over the regulation window, oldest first.
    pub effort_series: Vec<f64>,
    pub catchability: f64,
    /// Mean catchability over the previous 12 months.
    pub mean_catchability: f64,
    /// Time-varying enforcement is positive here.
    pub forced: bool,
    /// Externally estimated effective target (effort times catchability).
    pub external_target: Option<f64>,
    pub dt: f64,
}

/// Serialise NaN as `null` so the state survives JSON.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        (!value.is_nan()).then_some(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// Regulation state of one `(lat, lon, group)` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRegulation {
    pub status: RegulationStatus,
    pub onset_step: Option<usize>,
    /// Largest annual catch observed so far.
    pub annual_harvest_max: f64,
    /// NaN until a target has been accepted.
    #[serde(with = "nan_as_null")]
    pub target_effort: f64,
    /// Most recent stock-assessment fit.
    pub fit: Option<LinearFit>,
    #[serde(with = "nan_as_null")]
    previous_catch: f64,
    #[serde(with = "nan_as_null")]
    previous_effort: f64,
}

impl Default for CellRegulation {
    fn default() -> Self {
        Self {
            status: RegulationStatus::Unregulated,
            onset_step: None,
            annual_harvest_max: 0.0,
            target_effort: f64::NAN,
            fit: None,
            previous_catch: f64::NAN,
            previous_effort: f64::NAN,
        }
    }
}

impl CellRegulation {
    pub fn is_regulated(&self) -> bool {
        self.status == RegulationStatus::Regulated
    }

    /// Annual update: track the maximum, test for onset and estimate the target.
    pub fn evaluate(&mut self, params: &RegulationParameters, inputs: &CellInputs) -> Evaluation {
        let annual = inputs.annual_catch;
        if annual.is_nan() {
            return Evaluation::Unchanged;
        }
        if annual > self.annual_harvest_max {
            self.annual_harvest_max = annual;
        }

        let outcome = match self.status {
            RegulationStatus::Regulated => {
                if params.strategy == RegulationStrategy::Adaptive {
                    self.target_effort = self.adaptive_target(params, inputs);
                }
                Evaluation::Unchanged
            }
            RegulationStatus::Unregulated => {
                let declined = annual < params.reg_threshold * self.annual_harvest_max
                    && annual > MIN_ANNUAL_HARVEST;
                if declined || inputs.forced {
                    match self.estimate_target(params, inputs) {
                        Some(target) => {
                            self.status = RegulationStatus::Regulated;
                            self.onset_step = Some(inputs.step);
                            self.target_effort = target;
                            Evaluation::Onset
                        }
                        None => Evaluation::NoTarget,
                    }
                } else {
                    Evaluation::Unchanged
                }
            }
        };

        self.previous_catch = annual;
        self.previous_effort = inputs.annual_effort;
        outcome
    }

    fn estimate_target(&mut self, params: &RegulationParameters, inputs: &CellInputs) -> Option<f64> {
        match params.strategy {
            RegulationStrategy::StockAssessment => {
                // Schaefer: CPUE declines linearly with effort, MSY at -a / 2b
                let cpue: Vec<f64> = inputs
                    .catch_series
                    .iter()
                    .zip(inputs.effort_series.iter())
                    .map(|(&c, &e)| c / (e * inputs.dt + EPSILON))
                    .collect();
                self.fit = linear_regression(&inputs.effort_series, &cpue);
                let fit = self.fit?;
                let target = -fit.intercept / (2.0 * fit.slope) * params.precaution;
                (target.is_finite() && target * inputs.catchability > 0.0).then_some(target)
            }
            RegulationStrategy::Omniscient => {
                let target =
                    params.precaution * inputs.external_target? / (inputs.mean_catchability + EPSILON);
                (target.is_finite() && target > 0.0 && inputs.effort > target)
                    .then_some(target)
            }
            RegulationStrategy::Adaptive => {
                let target = self.adaptive_target(params, inputs);
                target.is_finite().then_some(target)
            }
        }
    }

    /// Step the effort up while more effort paid off last year, down otherwise.
    fn adaptive_target(&self, params: &RegulationParameters, inputs: &CellInputs) -> f64 {
        let d_catch = inputs.annual_catch - self.previous_catch;
        let d_effort = inputs.annual_effort - self.previous_effort;
        let product = d_catch * d_effort;
        let direction = if product.is_nan() || product == 0.0 {
            0.0
        } else {
            product.signum()
        };
        inputs.annual_effort * (1.0 + params.adaptive_step * direction)
    }
}

/// Drivers of one annual evaluation.
#[derive(Debug, Clone)]
pub struct RegulationDrivers<'a> {
    /// Current effort, `[lat, lon, group]`.
    pub effort: ArrayView3<'a, f64>,
    pub catchability: ArrayView1<'a, f64>,
    pub societal_enforcement: ArrayView2<'a, f64>,
    pub enforcement_is_time_varying: bool,
    pub target_effort: Option<ArrayView3<'a, f64>>,
    pub dt: f64,
}

/// Outcome counts of one annual evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub onsets: usize,
    pub without_target: usize,
}

/// Everything a [`Regulator`] needs to continue in a later run. Windows are
/// `[len, lat, lon, group]` oldest first, with land stored as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulationRestart {
    pub cells: Array3<CellRegulation>,
    pub catch_window: Array4<f64>,
    pub effort_window: Array4<f64>,
    /// `[len, 1, 1, group]`
    pub catchability_window: Array4<f64>,
}

/// Per-triple regulation state for the whole grid plus the windows it reads.
#[derive(Debug, Clone)]
pub struct Regulator {
    params: RegulationParameters,
    cells: Array3<CellRegulation>,
    catch_window: RollingWindow,
    effort_window: RollingWindow,
    catchability_window: RollingWindow,
}

impl Regulator {
    pub fn new(params: RegulationParameters, shape: (usize, usize, usize)) -> Self {
        Self {
            catch_window: RollingWindow::new(params.times_length, shape),
            effort_window: RollingWindow::new(params.times_length, shape),
            catchability_window: RollingWindow::new(MONTHS_PER_YEAR, (1, 1, shape.2)),
            cells: Array3::from_elem(shape, CellRegulation::default()),
            params,
        }
    }

    /// Continue from the state of an earlier run.
    pub fn restore(
        params: RegulationParameters,
        state: &RegulationRestart,
        shape: (usize, usize, usize),
        ocean: &Array2<bool>,
    ) -> BoatsResult<Self> {
        check_shape(
            "regulation cells",
            &[shape.0, shape.1, shape.2],
            state.cells.shape(),
        )?;
        Ok(Self {
            catch_window: RollingWindow::from_restart(
                "catch_window",
                params.times_length,
                shape,
                &state.catch_window,
                Some(ocean),
            )?,
            effort_window: RollingWindow::from_restart(
                "effort_window",
                params.times_length,
                shape,
                &state.effort_window,
                Some(ocean),
            )?,
            catchability_window: RollingWindow::from_restart(
                "catchability_window",
                MONTHS_PER_YEAR,
                (1, 1, shape.2),
                &state.catchability_window,
                None,
            )?,
            cells: state.cells.clone(),
            params,
        })
    }

    pub fn restart_state(&self) -> RegulationRestart {
        RegulationRestart {
            cells: self.cells.clone(),
            catch_window: self.catch_window.to_restart(),
            effort_window: self.effort_window.to_restart(),
            catchability_window: self.catchability_window.to_restart(),
        }
    }

    pub fn parameters(&self) -> &RegulationParameters {
        &self.params
    }

    pub fn cells(&self) -> &Array3<CellRegulation> {
        &self.cells
    }

    /// Evaluations happen at the start of every year but the first.
    pub fn is_due(step: usize) -> bool {
        step >= MONTHS_PER_YEAR && step % MONTHS_PER_YEAR == 0
    }

    /// Remember one month of catch (g m^-2), effort and catchability.
    pub fn record(&mut self, catch: &Array3<f64>, effort: &Array3<f64>, catchability: ArrayView1<f64>) {
        self.catch_window.push(catch.view());
        self.effort_window.push(effort.view());
        let q = Array3::from_shape_fn((1, 1, catchability.len()), |(_, _, g)| catchability[g]);
        self.catchability_window.push(q.view());
    }

    /// Evaluate every triple in parallel.
    pub fn evaluate(&mut self, step: usize, drivers: &RegulationDrivers) -> EvaluationSummary {
        let annual_catch = self.catch_window.sum_last(MONTHS_PER_YEAR);
        let annual_effort = self.effort_window.mean_last(MONTHS_PER_YEAR);
        let mean_catchability = self.catchability_window.mean();

        let Self {
            params,
            cells,
            catch_window,
            effort_window,
            ..
        } = self;
        let params = &*params;
        let catch_window = &*catch_window;
        let effort_window = &*effort_window;

        let outcomes = Zip::indexed(cells).par_map_collect(|(i, j, g), cell| {
            let forced =
                drivers.enforcement_is_time_varying && drivers.societal_enforcement[[i, j]] > 0.0;
            let inputs = CellInputs {
                step,
                annual_catch: annual_catch[[i, j, g]],
                annual_effort: annual_effort[[i, j, g]],
                effort: drivers.effort[[i, j, g]],
                catch_series: catch_window.cell_series(i, j, g),
                effort_series: effort_window.cell_series(i, j, g),
                catchability: drivers.catchability[g],
                mean_catchability: mean_catchability[[0, 0, g]],
                forced,
                external_target: drivers.target_effort.as_ref().map(|t| t[[i, j, g]]),
                dt: drivers.dt,
            };
            let outcome = cell.evaluate(params, &inputs);
            if outcome == Evaluation::NoTarget {
                debug!(lat = i, lon = j, group = g, step, "no acceptable target effort");
            }
            outcome
        });

        let summary = outcomes.iter().fold(EvaluationSummary::default(), |mut acc, o| {
            match o {
                Evaluation::Onset => acc.onsets += 1,
                Evaluation::NoTarget => acc.without_target += 1,
                Evaluation::Unchanged => {}
            }
            acc
        });
        if summary.onsets > 0 {
            info!(
                step,
                onsets = summary.onsets,
                strategy = %self.params.strategy,
                "regulation onset"
            );
        }
        if summary.without_target > 0 {
            warn!(
                step,
                triples = summary.without_target,
                strategy = %self.params.strategy,
                "regulation triggered without an acceptable target effort"
            );
        }
        debug!(step, regulated = self.n_regulated(), "regulation evaluated");
        summary
    }

    /// Blend the open-access tendency with the pull towards the target in regulated triples.
    pub fn blend_effort_change(
        &self,
        change: &mut Array3<f64>,
        annual_mean_effort: &Array3<f64>,
        societal_enforcement: ArrayView2<f64>,
    ) {
        let k_s = self.params.k_s;
        Zip::indexed(change)
            .and(&self.cells)
            .and(annual_mean_effort)
            .for_each(|(i, j, _), d, cell, &effort_avg| {
                if cell.is_regulated() {
                    let se = societal_enforcement[[i, j]];
                    *d = *d * (1.0 - se) + k_s * se * (cell.target_effort - effort_avg);
                }
            });
    }

    pub fn n_regulated(&self) -> usize {
        self.cells.iter().filter(|c| c.is_regulated()).count()
    }

    pub fn diagnostics(&self) -> RegulationDiagnostics {
        RegulationDiagnostics {
            strategy: self.params.strategy,
            status: self.cells.map(|c| c.status),
            onset_step: self.cells.map(|c| c.onset_step),
            annual_harvest_max: self.cells.map(|c| c.annual_harvest_max),
            target_effort: self.cells.map(|c| c.target_effort),
            fit: self.cells.map(|c| c.fit),
        }
    }
}

/// Per-triple regulation state for external reporting, each field `[lat, lon, group]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulationDiagnostics {
    pub strategy: RegulationStrategy,
    pub status: Array3<RegulationStatus>,
    pub onset_step: Array3<Option<usize>>,
    pub annual_harvest_max: Array3<f64>,
    pub target_effort: Array3<f64>,
    pub fit: Array3<Option<LinearFit>>,
}

impl RegulationDiagnostics {
    pub fn n_regulated(&self) -> usize {
        self.status
            .iter()
            .filter(|s| **s == RegulationStatus::Regulated)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DT;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    fn regulator(strategy: RegulationStrategy) -> Regulator {
        let params = RegulationParameters {
            strategy,
            times_length: 12,
            ..Default::default()
        };
        Regulator::new(params, (1, 1, 1))
    }

    /// Run a single-triple regulator over monthly catch and effort series.
    fn drive(
        regulator: &mut Regulator,
        catches: &[f64],
        efforts: &[f64],
        enforcement: f64,
        external_target: Option<f64>,
    ) -> Vec<(usize, EvaluationSummary)> {
        let q = array![1.0];
        let se = Array2::from_elem((1, 1), enforcement);
        let target = external_target.map(|t| Array3::from_elem((1, 1, 1), t));
        let mut evaluations = Vec::new();
        for (step, (&c, &e)) in catches.iter().zip(efforts.iter()).enumerate() {
            if Regulator::is_due(step) {
                let current = Array3::from_elem((1, 1, 1), e);
                let drivers = RegulationDrivers {
                    effort: current.view(),
                    catchability: q.view(),
                    societal_enforcement: se.view(),
                    enforcement_is_time_varying: enforcement > 0.0,
                    target_effort: target.as_ref().map(|t| t.view()),
                    dt: DT,
                };
                evaluations.push((step, regulator.evaluate(step, &drivers)));
            }
            regulator.record(
                &Array3::from_elem((1, 1, 1), c),
                &Array3::from_elem((1, 1, 1), e),
                q.view(),
            );
        }
        evaluations
    }

    fn cell(regulator: &Regulator) -> &CellRegulation {
        &regulator.cells()[[0, 0, 0]]
    }

    #[test]
    fn test_evaluation_schedule() {
        assert!(!Regulator::is_due(0));
        assert!(!Regulator::is_due(11));
        assert!(Regulator::is_due(12));
        assert!(!Regulator::is_due(13));
        assert!(Regulator::is_due(36));
    }

    #[test]
    fn test_onset_at_first_qualifying_january() {
        let mut regulator = regulator(RegulationStrategy::Adaptive);
        let mut catches = vec![1.0; 24];
        catches.extend(vec![0.5; 24]);
        let efforts = vec![1.0; 48];

        let evaluations = drive(&mut regulator, &catches, &efforts, 0.0, None);

        let onsets: Vec<usize> = evaluations
            .iter()
            .filter(|(_, s)| s.onsets > 0)
            .map(|(step, _)| *step)
            .collect();
        assert_eq!(onsets, vec![36]);
        assert_eq!(cell(&regulator).onset_step, Some(36));
        assert_relative_eq!(cell(&regulator).annual_harvest_max, 12.0);
    }

    #[test]
    fn test_decline_above_threshold_does_not_trigger() {
        let mut regulator = regulator(RegulationStrategy::Adaptive);
        let mut catches = vec![1.0; 24];
        catches.extend(vec![0.95; 24]);
        drive(&mut regulator, &catches, &[1.0; 48], 0.0, None);
        assert!(!cell(&regulator).is_regulated());
    }

    #[test]
    fn test_negligible_harvest_never_triggers() {
        let mut regulator = regulator(RegulationStrategy::Adaptive);
        drive(&mut regulator, &[0.0; 60], &[0.0; 60], 0.0, None);
        assert!(!cell(&regulator).is_regulated());
        assert_eq!(cell(&regulator).annual_harvest_max, 0.0);
    }

    #[test]
    fn test_regulation_is_monotonic() {
        let mut regulator = regulator(RegulationStrategy::Adaptive);
        let mut catches = vec![1.0; 24];
        catches.extend(vec![0.5; 24]);
        catches.extend(vec![2.0; 48]);
        let efforts = vec![1.0; catches.len()];

        let mut regulated_since = None;
        for end in (12..=catches.len()).step_by(12) {
            let mut fresh = regulator.clone();
            drive(&mut fresh, &catches[..end], &efforts[..end], 0.0, None);
            if fresh.n_regulated() > 0 && regulated_since.is_none() {
                regulated_since = Some(end);
            }
            if regulated_since.is_some() {
                assert!(cell(&fresh).is_regulated(), "reverted after {end} months");
                assert_eq!(cell(&fresh).onset_step, Some(36));
            }
        }
        assert!(regulated_since.is_some());
    }

    #[test]
    fn test_stock_assessment_recovers_schaefer_target() {
        let mut regulator = regulator(RegulationStrategy::StockAssessment);
        let efforts: Vec<f64> = (0..13).map(|t| 1.0 + 0.5 * t as f64).collect();
        let catches: Vec<f64> = efforts.iter().map(|e| (2.0 - 0.1 * e) * e * DT).collect();

        // Positive time-varying enforcement forces the assessment at step 12
        let evaluations = drive(&mut regulator, &catches, &efforts, 1.0, None);
        assert_eq!(evaluations[0].1.onsets, 1);

        let state = cell(&regulator);
        assert!(state.is_regulated());
        assert_relative_eq!(state.target_effort, 10.0, epsilon = 1e-6);
        let fit = state.fit.unwrap();
        assert_relative_eq!(fit.slope, -0.1, epsilon = 1e-9);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_stock_assessment_with_small_effort_units() {
        let scale = 1.0e-9;
        let mut regulator = regulator(RegulationStrategy::StockAssessment);
        let efforts: Vec<f64> = (0..13).map(|t| scale * (1.0 + 0.5 * t as f64)).collect();
        let catches: Vec<f64> = efforts
            .iter()
            .map(|e| (2.0 - 0.1 * e / scale) * e * DT)
            .collect();

        let evaluations = drive(&mut regulator, &catches, &efforts, 1.0, None);
        assert_eq!(evaluations[0].1.onsets, 1);
        let state = cell(&regulator);
        assert!(state.is_regulated());
        assert_relative_eq!(state.target_effort, 10.0 * scale, max_relative = 1e-3);
    }

    #[test]
    fn test_degenerate_fit_stays_unregulated() {
        let mut regulator = regulator(RegulationStrategy::StockAssessment);
        let evaluations = drive(&mut regulator, &[1.0; 25], &[2.0; 25], 1.0, None);
        assert_eq!(evaluations.len(), 2);
        for (_, summary) in evaluations {
            assert_eq!(summary.onsets, 0);
            assert_eq!(summary.without_target, 1);
        }
        assert!(!cell(&regulator).is_regulated());
        assert!(cell(&regulator).target_effort.is_nan());
    }

    #[test]
    fn test_omniscient_target_requires_excess_effort() {
        let mut catches = vec![1.0; 24];
        catches.extend(vec![0.5; 13]);

        let mut over = regulator(RegulationStrategy::Omniscient);
        drive(&mut over, &catches, &[5.0; 37], 0.0, Some(2.0));
        assert!(cell(&over).is_regulated());
        assert_relative_eq!(cell(&over).target_effort, 2.0, epsilon = 1e-9);

        let mut under = regulator(RegulationStrategy::Omniscient);
        drive(&mut under, &catches, &[1.0; 37], 0.0, Some(2.0));
        assert!(!cell(&under).is_regulated());
    }

    #[test]
    fn test_omniscient_compares_current_effort() {
        let mut catches = vec![1.0; 24];
        catches.extend(vec![0.5; 13]);
        // A year of low effort, then a jump in the month of the evaluation
        let mut efforts = vec![1.0; 36];
        efforts.push(5.0);

        let mut regulator = regulator(RegulationStrategy::Omniscient);
        drive(&mut regulator, &catches, &efforts, 0.0, Some(2.0));
        assert!(cell(&regulator).is_regulated());
        assert_eq!(cell(&regulator).onset_step, Some(36));
    }

    #[test]
    fn test_blend_pulls_towards_target() {
        let mut catches = vec![1.0; 24];
        catches.extend(vec![0.5; 13]);
        let mut regulator = regulator(RegulationStrategy::Omniscient);
        drive(&mut regulator, &catches, &[5.0; 37], 0.0, Some(2.0));

        let effort_avg = Array3::from_elem((1, 1, 1), 5.0);
        let mut change = Array3::from_elem((1, 1, 1), 3.0);
        regulator.blend_effort_change(&mut change, &effort_avg, Array2::from_elem((1, 1), 0.5).view());
        // 3 * 0.5 + 0.5 * (2 - 5)
        assert_relative_eq!(change[[0, 0, 0]], 0.0, epsilon = 1e-9);

        let mut change = Array3::from_elem((1, 1, 1), 3.0);
        regulator.blend_effort_change(&mut change, &effort_avg, Array2::from_elem((1, 1), 0.0).view());
        assert_relative_eq!(change[[0, 0, 0]], 3.0);
    }

    #[test]
    fn test_unregulated_change_untouched() {
        let regulator = regulator(RegulationStrategy::StockAssessment);
        let mut change = Array3::from_elem((1, 1, 1), 3.0);
        regulator.blend_effort_change(
            &mut change,
            &Array3::zeros((1, 1, 1)),
            Array2::from_elem((1, 1), 1.0).view(),
        );
        assert_eq!(change[[0, 0, 0]], 3.0);
    }

    #[test]
    fn test_restored_regulator_continues() {
        let mut catches = vec![1.0; 24];
        catches.extend(vec![0.5; 13]);
        let efforts = vec![1.0; 37];

        let mut whole = regulator(RegulationStrategy::Adaptive);
        drive(&mut whole, &catches, &efforts, 0.0, None);

        // Stop after two years, carry the state through JSON and finish the third
        let mut first = regulator(RegulationStrategy::Adaptive);
        drive(&mut first, &catches[..24], &efforts[..24], 0.0, None);
        let json = serde_json::to_string(&first.restart_state()).unwrap();
        let state: RegulationRestart = serde_json::from_str(&json).unwrap();
        let mut second =
            Regulator::restore(first.parameters().clone(), &state, (1, 1, 1), &array![[true]]).unwrap();
        assert!(cell(&second).target_effort.is_nan());
        assert_relative_eq!(cell(&second).annual_harvest_max, 12.0);

        let q = array![1.0];
        let se = Array2::zeros((1, 1));
        let current = Array3::from_elem((1, 1, 1), 1.0);
        for step in 24..37 {
            if Regulator::is_due(step) {
                let drivers = RegulationDrivers {
                    effort: current.view(),
                    catchability: q.view(),
                    societal_enforcement: se.view(),
                    enforcement_is_time_varying: false,
                    target_effort: None,
                    dt: DT,
                };
                second.evaluate(step, &drivers);
            }
            second.record(
                &Array3::from_elem((1, 1, 1), catches[step]),
                &current,
                q.view(),
            );
        }
        assert_eq!(cell(&second), cell(&whole));
        assert_eq!(cell(&second).onset_step, Some(36));
    }

    #[test]
    fn test_diagnostics_report_onsets() {
        let mut catches = vec![1.0; 24];
        catches.extend(vec![0.5; 13]);
        let mut regulator = regulator(RegulationStrategy::Adaptive);
        drive(&mut regulator, &catches, &[1.0; 37], 0.0, None);
        let diagnostics = regulator.diagnostics();
        assert_eq!(diagnostics.n_regulated(), 1);
        assert_eq!(diagnostics.onset_step[[0, 0, 0]], Some(36));
        assert_eq!(diagnostics.strategy, RegulationStrategy::Adaptive);
    }
}
