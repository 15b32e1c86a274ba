//! Economic Effort Engine
//!
//! Open-access fishing: effort enters a cell/group when it is profitable and leaves
//! when it is not.
//!
//! 1. Harvest, capped by the provisional biomass:
//!    $$H = \min\left(\frac{B^*}{\Delta t},\; q (E + \epsilon)\, s_g(m)\, B^*\right)$$
//! 2. Revenue $R = \sum_m p\, H\, \Delta m$ and cost $C = c (E + \epsilon)$
//! 3. Effort change $\dot E = k_e (R - C) / (E + \epsilon)$, integrated with the model
//!    timestep and clamped at zero.
//!
//! Effort, revenue and cost are remembered over the last 12 months.

use crate::constants::{EPSILON, MONTHS_PER_YEAR};
use crate::ecology::clamp_non_negative;
use crate::errors::BoatsResult;
use crate::grid::Grid;
use crate::memory::RollingWindow;
use crate::parameters::{EconomyParameters, EcologyParameters};
use ndarray::{Array1, Array2, Array3, Array4, ArrayView1, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Sum that ignores NaN entries but is NaN when every entry is NaN.
pub fn nan_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut total = 0.0;
    let mut any = false;
    for v in values {
        if !v.is_nan() {
            total += v;
            any = true;
        }
    }
    if any {
        total
    } else {
        f64::NAN
    }
}

/// Gear selectivity by group and mass class, `[group, mass]`.
pub fn selectivity(
    mass: &Array1<f64>,
    ecology: &EcologyParameters,
    economy: &EconomyParameters,
) -> Array2<f64> {
    Array2::from_shape_fn((ecology.n_groups(), mass.len()), |(g, k)| {
        let group = &ecology.groups[g];
        let m50 = group.selectivity_fraction * group.asymptotic_mass;
        1.0 / (1.0 + (mass[k] / m50).powf(-economy.selectivity_slope))
    })
}

/// Contents of the 12-month memories, each `[len, lat, lon, group]` oldest first, with
/// land stored as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicMemories {
    pub effort: Array4<f64>,
    pub revenue: Array4<f64>,
    pub cost: Array4<f64>,
}

/// Persistent economic state.
#[derive(Debug, Clone)]
pub struct EconomicState {
    /// Effort, `[lat, lon, group]`.
    pub effort: Array3<f64>,
    pub effort_memory: RollingWindow,
    pub revenue_memory: RollingWindow,
    pub cost_memory: RollingWindow,
}

impl EconomicState {
    pub fn new(effort: Array3<f64>) -> Self {
        let shape = effort.dim();
        Self {
            effort,
            effort_memory: RollingWindow::new(MONTHS_PER_YEAR, shape),
            revenue_memory: RollingWindow::new(MONTHS_PER_YEAR, shape),
            cost_memory: RollingWindow::new(MONTHS_PER_YEAR, shape),
        }
    }

    /// Continue with `effort` and the memories of an earlier run.
    pub fn restore(
        effort: Array3<f64>,
        memories: &EconomicMemories,
        ocean: &Array2<bool>,
    ) -> BoatsResult<Self> {
        let shape = effort.dim();
        let window = |name: &str, history: &Array4<f64>| {
            RollingWindow::from_restart(name, MONTHS_PER_YEAR, shape, history, Some(ocean))
        };
        Ok(Self {
            effort_memory: window("effort_memory", &memories.effort)?,
            revenue_memory: window("revenue_memory", &memories.revenue)?,
            cost_memory: window("cost_memory", &memories.cost)?,
            effort,
        })
    }

    pub fn memories(&self) -> EconomicMemories {
        EconomicMemories {
            effort: self.effort_memory.to_restart(),
            revenue: self.revenue_memory.to_restart(),
            cost: self.cost_memory.to_restart(),
        }
    }

    /// Mean effort over the last 12 months (or fewer at the start of a run).
    pub fn annual_mean_effort(&self) -> Array3<f64> {
        self.effort_memory.mean()
    }

    pub fn annual_mean_revenue(&self) -> Array3<f64> {
        self.revenue_memory.mean()
    }

    pub fn annual_mean_cost(&self) -> Array3<f64> {
        self.cost_memory.mean()
    }

    /// Record one month of effort, revenue and cost.
    pub fn remember(&mut self, revenue: &Array3<f64>, cost: &Array3<f64>) {
        self.effort_memory.push(self.effort.view());
        self.revenue_memory.push(revenue.view());
        self.cost_memory.push(cost.view());
    }

    /// Forward-Euler effort update, clamped at zero.
    pub fn integrate(&mut self, change: &Array3<f64>, dt: f64) {
        Zip::from(&mut self.effort)
            .and(change)
            .for_each(|e, &de| *e += de * dt);
        clamp_non_negative(&mut self.effort);
    }
}

/// Harvest and its economic consequences for one timestep.
#[derive(Debug, Clone)]
pub struct EconomicStep {
    /// `[lat, lon, group, mass]`
    pub harvest: Array4<f64>,
    /// `[lat, lon, group]`
    pub revenue: Array3<f64>,
    pub cost: Array3<f64>,
    /// Catch of the month, integrated over mass classes (g m^-2).
    pub catch: Array3<f64>,
}

impl EconomicStep {
    pub fn profit(&self) -> Array3<f64> {
        &self.revenue - &self.cost
    }
}

/// Stateless economic kernels plus the precomputed selectivity.
#[derive(Debug, Clone)]
pub struct EffortEngine {
    params: EconomyParameters,
    selectivity: Array2<f64>,
    width: Array1<f64>,
}

impl EffortEngine {
    pub fn new(grid: &Grid, ecology: &EcologyParameters, params: &EconomyParameters) -> Self {
        Self {
            params: params.clone(),
            selectivity: selectivity(grid.mass_classes().mass(), ecology, params),
            width: grid.mass_classes().width().clone(),
        }
    }

    pub fn selectivity(&self) -> &Array2<f64> {
        &self.selectivity
    }

    /// Harvest rate (g m^-2 g^-1 yr^-1), never exceeding `provisional / dt`.
    pub fn harvest(
        &self,
        provisional: &Array4<f64>,
        effort: &Array3<f64>,
        catchability: ArrayView1<f64>,
        dt: f64,
    ) -> Array4<f64> {
        let mut harvest = Array4::from_elem(provisional.raw_dim(), f64::NAN);
        Zip::indexed(harvest.lanes_mut(Axis(3)))
            .and(provisional.lanes(Axis(3)))
            .and(effort)
            .par_for_each(|(_, _, g), mut h, b, &e| {
                let q = catchability[g];
                for k in 0..h.len() {
                    if b[k].is_nan() {
                        continue;
                    }
                    h[k] = capped_harvest(b[k], q * (e + EPSILON) * self.selectivity[[g, k]] * b[k], dt);
                }
            });
        harvest
    }

    /// Revenue per cell/group: price times harvest integrated over mass classes.
    pub fn revenue(&self, harvest: &Array4<f64>, price: ArrayView1<f64>) -> Array3<f64> {
        self.integrate_mass(harvest, |g| price[g])
    }

    /// Harvest integrated over mass classes (g m^-2 yr^-1).
    pub fn total_harvest(&self, harvest: &Array4<f64>) -> Array3<f64> {
        self.integrate_mass(harvest, |_| 1.0)
    }

    fn integrate_mass(&self, field: &Array4<f64>, weight: impl Fn(usize) -> f64 + Sync) -> Array3<f64> {
        let (n_lat, n_lon, n_groups, _) = field.dim();
        let mut out = Array3::zeros((n_lat, n_lon, n_groups));
        Zip::indexed(&mut out)
            .and(field.lanes(Axis(3)))
            .par_for_each(|(_, _, g), o, lane| {
                let w = weight(g);
                *o = nan_sum(lane.iter().zip(self.width.iter()).map(|(&h, &dm)| w * h * dm));
            });
        out
    }

    /// Cost per cell/group.
    pub fn cost(&self, effort: &Array3<f64>, cost_per_effort: ArrayView1<f64>) -> Array3<f64> {
        let mut cost = Array3::zeros(effort.raw_dim());
        Zip::indexed(&mut cost)
            .and(effort)
            .for_each(|(_, _, g), c, &e| *c = cost_per_effort[g] * (e + EPSILON));
        cost
    }

    /// Open-access effort tendency driven by profit.
    pub fn effort_change(
        &self,
        revenue: &Array3<f64>,
        cost: &Array3<f64>,
        effort: &Array3<f64>,
    ) -> Array3<f64> {
        let k_e = self.params.k_e;
        let mut change = Array3::zeros(effort.raw_dim());
        Zip::from(&mut change)
            .and(revenue)
            .and(cost)
            .and(effort)
            .for_each(|d, &r, &c, &e| *d = k_e * (r - c) / (e + EPSILON));
        change
    }

    /// Harvest, revenue, cost and catch for the current month.
    pub fn step(
        &self,
        provisional: &Array4<f64>,
        effort: &Array3<f64>,
        catchability: ArrayView1<f64>,
        price: ArrayView1<f64>,
        cost_per_effort: ArrayView1<f64>,
        dt: f64,
    ) -> EconomicStep {
        let harvest = self.harvest(provisional, effort, catchability, dt);
        let revenue = self.revenue(&harvest, price);
        let cost = self.cost(effort, cost_per_effort);
        let catch = self.total_harvest(&harvest) * dt;
        EconomicStep {
            harvest,
            revenue,
            cost,
            catch,
        }
    }
}

/// Harvest bounded by the available biomass; negative values are numerical noise.
pub fn capped_harvest(provisional: f64, uncapped: f64, dt: f64) -> f64 {
    let h = uncapped.min(provisional / dt);
    if h < 0.0 {
        0.0
    } else {
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MassClasses;
    use crate::parameters::GroupParameters;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn engine() -> EffortEngine {
        let classes = MassClasses::new(array![1.0, 10.0], array![1.0, 2.0]).unwrap();
        let grid = Grid::uniform(1, 1, 1.0, classes).unwrap();
        let ecology = EcologyParameters {
            groups: vec![GroupParameters::new("only", 100.0, 0.05)],
            ..Default::default()
        };
        EffortEngine::new(&grid, &ecology, &EconomyParameters::default())
    }

    #[test]
    fn test_cap_is_binding() {
        // Uncapped harvest of 50 against 10 units of provisional biomass
        assert_eq!(capped_harvest(10.0, 50.0, 1.0), 10.0);
        assert_eq!(capped_harvest(10.0, 5.0, 1.0), 5.0);
    }

    #[test]
    fn test_negative_harvest_clamped() {
        assert_eq!(capped_harvest(-1.0, -0.1, 1.0), 0.0);
    }

    #[test]
    fn test_harvest_never_exceeds_provisional_biomass() {
        let engine = engine();
        let provisional = Array4::from_elem((1, 1, 1, 2), 10.0);
        let effort = Array3::from_elem((1, 1, 1), 1.0e6);
        let harvest = engine.harvest(&provisional, &effort, array![1.0].view(), 1.0);
        for &h in harvest.iter() {
            assert!(h <= 10.0 + 1e-12);
            assert!(h >= 0.0);
        }
        assert_relative_eq!(harvest[[0, 0, 0, 1]], 10.0);
    }

    #[test]
    fn test_selectivity_increases_with_mass() {
        let engine = engine();
        let s = engine.selectivity();
        assert!(s[[0, 0]] < s[[0, 1]]);
        assert!(s.iter().all(|&v| v > 0.0 && v < 1.0));
    }

    #[test]
    fn test_revenue_and_cost() {
        let engine = engine();
        let harvest = Array4::from_shape_vec((1, 1, 1, 2), vec![3.0, 4.0]).unwrap();
        let revenue = engine.revenue(&harvest, array![2.0].view());
        // 2 * (3 * 1 + 4 * 2)
        assert_relative_eq!(revenue[[0, 0, 0]], 22.0);

        let effort = Array3::from_elem((1, 1, 1), 5.0);
        let cost = engine.cost(&effort, array![3.0].view());
        assert_relative_eq!(cost[[0, 0, 0]], 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_revenue_on_land_is_nan() {
        let engine = engine();
        let harvest = Array4::from_elem((1, 1, 1, 2), f64::NAN);
        assert!(engine.revenue(&harvest, array![2.0].view())[[0, 0, 0]].is_nan());
    }

    #[test]
    fn test_effort_follows_profit() {
        let engine = engine();
        let effort = Array3::from_elem((1, 1, 1), 2.0);
        let profitable = engine.effort_change(
            &Array3::from_elem((1, 1, 1), 10.0),
            &Array3::from_elem((1, 1, 1), 4.0),
            &effort,
        );
        assert_relative_eq!(profitable[[0, 0, 0]], 3.0, epsilon = 1e-12);
        let losing = engine.effort_change(
            &Array3::from_elem((1, 1, 1), 1.0),
            &Array3::from_elem((1, 1, 1), 4.0),
            &effort,
        );
        assert!(losing[[0, 0, 0]] < 0.0);
    }

    #[test]
    fn test_effort_clamped_at_zero() {
        let mut state = EconomicState::new(Array3::from_elem((1, 1, 1), 1.0));
        state.integrate(&Array3::from_elem((1, 1, 1), -100.0), 1.0 / 12.0);
        assert_eq!(state.effort[[0, 0, 0]], 0.0);
    }

    #[test]
    fn test_annual_memories_hold_twelve_months() {
        let mut state = EconomicState::new(Array3::from_elem((1, 1, 1), 1.0));
        for month in 0..20 {
            let revenue = Array3::from_elem((1, 1, 1), month as f64);
            state.remember(&revenue, &Array3::zeros((1, 1, 1)));
        }
        assert_eq!(state.revenue_memory.len(), 12);
        // Months 8..=19
        assert_relative_eq!(state.annual_mean_revenue()[[0, 0, 0]], 13.5);
        assert_relative_eq!(state.annual_mean_effort()[[0, 0, 0]], 1.0);
    }

    #[test]
    fn test_restored_memories_continue_the_year() {
        let ocean = array![[true, false]];
        let mut effort = Array3::from_elem((1, 2, 1), 2.0);
        effort[[0, 1, 0]] = f64::NAN;
        let mut state = EconomicState::new(effort.clone());
        for month in 0..15 {
            let mut revenue = Array3::from_elem((1, 2, 1), month as f64);
            revenue[[0, 1, 0]] = f64::NAN;
            state.remember(&revenue, &Array3::zeros((1, 2, 1)));
        }

        let restored = EconomicState::restore(effort, &state.memories(), &ocean).unwrap();
        assert_eq!(restored.annual_mean_revenue()[[0, 0, 0]], state.annual_mean_revenue()[[0, 0, 0]]);
        assert!(restored.annual_mean_revenue()[[0, 1, 0]].is_nan());
        assert_relative_eq!(restored.annual_mean_effort()[[0, 0, 0]], 2.0);

        let wrong = Array3::from_elem((2, 2, 1), 1.0);
        assert!(EconomicState::restore(wrong, &state.memories(), &array![[true, true], [true, true]]).is_err());
    }

    #[test]
    fn test_nan_sum() {
        assert!(nan_sum([f64::NAN, f64::NAN]).is_nan());
        assert_eq!(nan_sum([f64::NAN, 1.0, 2.0]), 3.0);
    }
}
