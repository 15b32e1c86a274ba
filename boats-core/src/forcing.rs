//! Forcing Adapter interface
//!
//! Environmental and economic drivers are loaded and interpolated elsewhere and
//! handed to the engine as pre-built arrays. This module only knows how to look a
//! value up for a given timestep:
//!
//! - `Constant`: the same field every timestep
//! - `Monthly`: a 12-month climatology indexed by `t % 12`
//! - `Series`: one entry per timestep
//!
//! Nothing in here touches files; the hot loop only indexes memory.

use crate::constants::MONTHS_PER_YEAR;
use crate::errors::{check_shape, BoatsError, BoatsResult};
use crate::grid::Grid;
use ndarray::{Array1, Array2, Array3, Array4, ArrayView1, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

/// A 2-D `[lat, lon]` driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForcingField {
    Constant(Array2<f64>),
    /// Shape `[12, lat, lon]`.
    Monthly(Array3<f64>),
    /// Shape `[time, lat, lon]`.
    Series(Array3<f64>),
}

impl ForcingField {
    pub fn uniform(n_lat: usize, n_lon: usize, value: f64) -> Self {
        Self::Constant(Array2::from_elem((n_lat, n_lon), value))
    }

    pub fn at(&self, step: usize) -> ArrayView2<'_, f64> {
        match self {
            Self::Constant(field) => field.view(),
            Self::Monthly(fields) => fields.index_axis(Axis(0), step % MONTHS_PER_YEAR),
            Self::Series(fields) => fields.index_axis(Axis(0), step),
        }
    }

    /// Whether the driver changes through the run.
    pub fn is_time_varying(&self) -> bool {
        !matches!(self, Self::Constant(_))
    }

    fn validate(&self, name: &str, grid: &Grid, n_steps: usize) -> BoatsResult<()> {
        let spatial = [grid.n_lat(), grid.n_lon()];
        let (found, expected) = match self {
            Self::Constant(field) => (field.shape().to_vec(), spatial.to_vec()),
            Self::Monthly(fields) => (
                fields.shape().to_vec(),
                vec![MONTHS_PER_YEAR, spatial[0], spatial[1]],
            ),
            Self::Series(fields) => {
                if fields.len_of(Axis(0)) < n_steps {
                    return Err(BoatsError::ForcingTooShort {
                        name: name.to_string(),
                        available: fields.len_of(Axis(0)),
                        required: n_steps,
                    });
                }
                (
                    fields.shape()[1..].to_vec(),
                    spatial.to_vec(),
                )
            }
        };
        check_shape(name, &expected, &found)
    }
}

/// A per-group driver (price, cost per effort, catchability).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GroupSeries {
    Constant(Array1<f64>),
    /// Shape `[12, group]`.
    Monthly(Array2<f64>),
    /// Shape `[time, group]`.
    Series(Array2<f64>),
}

impl GroupSeries {
    pub fn uniform(n_groups: usize, value: f64) -> Self {
        Self::Constant(Array1::from_elem(n_groups, value))
    }

    pub fn at(&self, step: usize) -> ArrayView1<'_, f64> {
        match self {
            Self::Constant(values) => values.view(),
            Self::Monthly(values) => values.index_axis(Axis(0), step % MONTHS_PER_YEAR),
            Self::Series(values) => values.index_axis(Axis(0), step),
        }
    }

    fn validate(&self, name: &str, n_groups: usize, n_steps: usize) -> BoatsResult<()> {
        match self {
            Self::Constant(values) => check_shape(name, &[n_groups], values.shape()),
            Self::Monthly(values) => {
                check_shape(name, &[MONTHS_PER_YEAR, n_groups], values.shape())
            }
            Self::Series(values) => {
                if values.nrows() < n_steps {
                    return Err(BoatsError::ForcingTooShort {
                        name: name.to_string(),
                        available: values.nrows(),
                        required: n_steps,
                    });
                }
                check_shape(name, &[n_groups], &values.shape()[1..])
            }
        }
    }
}

/// Externally estimated effective target effort, `[lat, lon, group]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TargetEffort {
    Constant(Array3<f64>),
    /// Shape `[time, lat, lon, group]`.
    Series(Array4<f64>),
}

impl TargetEffort {
    pub fn at(&self, step: usize) -> ArrayView3<'_, f64> {
        match self {
            Self::Constant(target) => target.view(),
            Self::Series(targets) => targets.index_axis(Axis(0), step),
        }
    }

    fn validate(&self, grid: &Grid, n_groups: usize, n_steps: usize) -> BoatsResult<()> {
        let expected = [grid.n_lat(), grid.n_lon(), n_groups];
        match self {
            Self::Constant(target) => check_shape("target_effort", &expected, target.shape()),
            Self::Series(targets) => {
                if targets.len_of(Axis(0)) < n_steps {
                    return Err(BoatsError::ForcingTooShort {
                        name: "target_effort".to_string(),
                        available: targets.len_of(Axis(0)),
                        required: n_steps,
                    });
                }
                check_shape("target_effort", &expected, &targets.shape()[1..])
            }
        }
    }
}

/// All drivers of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forcing {
    /// Areal primary production (g wet weight m^-2 yr^-1).
    pub primary_production: ForcingField,
    /// Primary production per euphotic volume, driving the large phytoplankton fraction.
    pub primary_production_euphotic: ForcingField,
    /// Temperature controlling metabolic activity (degC).
    pub temperature_activity: ForcingField,
    /// Temperature controlling natural mortality (degC).
    pub temperature_mortality: ForcingField,
    /// Spatially varying trophic efficiency. Falls back to the scalar parameter.
    pub trophic_efficiency: Option<ForcingField>,
    /// Ex-vessel price per gram.
    pub price: GroupSeries,
    /// Cost per unit effort per year.
    pub cost_per_effort: GroupSeries,
    /// Catchability before the harvest start time is ignored.
    pub catchability: GroupSeries,
    /// Strength of enforcement of regulation targets, in [0, 1].
    pub societal_enforcement: ForcingField,
    /// Required by the omniscient regulation strategy.
    pub target_effort: Option<TargetEffort>,
}

impl Forcing {
    /// Uniform ecological drivers with no economic activity.
    pub fn uniform_ecology(
        grid: &Grid,
        n_groups: usize,
        primary_production: f64,
        primary_production_euphotic: f64,
        temperature: f64,
    ) -> Self {
        let (n_lat, n_lon) = (grid.n_lat(), grid.n_lon());
        Self {
            primary_production: ForcingField::uniform(n_lat, n_lon, primary_production),
            primary_production_euphotic: ForcingField::uniform(
                n_lat,
                n_lon,
                primary_production_euphotic,
            ),
            temperature_activity: ForcingField::uniform(n_lat, n_lon, temperature),
            temperature_mortality: ForcingField::uniform(n_lat, n_lon, temperature),
            trophic_efficiency: None,
            price: GroupSeries::uniform(n_groups, 0.0),
            cost_per_effort: GroupSeries::uniform(n_groups, 0.0),
            catchability: GroupSeries::uniform(n_groups, 0.0),
            societal_enforcement: ForcingField::uniform(n_lat, n_lon, 0.0),
            target_effort: None,
        }
    }

    pub fn with_economics(mut self, price: GroupSeries, cost: GroupSeries, q: GroupSeries) -> Self {
        self.price = price;
        self.cost_per_effort = cost;
        self.catchability = q;
        self
    }

    pub fn with_societal_enforcement(mut self, enforcement: ForcingField) -> Self {
        self.societal_enforcement = enforcement;
        self
    }

    pub fn with_target_effort(mut self, target: TargetEffort) -> Self {
        self.target_effort = Some(target);
        self
    }

    pub fn with_trophic_efficiency(mut self, efficiency: ForcingField) -> Self {
        self.trophic_efficiency = Some(efficiency);
        self
    }

    /// Check every driver against the grid and run length.
    pub fn validate(&self, grid: &Grid, n_groups: usize, n_steps: usize) -> BoatsResult<()> {
        self.primary_production
            .validate("primary_production", grid, n_steps)?;
        self.primary_production_euphotic
            .validate("primary_production_euphotic", grid, n_steps)?;
        self.temperature_activity
            .validate("temperature_activity", grid, n_steps)?;
        self.temperature_mortality
            .validate("temperature_mortality", grid, n_steps)?;
        if let Some(efficiency) = &self.trophic_efficiency {
            efficiency.validate("trophic_efficiency", grid, n_steps)?;
        }
        self.price.validate("price", n_groups, n_steps)?;
        self.cost_per_effort
            .validate("cost_per_effort", n_groups, n_steps)?;
        self.catchability
            .validate("catchability", n_groups, n_steps)?;
        self.societal_enforcement
            .validate("societal_enforcement", grid, n_steps)?;
        if let Some(target) = &self.target_effort {
            target.validate(grid, n_groups, n_steps)?;
        }
        Ok(())
    }

    /// Views of every driver at one timestep.
    pub fn snapshot(&self, step: usize) -> ForcingSnapshot<'_> {
        ForcingSnapshot {
            step,
            primary_production: self.primary_production.at(step),
            primary_production_euphotic: self.primary_production_euphotic.at(step),
            temperature_activity: self.temperature_activity.at(step),
            temperature_mortality: self.temperature_mortality.at(step),
            trophic_efficiency: self.trophic_efficiency.as_ref().map(|f| f.at(step)),
            price: self.price.at(step),
            cost_per_effort: self.cost_per_effort.at(step),
            catchability: self.catchability.at(step),
            societal_enforcement: self.societal_enforcement.at(step),
            enforcement_is_time_varying: self.societal_enforcement.is_time_varying(),
            target_effort: self.target_effort.as_ref().map(|t| t.at(step)),
        }
    }
}

/// Drivers for a single timestep.
#[derive(Debug, Clone)]
pub struct ForcingSnapshot<'a> {
    pub step: usize,
    pub primary_production: ArrayView2<'a, f64>,
    pub primary_production_euphotic: ArrayView2<'a, f64>,
    pub temperature_activity: ArrayView2<'a, f64>,
    pub temperature_mortality: ArrayView2<'a, f64>,
    pub trophic_efficiency: Option<ArrayView2<'a, f64>>,
    pub price: ArrayView1<'a, f64>,
    pub cost_per_effort: ArrayView1<'a, f64>,
    pub catchability: ArrayView1<'a, f64>,
    pub societal_enforcement: ArrayView2<'a, f64>,
    pub enforcement_is_time_varying: bool,
    pub target_effort: Option<ArrayView3<'a, f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MassClasses;

    fn grid() -> Grid {
        Grid::uniform(2, 3, 1.0, MassClasses::log_spaced(1.0, 100.0, 4).unwrap()).unwrap()
    }

    #[test]
    fn test_monthly_field_wraps() {
        let fields = Array3::from_shape_fn((12, 2, 3), |(m, _, _)| m as f64);
        let forcing = ForcingField::Monthly(fields);
        assert_eq!(forcing.at(3)[[0, 0]], 3.0);
        assert_eq!(forcing.at(15)[[1, 2]], 3.0);
        assert!(forcing.is_time_varying());
    }

    #[test]
    fn test_series_too_short() {
        let forcing = ForcingField::Series(Array3::zeros((5, 2, 3)));
        let result = forcing.validate("pp", &grid(), 12);
        assert!(matches!(result, Err(BoatsError::ForcingTooShort { .. })));
    }

    #[test]
    fn test_shape_mismatch() {
        let forcing = Forcing::uniform_ecology(&grid(), 2, 100.0, 1.0, 15.0)
            .with_economics(
                GroupSeries::uniform(3, 1.0),
                GroupSeries::uniform(2, 1.0),
                GroupSeries::uniform(2, 1.0),
            );
        let result = forcing.validate(&grid(), 2, 12);
        assert!(matches!(result, Err(BoatsError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_snapshot_reads_catchability_by_group() {
        let series = Array2::from_shape_fn((24, 2), |(t, g)| (t * 10 + g) as f64);
        let forcing = Forcing::uniform_ecology(&grid(), 2, 100.0, 1.0, 15.0).with_economics(
            GroupSeries::uniform(2, 1.0),
            GroupSeries::uniform(2, 1.0),
            GroupSeries::Series(series),
        );
        assert!(forcing.validate(&grid(), 2, 24).is_ok());
        let snapshot = forcing.snapshot(7);
        assert_eq!(snapshot.catchability[1], 71.0);
        assert!(!snapshot.enforcement_is_time_varying);
    }
}
