//! Idealised scenario described in the `[scenario]` table of a run file
//!
//! A rectangular all-ocean grid, log-spaced mass classes and spatially uniform,
//! constant forcing. Initial biomass follows `B(m) = initial_biomass / m`.

use boats_core::forcing::{Forcing, ForcingField, GroupSeries, TargetEffort};
use boats_core::grid::{Grid, MassClasses};
use boats_core::BoatsResult;
use ndarray::{Array3, Array4};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    scenario: Scenario,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// default: 4
    pub n_lat: usize,
    /// default: 4
    pub n_lon: usize,
    /// Cell area (m^2).
    /// default: 1.0e8
    pub cell_area: f64,
    /// default: 10.0
    pub mass_min: f64,
    /// default: 1.0e5
    pub mass_max: f64,
    /// default: 30
    pub n_mass: usize,
    /// default: 500.0
    pub primary_production: f64,
    /// default: 0.5
    pub primary_production_euphotic: f64,
    /// default: 15.0
    pub temperature: f64,
    /// default: 2.0e-3
    pub price: f64,
    /// default: 1.0e-4
    pub cost_per_effort: f64,
    /// default: 0.5
    pub catchability: f64,
    /// default: 0.0
    pub societal_enforcement: f64,
    /// Externally estimated effective target effort, required by `omnT`.
    pub target_effort: Option<f64>,
    /// default: 1.0e-2
    pub initial_biomass: f64,
    /// default: 1.0
    pub initial_effort: f64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            n_lat: 4,
            n_lon: 4,
            cell_area: 1.0e8,
            mass_min: 10.0,
            mass_max: 1.0e5,
            n_mass: 30,
            primary_production: 500.0,
            primary_production_euphotic: 0.5,
            temperature: 15.0,
            price: 2.0e-3,
            cost_per_effort: 1.0e-4,
            catchability: 0.5,
            societal_enforcement: 0.0,
            target_effort: None,
            initial_biomass: 1.0e-2,
            initial_effort: 1.0,
        }
    }
}

impl Scenario {
    /// Read the `[scenario]` table, falling back to defaults when it is absent.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        let file: ScenarioFile = toml::from_str(contents)?;
        Ok(file.scenario)
    }

    pub fn grid(&self) -> BoatsResult<Grid> {
        let classes = MassClasses::log_spaced(self.mass_min, self.mass_max, self.n_mass)?;
        Grid::uniform(self.n_lat, self.n_lon, self.cell_area, classes)
    }

    pub fn forcing(&self, grid: &Grid, n_groups: usize) -> Forcing {
        let mut forcing = Forcing::uniform_ecology(
            grid,
            n_groups,
            self.primary_production,
            self.primary_production_euphotic,
            self.temperature,
        )
        .with_economics(
            GroupSeries::uniform(n_groups, self.price),
            GroupSeries::uniform(n_groups, self.cost_per_effort),
            GroupSeries::uniform(n_groups, self.catchability),
        )
        .with_societal_enforcement(ForcingField::uniform(
            grid.n_lat(),
            grid.n_lon(),
            self.societal_enforcement,
        ));
        if let Some(target) = self.target_effort {
            forcing = forcing.with_target_effort(TargetEffort::Constant(
                Array3::from_elem(grid.spatial_shape(n_groups), target),
            ));
        }
        forcing
    }

    pub fn initial_biomass(&self, grid: &Grid, n_groups: usize) -> Array4<f64> {
        let mass = grid.mass_classes().mass();
        Array4::from_shape_fn(grid.full_shape(n_groups), |(_, _, _, k)| {
            self.initial_biomass / mass[k]
        })
    }

    pub fn initial_effort(&self, grid: &Grid, n_groups: usize) -> Array3<f64> {
        Array3::from_elem(grid.spatial_shape(n_groups), self.initial_effort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_table_uses_defaults() {
        let scenario = Scenario::from_toml_str("[run]\nn_years = 2\n").unwrap();
        assert_eq!(scenario.n_lat, 4);
        assert_eq!(scenario.n_mass, 30);
    }

    #[test]
    fn test_scenario_builds_consistent_inputs() {
        let scenario = Scenario::from_toml_str(
            r#"
            [scenario]
            n_lat = 2
            n_lon = 3
            n_mass = 8
            target_effort = 0.5
            "#,
        )
        .unwrap();
        let grid = scenario.grid().unwrap();
        let forcing = scenario.forcing(&grid, 3);
        assert!(forcing.validate(&grid, 3, 12).is_ok());
        assert!(forcing.target_effort.is_some());
        assert_eq!(scenario.initial_biomass(&grid, 3).dim(), (2, 3, 3, 8));
        assert_eq!(scenario.initial_effort(&grid, 3).dim(), (2, 3, 3));
    }
}
