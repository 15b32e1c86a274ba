//! Spatial and mass-class discretisation of the model domain
//!
//! The grid is fixed for the whole run. It carries:
//!
//! - the (lat, lon) cell layout with a cell area and an ocean mask,
//! - optional named region masks used by regional output integrals,
//! - the mass classes shared by every species group.
//!
//! How the grid itself is produced (coastlines, regridding) is outside this crate.

use crate::errors::{BoatsError, BoatsResult};
use ndarray::{Array1, Array2, Array4};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Discretised fish-mass axis
///
/// `mass` holds the representative mass of each class (g) and `width` the extent of
/// each class along the mass axis (g). Biomass is stored as a density per unit width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassClasses {
    mass: Array1<f64>,
    width: Array1<f64>,
}

impl MassClasses {
    pub fn new(mass: Array1<f64>, width: Array1<f64>) -> BoatsResult<Self> {
        if mass.is_empty() {
            return Err(BoatsError::InvalidParameter {
                name: "mass_classes".to_string(),
                reason: "at least one mass class is required".to_string(),
            });
        }
        if mass.len() != width.len() {
            return Err(BoatsError::ShapeMismatch {
                name: "mass_class_width".to_string(),
                expected: vec![mass.len()],
                found: vec![width.len()],
            });
        }
        if width.iter().any(|w| !(*w > 0.0)) || mass.iter().any(|m| !(*m > 0.0)) {
            return Err(BoatsError::InvalidParameter {
                name: "mass_classes".to_string(),
                reason: "masses and widths must be strictly positive".to_string(),
            });
        }
        if mass.windows(2).into_iter().any(|w| w[1] <= w[0]) {
            return Err(BoatsError::InvalidParameter {
                name: "mass_classes".to_string(),
                reason: "masses must be strictly increasing".to_string(),
            });
        }
        Ok(Self { mass, width })
    }

    /// Logarithmically spaced classes between `mass_min` and `mass_max`.
    ///
    /// Class edges are spaced evenly in log10(mass); the representative mass of a class
    /// is the geometric mean of its edges.
    pub fn log_spaced(mass_min: f64, mass_max: f64, n: usize) -> BoatsResult<Self> {
        if n == 0 || !(mass_min > 0.0) || !(mass_max > mass_min) {
            return Err(BoatsError::InvalidParameter {
                name: "mass_classes".to_string(),
                reason: format!("cannot build {n} classes between {mass_min} and {mass_max}"),
            });
        }
        let edges = Array1::logspace(10.0, mass_min.log10(), mass_max.log10(), n + 1);
        let mass = Array1::from_shape_fn(n, |k| (edges[k] * edges[k + 1]).sqrt());
        let width = Array1::from_shape_fn(n, |k| edges[k + 1] - edges[k]);
        Self::new(mass, width)
    }

    pub fn len(&self) -> usize {
        self.mass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass.is_empty()
    }

    pub fn mass(&self) -> &Array1<f64> {
        &self.mass
    }

    pub fn width(&self) -> &Array1<f64> {
        &self.width
    }
}

/// The fixed model grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    /// Cell area (m^2), shape `[lat, lon]`.
    area: Array2<f64>,
    /// `true` for ocean cells, shape `[lat, lon]`.
    ocean: Array2<bool>,
    mass_classes: MassClasses,
    /// Named region masks, each of shape `[lat, lon]`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    regions: BTreeMap<String, Array2<bool>>,
}

impl Grid {
    pub fn new(
        area: Array2<f64>,
        ocean: Array2<bool>,
        mass_classes: MassClasses,
    ) -> BoatsResult<Self> {
        if area.dim() != ocean.dim() {
            return Err(BoatsError::ShapeMismatch {
                name: "ocean_mask".to_string(),
                expected: area.shape().to_vec(),
                found: ocean.shape().to_vec(),
            });
        }
        Ok(Self {
            area,
            ocean,
            mass_classes,
            regions: BTreeMap::new(),
        })
    }

    /// An all-ocean grid with uniform cell area.
    pub fn uniform(
        n_lat: usize,
        n_lon: usize,
        cell_area: f64,
        mass_classes: MassClasses,
    ) -> BoatsResult<Self> {
        Self::new(
            Array2::from_elem((n_lat, n_lon), cell_area),
            Array2::from_elem((n_lat, n_lon), true),
            mass_classes,
        )
    }

    /// Attach a named region mask.
    pub fn with_region(mut self, name: &str, mask: Array2<bool>) -> BoatsResult<Self> {
        if mask.dim() != self.area.dim() {
            return Err(BoatsError::ShapeMismatch {
                name: format!("region {name}"),
                expected: self.area.shape().to_vec(),
                found: mask.shape().to_vec(),
            });
        }
        self.regions.insert(name.to_string(), mask);
        Ok(self)
    }

    pub fn n_lat(&self) -> usize {
        self.area.nrows()
    }

    pub fn n_lon(&self) -> usize {
        self.area.ncols()
    }

    pub fn n_mass(&self) -> usize {
        self.mass_classes.len()
    }

    pub fn area(&self) -> &Array2<f64> {
        &self.area
    }

    pub fn ocean(&self) -> &Array2<bool> {
        &self.ocean
    }

    pub fn mass_classes(&self) -> &MassClasses {
        &self.mass_classes
    }

    pub fn region(&self, name: &str) -> BoatsResult<&Array2<bool>> {
        self.regions
            .get(name)
            .ok_or_else(|| BoatsError::UnknownRegion(name.to_string()))
    }

    /// Shape of a full field `[lat, lon, group, mass]`.
    pub fn full_shape(&self, n_groups: usize) -> (usize, usize, usize, usize) {
        (self.n_lat(), self.n_lon(), n_groups, self.n_mass())
    }

    /// Shape of a spatial-only field `[lat, lon, group]`.
    pub fn spatial_shape(&self, n_groups: usize) -> (usize, usize, usize) {
        (self.n_lat(), self.n_lon(), n_groups)
    }

    /// Valid (lat, lon, group, mass) entries.
    ///
    /// An entry is applicable when its cell is ocean and the class mass does not exceed
    /// the asymptotic mass of the group.
    pub fn applicability(&self, asymptotic_mass: &[f64]) -> Array4<bool> {
        let mass = self.mass_classes.mass();
        Array4::from_shape_fn(
            self.full_shape(asymptotic_mass.len()),
            |(i, j, g, k)| self.ocean[[i, j]] && mass[k] <= asymptotic_mass[g],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_log_spaced_widths_cover_range() {
        let classes = MassClasses::log_spaced(10.0, 1.0e5, 40).unwrap();
        assert_eq!(classes.len(), 40);
        assert_relative_eq!(classes.width().sum(), 1.0e5 - 10.0, max_relative = 1e-10);
        // Representative masses sit inside their class
        assert!(classes.mass()[0] > 10.0);
        assert!(classes.mass()[39] < 1.0e5);
    }

    #[test]
    fn test_mass_classes_reject_unsorted() {
        let result = MassClasses::new(array![2.0, 1.0], array![1.0, 1.0]);
        assert!(matches!(result, Err(BoatsError::InvalidParameter { .. })));
    }

    #[test]
    fn test_applicability_masks_land_and_oversized_classes() {
        let classes = MassClasses::new(array![1.0, 10.0, 100.0], array![1.0, 9.0, 90.0]).unwrap();
        let grid = Grid::new(
            Array2::from_elem((1, 2), 1.0),
            array![[true, false]],
            classes,
        )
        .unwrap();

        let valid = grid.applicability(&[10.0, 1000.0]);
        assert_eq!(valid.dim(), (1, 2, 2, 3));
        assert!(valid[[0, 0, 0, 1]]);
        assert!(!valid[[0, 0, 0, 2]]);
        assert!(valid[[0, 0, 1, 2]]);
        assert!(!valid[[0, 1, 1, 0]]);
    }

    #[test]
    fn test_unknown_region() {
        let classes = MassClasses::log_spaced(1.0, 10.0, 2).unwrap();
        let grid = Grid::uniform(2, 2, 1.0, classes).unwrap();
        assert!(matches!(grid.region("nowhere"), Err(BoatsError::UnknownRegion(_))));
    }
}
