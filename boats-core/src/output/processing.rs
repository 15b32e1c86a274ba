//! Closed set of output variables and reductions
//!
//! Configuration strings are parsed into these types once, when an output mode is set
//! up. Reductions skip NaN entries but keep NaN where every contributing entry is NaN.

use crate::economy::nan_sum;
use crate::errors::{BoatsError, BoatsResult};
use ndarray::{Array1, Array2, ArrayD, ArrayViewD, Axis};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// `[lat, lon, group, mass]`
    Full,
    /// `[lat, lon, group]`
    Spatial,
    /// Group sum of another output, computed after the run.
    Derived,
}

impl FromStr for VariableKind {
    type Err = BoatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "spatial" => Ok(Self::Spatial),
            "derived" => Ok(Self::Derived),
            other => Err(BoatsError::UnknownVariableKind(other.to_string())),
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::Spatial => "spatial",
            Self::Derived => "derived",
        })
    }
}

/// Live model variables that can be written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateVariable {
    Biomass,
    Harvest,
    FluxIn,
    FluxOut,
    FluxGrowth,
    Mortality,
    Growth,
    Energy,
    Effort,
    Revenue,
    Cost,
    Profit,
}

impl StateVariable {
    pub fn kind(&self) -> VariableKind {
        match self {
            Self::Effort | Self::Revenue | Self::Cost | Self::Profit => VariableKind::Spatial,
            _ => VariableKind::Full,
        }
    }

    /// Only available when the fishery is simulated.
    pub fn is_economic(&self) -> bool {
        matches!(
            self,
            Self::Harvest | Self::Effort | Self::Revenue | Self::Cost | Self::Profit
        )
    }
}

impl FromStr for StateVariable {
    type Err = BoatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "biomass" => Self::Biomass,
            "harvest" => Self::Harvest,
            "flux_in" => Self::FluxIn,
            "flux_out" => Self::FluxOut,
            "flux_growth" => Self::FluxGrowth,
            "mortality" => Self::Mortality,
            "growth" => Self::Growth,
            "energy" => Self::Energy,
            "effort" => Self::Effort,
            "revenue" => Self::Revenue,
            "cost" => Self::Cost,
            "profit" => Self::Profit,
            other => return Err(BoatsError::UnknownVariable(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    /// Width-weighted sum over mass classes.
    SizeIntegral,
    /// Sum over groups.
    GroupSum,
    /// Area-weighted sum over ocean cells.
    Integral2d,
    /// Area-weighted sum over the ocean cells of a named region.
    RegionalIntegral(String),
}

impl Reduction {
    fn parse(token: &str, processing: &str, region: Option<&str>) -> BoatsResult<Self> {
        match token {
            "size_integral" => Ok(Self::SizeIntegral),
            "group_sum" => Ok(Self::GroupSum),
            "integral_2d" => Ok(Self::Integral2d),
            "regional_integral" => region
                .map(|r| Self::RegionalIntegral(r.to_string()))
                .ok_or_else(|| BoatsError::MissingRegion(processing.to_string())),
            other => Err(BoatsError::UnknownProcessing(other.to_string())),
        }
    }

    fn is_spatial(&self) -> bool {
        matches!(self, Self::Integral2d | Self::RegionalIntegral(_))
    }
}

/// Ordered reductions applied to a live field: size, then group, then space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Processing {
    size_integral: bool,
    group_sum: bool,
    spatial: Option<Reduction>,
}

impl Processing {
    /// Parse `none` or a `+`-joined list of reductions.
    pub fn parse(text: &str, region: Option<&str>) -> BoatsResult<Self> {
        let mut processing = Self::default();
        if text.trim() == "none" {
            return Ok(processing);
        }
        for token in text.split('+').map(str::trim) {
            let reduction = Reduction::parse(token, text, region)?;
            let duplicate = match &reduction {
                Reduction::SizeIntegral => std::mem::replace(&mut processing.size_integral, true),
                Reduction::GroupSum => std::mem::replace(&mut processing.group_sum, true),
                r if r.is_spatial() => processing.spatial.replace(reduction.clone()).is_some(),
                _ => false,
            };
            if duplicate {
                return Err(BoatsError::UnknownProcessing(text.to_string()));
            }
        }
        Ok(processing)
    }

    pub fn reductions(&self) -> Vec<Reduction> {
        let mut reductions = Vec::new();
        if self.size_integral {
            reductions.push(Reduction::SizeIntegral);
        }
        if self.group_sum {
            reductions.push(Reduction::GroupSum);
        }
        reductions.extend(self.spatial.clone());
        reductions
    }

    pub fn size_integral(&self) -> bool {
        self.size_integral
    }

    pub fn group_sum(&self) -> bool {
        self.group_sum
    }

    pub fn spatial(&self) -> Option<&Reduction> {
        self.spatial.as_ref()
    }

    /// Shape of a processed field of the given kind.
    pub fn output_shape(&self, kind: VariableKind, full_shape: [usize; 4]) -> Vec<usize> {
        let [n_lat, n_lon, n_groups, n_mass] = full_shape;
        let mut shape = Vec::new();
        if self.spatial.is_none() {
            shape.extend([n_lat, n_lon]);
        }
        if !self.group_sum {
            shape.push(n_groups);
        }
        if kind == VariableKind::Full && !self.size_integral {
            shape.push(n_mass);
        }
        shape
    }

    /// Axis of the group dimension in a processed field, if it survives.
    pub fn group_axis(&self) -> Option<usize> {
        if self.group_sum {
            None
        } else if self.spatial.is_some() {
            Some(0)
        } else {
            Some(2)
        }
    }

    /// Reduce a `[lat, lon, group(, mass)]` field.
    pub fn apply(&self, field: ArrayViewD<f64>, weights: &ReductionWeights) -> ArrayD<f64> {
        let mut value = field.to_owned();
        if self.size_integral {
            let width = &weights.width;
            value = value.map_axis(Axis(3), |lane| {
                nan_sum(lane.iter().zip(width.iter()).map(|(&v, &dm)| v * dm))
            });
        }
        if self.group_sum {
            value = value.map_axis(Axis(2), |lane| nan_sum(lane.iter().copied()));
        }
        if let Some(spatial) = &self.spatial {
            let mask = match spatial {
                Reduction::RegionalIntegral(name) => weights.regions.get(name),
                _ => None,
            };
            for (index, v) in value.indexed_iter_mut() {
                let (i, j) = (index[0], index[1]);
                let inside = weights.ocean[[i, j]] && mask.map_or(true, |m| m[[i, j]]);
                *v = if inside { *v * weights.area[[i, j]] } else { f64::NAN };
            }
            for _ in 0..2 {
                value = value.map_axis(Axis(0), |lane| nan_sum(lane.iter().copied()));
            }
        }
        value
    }
}

/// Grid weights used by the reductions.
#[derive(Debug, Clone)]
pub struct ReductionWeights {
    pub width: Array1<f64>,
    pub area: Array2<f64>,
    pub ocean: Array2<bool>,
    pub regions: std::collections::BTreeMap<String, Array2<bool>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array4};
    use std::collections::BTreeMap;

    fn weights() -> ReductionWeights {
        let mut regions = BTreeMap::new();
        regions.insert("west".to_string(), array![[true, false]]);
        ReductionWeights {
            width: array![1.0, 2.0, 4.0],
            area: array![[10.0, 20.0]],
            ocean: array![[true, true]],
            regions,
        }
    }

    #[test]
    fn test_parse_processing() {
        let p = Processing::parse("size_integral + group_sum", None).unwrap();
        assert!(p.size_integral() && p.group_sum());
        assert!(p.spatial().is_none());
        assert_eq!(Processing::parse("none", None).unwrap(), Processing::default());
        assert_eq!(
            Processing::parse("regional_integral", Some("west")).unwrap().spatial(),
            Some(&Reduction::RegionalIntegral("west".to_string()))
        );
    }

    #[test]
    fn test_unknown_processing_is_fatal() {
        assert!(matches!(
            Processing::parse("size_integral+mean", None),
            Err(BoatsError::UnknownProcessing(_))
        ));
        assert!(matches!(
            Processing::parse("integral_2d+integral_2d", None),
            Err(BoatsError::UnknownProcessing(_))
        ));
        assert!(matches!(
            Processing::parse("size_integral+regional_integral", None),
            Err(BoatsError::MissingRegion(p)) if p == "size_integral+regional_integral"
        ));
    }

    #[test]
    fn test_unknown_names() {
        assert!(matches!(
            "partial".parse::<VariableKind>(),
            Err(BoatsError::UnknownVariableKind(_))
        ));
        assert!(matches!(
            "catch".parse::<StateVariable>(),
            Err(BoatsError::UnknownVariable(_))
        ));
        assert_eq!("profit".parse::<StateVariable>().unwrap().kind(), VariableKind::Spatial);
    }

    #[test]
    fn test_size_integral_of_constant_density() {
        let field = Array4::from_elem((1, 2, 1, 3), 2.5).into_dyn();
        let p = Processing::parse("size_integral", None).unwrap();
        let out = p.apply(field.view(), &weights());
        assert_eq!(out.shape(), &[1, 2, 1]);
        // c * W with W = 7
        for &v in out.iter() {
            assert_relative_eq!(v, 17.5);
        }
    }

    #[test]
    fn test_spatial_integrals() {
        let field = Array4::from_elem((1, 2, 2, 3), 1.0).into_dyn();
        let p = Processing::parse("size_integral+group_sum+integral_2d", None).unwrap();
        let out = p.apply(field.view(), &weights());
        assert_eq!(out.ndim(), 0);
        // 7 per group, 2 groups, area 30
        assert_relative_eq!(out.sum(), 420.0);

        let p = Processing::parse("size_integral+group_sum+regional_integral", Some("west")).unwrap();
        let out = p.apply(field.view(), &weights());
        assert_relative_eq!(out.sum(), 140.0);
    }

    #[test]
    fn test_reductions_keep_all_missing_as_missing() {
        let mut field = Array4::from_elem((1, 2, 1, 3), f64::NAN);
        field[[0, 0, 0, 1]] = 1.0;
        let p = Processing::parse("size_integral", None).unwrap();
        let out = p.apply(field.into_dyn().view(), &weights());
        assert_relative_eq!(out[[0, 0, 0]], 2.0);
        assert!(out[[0, 1, 0]].is_nan());
    }

    #[test]
    fn test_output_shape_and_group_axis() {
        let p = Processing::parse("size_integral", None).unwrap();
        assert_eq!(p.output_shape(VariableKind::Full, [3, 4, 2, 5]), vec![3, 4, 2]);
        assert_eq!(p.group_axis(), Some(2));
        let p = Processing::parse("integral_2d", None).unwrap();
        assert_eq!(p.output_shape(VariableKind::Spatial, [3, 4, 2, 5]), vec![2]);
        assert_eq!(p.group_axis(), Some(0));
    }
}
