use crate::constants::MONTHS_PER_YEAR;
use crate::errors::{BoatsError, BoatsResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Whether the run couples the fishery to the ecology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum RunMode {
    /// Unfished ecosystem.
    Ecology,
    /// Ecology plus open-access (optionally regulated) fishing.
    Bioeconomic,
}

impl FromStr for RunMode {
    type Err = BoatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ecology" => Ok(Self::Ecology),
            "bioeconomic" | "economic" => Ok(Self::Bioeconomic),
            other => Err(BoatsError::UnknownRunMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for RunMode {
    type Error = BoatsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParameters {
    /// Simulated years.
    /// default: 100
    pub n_years: usize,

    /// Year from which catchability is switched on.
    /// default: 0.0
    pub harvest_start_year: f64,

    /// default: ecology
    pub mode: RunMode,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            n_years: 100,
            harvest_start_year: 0.0,
            mode: RunMode::Ecology,
        }
    }
}

impl RunParameters {
    pub fn n_steps(&self) -> usize {
        self.n_years * MONTHS_PER_YEAR
    }

    /// First timestep at which catchability is non-zero.
    pub fn harvest_start_step(&self) -> usize {
        (self.harvest_start_year.max(0.0) * MONTHS_PER_YEAR as f64).round() as usize
    }

    pub fn validate(&self) -> BoatsResult<()> {
        if self.n_years == 0 {
            return Err(BoatsError::InvalidParameter {
                name: "n_years".to_string(),
                reason: "must be at least one year".to_string(),
            });
        }
        Ok(())
    }
}
