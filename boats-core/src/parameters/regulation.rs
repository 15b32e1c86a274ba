//! Regulation parameters
//!
//! A cell/group switches from open access to a target-tracking policy when its
//! annual harvest has fallen below `reg_threshold` times the largest annual harvest
//! seen so far. The strategy decides how the target effort is estimated.

use crate::constants::MONTHS_PER_YEAR;
use crate::errors::{BoatsError, BoatsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the regulation target is estimated once onset is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum RegulationStrategy {
    /// Schaefer stock assessment: linear fit of CPUE against effort.
    #[serde(rename = "stockT")]
    StockAssessment,
    /// Externally supplied maximum-sustainable-yield effort.
    #[serde(rename = "omnT")]
    Omniscient,
    /// Year-over-year adaptive search without a closed-form target.
    #[serde(rename = "optS")]
    Adaptive,
}

impl FromStr for RegulationStrategy {
    type Err = BoatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stockT" | "stock_assessment" => Ok(Self::StockAssessment),
            "omnT" | "omniscient" => Ok(Self::Omniscient),
            "optS" | "adaptive" => Ok(Self::Adaptive),
            other => Err(BoatsError::UnknownStrategy(other.to_string())),
        }
    }
}

impl TryFrom<String> for RegulationStrategy {
    type Error = BoatsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for RegulationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StockAssessment => "stockT",
            Self::Omniscient => "omnT",
            Self::Adaptive => "optS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulationParameters {
    /// default: stockT
    pub strategy: RegulationStrategy,

    /// Fraction of the historical annual-harvest maximum below which onset triggers.
    /// default: 0.9
    pub reg_threshold: f64,

    /// Precaution factor applied to the estimated target effort.
    /// default: 1.0
    pub precaution: f64,

    /// Rate at which enforced effort relaxes towards its target (yr^-1).
    /// default: 1.0
    pub k_s: f64,

    /// Length of the harvest/effort window used by the stock assessment (months).
    /// default: 120
    pub times_length: usize,

    /// Relative effort step of the adaptive strategy.
    /// default: 0.1
    pub adaptive_step: f64,
}

impl Default for RegulationParameters {
    fn default() -> Self {
        Self {
            strategy: RegulationStrategy::StockAssessment,
            reg_threshold: 0.9,
            precaution: 1.0,
            k_s: 1.0,
            times_length: 120,
            adaptive_step: 0.1,
        }
    }
}

impl RegulationParameters {
    pub fn validate(&self) -> BoatsResult<()> {
        if self.times_length < MONTHS_PER_YEAR {
            return Err(BoatsError::InvalidParameter {
                name: "times_length".to_string(),
                reason: format!("must cover at least {MONTHS_PER_YEAR} months"),
            });
        }
        if !(self.reg_threshold > 0.0 && self.reg_threshold <= 1.0) {
            return Err(BoatsError::InvalidParameter {
                name: "reg_threshold".to_string(),
                reason: "must lie in (0, 1]".to_string(),
            });
        }
        if !(self.precaution > 0.0) {
            return Err(BoatsError::InvalidParameter {
                name: "precaution".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_aliases() {
        assert_eq!(
            "stockT".parse::<RegulationStrategy>().unwrap(),
            RegulationStrategy::StockAssessment
        );
        assert_eq!(
            "omniscient".parse::<RegulationStrategy>().unwrap(),
            RegulationStrategy::Omniscient
        );
        assert_eq!(
            "optS".parse::<RegulationStrategy>().unwrap(),
            RegulationStrategy::Adaptive
        );
        assert!("mixed".parse::<RegulationStrategy>().is_err());
    }

    #[test]
    fn test_strategy_display_round_trips() {
        for strategy in [
            RegulationStrategy::StockAssessment,
            RegulationStrategy::Omniscient,
            RegulationStrategy::Adaptive,
        ] {
            assert_eq!(strategy.to_string().parse::<RegulationStrategy>().unwrap(), strategy);
        }
    }
}
