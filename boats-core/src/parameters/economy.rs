use crate::errors::{BoatsError, BoatsResult};
use serde::{Deserialize, Serialize};

/// Parameters of the open-access effort dynamics.
///
/// Prices, costs and catchability are forcing inputs; only the behavioural
/// constants live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyParameters {
    /// Effort response to profit k_e.
    /// default: 1.0
    pub k_e: f64,

    /// Steepness of the size selectivity curve.
    /// default: 5.0
    pub selectivity_slope: f64,
}

impl Default for EconomyParameters {
    fn default() -> Self {
        Self {
            k_e: 1.0,
            selectivity_slope: 5.0,
        }
    }
}

impl EconomyParameters {
    pub fn validate(&self) -> BoatsResult<()> {
        if !(self.k_e >= 0.0) {
            return Err(BoatsError::InvalidParameter {
                name: "k_e".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        if !(self.selectivity_slope > 0.0) {
            return Err(BoatsError::InvalidParameter {
                name: "selectivity_slope".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
