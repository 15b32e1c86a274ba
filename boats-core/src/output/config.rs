//! Declarative output-mode configuration, as written in the run file
//!
//! ```toml
//! [[output.modes]]
//! name = "annual"
//! buckets = [[0.0, 1.0], [1.0, 2.0]]
//!
//! [[output.modes.variables]]
//! source = "biomass"
//! kind = "full"
//! processing = "size_integral+group_sum"
//! output = "total_biomass"
//! ```
//!
//! The strings are only validated when the aggregator is set up.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub modes: Vec<OutputModeConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputModeConfig {
    pub name: String,
    /// Half-open `[start, end)` intervals in model years.
    pub buckets: Vec<[f64; 2]>,
    #[serde(default)]
    pub variables: Vec<VariableConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableConfig {
    /// Live state variable. Unused for derived variables.
    #[serde(default)]
    pub source: String,
    /// `full`, `spatial` or `derived`.
    pub kind: String,
    /// `none` or a `+`-joined list of reductions.
    #[serde(default = "default_processing")]
    pub processing: String,
    pub output: String,
    /// default: 1.0
    #[serde(default = "default_unit_conversion")]
    pub unit_conversion: f64,
    /// Region mask used by `regional_integral`.
    #[serde(default)]
    pub region: Option<String>,
    /// Output (of the same mode) summed over groups by a derived variable.
    #[serde(default)]
    pub derive_from: Option<String>,
}

impl VariableConfig {
    pub fn new(source: &str, kind: &str, processing: &str, output: &str) -> Self {
        Self {
            source: source.to_string(),
            kind: kind.to_string(),
            processing: processing.to_string(),
            output: output.to_string(),
            unit_conversion: default_unit_conversion(),
            region: None,
            derive_from: None,
        }
    }

    pub fn derived(output: &str, derive_from: &str) -> Self {
        Self {
            derive_from: Some(derive_from.to_string()),
            ..Self::new("", "derived", "none", output)
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_unit_conversion(mut self, factor: f64) -> Self {
        self.unit_conversion = factor;
        self
    }
}

fn default_processing() -> String {
    "none".to_string()
}

fn default_unit_conversion() -> f64 {
    1.0
}
