//! Model parameters
//!
//! Each parameter struct provides defaults for a three-group global configuration
//! and can be loaded from TOML. Every field is optional in the file; missing values
//! fall back to the defaults.

mod ecology;
mod economy;
mod regulation;
mod run;

pub use ecology::{EcologyParameters, GroupParameters};
pub use economy::EconomyParameters;
pub use regulation::{RegulationParameters, RegulationStrategy};
pub use run::{RunMode, RunParameters};

use crate::errors::BoatsResult;
use crate::output::OutputConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Full run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoatsConfig {
    pub run: RunParameters,
    pub ecology: EcologyParameters,
    pub economy: EconomyParameters,
    /// Regulation is disabled (pure open access) when absent.
    pub regulation: Option<RegulationParameters>,
    pub output: OutputConfig,
}

impl BoatsConfig {
    pub fn from_toml_str(contents: &str) -> BoatsResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> BoatsResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check parameter ranges that would otherwise surface as silent numerical garbage.
    pub fn validate(&self) -> BoatsResult<()> {
        self.run.validate()?;
        self.ecology.validate()?;
        self.economy.validate()?;
        if let Some(regulation) = &self.regulation {
            regulation.validate()?;
        }
        Ok(())
    }
}
