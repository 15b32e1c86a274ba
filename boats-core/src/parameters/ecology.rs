//! Ecological parameters
//!
//! Growth follows a von Bertalanffy form capped by the energy that reaches each mass
//! class from primary production through a chain of trophic transfers.
//! Temperature enters through Arrhenius factors on the activity (growth) and
//! mortality rate constants.

use crate::errors::{BoatsError, BoatsResult};
use serde::{Deserialize, Serialize};

/// A species group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupParameters {
    /// Label used in logs and reports.
    pub name: String,
    /// Asymptotic (maximum) individual mass (g).
    /// Mass classes above it are not applicable to the group.
    pub asymptotic_mass: f64,
    /// Mass at 50% gear selectivity as a fraction of the asymptotic mass.
    pub selectivity_fraction: f64,
}

impl GroupParameters {
    pub fn new(name: &str, asymptotic_mass: f64, selectivity_fraction: f64) -> Self {
        Self {
            name: name.to_string(),
            asymptotic_mass,
            selectivity_fraction,
        }
    }
}

/// Parameters of the Flux Engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EcologyParameters {
    /// Species groups, small to large.
    /// default: 0.3 kg, 8.5 kg and 100 kg asymptotic mass
    pub groups: Vec<GroupParameters>,

    /// Allometric growth exponent b.
    /// default: 0.7
    pub b_allo: f64,

    /// Allometric scaling of mortality with mass, combined with `b_allo`
    /// into the mortality exponent h * (b - 1).
    /// default: 0.5
    pub h_allo: f64,

    /// Growth rate constant A at the reference temperature (g^(1-b) yr^-1).
    /// default: 4.46
    pub a00: f64,

    /// Activation energy of metabolic activity (eV).
    /// default: 0.45
    pub activation_energy_activity: f64,

    /// Activation energy of natural mortality (eV).
    /// default: 0.45
    pub activation_energy_mortality: f64,

    /// Reference temperature of the Arrhenius factors (degC).
    /// default: 10.0
    pub temperature_reference: f64,

    /// Mortality coefficient zeta (dimensionless).
    /// default: 0.1
    pub mortality_coefficient: f64,

    /// Maximum fraction of available energy allocated to reproduction.
    /// default: 0.5
    pub frac_reprod_max: f64,

    /// Mass at maturity as a fraction of the asymptotic mass.
    /// default: 0.25
    pub eta_maturity: f64,

    /// Steepness of the maturity ogive.
    /// default: 5.0
    pub h_maturity: f64,

    /// Fraction of eggs surviving to recruit into the smallest class.
    /// default: 0.01
    pub egg_survival: f64,

    /// Trophic transfer efficiency. May be overridden by a per-cell forcing field.
    /// default: 0.125
    pub trophic_efficiency: f64,

    /// Predator to prey mass ratio.
    /// default: 5000.0
    pub ppmr: f64,

    /// Representative mass of small phytoplankton (g).
    /// default: 10^-14.25
    pub phyto_mass_small: f64,

    /// Representative mass of large phytoplankton (g).
    /// default: 10^-10.184
    pub phyto_mass_large: f64,

    /// Upper bound of the large phytoplankton fraction of production.
    /// default: 0.8
    pub large_fraction_max: f64,

    /// Euphotic production at which the large fraction is half of its maximum.
    /// default: 0.5
    pub large_fraction_half: f64,
}

impl Default for EcologyParameters {
    fn default() -> Self {
        Self {
            groups: vec![
                GroupParameters::new("small", 300.0, 0.25),
                GroupParameters::new("medium", 8500.0, 0.25),
                GroupParameters::new("large", 100000.0, 0.25),
            ],
            b_allo: 0.7,
            h_allo: 0.5,
            a00: 4.46,
            activation_energy_activity: 0.45,
            activation_energy_mortality: 0.45,
            temperature_reference: 10.0,
            mortality_coefficient: 0.1,
            frac_reprod_max: 0.5,
            eta_maturity: 0.25,
            h_maturity: 5.0,
            egg_survival: 0.01,
            trophic_efficiency: 0.125,
            ppmr: 5000.0,
            phyto_mass_small: 10f64.powf(-14.25),
            phyto_mass_large: 10f64.powf(-10.184),
            large_fraction_max: 0.8,
            large_fraction_half: 0.5,
        }
    }
}

impl EcologyParameters {
    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    /// Asymptotic masses in group order.
    pub fn asymptotic_masses(&self) -> Vec<f64> {
        self.groups.iter().map(|g| g.asymptotic_mass).collect()
    }

    /// Exponent of the mass-specific mortality rate.
    pub fn mortality_exponent(&self) -> f64 {
        self.h_allo * (self.b_allo - 1.0)
    }

    pub fn validate(&self) -> BoatsResult<()> {
        if self.groups.is_empty() {
            return Err(invalid("groups", "at least one group is required"));
        }
        for group in &self.groups {
            if !(group.asymptotic_mass > 0.0) {
                return Err(invalid(
                    "asymptotic_mass",
                    &format!("group {} must have a positive asymptotic mass", group.name),
                ));
            }
            if !(group.selectivity_fraction > 0.0) {
                return Err(invalid(
                    "selectivity_fraction",
                    &format!("group {} must have a positive selectivity", group.name),
                ));
            }
        }
        if !(self.b_allo > 0.0 && self.b_allo < 1.0) {
            return Err(invalid("b_allo", "must lie in (0, 1)"));
        }
        if !(0.0..1.0).contains(&self.frac_reprod_max) {
            return Err(invalid("frac_reprod_max", "must lie in [0, 1)"));
        }
        if !(self.trophic_efficiency > 0.0 && self.trophic_efficiency < 1.0) {
            return Err(invalid("trophic_efficiency", "must lie in (0, 1)"));
        }
        if !(self.ppmr > 1.0) {
            return Err(invalid("ppmr", "must be greater than 1"));
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: &str) -> BoatsError {
    BoatsError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
