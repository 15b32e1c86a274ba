//! Ecological core
//!
//! - `flux`: energy input, growth, mass-class fluxes, recruitment and mortality
//! - `integrator`: forward-Euler advance of the biomass field

mod flux;
mod integrator;

pub use flux::{arrhenius, beverton_holt, phytoplankton_mass, FluxEngine, FluxFields};
pub use integrator::{
    apply_harvest, clamp_non_negative, integrate_biomass, net_rate, provisional_biomass,
};
