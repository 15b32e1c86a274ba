//! Biomass Integrator
//!
//! Forward-Euler update
//! $$B_{new} = B + (F_{in} - F_{out} + F_{growth} - M)\, \Delta t$$
//! followed by clamping at zero. Clamping removes mass rather than conserving it;
//! negative biomass is not meaningful and is never carried forward.
//!
//! In bioeconomic runs the update is split: the ecology-only provisional biomass bounds
//! the harvest, and the harvest is removed before clamping.

use super::flux::FluxFields;
use ndarray::{Array4, Zip};

/// Net tendency `flux_in - flux_out + flux_growth - mortality`.
pub fn net_rate(fluxes: &FluxFields) -> Array4<f64> {
    let mut rate = fluxes.flux_in.clone();
    Zip::from(&mut rate)
        .and(&fluxes.flux_out)
        .and(&fluxes.flux_growth)
        .and(&fluxes.mortality)
        .par_for_each(|r, &out, &growth, &mort| *r += growth - out - mort);
    rate
}

/// Ecology-only biomass after one step, before clamping.
pub fn provisional_biomass(biomass: &Array4<f64>, fluxes: &FluxFields, dt: f64) -> Array4<f64> {
    let mut next = net_rate(fluxes);
    Zip::from(&mut next)
        .and(biomass)
        .par_for_each(|n, &b| *n = b + *n * dt);
    next
}

/// Full ecology-only step with clamping.
pub fn integrate_biomass(biomass: &Array4<f64>, fluxes: &FluxFields, dt: f64) -> Array4<f64> {
    let mut next = provisional_biomass(biomass, fluxes, dt);
    clamp_non_negative(&mut next);
    next
}

/// Remove the harvest from the provisional biomass and clamp.
pub fn apply_harvest(provisional: &Array4<f64>, harvest: &Array4<f64>, dt: f64) -> Array4<f64> {
    let mut next = provisional.clone();
    Zip::from(&mut next)
        .and(harvest)
        .par_for_each(|b, &h| *b -= h * dt);
    clamp_non_negative(&mut next);
    next
}

/// Replace negative entries by zero. NaN (not applicable) entries are left untouched.
pub fn clamp_non_negative<D: ndarray::Dimension>(field: &mut ndarray::Array<f64, D>) {
    field.par_mapv_inplace(|v| if v < 0.0 { 0.0 } else { v });
}
