//! Flux Engine
//!
//! Computes the per-timestep tendencies of the biomass field. Everything returned
//! here is a pure function of the current biomass and forcing; no state is carried
//! between timesteps.
//!
//! # Energy input
//!
//! The energy available to an individual of mass $m$ is the smaller of
//!
//! - the production-limited supply
//!   $$e_P = \frac{P(m)\, m}{B + \epsilon}, \qquad
//!     P(m) = \frac{PP\, s_g}{m_\phi} \left(\frac{m}{m_\phi}\right)^{\tau - 1}$$
//!   where $\tau = \ln(te) / \ln(ppmr)$ and $m_\phi$ the representative phytoplankton mass,
//! - the von Bertalanffy growth capacity
//!   $$e_{vb} = A(T)\, m^b \left(1 - (m / m_\infty)^{1-b}\right)$$
//!
//! A fraction $\phi(m)$ of it goes to reproduction; the rest is somatic growth $\gamma$.
//!
//! # Fluxes
//!
//! - `flux_out` $= \gamma B / \Delta m$
//! - `flux_growth` $= \gamma B / m$
//! - `flux_in[k]` $= \gamma_{k-1} B_{k-1} / \Delta m_k$, so the mass leaving class
//!   $k-1$ is exactly the mass entering class $k$; recruitment feeds the smallest class
//! - `mortality` $= \mu(T, m) B$

use crate::constants::{BOLTZMANN, EPSILON, KELVIN_OFFSET, MIN_EGG_FLUX};
use crate::forcing::ForcingSnapshot;
use crate::grid::Grid;
use crate::parameters::EcologyParameters;
use ndarray::{Array1, Array2, Array4, ArrayView1, Axis, Zip};
use tracing::trace;

/// Arrhenius temperature factor relative to `reference` (both in degC).
pub fn arrhenius(activation_energy: f64, temperature: f64, reference: f64) -> f64 {
    let t = temperature + KELVIN_OFFSET;
    let t_ref = reference + KELVIN_OFFSET;
    (activation_energy / BOLTZMANN * (1.0 / t_ref - 1.0 / t)).exp()
}

/// Representative phytoplankton mass of a cell.
///
/// The large fraction of production saturates with euphotic production; the mass is
/// the geometric interpolation between the small and large representative masses.
pub fn phytoplankton_mass(params: &EcologyParameters, euphotic_production: f64) -> f64 {
    let p = euphotic_production.max(0.0);
    let large_fraction = params.large_fraction_max * p / (p + params.large_fraction_half);
    params.phyto_mass_small.powf(1.0 - large_fraction) * params.phyto_mass_large.powf(large_fraction)
}

/// Saturating (Beverton-Holt) recruitment from a production-driven and an egg-driven
/// number flux.
pub fn beverton_holt(production_flux: f64, egg_flux: f64) -> f64 {
    production_flux * egg_flux / (production_flux + egg_flux + EPSILON)
}

/// Tendencies of one timestep, each shaped `[lat, lon, group, mass]`.
///
/// Non-applicable entries (land, classes above the asymptotic mass) are NaN.
#[derive(Debug, Clone)]
pub struct FluxFields {
    /// Available energy per individual (g yr^-1).
    pub energy: Array4<f64>,
    /// Somatic growth rate per individual (g yr^-1).
    pub growth: Array4<f64>,
    pub flux_in: Array4<f64>,
    pub flux_out: Array4<f64>,
    pub flux_growth: Array4<f64>,
    pub mortality: Array4<f64>,
}

/// Cell-level drivers shared by every group and class of a cell.
#[derive(Debug, Clone, Copy, Default)]
struct CellDrivers {
    ocean: bool,
    primary_production: f64,
    phyto_mass: f64,
    trophic_scaling: f64,
    /// Growth constant A at the activity temperature.
    activity: f64,
    /// zeta * A00 at the mortality temperature.
    mortality_scale: f64,
}

impl CellDrivers {
    /// Production density reaching mass `m` for one group (g m^-2 yr^-1 g^-1).
    fn production_density(&self, m: f64, share: f64) -> f64 {
        self.primary_production.max(0.0) * share / self.phyto_mass
            * (m / self.phyto_mass).powf(self.trophic_scaling - 1.0)
    }
}

/// Precomputed allometry plus the pure tendency kernel.
#[derive(Debug, Clone)]
pub struct FluxEngine {
    params: EcologyParameters,
    mass: Array1<f64>,
    width: Array1<f64>,
    ocean: Array2<bool>,
    /// `[group, mass]`
    applicable: Array2<bool>,
    /// Reproduction allocation phi, `[group, mass]`.
    reproduction: Array2<f64>,
    /// m^b (1 - (m/m_inf)^(1-b)), `[group, mass]`.
    vb_shape: Array2<f64>,
    /// m^(h (b - 1))
    mortality_allometry: Array1<f64>,
}

impl FluxEngine {
    pub fn new(grid: &Grid, params: &EcologyParameters) -> Self {
        let mass = grid.mass_classes().mass().clone();
        let width = grid.mass_classes().width().clone();
        let n_groups = params.n_groups();
        let n_mass = mass.len();
        let b = params.b_allo;

        let applicable = Array2::from_shape_fn((n_groups, n_mass), |(g, k)| {
            mass[k] <= params.groups[g].asymptotic_mass
        });
        let reproduction = Array2::from_shape_fn((n_groups, n_mass), |(g, k)| {
            let maturity = params.eta_maturity * params.groups[g].asymptotic_mass;
            params.frac_reprod_max / (1.0 + (mass[k] / maturity).powf(-params.h_maturity))
        });
        let vb_shape = Array2::from_shape_fn((n_groups, n_mass), |(g, k)| {
            let m_inf = params.groups[g].asymptotic_mass;
            (mass[k].powf(b) * (1.0 - (mass[k] / m_inf).powf(1.0 - b))).max(0.0)
        });
        let exponent = params.mortality_exponent();
        let mortality_allometry = mass.mapv(|m| m.powf(exponent));

        Self {
            params: params.clone(),
            mass,
            width,
            ocean: grid.ocean().clone(),
            applicable,
            reproduction,
            vb_shape,
            mortality_allometry,
        }
    }

    pub fn n_groups(&self) -> usize {
        self.params.n_groups()
    }

    /// Reproduction allocation phi of a group, by mass class.
    pub fn reproduction_allocation(&self, group: usize) -> ArrayView1<'_, f64> {
        self.reproduction.row(group)
    }

    fn cell_drivers(&self, forcing: &ForcingSnapshot) -> Array2<CellDrivers> {
        let p = &self.params;
        let default_scaling = p.trophic_efficiency.ln() / p.ppmr.ln();
        Array2::from_shape_fn(self.ocean.dim(), |(i, j)| {
            if !self.ocean[[i, j]] {
                return CellDrivers::default();
            }
            let trophic_scaling = match &forcing.trophic_efficiency {
                Some(te) => te[[i, j]].ln() / p.ppmr.ln(),
                None => default_scaling,
            };
            CellDrivers {
                ocean: true,
                primary_production: forcing.primary_production[[i, j]],
                phyto_mass: phytoplankton_mass(p, forcing.primary_production_euphotic[[i, j]]),
                trophic_scaling,
                activity: p.a00
                    * arrhenius(
                        p.activation_energy_activity,
                        forcing.temperature_activity[[i, j]],
                        p.temperature_reference,
                    ),
                mortality_scale: p.mortality_coefficient
                    * p.a00
                    * arrhenius(
                        p.activation_energy_mortality,
                        forcing.temperature_mortality[[i, j]],
                        p.temperature_reference,
                    ),
            }
        })
    }

    /// Compute all tendencies for the current biomass field.
    pub fn compute(&self, biomass: &Array4<f64>, forcing: &ForcingSnapshot) -> FluxFields {
        let shape = biomass.raw_dim();
        let drivers = self.cell_drivers(forcing);
        let share = 1.0 / self.n_groups() as f64;

        let mut energy = Array4::from_elem(shape.clone(), f64::NAN);
        let mut growth = Array4::from_elem(shape.clone(), f64::NAN);
        let mut mortality = Array4::from_elem(shape.clone(), f64::NAN);

        // Energy, growth and mortality per (lat, lon, group) lane
        Zip::indexed(energy.lanes_mut(Axis(3)))
            .and(growth.lanes_mut(Axis(3)))
            .and(mortality.lanes_mut(Axis(3)))
            .and(biomass.lanes(Axis(3)))
            .par_for_each(|(i, j, g), mut en, mut gamma, mut mort, b| {
                let cell = drivers[[i, j]];
                if !cell.ocean {
                    return;
                }
                for k in 0..self.mass.len() {
                    if !self.applicable[[g, k]] {
                        continue;
                    }
                    let m = self.mass[k];
                    let en_p = cell.production_density(m, share) * m / (b[k] + EPSILON);
                    let en_vb = cell.activity * self.vb_shape[[g, k]];
                    en[k] = en_p.min(en_vb);
                    gamma[k] = en[k] * (1.0 - self.reproduction[[g, k]]);
                    mort[k] = cell.mortality_scale * self.mortality_allometry[k] * b[k];
                }
            });

        let mut flux_in = Array4::from_elem(shape.clone(), f64::NAN);
        let mut flux_out = Array4::from_elem(shape.clone(), f64::NAN);
        let mut flux_growth = Array4::from_elem(shape, f64::NAN);

        let m0 = self.mass[0];
        let dm0 = self.width[0];
        let egg_survival = self.params.egg_survival;

        Zip::indexed(flux_in.lanes_mut(Axis(3)))
            .and(flux_out.lanes_mut(Axis(3)))
            .and(flux_growth.lanes_mut(Axis(3)))
            .and(biomass.lanes(Axis(3)))
            .and(energy.lanes(Axis(3)))
            .par_for_each(|(i, j, g), mut f_in, mut f_out, mut f_growth, b, en| {
                let cell = drivers[[i, j]];
                if !cell.ocean {
                    return;
                }
                let mut eggs = 0.0;
                for k in 0..self.mass.len() {
                    if !self.applicable[[g, k]] {
                        continue;
                    }
                    let phi = self.reproduction[[g, k]];
                    let gamma = en[k] * (1.0 - phi);
                    f_out[k] = gamma * b[k] / self.width[k];
                    f_growth[k] = gamma * b[k] / self.mass[k];
                    f_in[k] = if k == 0 {
                        0.0
                    } else {
                        f_out[k - 1] * self.width[k - 1] / self.width[k]
                    };
                    eggs += phi * en[k] * b[k] / self.mass[k] * self.width[k];
                }
                if !self.applicable[[g, 0]] {
                    return;
                }
                let mut egg_flux = egg_survival * eggs / m0;
                if !(egg_flux >= MIN_EGG_FLUX) {
                    egg_flux = 0.0;
                }
                let production_flux = cell.production_density(m0, share) * dm0 / m0;
                let recruits = beverton_holt(production_flux, egg_flux);
                f_in[0] = recruits * m0 / dm0;
            });

        trace!(step = forcing.step, "computed flux fields");

        FluxFields {
            energy,
            growth,
            flux_in,
            flux_out,
            flux_growth,
            mortality,
        }
    }
}
