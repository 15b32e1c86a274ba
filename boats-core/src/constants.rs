//! Model-wide constants

/// Additive guard for divisions by biomass or effort that may be exactly zero.
pub const EPSILON: f64 = 1e-15;

/// Egg fluxes below this value (eggs m^-2 yr^-1) are treated as zero.
pub const MIN_EGG_FLUX: f64 = 0.001;

/// Annual harvest at or below this value never triggers regulation.
pub const MIN_ANNUAL_HARVEST: f64 = 1e-25;

/// Boltzmann constant (eV/K).
pub const BOLTZMANN: f64 = 8.617e-5;

/// Offset between Celsius and Kelvin.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Timesteps per simulated year.
pub const MONTHS_PER_YEAR: usize = 12;

/// Model timestep (yr).
pub const DT: f64 = 1.0 / MONTHS_PER_YEAR as f64;
