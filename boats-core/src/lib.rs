pub mod constants;
pub mod ecology;
pub mod economy;
pub mod errors;
pub mod forcing;
pub mod grid;
pub mod memory;
pub mod output;
pub mod parameters;
pub mod regulation;
pub mod simulation;

pub use errors::{BoatsError, BoatsResult};
pub use simulation::{RestartState, Simulation, SimulationBuilder, SimulationResult};
