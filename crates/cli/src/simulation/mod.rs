//! In-process delivery simulation.

mod runner;
mod stats;

pub use runner::{Simulation, SimulationConfig};
pub use stats::SimulationStats;
