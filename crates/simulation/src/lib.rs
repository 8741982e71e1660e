//! Running cellsim models in the background.
//!
//! - [`Simulation`]: a shareable handle to one model's run, with the
//!   `Idle → Running ⇄ Paused → Stopped | Finished | Failed` lifecycle
//! - [`SimulationData`]: the numeric state of a model (states, rates,
//!   constants, computed variables) and the solver that advances it
//! - [`ResultsBuffer`]: the output points recorded by a run
//! - [`Event`]: progress and lifecycle notifications, delivered over channels
//!   returned by [`Simulation::subscribe`]
//! - [`SimulationManager`]: one simulation per model, created on demand
//!
//! The caller's thread never blocks on a running simulation: [`Simulation::run`]
//! hands the work to a worker thread, and pause and stop requests are honoured
//! at the next output point.

mod data;
mod error;
mod event;
mod manager;
mod results;
mod settings;
mod simulation;
mod state;
mod worker;

#[cfg(test)]
mod test_utils;

pub use data::SimulationData;
pub use error::Error;
pub use event::{Event, Progress};
pub use manager::{ModelId, ModelSource, SimulationManager};
pub use results::{Point, ResultsBuffer, Variable};
pub use settings::{SettingsError, SimulationConfig, SimulationSettings};
pub use simulation::Simulation;
pub use state::{Operation, State};
