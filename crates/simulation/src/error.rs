use std::{collections::TryReserveError, io};

use cellsim_core::{ConfigError, ModelError, SolverError};
use thiserror::Error;

use crate::{ModelId, Operation, SettingsError, State};

/// Errors returned by simulation operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid solver configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("invalid simulation settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("cannot {operation} a simulation that is {state}")]
    InvalidOperation { operation: Operation, state: State },

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("model evaluation failed")]
    Model(#[source] ModelError),

    #[error("{kind} index {index} is out of range (length {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error("no simulation is managed for model `{0}`")]
    NotManaged(ModelId),

    #[error("a simulation is already managed for model `{0}`")]
    AlreadyManaged(ModelId),

    #[error("cannot allocate results for {points} output points")]
    ResultsAllocation {
        points: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("the simulation was released by its manager")]
    Released,

    #[error("failed to spawn the simulation worker")]
    Spawn(#[source] io::Error),
}

impl Error {
    /// Returns `true` if the error was caused by the solver selection or the
    /// simulation settings.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Settings(_))
    }
}
