use std::{error::Error as StdError, sync::Arc};

use thiserror::Error;

use crate::{Limit, ModelError, SolverKind};

/// Errors a solver reports while stepping or iterating.
///
/// Errors are cheap to clone so that one failure can be broadcast to every
/// listener of a simulation.
#[derive(Debug, Clone, Error)]
pub enum SolverError {
    /// The solver could not reach the requested target.
    #[error("solver failed to converge at t = {time}: {reason}")]
    ConvergenceFailure { time: f64, reason: Convergence },

    /// The model produced values the solver cannot continue from.
    #[error("invalid state at t = {time}: {fault}")]
    InvalidState { time: f64, fault: Fault },
}

/// Why a solver gave up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Convergence {
    #[error("step size fell below {min_step:e}")]
    StepTooSmall { min_step: f64 },

    #[error("more than {max_steps} steps needed to reach t = {target}")]
    TooMuchWork { max_steps: usize, target: f64 },

    #[error("no convergence after {iters} iterations (residual norm {residual_norm:e})")]
    MaxIterations { iters: usize, residual_norm: f64 },

    #[error("singular jacobian")]
    SingularJacobian,

    #[error("residuals are not finite")]
    NonFiniteResidual,
}

/// What made a state invalid.
#[derive(Debug, Clone, Error)]
pub enum Fault {
    #[error("state {index} is not finite ({value})")]
    NonFinite { index: usize, value: f64 },

    #[error("model evaluation failed: {0}")]
    Model(#[source] Arc<dyn StdError + Send + Sync>),

    #[error("model evaluation panicked: {0}")]
    Panicked(String),
}

impl SolverError {
    /// Wraps a model callback failure at `time`.
    #[must_use]
    pub fn model(time: f64, error: ModelError) -> Self {
        Self::InvalidState {
            time,
            fault: Fault::Model(Arc::from(error)),
        }
    }

    /// Creates a convergence failure at `time`.
    #[must_use]
    pub fn convergence(time: f64, reason: Convergence) -> Self {
        Self::ConvergenceFailure { time, reason }
    }

    /// Returns the time at which the error occurred.
    #[must_use]
    pub fn time(&self) -> f64 {
        match self {
            Self::ConvergenceFailure { time, .. } | Self::InvalidState { time, .. } => *time,
        }
    }

    /// Checks that every state is finite.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidState`] naming the first non-finite state.
    pub fn check_finite(time: f64, states: &[f64]) -> Result<(), Self> {
        match states.iter().position(|value| !value.is_finite()) {
            Some(index) => Err(Self::InvalidState {
                time,
                fault: Fault::NonFinite {
                    index,
                    value: states[index],
                },
            }),
            None => Ok(()),
        }
    }
}

/// Errors raised while selecting or configuring a solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown solver `{0}`")]
    UnknownSolver(String),

    #[error("`{name}` is not an {expected} solver")]
    WrongKind { name: String, expected: SolverKind },

    #[error("solver `{solver}` has no property `{property}`")]
    UnknownProperty { solver: String, property: String },

    #[error("property `{property}` expects {expected} value")]
    WrongType {
        property: String,
        expected: &'static str,
    },

    #[error("property `{property}` must be {limit} (got {value})")]
    OutOfRange {
        property: String,
        value: f64,
        limit: Limit,
    },

    #[error("property `{property}` must be one of {allowed:?} (got `{value}`)")]
    NotInList {
        property: String,
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("property `{0}` was not resolved")]
    Unresolved(String),

    #[error("algebraic unknown {index} is outside the computed vector (length {len})")]
    UnknownOutOfRange { index: usize, len: usize },
}
