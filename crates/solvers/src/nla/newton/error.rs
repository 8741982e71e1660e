use cellsim_core::{Convergence, ModelError, SolverError};
use thiserror::Error;

/// Errors that can occur during a Newton solve.
#[derive(Debug, Error)]
pub enum Error {
    #[error("system error: {0}")]
    System(#[source] ModelError),

    #[error("residuals are not finite at iteration {iter}")]
    NonFiniteResidual { iter: usize },

    #[error("singular jacobian at iteration {iter}")]
    SingularJacobian { iter: usize },

    #[error("no convergence after {iters} iterations (residual norm {residual_norm:e})")]
    MaxIterations { iters: usize, residual_norm: f64 },
}

impl Error {
    /// Converts the error into a [`SolverError`] raised at `time`.
    #[must_use]
    pub fn at(self, time: f64) -> SolverError {
        match self {
            Self::System(err) => SolverError::model(time, err),
            Self::NonFiniteResidual { .. } => {
                SolverError::convergence(time, Convergence::NonFiniteResidual)
            }
            Self::SingularJacobian { .. } => {
                SolverError::convergence(time, Convergence::SingularJacobian)
            }
            Self::MaxIterations {
                iters,
                residual_norm,
            } => SolverError::convergence(
                time,
                Convergence::MaxIterations {
                    iters,
                    residual_norm,
                },
            ),
        }
    }
}
