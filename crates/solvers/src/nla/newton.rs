//! Damped Newton iteration for nonlinear algebraic systems.
//!
//! # Algorithm
//!
//! 1. Evaluate the residuals at the initial guess. Stop if their max-norm is
//!    within tolerance.
//! 2. Build a forward-difference Jacobian and solve `J dx = -F(x)`.
//! 3. Take the full step if it reduces the residual norm, otherwise halve it
//!    (at most [`MAX_HALVINGS`] times) and take the last trial.
//! 4. Emit an [`Event`]; stop if the observer returns [`Action::StopEarly`].
//! 5. Repeat until converged or the iteration limit is reached.
//!
//! # Errors
//!
//! - [`Error::System`] if the system fails to evaluate
//! - [`Error::NonFiniteResidual`] if the initial residuals are not finite
//! - [`Error::SingularJacobian`] if the Newton step cannot be computed
//! - [`Error::MaxIterations`] if the limit is reached without converging

mod action;
mod config;
mod error;
mod event;
mod solution;

pub use action::Action;
pub use config::{Config, MAXIMUM_NUMBER_OF_ITERATIONS, TOLERANCE};
pub(crate) use config::PROPERTIES;
pub use error::Error;
pub use event::Event;
pub use solution::{Solution, Status};

use cellsim_core::Observer;

use crate::{
    NonlinearSystem,
    linalg::{self, Factorization, max_norm},
};

/// Most times a Newton step is halved while looking for descent.
pub const MAX_HALVINGS: usize = 10;

/// Solves `system` in place, starting from the guess in `x`.
///
/// On return `x` holds the last accepted iterate, and the system's most recent
/// evaluation was at that iterate.
///
/// # Errors
///
/// Returns an [`Error`] if the system fails to evaluate, the Jacobian is
/// singular, or the iteration limit is reached.
pub fn solve<S, Obs>(
    system: &mut S,
    x: &mut [f64],
    config: &Config,
    mut observer: Obs,
) -> Result<Solution, Error>
where
    S: NonlinearSystem + ?Sized,
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let n = x.len();
    let mut f = vec![0.0; n];
    system.residuals(x, &mut f).map_err(Error::System)?;

    if f.iter().any(|value| !value.is_finite()) {
        return Err(Error::NonFiniteResidual { iter: 0 });
    }
    let mut norm = max_norm(&f);

    let mut trial = vec![0.0; n];
    let mut f_trial = vec![0.0; n];

    for iter in 1..=config.max_iters() {
        if norm <= config.tolerance() {
            return Ok(Solution {
                status: Status::Converged,
                residual_norm: norm,
                iters: iter - 1,
            });
        }

        let jacobian = linalg::forward_difference(x, &f, |x, f| system.residuals(x, f))
            .map_err(Error::System)?;
        let mut dx: Vec<f64> = f.iter().map(|value| -value).collect();
        let solved = Factorization::new(jacobian).is_some_and(|lu| lu.solve_in_place(&mut dx));
        if !solved {
            return Err(Error::SingularJacobian { iter });
        }

        let mut damping = 1.0;
        let mut halvings = 0;
        let trial_norm = loop {
            for ((trial, x), dx) in trial.iter_mut().zip(x.iter()).zip(&dx) {
                *trial = x + damping * dx;
            }
            system
                .residuals(&trial, &mut f_trial)
                .map_err(Error::System)?;

            let finite = f_trial.iter().all(|value| value.is_finite());
            let trial_norm = max_norm(&f_trial);
            if finite && trial_norm < norm {
                break trial_norm;
            }
            if halvings == MAX_HALVINGS {
                if !finite {
                    return Err(Error::NonFiniteResidual { iter });
                }
                break trial_norm;
            }

            damping *= 0.5;
            halvings += 1;
        };

        x.copy_from_slice(&trial);
        f.copy_from_slice(&f_trial);
        norm = trial_norm;

        let event = Event {
            iter,
            x,
            residual_norm: norm,
            damping,
        };
        if let Some(Action::StopEarly) = observer.observe(&event) {
            return Ok(Solution {
                status: Status::StoppedByObserver,
                residual_norm: norm,
                iters: iter,
            });
        }
    }

    if norm <= config.tolerance() {
        return Ok(Solution {
            status: Status::Converged,
            residual_norm: norm,
            iters: config.max_iters(),
        });
    }

    Err(Error::MaxIterations {
        iters: config.max_iters(),
        residual_norm: norm,
    })
}

/// Solves `system` without observation.
///
/// # Errors
///
/// Returns an [`Error`] if the system cannot be solved.
pub fn solve_unobserved<S>(
    system: &mut S,
    x: &mut [f64],
    config: &Config,
) -> Result<Solution, Error>
where
    S: NonlinearSystem + ?Sized,
{
    solve(system, x, config, ())
}
