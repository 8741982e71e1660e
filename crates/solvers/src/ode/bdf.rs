//! Backward differentiation formulas for stiff models.
//!
//! A variable-order (1 to 5), variable-step BDF method in the quasi-constant
//! step form: the solution history is kept as a table of backward differences
//! that is rescaled whenever the step size changes.
//!
//! # Algorithm
//!
//! 1. Predict the next solution from the difference table.
//! 2. Solve the implicit BDF equation with a simplified Newton iteration on
//!    `I - c J`, where `J` is a finite-difference Jacobian that is refreshed
//!    only when the iteration fails to converge.
//! 3. Estimate the local error from the Newton correction. Reject and shrink
//!    the step when its scaled RMS norm exceeds one.
//! 4. After `order + 1` equal steps, pick the order (one lower, same, one
//!    higher) that allows the largest next step.
//!
//! With `InterpolateSolution` enabled the solver steps past each target and
//! evaluates the interpolating polynomial at the target. Otherwise the last
//! step before a target is shortened to land on it.
//!
//! # Errors
//!
//! - [`Convergence::StepTooSmall`] when the step collapses to rounding level
//! - [`Convergence::TooMuchWork`] when a single `solve` call needs more than
//!   `MaximumNumberOfSteps` internal steps

mod config;
mod history;

pub use config::{
    ABSOLUTE_TOLERANCE, Config, INTERPOLATE_SOLUTION, MAXIMUM_NUMBER_OF_STEPS, MAXIMUM_STEP,
    RELATIVE_TOLERANCE,
};
pub(crate) use config::PROPERTIES;

use cellsim_core::{Convergence, SolverError};
use nalgebra::DMatrix;

use history::Differences;

use crate::{
    RateSystem,
    linalg::{self, Factorization, scaled_rms},
};

const MAX_ORDER: usize = 5;
const NEWTON_MAXITER: usize = 4;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

const KAPPA: [f64; MAX_ORDER + 1] = [0.0, -0.1850, -1.0 / 9.0, -0.0823, -0.0415, 0.0];

/// A BDF solver.
#[derive(Debug, Clone)]
pub struct Bdf {
    config: Config,
    workspace: Option<Workspace>,
}

impl Bdf {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the time of the last internal step, if initialised.
    #[must_use]
    pub fn last_time(&self) -> Option<f64> {
        self.workspace.as_ref().map(|ws| ws.t)
    }

    /// Returns the current order, if initialised.
    #[must_use]
    pub fn order(&self) -> Option<usize> {
        self.workspace.as_ref().map(|ws| ws.order)
    }

    /// Returns the size of the next internal step, once stepping has begun.
    #[must_use]
    pub fn step_size(&self) -> Option<f64> {
        self.workspace
            .as_ref()
            .filter(|ws| ws.started)
            .map(|ws| ws.h_abs)
    }

    /// Evaluates the model at the start point and sets up the workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if the rates or the Jacobian cannot be evaluated.
    pub fn initialize(
        &mut self,
        time: f64,
        states: &[f64],
        system: &mut RateSystem<'_>,
    ) -> Result<(), SolverError> {
        self.workspace = Some(Workspace::new(time, states, &self.config, system)?);
        Ok(())
    }

    /// Advances `states` from `*time` to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::ConvergenceFailure`] if the step size collapses
    /// or the step budget runs out, or [`SolverError::InvalidState`] if the
    /// model fails. On error `*time` and `states` hold the last accepted step.
    pub fn solve(
        &mut self,
        time: &mut f64,
        target: f64,
        states: &mut [f64],
        system: &mut RateSystem<'_>,
    ) -> Result<(), SolverError> {
        if target <= *time {
            return Ok(());
        }

        let config = self.config;
        let ws = match self.workspace.take() {
            Some(ws) => self.workspace.insert(ws),
            None => self
                .workspace
                .insert(Workspace::new(*time, states, &config, system)?),
        };

        if !ws.started {
            ws.start(target, &config, system)?;
        }

        let bound = if config.interpolate() {
            f64::INFINITY
        } else {
            target
        };

        let mut steps = 0;
        let outcome = loop {
            if ws.t >= target {
                break Ok(());
            }
            if steps == config.max_steps() {
                break Err(SolverError::convergence(
                    ws.t,
                    Convergence::TooMuchWork {
                        max_steps: config.max_steps(),
                        target,
                    },
                ));
            }
            if let Err(err) = ws.step(&config, bound, system) {
                break Err(err);
            }
            steps += 1;
        };

        match outcome {
            Ok(()) => {
                if ws.t > target {
                    ws.differences
                        .interpolate(ws.order, ws.t, ws.h_abs, target, states);
                } else {
                    states.copy_from_slice(&ws.y);
                }
                *time = target;
                Ok(())
            }
            Err(err) => {
                log::debug!("BDF stopped at t = {} (order {}): {err}", ws.t, ws.order);
                states.copy_from_slice(&ws.y);
                *time = ws.t;
                Err(err)
            }
        }
    }

    /// Drops the workspace.
    pub fn finalize(&mut self) {
        self.workspace = None;
    }
}

/// Method coefficients indexed by order.
#[derive(Debug, Clone, Copy)]
struct Coefficients {
    gamma: [f64; MAX_ORDER + 1],
    alpha: [f64; MAX_ORDER + 1],
    error_const: [f64; MAX_ORDER + 1],
}

impl Coefficients {
    fn new() -> Self {
        let mut gamma = [0.0; MAX_ORDER + 1];
        let mut alpha = [0.0; MAX_ORDER + 1];
        let mut error_const = [0.0; MAX_ORDER + 1];

        for k in 0..=MAX_ORDER {
            #[allow(clippy::cast_precision_loss)]
            let k_f = k as f64;
            if k > 0 {
                gamma[k] = gamma[k - 1] + 1.0 / k_f;
            }
            alpha[k] = (1.0 - KAPPA[k]) * gamma[k];
            error_const[k] = KAPPA[k] * gamma[k] + 1.0 / (k_f + 1.0);
        }

        Self {
            gamma,
            alpha,
            error_const,
        }
    }
}

#[derive(Debug, Clone)]
struct Workspace {
    t: f64,
    y: Vec<f64>,
    f: Vec<f64>,
    h_abs: f64,
    order: usize,
    n_equal_steps: usize,
    newton_tol: f64,
    differences: Differences,
    jacobian: DMatrix<f64>,
    lu: Option<Factorization>,
    coefficients: Coefficients,
    started: bool,
}

/// The result of a converged Newton iteration.
struct NewtonStep {
    iters: usize,
    y: Vec<f64>,
    d: Vec<f64>,
}

/// A step that passed the error test.
struct Accepted {
    t: f64,
    newton: NewtonStep,
    scale: Vec<f64>,
    safety: f64,
    error_norm: f64,
}

impl Workspace {
    fn new(
        time: f64,
        states: &[f64],
        config: &Config,
        system: &mut RateSystem<'_>,
    ) -> Result<Self, SolverError> {
        let mut f = vec![0.0; states.len()];
        system.rates(time, states, &mut f)?;
        let jacobian = jacobian(system, time, states, &f)?;

        let rel_tol = config.rel_tol();
        let newton_tol = (10.0 * f64::EPSILON / rel_tol).max(rel_tol.sqrt().min(0.03));

        Ok(Self {
            t: time,
            y: states.to_vec(),
            f,
            h_abs: 0.0,
            order: 1,
            n_equal_steps: 0,
            newton_tol,
            differences: Differences::default(),
            jacobian,
            lu: None,
            coefficients: Coefficients::new(),
            started: false,
        })
    }

    /// Chooses the first step towards `target` and seeds the difference table.
    fn start(
        &mut self,
        target: f64,
        config: &Config,
        system: &mut RateSystem<'_>,
    ) -> Result<(), SolverError> {
        let h_abs = initial_step(system, self.t, &self.y, &self.f, target - self.t, config)?
            .min(config.max_step());

        self.differences = Differences::new(&self.y, &self.f, h_abs);
        self.h_abs = h_abs;
        self.started = true;
        Ok(())
    }

    /// Takes one accepted step, never past `bound`.
    fn step(
        &mut self,
        config: &Config,
        bound: f64,
        system: &mut RateSystem<'_>,
    ) -> Result<(), SolverError> {
        let coefficients = self.coefficients;
        let t = self.t;
        let order = self.order;
        let min_step = 10.0 * spacing(t);
        let max_step = config.max_step();

        let mut h_abs = self.h_abs;
        if h_abs > max_step {
            self.differences.rescale(order, max_step / h_abs);
            h_abs = max_step;
            self.n_equal_steps = 0;
        } else if h_abs < min_step {
            self.differences.rescale(order, min_step / h_abs);
            h_abs = min_step;
            self.n_equal_steps = 0;
        }

        let mut current_jacobian = false;
        let accepted = loop {
            if h_abs < min_step {
                return Err(SolverError::convergence(
                    t,
                    Convergence::StepTooSmall { min_step },
                ));
            }

            let mut t_new = t + h_abs;
            if t_new > bound {
                t_new = bound;
                self.differences.rescale(order, (t_new - t) / h_abs);
                self.n_equal_steps = 0;
                self.lu = None;
            }
            let h = t_new - t;
            h_abs = h;

            let y_predict = self.differences.predict(order);
            let scale = error_scale(&y_predict, config);
            let psi = self
                .differences
                .psi(order, &coefficients.gamma, coefficients.alpha[order]);
            let c = h / coefficients.alpha[order];

            let newton = loop {
                if self.lu.is_none() {
                    self.lu = Factorization::new(iteration_matrix(c, &self.jacobian));
                }
                let outcome = match &self.lu {
                    Some(lu) => solve_bdf_system(
                        system,
                        t_new,
                        &y_predict,
                        c,
                        &psi,
                        lu,
                        &scale,
                        self.newton_tol,
                    )?,
                    None => None,
                };
                if outcome.is_some() || current_jacobian {
                    break outcome;
                }

                let mut f = vec![0.0; y_predict.len()];
                system.rates(t_new, &y_predict, &mut f)?;
                self.jacobian = jacobian(system, t_new, &y_predict, &f)?;
                self.lu = None;
                current_jacobian = true;
            };

            let Some(newton) = newton else {
                h_abs *= 0.5;
                self.differences.rescale(order, 0.5);
                self.n_equal_steps = 0;
                self.lu = None;
                continue;
            };

            #[allow(clippy::cast_precision_loss)]
            let safety = 0.9 * (2 * NEWTON_MAXITER + 1) as f64
                / (2 * NEWTON_MAXITER + newton.iters) as f64;
            let scale = error_scale(&newton.y, config);
            let error: Vec<f64> = newton
                .d
                .iter()
                .map(|d| coefficients.error_const[order] * d)
                .collect();
            let error_norm = scaled_rms(&error, &scale);

            if error_norm.is_nan() || error_norm > 1.0 {
                #[allow(clippy::cast_precision_loss)]
                let exponent = -1.0 / (order as f64 + 1.0);
                let factor = MIN_FACTOR.max(safety * error_norm.powf(exponent));
                h_abs *= factor;
                self.differences.rescale(order, factor);
                self.n_equal_steps = 0;
            } else {
                break Accepted {
                    t: t_new,
                    newton,
                    scale,
                    safety,
                    error_norm,
                };
            }
        };

        self.n_equal_steps += 1;
        self.t = accepted.t;
        self.h_abs = h_abs;
        self.differences.update(order, &accepted.newton.d);
        self.y = accepted.newton.y;

        if self.n_equal_steps < order + 1 {
            return Ok(());
        }

        let neighbour_norm = |k: usize, row: usize| {
            let error: Vec<f64> = self
                .differences
                .row(row)
                .iter()
                .map(|d| coefficients.error_const[k] * d)
                .collect();
            scaled_rms(&error, &accepted.scale)
        };
        let lower = if order > 1 {
            neighbour_norm(order - 1, order)
        } else {
            f64::INFINITY
        };
        let higher = if order < MAX_ORDER {
            neighbour_norm(order + 1, order + 2)
        } else {
            f64::INFINITY
        };

        let (best, best_factor) = [lower, accepted.error_norm, higher]
            .into_iter()
            .enumerate()
            .map(|(i, norm)| {
                #[allow(clippy::cast_precision_loss)]
                let exponent = -1.0 / (order + i) as f64;
                (i, norm.powf(exponent))
            })
            .fold((1, f64::NEG_INFINITY), |best, candidate| {
                if candidate.1 > best.1 { candidate } else { best }
            });

        let new_order = (order + best).saturating_sub(1).clamp(1, MAX_ORDER);
        let factor = MAX_FACTOR.min(accepted.safety * best_factor);

        self.order = new_order;
        self.h_abs *= factor;
        self.differences.rescale(new_order, factor);
        self.n_equal_steps = 0;
        self.lu = None;

        Ok(())
    }
}

/// Runs the simplified Newton iteration for one BDF step.
///
/// Returns `None` if the iteration diverges, stalls or meets a non-finite
/// rate.
#[allow(clippy::too_many_arguments)]
fn solve_bdf_system(
    system: &mut RateSystem<'_>,
    t_new: f64,
    y_predict: &[f64],
    c: f64,
    psi: &[f64],
    lu: &Factorization,
    scale: &[f64],
    tol: f64,
) -> Result<Option<NewtonStep>, SolverError> {
    let n = y_predict.len();
    let mut y = y_predict.to_vec();
    let mut d = vec![0.0; n];
    let mut f = vec![0.0; n];
    let mut dy = vec![0.0; n];
    let mut dy_norm_old: Option<f64> = None;

    for k in 0..NEWTON_MAXITER {
        system.rates(t_new, &y, &mut f)?;
        if f.iter().any(|value| !value.is_finite()) {
            return Ok(None);
        }

        for i in 0..n {
            dy[i] = c * f[i] - psi[i] - d[i];
        }
        if !lu.solve_in_place(&mut dy) {
            return Ok(None);
        }

        let dy_norm = scaled_rms(&dy, scale);
        let rate = dy_norm_old.map(|old| dy_norm / old);

        if let Some(rate) = rate {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let remaining = (NEWTON_MAXITER - k) as i32;
            if rate >= 1.0 || rate.powi(remaining) / (1.0 - rate) * dy_norm > tol {
                return Ok(None);
            }
        }

        for i in 0..n {
            y[i] += dy[i];
            d[i] += dy[i];
        }

        if dy_norm == 0.0 || rate.is_some_and(|rate| rate / (1.0 - rate) * dy_norm < tol) {
            return Ok(Some(NewtonStep { iters: k + 1, y, d }));
        }

        dy_norm_old = Some(dy_norm);
    }

    Ok(None)
}

/// Estimates a first step towards a target `span` away.
fn initial_step(
    system: &mut RateSystem<'_>,
    t0: f64,
    y0: &[f64],
    f0: &[f64],
    span: f64,
    config: &Config,
) -> Result<f64, SolverError> {
    if y0.is_empty() || span <= 0.0 {
        return Ok(span);
    }

    let scale = error_scale(y0, config);
    let d0 = scaled_rms(y0, &scale);
    let d1 = scaled_rms(f0, &scale);

    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    };
    let h0 = h0.min(span);

    let y1: Vec<f64> = y0.iter().zip(f0).map(|(y, f)| y + h0 * f).collect();
    let mut f1 = vec![0.0; y0.len()];
    system.rates(t0 + h0, &y1, &mut f1)?;

    let df: Vec<f64> = f1.iter().zip(f0).map(|(f1, f0)| f1 - f0).collect();
    let d2 = scaled_rms(&df, &scale) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).sqrt()
    };

    Ok((100.0 * h0).min(h1).min(span))
}

fn jacobian(
    system: &mut RateSystem<'_>,
    t: f64,
    y: &[f64],
    f: &[f64],
) -> Result<DMatrix<f64>, SolverError> {
    linalg::forward_difference(y, f, |y, f| system.rates(t, y, f))
}

/// `I - c J`
fn iteration_matrix(c: f64, jacobian: &DMatrix<f64>) -> DMatrix<f64> {
    let mut matrix = jacobian.scale(-c);
    for i in 0..matrix.nrows().min(matrix.ncols()) {
        matrix[(i, i)] += 1.0;
    }
    matrix
}

fn error_scale(y: &[f64], config: &Config) -> Vec<f64> {
    y.iter()
        .map(|y| config.abs_tol() + config.rel_tol() * y.abs())
        .collect()
}

/// Distance from `t` to the next representable value above `|t|`.
fn spacing(t: f64) -> f64 {
    let magnitude = t.abs();
    if magnitude.is_finite() {
        f64::from_bits(magnitude.to_bits() + 1) - magnitude
    } else {
        f64::INFINITY
    }
}
