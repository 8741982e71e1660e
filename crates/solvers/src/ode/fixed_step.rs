//! Explicit fixed-step solvers.
//!
//! Each call to `solve` covers the interval to the target with steps of the
//! configured size. The last step is shortened so that it lands exactly on
//! the target, and an interval that is a whole number of steps (to rounding)
//! is never split into an extra sliver.
//!
//! # Methods
//!
//! - [`Method::ForwardEuler`]: `y += h f(t, y)`
//! - [`Method::Heun`]: trapezoidal predictor-corrector
//! - [`Method::SecondOrderRungeKutta`]: explicit midpoint rule
//! - [`Method::FourthOrderRungeKutta`]: the classical four-stage scheme

use cellsim_core::{
    ConfigError, Convergence, Limit, PropertyKind, PropertySpec, PropertyValue, SolverError,
};

use crate::{RateSystem, registry};

/// Property id of the step size.
pub const STEP: &str = "Step";

pub(crate) static PROPERTIES: [PropertySpec; 1] = [PropertySpec {
    id: STEP,
    kind: PropertyKind::Double(Limit::Positive),
    default: PropertyValue::Double(1.0),
    has_time_unit: true,
}];

/// Relative slack when counting whole steps in an interval.
const STEP_SNAP: f64 = 1e-9;

/// Most steps a single call to `solve` may take.
pub const MAX_STEPS: usize = 1_000_000_000;

/// The update rule of a fixed-step solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    ForwardEuler,
    Heun,
    SecondOrderRungeKutta,
    FourthOrderRungeKutta,
}

impl Method {
    /// Looks up a method by its registry name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            registry::FORWARD_EULER => Some(Self::ForwardEuler),
            registry::HEUN => Some(Self::Heun),
            registry::SECOND_ORDER_RUNGE_KUTTA => Some(Self::SecondOrderRungeKutta),
            registry::FOURTH_ORDER_RUNGE_KUTTA => Some(Self::FourthOrderRungeKutta),
            _ => None,
        }
    }

    /// Returns the registry name of the method.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ForwardEuler => registry::FORWARD_EULER,
            Self::Heun => registry::HEUN,
            Self::SecondOrderRungeKutta => registry::SECOND_ORDER_RUNGE_KUTTA,
            Self::FourthOrderRungeKutta => registry::FOURTH_ORDER_RUNGE_KUTTA,
        }
    }

    fn stages(self) -> usize {
        match self {
            Self::ForwardEuler => 1,
            Self::Heun | Self::SecondOrderRungeKutta => 2,
            Self::FourthOrderRungeKutta => 4,
        }
    }
}

/// A fixed-step explicit solver.
#[derive(Debug, Clone)]
pub struct FixedStep {
    method: Method,
    step: f64,
    stages: [Vec<f64>; 4],
    scratch: Vec<f64>,
}

impl FixedStep {
    /// Creates a solver that steps with `method` and step size `step`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] if `step` is not finite and positive.
    pub fn new(method: Method, step: f64) -> Result<Self, ConfigError> {
        if !Limit::Positive.admits(step) {
            return Err(ConfigError::OutOfRange {
                property: STEP.to_string(),
                value: step,
                limit: Limit::Positive,
            });
        }

        Ok(Self {
            method,
            step,
            stages: Default::default(),
            scratch: Vec::new(),
        })
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Allocates the stage buffers for `size` states.
    pub fn initialize(&mut self, size: usize) {
        let used = self.method.stages();
        for (i, stage) in self.stages.iter_mut().enumerate() {
            *stage = if i < used { vec![0.0; size] } else { Vec::new() };
        }
        self.scratch = vec![0.0; size];
    }

    /// Steps `states` from `*time` to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidState`] if a rate evaluation fails, or
    /// [`SolverError::ConvergenceFailure`] if reaching `target` would take
    /// more than [`MAX_STEPS`] steps.
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
        if self.scratch.len() != states.len() || self.stages[0].len() != states.len() {
            self.initialize(states.len());
        }

        let start = *time;
        let steps = step_count(target - start, self.step).ok_or_else(|| {
            SolverError::convergence(
                start,
                Convergence::TooMuchWork {
                    max_steps: MAX_STEPS,
                    target,
                },
            )
        })?;

        for i in 1..=steps {
            #[allow(clippy::cast_precision_loss)]
            let next = if i == steps {
                target
            } else {
                start + i as f64 * self.step
            };
            self.advance(*time, next - *time, states, system)?;
            *time = next;
        }

        Ok(())
    }

    /// Drops the stage buffers.
    pub fn finalize(&mut self) {
        self.stages = Default::default();
        self.scratch = Vec::new();
    }

    fn advance(
        &mut self,
        t: f64,
        h: f64,
        y: &mut [f64],
        system: &mut RateSystem<'_>,
    ) -> Result<(), SolverError> {
        let scratch = &mut self.scratch;
        let [k1, k2, k3, k4] = &mut self.stages;

        match self.method {
            Method::ForwardEuler => {
                system.rates(t, y, k1)?;
                axpy(y, h, k1);
            }
            Method::Heun => {
                system.rates(t, y, k1)?;
                offset(scratch, y, h, k1);
                system.rates(t + h, scratch, k2)?;
                for ((y, k1), k2) in y.iter_mut().zip(k1.iter()).zip(k2.iter()) {
                    *y += 0.5 * h * (k1 + k2);
                }
            }
            Method::SecondOrderRungeKutta => {
                system.rates(t, y, k1)?;
                offset(scratch, y, 0.5 * h, k1);
                system.rates(t + 0.5 * h, scratch, k2)?;
                axpy(y, h, k2);
            }
            Method::FourthOrderRungeKutta => {
                system.rates(t, y, k1)?;
                offset(scratch, y, 0.5 * h, k1);
                system.rates(t + 0.5 * h, scratch, k2)?;
                offset(scratch, y, 0.5 * h, k2);
                system.rates(t + 0.5 * h, scratch, k3)?;
                offset(scratch, y, h, k3);
                system.rates(t + h, scratch, k4)?;
                let stages = k1.iter().zip(k2.iter()).zip(k3.iter()).zip(k4.iter());
                for (y, (((k1, k2), k3), k4)) in y.iter_mut().zip(stages) {
                    *y += h / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4);
                }
            }
        }

        Ok(())
    }
}

/// Number of steps of size `step` needed to cover `span`.
///
/// Returns `None` if that is more than [`MAX_STEPS`].
fn step_count(span: f64, step: f64) -> Option<usize> {
    let ratio = span / step;
    let whole = ratio.round();
    let steps = if (ratio - whole).abs() <= STEP_SNAP * whole.max(1.0) {
        whole
    } else {
        ratio.ceil()
    };
    #[allow(clippy::cast_precision_loss)]
    let limit = MAX_STEPS as f64;
    if steps > limit {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let steps = steps as usize;
    Some(steps.max(1))
}

/// `y += a x`
fn axpy(y: &mut [f64], a: f64, x: &[f64]) {
    for (y, x) in y.iter_mut().zip(x) {
        *y += a * x;
    }
}

/// `out = y + a x`
fn offset(out: &mut [f64], y: &[f64], a: f64, x: &[f64]) {
    for ((out, y), x) in out.iter_mut().zip(y).zip(x) {
        *out = y + a * x;
    }
}
