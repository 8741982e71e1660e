//! Time-stepping solvers for the differential part of a model.
//!
//! # Solvers
//!
//! - [`fixed_step`]: explicit Runge-Kutta family with a constant step
//! - [`bdf`]: variable-order, variable-step backward differentiation formulas
//!   for stiff models

pub mod bdf;
pub mod fixed_step;

use cellsim_core::{ConfigError, SolverConfig, SolverError, SolverKind};

pub use bdf::Bdf;
pub use fixed_step::{FixedStep, Method};

use crate::{RateSystem, registry};

/// An ODE solver selected by name.
#[derive(Debug, Clone)]
pub enum OdeSolver {
    FixedStep(FixedStep),
    Bdf(Bdf),
}

impl OdeSolver {
    /// Builds the ODE solver named in `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the name is not a registered ODE solver or
    /// a property is invalid for it.
    pub fn new(config: &SolverConfig) -> Result<Self, ConfigError> {
        let info = registry::find(&config.name, SolverKind::Ode)?;
        let properties = config.properties.resolve(info)?;

        if info.name == registry::BDF {
            return Ok(Self::Bdf(Bdf::new(bdf::Config::from_properties(&properties)?)));
        }

        let method = Method::from_name(info.name)
            .ok_or_else(|| ConfigError::UnknownSolver(config.name.clone()))?;
        let step = properties.double(fixed_step::STEP)?;

        Ok(Self::FixedStep(FixedStep::new(method, step)?))
    }

    /// Returns the registry name of the solver.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FixedStep(solver) => solver.method().name(),
            Self::Bdf(_) => registry::BDF,
        }
    }

    /// Prepares the solver to step from `time` and `states`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be evaluated at the start point.
    pub fn initialize(
        &mut self,
        time: f64,
        states: &[f64],
        system: &mut RateSystem<'_>,
    ) -> Result<(), SolverError> {
        match self {
            Self::FixedStep(solver) => {
                solver.initialize(states.len());
                Ok(())
            }
            Self::Bdf(solver) => solver.initialize(time, states, system),
        }
    }

    /// Advances `states` from `*time` to `target`.
    ///
    /// On success `*time == target`. On error `*time` and `states` are left
    /// at the last point the solver reached.
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if the target cannot be reached.
    pub fn solve(
        &mut self,
        time: &mut f64,
        target: f64,
        states: &mut [f64],
        system: &mut RateSystem<'_>,
    ) -> Result<(), SolverError> {
        match self {
            Self::FixedStep(solver) => solver.solve(time, target, states, system),
            Self::Bdf(solver) => solver.solve(time, target, states, system),
        }
    }

    /// Releases the solver's workspace.
    pub fn finalize(&mut self) {
        match self {
            Self::FixedStep(solver) => solver.finalize(),
            Self::Bdf(solver) => solver.finalize(),
        }
    }
}
