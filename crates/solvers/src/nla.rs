//! Solvers for systems of nonlinear algebraic equations.
//!
//! A [`NonlinearSystem`] maps unknowns `x` to residuals `F(x)`; solvers in
//! this module drive the residuals to zero. Closures of the form
//! `FnMut(&[f64], &mut [f64]) -> Result<(), ModelError>` are systems.
//!
//! # Solvers
//!
//! - [`newton`]: damped Newton iteration with a finite-difference Jacobian

pub mod newton;

use cellsim_core::{ConfigError, ModelError, SolverConfig, SolverKind};

use crate::registry;

/// A square system of nonlinear equations.
pub trait NonlinearSystem {
    /// Writes `F(x)` into `residuals`.
    ///
    /// # Errors
    ///
    /// Returns an error if the residuals cannot be evaluated at `x`.
    fn residuals(&mut self, x: &[f64], residuals: &mut [f64]) -> Result<(), ModelError>;
}

impl<F> NonlinearSystem for F
where
    F: FnMut(&[f64], &mut [f64]) -> Result<(), ModelError>,
{
    fn residuals(&mut self, x: &[f64], residuals: &mut [f64]) -> Result<(), ModelError> {
        self(x, residuals)
    }
}

/// An NLA solver selected by name.
#[derive(Debug, Clone, PartialEq)]
pub enum NlaSolver {
    Newton(newton::Config),
}

impl Default for NlaSolver {
    fn default() -> Self {
        Self::Newton(newton::Config::default())
    }
}

impl NlaSolver {
    /// Builds the NLA solver named in `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the name is not a registered NLA solver or
    /// a property is invalid for it.
    pub fn new(config: &SolverConfig) -> Result<Self, ConfigError> {
        let info = registry::find(&config.name, SolverKind::Nla)?;
        let properties = config.properties.resolve(info)?;
        Ok(Self::Newton(newton::Config::from_properties(&properties)?))
    }

    /// Returns the registry name of the solver.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Newton(_) => registry::NEWTON,
        }
    }

    /// Solves `system` starting from the guess in `x`.
    ///
    /// # Errors
    ///
    /// Returns the solver's error if the system cannot be solved.
    pub fn solve<S>(&self, system: &mut S, x: &mut [f64]) -> Result<newton::Solution, newton::Error>
    where
        S: NonlinearSystem + ?Sized,
    {
        match self {
            Self::Newton(config) => newton::solve_unobserved(system, x, config),
        }
    }
}
