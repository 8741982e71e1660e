use cellsim_core::{Model, SolverError};

use crate::Constraints;

/// A model bound to the buffers a solver does not own.
///
/// Solvers own the state vector they step. Constants and computed variables
/// belong to the simulation and are lent to the solver for the duration of a
/// call through this type.
pub struct RateSystem<'a> {
    model: &'a dyn Model,
    constants: &'a [f64],
    computed: &'a mut [f64],
    constraints: Option<&'a mut Constraints>,
}

impl<'a> RateSystem<'a> {
    /// Binds `model` to its constant and computed vectors.
    pub fn new(model: &'a dyn Model, constants: &'a [f64], computed: &'a mut [f64]) -> Self {
        Self {
            model,
            constants,
            computed,
            constraints: None,
        }
    }

    /// Returns the number of states.
    #[must_use]
    pub fn size(&self) -> usize {
        self.model.sizes().states
    }

    #[must_use]
    pub fn constants(&self) -> &[f64] {
        self.constants
    }

    #[must_use]
    pub fn computed(&self) -> &[f64] {
        &*self.computed
    }

    /// Evaluates the rates at `time`.
    ///
    /// When the system carries algebraic constraints they are solved first, so
    /// the computed vector is consistent with `states` on return.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidState`] if the model fails, or the
    /// constraint solver's error if the algebraic system cannot be solved.
    pub fn rates(
        &mut self,
        time: f64,
        states: &[f64],
        rates: &mut [f64],
    ) -> Result<(), SolverError> {
        if let Some(constraints) = self.constraints.as_deref_mut() {
            constraints.resolve(self.model, time, states, self.constants, self.computed)?;
        }

        self.model
            .compute_rates(time, states, rates, self.constants, self.computed)
            .map_err(|err| SolverError::model(time, err))
    }

    /// Returns a system that solves `constraints` before every evaluation.
    pub(crate) fn constrained<'b>(
        &'b mut self,
        constraints: &'b mut Constraints,
    ) -> RateSystem<'b> {
        RateSystem {
            model: self.model,
            constants: self.constants,
            computed: &mut *self.computed,
            constraints: Some(constraints),
        }
    }
}
