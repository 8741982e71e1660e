use std::{fmt, mem, sync::Arc};

use cellsim_core::{Model, Sizes, SolverError};
use cellsim_solvers::{RateSystem, Solver};

use crate::{Error, Point};

/// The numeric state of one model.
///
/// Vector lengths are fixed at construction from the model's [`Sizes`].
/// Between runs the values can be edited; during a run the worker owns the
/// data and only the solver writes to it.
pub struct SimulationData {
    model: Arc<dyn Model>,
    sizes: Sizes,
    time: f64,
    states: Box<[f64]>,
    rates: Box<[f64]>,
    constants: Box<[f64]>,
    computed: Box<[f64]>,
    initial_states: Box<[f64]>,
    initial_constants: Box<[f64]>,
    solver: Solver,
}

impl SimulationData {
    /// Allocates the vectors for `model` and fills them with its initial values.
    ///
    /// Algebraic unknowns are resolved with a default Newton solver until a
    /// run installs the configured one.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be initialized or its variables
    /// cannot be computed at `start`.
    pub fn new(model: Arc<dyn Model>, start: f64) -> Result<Self, Error> {
        let sizes = model.sizes();
        let solver = Solver::idle(None, model.as_ref())?;
        let mut data = Self {
            model,
            sizes,
            time: start,
            states: vec![0.0; sizes.states].into(),
            rates: vec![0.0; sizes.states].into(),
            constants: vec![0.0; sizes.constants].into(),
            computed: vec![0.0; sizes.computed].into(),
            initial_states: Box::default(),
            initial_constants: Box::default(),
            solver,
        };
        data.reset(start)?;
        Ok(data)
    }

    #[must_use]
    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    #[must_use]
    pub fn sizes(&self) -> Sizes {
        self.sizes
    }

    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[must_use]
    pub fn states(&self) -> &[f64] {
        &self.states
    }

    #[must_use]
    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    #[must_use]
    pub fn constants(&self) -> &[f64] {
        &self.constants
    }

    #[must_use]
    pub fn computed(&self) -> &[f64] {
        &self.computed
    }

    /// Returns the name of the active solver, `"none"` between runs.
    #[must_use]
    pub fn solver_name(&self) -> &'static str {
        self.solver.name()
    }

    /// Overrides a state value and recomputes the dependent variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] for a bad index, or an error if the
    /// variables cannot be recomputed.
    pub fn set_state(&mut self, index: usize, value: f64) -> Result<(), Error> {
        set(&mut self.states, "state", index, value)?;
        self.recompute_variables()
    }

    /// Overrides a constant and recomputes the dependent variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] for a bad index, or an error if the
    /// variables cannot be recomputed.
    pub fn set_constant(&mut self, index: usize, value: f64) -> Result<(), Error> {
        set(&mut self.constants, "constant", index, value)?;
        self.recompute_variables()
    }

    /// Returns `true` if any state or constant differs from its initial value.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.states != self.initial_states || self.constants != self.initial_constants
    }

    /// Restores the model's initial values at time `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be initialized or its variables
    /// cannot be computed.
    pub fn reset(&mut self, start: f64) -> Result<(), Error> {
        self.time = start;
        self.rates.fill(0.0);
        self.model
            .initialize(&mut self.states, &mut self.constants, &mut self.computed)
            .map_err(Error::Model)?;
        self.initial_states.clone_from(&self.states);
        self.initial_constants.clone_from(&self.constants);
        self.recompute_variables()
    }

    /// Recomputes the rates and computed variables from the current states.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be evaluated.
    pub fn recompute_variables(&mut self) -> Result<(), Error> {
        self.refresh().map_err(Error::from)
    }

    /// Captures the current values as an output point.
    #[must_use]
    pub fn point(&self) -> Point {
        Point {
            time: self.time,
            states: self.states.clone(),
            rates: self.rates.clone(),
            computed: self.computed.clone(),
        }
    }

    /// Installs `solver` and prepares it to step from `time`.
    pub(crate) fn start(&mut self, time: f64, solver: Solver) -> Result<(), SolverError> {
        self.time = time;
        self.solver = solver;

        let Self {
            model,
            states,
            constants,
            computed,
            solver,
            ..
        } = self;
        let mut system = RateSystem::new(&**model, constants, computed);
        solver.initialize(time, states, &mut system)?;

        self.refresh()
    }

    /// Advances the states to `target` and checks they are still finite.
    pub(crate) fn advance(&mut self, target: f64) -> Result<(), SolverError> {
        let Self {
            model,
            time,
            states,
            constants,
            computed,
            solver,
            ..
        } = self;
        let mut system = RateSystem::new(&**model, constants, computed);
        solver.solve(time, target, states, &mut system)?;

        SolverError::check_finite(*time, states)
    }

    /// Evaluates rates, constraints and essential variables at the current time.
    pub(crate) fn refresh(&mut self) -> Result<(), SolverError> {
        let Self {
            model,
            time,
            states,
            rates,
            constants,
            computed,
            solver,
            ..
        } = self;

        let mut system = RateSystem::new(&**model, constants, computed);
        solver.recompute(*time, states, rates, &mut system)?;

        model
            .compute_essential_variables(*time, states, rates, constants, computed)
            .map_err(|error| SolverError::model(*time, error))
    }

    /// Releases the solver's workspace, keeping its algebraic constraints.
    pub(crate) fn finish(&mut self) {
        self.solver.finalize();
        self.solver = mem::take(&mut self.solver).into_idle();
    }
}

fn set(values: &mut [f64], kind: &'static str, index: usize, value: f64) -> Result<(), Error> {
    let len = values.len();
    let slot = values
        .get_mut(index)
        .ok_or(Error::IndexOutOfRange { kind, index, len })?;
    *slot = value;
    Ok(())
}

impl fmt::Debug for SimulationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationData")
            .field("sizes", &self.sizes)
            .field("time", &self.time)
            .field("states", &self.states)
            .field("constants", &self.constants)
            .field("computed", &self.computed)
            .field("solver", &self.solver.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use cellsim_core::SolverConfig;
    use cellsim_solvers::registry;

    use crate::test_utils::{Decay, shared};

    #[test]
    fn starts_from_the_model_initial_values() {
        let data = SimulationData::new(shared(Decay), 0.0).unwrap();

        assert_eq!(data.sizes(), Sizes::new(1, 1, 1));
        assert_eq!(data.states(), [1.0]);
        assert_eq!(data.constants(), [1.0]);
        assert_eq!(data.rates(), [-1.0]);
        assert_eq!(data.computed(), [2.0]);
        assert_eq!(data.solver_name(), "none");
        assert!(!data.is_modified());
    }

    #[test]
    fn overrides_recompute_and_reset_restores() {
        let mut data = SimulationData::new(shared(Decay), 0.0).unwrap();

        data.set_constant(0, 3.0).unwrap();
        assert_eq!(data.rates(), [-3.0]);
        assert!(data.is_modified());

        data.set_state(0, 2.0).unwrap();
        assert_eq!(data.rates(), [-6.0]);
        assert_eq!(data.computed(), [4.0]);

        assert!(matches!(
            data.set_state(1, 0.0),
            Err(Error::IndexOutOfRange {
                kind: "state",
                index: 1,
                len: 1
            })
        ));

        data.reset(0.0).unwrap();
        assert_eq!(data.states(), [1.0]);
        assert_eq!(data.rates(), [-1.0]);
        assert!(!data.is_modified());
    }

    #[test]
    fn advances_with_the_installed_solver() {
        let model = shared(Decay);
        let mut data = SimulationData::new(Arc::clone(&model), 0.0).unwrap();
        let config = SolverConfig::new(registry::FOURTH_ORDER_RUNGE_KUTTA).with("Step", 0.01);
        let solver = Solver::build(&config, None, model.as_ref()).unwrap();

        data.start(0.0, solver).unwrap();
        assert_eq!(data.solver_name(), registry::FOURTH_ORDER_RUNGE_KUTTA);

        data.advance(1.0).unwrap();
        data.refresh().unwrap();
        assert_relative_eq!(data.time(), 1.0);
        assert_relative_eq!(data.states()[0], (-1.0_f64).exp(), max_relative = 1e-8);
        assert_relative_eq!(data.rates()[0], -data.states()[0]);

        data.finish();
        assert_eq!(data.solver_name(), "none");
    }
}
