use cellsim_core::{ConfigError, Model, ModelError, SolverError};

use crate::{NlaSolver, NonlinearSystem, OdeSolver, RateSystem};

/// The algebraic part of a model and the solver that resolves it.
///
/// The unknowns live in the computed vector. Their values from the previous
/// resolution are the starting guess for the next one.
#[derive(Debug, Clone)]
pub struct Constraints {
    solver: NlaSolver,
    unknowns: Vec<usize>,
    guess: Vec<f64>,
}

impl Constraints {
    /// Creates constraints on the computed variables at `unknowns`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownOutOfRange`] if an index does not fit a
    /// computed vector of length `computed_len`.
    pub fn new(
        solver: NlaSolver,
        unknowns: &[usize],
        computed_len: usize,
    ) -> Result<Self, ConfigError> {
        if let Some(&index) = unknowns.iter().find(|&&index| index >= computed_len) {
            return Err(ConfigError::UnknownOutOfRange {
                index,
                len: computed_len,
            });
        }

        Ok(Self {
            solver,
            unknowns: unknowns.to_vec(),
            guess: vec![0.0; unknowns.len()],
        })
    }

    #[must_use]
    pub fn solver(&self) -> &NlaSolver {
        &self.solver
    }

    /// Solves the unknowns at `time` and stores them in `computed`.
    ///
    /// # Errors
    ///
    /// Returns the NLA solver's error, raised at `time`.
    pub fn resolve(
        &mut self,
        model: &dyn Model,
        time: f64,
        states: &[f64],
        constants: &[f64],
        computed: &mut [f64],
    ) -> Result<(), SolverError> {
        for (guess, &index) in self.guess.iter_mut().zip(&self.unknowns) {
            *guess = computed[index];
        }

        let mut system = AlgebraicSystem {
            model,
            time,
            states,
            constants,
            computed: &mut *computed,
            unknowns: &self.unknowns,
        };
        self.solver
            .solve(&mut system, &mut self.guess)
            .map_err(|err| err.at(time))?;

        for (&value, &index) in self.guess.iter().zip(&self.unknowns) {
            computed[index] = value;
        }
        Ok(())
    }
}

/// The model's root-finding residuals as a function of its unknowns.
struct AlgebraicSystem<'a> {
    model: &'a dyn Model,
    time: f64,
    states: &'a [f64],
    constants: &'a [f64],
    computed: &'a mut [f64],
    unknowns: &'a [usize],
}

impl NonlinearSystem for AlgebraicSystem<'_> {
    fn residuals(&mut self, x: &[f64], residuals: &mut [f64]) -> Result<(), ModelError> {
        for (&value, &index) in x.iter().zip(self.unknowns) {
            self.computed[index] = value;
        }
        self.model.compute_root_finding(
            self.time,
            self.states,
            self.constants,
            self.computed,
            residuals,
        )
    }
}

/// An ODE solver whose rate evaluations first resolve algebraic constraints.
#[derive(Debug, Clone)]
pub struct DaeSolver {
    ode: OdeSolver,
    constraints: Constraints,
}

impl DaeSolver {
    #[must_use]
    pub fn new(ode: OdeSolver, constraints: Constraints) -> Self {
        Self { ode, constraints }
    }

    #[must_use]
    pub fn ode(&self) -> &OdeSolver {
        &self.ode
    }

    #[must_use]
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub(crate) fn constraints_mut(&mut self) -> &mut Constraints {
        &mut self.constraints
    }

    #[must_use]
    pub fn into_constraints(self) -> Constraints {
        self.constraints
    }

    /// Resolves the constraints at the start point, then prepares the ODE solver.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraints or the model cannot be evaluated.
    pub fn initialize(
        &mut self,
        time: f64,
        states: &[f64],
        system: &mut RateSystem<'_>,
    ) -> Result<(), SolverError> {
        let mut system = system.constrained(&mut self.constraints);
        let mut rates = vec![0.0; states.len()];
        system.rates(time, states, &mut rates)?;
        self.ode.initialize(time, states, &mut system)
    }

    /// Advances `states` from `*time` to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ODE solver fails or the constraints cannot be
    /// solved at some intermediate time.
    pub fn solve(
        &mut self,
        time: &mut f64,
        target: f64,
        states: &mut [f64],
        system: &mut RateSystem<'_>,
    ) -> Result<(), SolverError> {
        let mut system = system.constrained(&mut self.constraints);
        self.ode.solve(time, target, states, &mut system)
    }

    pub fn finalize(&mut self) {
        self.ode.finalize();
    }
}
