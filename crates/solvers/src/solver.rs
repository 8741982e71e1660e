use cellsim_core::{ConfigError, Model, SolverConfig, SolverError};

use crate::{Constraints, DaeSolver, NlaSolver, OdeSolver, RateSystem};

/// The solver a simulation steps with.
#[derive(Debug, Clone)]
pub enum Solver {
    /// Integrates the states.
    Ode(OdeSolver),
    /// Integrates the states while keeping algebraic constraints satisfied.
    Dae(DaeSolver),
    /// Advances time only, for models without states.
    None(NoSolver),
}

impl Default for Solver {
    fn default() -> Self {
        Self::None(NoSolver::default())
    }
}

/// A solver for models with no differential part.
///
/// Time jumps straight to each target. Algebraic constraints, if any, are
/// resolved whenever the variables are recomputed.
#[derive(Debug, Clone, Default)]
pub struct NoSolver {
    constraints: Option<Constraints>,
}

impl NoSolver {
    #[must_use]
    pub fn new(constraints: Option<Constraints>) -> Self {
        Self { constraints }
    }
}

impl Solver {
    /// Builds the solver for `model`.
    ///
    /// The ODE and NLA selections are always validated. The variant is chosen
    /// from the model's shape: no states gives [`Solver::None`], algebraic
    /// unknowns give [`Solver::Dae`] (with a default Newton solver when `nla`
    /// is `None`), anything else gives [`Solver::Ode`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a selection names an unknown solver, a
    /// solver of the wrong kind, or carries an invalid property.
    pub fn build(
        ode: &SolverConfig,
        nla: Option<&SolverConfig>,
        model: &dyn Model,
    ) -> Result<Self, ConfigError> {
        let ode = OdeSolver::new(ode)?;
        let constraints = constraints(nla, model)?;

        let solver = match (model.sizes().states, constraints) {
            (0, constraints) => Self::None(NoSolver::new(constraints)),
            (_, Some(constraints)) => Self::Dae(DaeSolver::new(ode, constraints)),
            (_, None) => Self::Ode(ode),
        };

        log::debug!("selected {} solver", solver.name());
        Ok(solver)
    }

    /// Builds the solver held between runs.
    ///
    /// It never advances time, but still resolves the model's algebraic
    /// unknowns whenever the variables are recomputed.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `nla` is invalid or the model's unknowns
    /// do not fit its computed vector.
    pub fn idle(nla: Option<&SolverConfig>, model: &dyn Model) -> Result<Self, ConfigError> {
        Ok(Self::None(NoSolver::new(constraints(nla, model)?)))
    }

    /// Drops everything but the algebraic constraints, ready for use between
    /// runs.
    #[must_use]
    pub fn into_idle(self) -> Self {
        match self {
            Self::Dae(solver) => Self::None(NoSolver::new(Some(solver.into_constraints()))),
            Self::None(solver) => Self::None(solver),
            Self::Ode(_) => Self::default(),
        }
    }

    /// Returns the name of the solver that advances time.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ode(solver) => solver.name(),
            Self::Dae(solver) => solver.ode().name(),
            Self::None(_) => "none",
        }
    }

    /// Prepares the solver to step from `time` and `states`.
    ///
    /// Calling `initialize` followed by [`finalize`](Solver::finalize) leaves
    /// `states` untouched.
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
            Self::Ode(solver) => solver.initialize(time, states, system),
            Self::Dae(solver) => solver.initialize(time, states, system),
            Self::None(_) => Ok(()),
        }
    }

    /// Advances `states` from `*time` to `target`.
    ///
    /// On success `*time == target`.
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
            Self::Ode(solver) => solver.solve(time, target, states, system),
            Self::Dae(solver) => solver.solve(time, target, states, system),
            Self::None(_) => {
                *time = target;
                Ok(())
            }
        }
    }

    /// Evaluates the rates at `time` with any algebraic constraints resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraints or the model cannot be evaluated.
    pub fn recompute(
        &mut self,
        time: f64,
        states: &[f64],
        rates: &mut [f64],
        system: &mut RateSystem<'_>,
    ) -> Result<(), SolverError> {
        let constraints = match self {
            Self::Dae(solver) => Some(solver.constraints_mut()),
            Self::None(solver) => solver.constraints.as_mut(),
            Self::Ode(_) => None,
        };

        match constraints {
            Some(constraints) => system.constrained(constraints).rates(time, states, rates),
            None => system.rates(time, states, rates),
        }
    }

    /// Releases the solver's workspace.
    pub fn finalize(&mut self) {
        match self {
            Self::Ode(solver) => solver.finalize(),
            Self::Dae(solver) => solver.finalize(),
            Self::None(_) => {}
        }
    }
}

/// The model's algebraic constraints, solved with `nla` or a default Newton.
fn constraints(
    nla: Option<&SolverConfig>,
    model: &dyn Model,
) -> Result<Option<Constraints>, ConfigError> {
    let nla = nla.map(NlaSolver::new).transpose()?;

    let unknowns = model.algebraic_unknowns();
    if unknowns.is_empty() {
        return Ok(None);
    }
    Constraints::new(nla.unwrap_or_default(), unknowns, model.sizes().computed).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use cellsim_core::{Limit, Sizes};

    use crate::{
        registry,
        test_utils::{Buffers, CubicConstraint, Decay},
    };

    struct Empty;

    impl Model for Empty {
        fn sizes(&self) -> Sizes {
            Sizes::new(0, 1, 1)
        }

        fn initialize(
            &self,
            _: &mut [f64],
            constants: &mut [f64],
            _: &mut [f64],
        ) -> Result<(), cellsim_core::ModelError> {
            constants[0] = 4.0;
            Ok(())
        }

        fn compute_rates(
            &self,
            time: f64,
            _: &[f64],
            _: &mut [f64],
            constants: &[f64],
            computed: &mut [f64],
        ) -> Result<(), cellsim_core::ModelError> {
            computed[0] = constants[0] * time;
            Ok(())
        }
    }

    #[test]
    fn picks_variant_from_model_shape() {
        let ode = SolverConfig::new(registry::FORWARD_EULER).with("Step", 0.1);

        assert!(matches!(
            Solver::build(&ode, None, &Decay).unwrap(),
            Solver::Ode(OdeSolver::FixedStep(_))
        ));
        assert!(matches!(
            Solver::build(&ode, None, &CubicConstraint).unwrap(),
            Solver::Dae(_)
        ));
        assert!(matches!(
            Solver::build(&ode, None, &Empty).unwrap(),
            Solver::None(_)
        ));
    }

    #[test]
    fn rejects_bad_selections() {
        let bad_step = SolverConfig::new(registry::HEUN).with("Step", -1.0);
        assert!(matches!(
            Solver::build(&bad_step, None, &Decay),
            Err(ConfigError::OutOfRange {
                limit: Limit::Positive,
                ..
            })
        ));

        let nla_as_ode = SolverConfig::new(registry::NEWTON);
        assert!(matches!(
            Solver::build(&nla_as_ode, None, &Decay),
            Err(ConfigError::WrongKind { .. })
        ));

        let ode = SolverConfig::new(registry::BDF);
        let bad_nla = SolverConfig::new(registry::NEWTON).with("Tolerance", 0.0);
        assert!(Solver::build(&ode, Some(&bad_nla), &Decay).is_err());
    }

    #[test]
    fn no_solver_jumps_to_the_target() {
        let ode = SolverConfig::new(registry::BDF);
        let mut solver = Solver::build(&ode, None, &Empty).unwrap();

        let Buffers {
            mut states,
            constants,
            mut computed,
        } = Buffers::new(&Empty);
        let mut system = RateSystem::new(&Empty, &constants, &mut computed);

        let mut time = 0.0;
        solver.initialize(time, &states, &mut system).unwrap();
        solver
            .solve(&mut time, 2.5, &mut states, &mut system)
            .unwrap();
        assert_eq!(time, 2.5);

        let mut rates = [];
        solver
            .recompute(time, &states, &mut rates, &mut system)
            .unwrap();
        assert_relative_eq!(system.computed()[0], 10.0);
    }

    #[test]
    fn idle_solver_keeps_resolving_constraints() {
        let ode = SolverConfig::new(registry::FORWARD_EULER).with("Step", 0.1);
        let idle = Solver::build(&ode, None, &CubicConstraint)
            .unwrap()
            .into_idle();
        assert_eq!(idle.name(), "none");

        for mut solver in [idle, Solver::idle(None, &CubicConstraint).unwrap()] {
            let Buffers {
                states,
                constants,
                mut computed,
            } = Buffers::new(&CubicConstraint);
            let mut system = RateSystem::new(&CubicConstraint, &constants, &mut computed);

            let mut rates = [0.0];
            solver
                .recompute(0.0, &states, &mut rates, &mut system)
                .unwrap();
            // z^3 + z = 2 has root z = 1.
            assert_relative_eq!(system.computed()[0], 1.0, epsilon = 1e-9);
            assert_relative_eq!(rates[0], -1.0, epsilon = 1e-9);
        }

        let plain = Solver::build(&ode, None, &Decay).unwrap().into_idle();
        assert!(matches!(plain, Solver::None(NoSolver { constraints: None })));
    }
}
