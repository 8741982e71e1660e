use approx::assert_relative_eq;
use cellsim_core::{Convergence, SolverConfig, SolverError};
use cellsim_simulation::{Simulation, SimulationConfig, SimulationSettings, State, Variable};
use cellsim_solvers::{
    nla::newton,
    ode::{bdf, fixed_step},
    registry,
};
use integration_tests::models::{Clock, Decay, Drained, StiffLinear, shared};

fn config(end: f64, interval: f64, ode: SolverConfig) -> SimulationConfig {
    SimulationConfig {
        ode,
        ..SimulationConfig::new(SimulationSettings::new(0.0, end, interval).unwrap())
    }
}

fn stiff_bdf() -> SolverConfig {
    SolverConfig::new(registry::BDF)
        .with(bdf::RELATIVE_TOLERANCE, 1e-6)
        .with(bdf::ABSOLUTE_TOLERANCE, 1e-6)
}

#[test]
fn fixed_step_decay_matches_the_exact_solution() {
    let ode = SolverConfig::new(registry::FOURTH_ORDER_RUNGE_KUTTA).with(fixed_step::STEP, 0.01);
    let simulation = Simulation::new(shared(Decay), config(1.0, 0.1, ode)).unwrap();

    simulation.run().unwrap();
    assert_eq!(simulation.wait(), State::Finished);

    let results = simulation.results();
    let last = results.last().unwrap();
    assert_relative_eq!(last.time, 1.0);
    assert_relative_eq!(last.states[0], (-1.0_f64).exp(), max_relative = 1e-3);
}

#[test]
fn forward_euler_converges_towards_the_exact_solution() {
    let ode = SolverConfig::new(registry::FORWARD_EULER).with(fixed_step::STEP, 0.01);
    let simulation = Simulation::new(shared(Decay), config(1.0, 0.1, ode)).unwrap();

    simulation.run().unwrap();
    assert_eq!(simulation.wait(), State::Finished);

    let final_state = simulation.results().last().unwrap().states[0];
    assert_relative_eq!(final_state, 0.99_f64.powi(100), max_relative = 1e-10);
    assert_relative_eq!(final_state, (-1.0_f64).exp(), max_relative = 1e-2);
}

#[test]
fn bdf_finishes_a_stiff_system() {
    let simulation = Simulation::new(shared(StiffLinear), config(10.0, 1.0, stiff_bdf())).unwrap();

    simulation.run().unwrap();
    assert_eq!(simulation.wait(), State::Finished);
    assert!(simulation.error().is_none());

    let results = simulation.results();
    assert_eq!(results.len(), 11);
    for point in results.points().iter().skip(1) {
        let exact = StiffLinear::exact(point.time);
        assert_relative_eq!(point.states[0], exact[0], epsilon = 1e-4);
        assert_relative_eq!(point.states[1], exact[1], epsilon = 1e-4);
    }
}

#[test]
fn bdf_with_a_tiny_step_budget_fails_to_converge() {
    let ode = stiff_bdf().with(bdf::MAXIMUM_NUMBER_OF_STEPS, 1_i64);
    let simulation = Simulation::new(shared(StiffLinear), config(10.0, 1.0, ode)).unwrap();

    simulation.run().unwrap();
    assert_eq!(simulation.wait(), State::Failed);

    assert!(matches!(
        simulation.error(),
        Some(SolverError::ConvergenceFailure {
            reason: Convergence::TooMuchWork { max_steps: 1, .. },
            ..
        })
    ));
    // Only the starting point was recorded.
    assert_eq!(simulation.results().len(), 1);
}

#[test]
fn constrained_model_stays_on_its_constraint() {
    let ode = SolverConfig::new(registry::FOURTH_ORDER_RUNGE_KUTTA).with(fixed_step::STEP, 0.01);
    let simulation = Simulation::new(shared(Drained), config(1.0, 0.25, ode)).unwrap();

    simulation.run().unwrap();
    assert_eq!(simulation.wait(), State::Finished);

    let results = simulation.results();
    let first = results.points()[0].clone();
    assert_relative_eq!(first.computed[0], 1.0, epsilon = 1e-9);
    assert_relative_eq!(first.rates[0], -1.0, epsilon = 1e-9);

    // With z(0) = 1 the exact solution satisfies 1.5 z^2 + ln z = 1.5 - t.
    let last = results.last().unwrap();
    let (y, z) = (last.states[0], last.computed[0]);
    assert_relative_eq!(z * z * z + z, y, epsilon = 1e-8);
    assert_relative_eq!(1.5 * z * z + z.ln(), 0.5, epsilon = 1e-6);
}

#[test]
fn constraint_holds_between_runs() {
    let ode = SolverConfig::new(registry::FOURTH_ORDER_RUNGE_KUTTA).with(fixed_step::STEP, 0.01);
    let simulation = Simulation::new(shared(Drained), config(1.0, 0.5, ode)).unwrap();
    let unknown_and_rate = || {
        simulation
            .with_data(|data| (data.computed()[0], data.rates()[0]))
            .unwrap()
    };

    // z^3 + z = 2 has root z = 1.
    let (z, rate) = unknown_and_rate();
    assert_relative_eq!(z, 1.0, epsilon = 1e-9);
    assert_relative_eq!(rate, -1.0, epsilon = 1e-9);

    // z^3 + z = 10 has root z = 2.
    simulation
        .with_data(|data| data.set_state(0, 10.0))
        .unwrap()
        .unwrap();
    let (z, rate) = unknown_and_rate();
    assert_relative_eq!(z, 2.0, epsilon = 1e-9);
    assert_relative_eq!(rate, -2.0, epsilon = 1e-9);

    simulation.run().unwrap();
    assert_eq!(simulation.wait(), State::Finished);
    simulation.reset().unwrap();

    let (z, rate) = unknown_and_rate();
    assert_relative_eq!(z, 1.0, epsilon = 1e-9);
    assert_relative_eq!(rate, -1.0, epsilon = 1e-9);
}

#[test]
fn constraint_that_cannot_be_solved_fails_the_run() {
    let ode = SolverConfig::new(registry::FORWARD_EULER).with(fixed_step::STEP, 0.25);
    let nla = SolverConfig::new(registry::NEWTON)
        .with(newton::MAXIMUM_NUMBER_OF_ITERATIONS, 1_i64)
        .with(newton::TOLERANCE, 1e-12);
    let simulation = Simulation::new(
        shared(Drained),
        SimulationConfig {
            nla: Some(nla),
            ..config(1.0, 0.25, ode)
        },
    )
    .unwrap();

    simulation.run().unwrap();
    assert_eq!(simulation.wait(), State::Failed);

    // The start point is already solved; one iteration cannot follow the first step.
    match simulation.error() {
        Some(SolverError::ConvergenceFailure {
            time,
            reason: Convergence::MaxIterations { iters: 1, .. },
        }) => assert_relative_eq!(time, 0.25),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(simulation.results().len(), 1);
}

#[test]
fn model_without_states_only_advances_time() {
    let ode = SolverConfig::new(registry::BDF);
    let simulation = Simulation::new(shared(Clock), config(2.0, 0.5, ode)).unwrap();

    simulation.run().unwrap();
    assert_eq!(simulation.wait(), State::Finished);

    let results = simulation.results();
    assert_eq!(results.times().collect::<Vec<_>>(), [0.0, 0.5, 1.0, 1.5, 2.0]);
    assert_eq!(
        results.series(Variable::Computed(0)).collect::<Vec<_>>(),
        [0.0, 0.25, 1.0, 2.25, 4.0]
    );
}
