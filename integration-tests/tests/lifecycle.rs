use std::{
    sync::{Arc, mpsc::Receiver},
    thread,
    time::Duration,
};

use cellsim_core::{ConfigError, Model, ModelError, SolverConfig};
use cellsim_simulation::{
    Error, Event, ModelId, Operation, Simulation, SimulationConfig, SimulationManager,
    SimulationSettings, State,
};
use cellsim_solvers::{ode::fixed_step, registry};
use integration_tests::models::{Decay, shared};

const TIMEOUT: Duration = Duration::from_secs(10);

// --- Test fixtures ---

fn slow_config(step: f64) -> SimulationConfig {
    let settings = SimulationSettings::new(0.0, 1.0, 0.01)
        .unwrap()
        .with_delay(Duration::from_millis(2));
    SimulationConfig {
        ode: SolverConfig::new(registry::HEUN).with(fixed_step::STEP, step),
        ..SimulationConfig::new(settings)
    }
}

fn next_progress(events: &Receiver<Event>, at_least: usize) {
    loop {
        match events.recv_timeout(TIMEOUT) {
            Ok(Event::Progress(progress)) if progress.index >= at_least => return,
            Ok(_) => {}
            Err(error) => panic!("no progress received: {error}"),
        }
    }
}

fn load(_id: &ModelId) -> Result<Arc<dyn Model>, ModelError> {
    Ok(shared(Decay))
}

#[test]
fn reset_while_running_is_rejected() {
    let simulation = Simulation::new(shared(Decay), slow_config(0.01)).unwrap();

    simulation.run().unwrap();
    assert!(matches!(
        simulation.reset(),
        Err(Error::InvalidOperation {
            operation: Operation::Reset,
            state: State::Running,
        })
    ));
    assert_eq!(simulation.state(), State::Running);

    simulation.stop().unwrap();
    simulation.wait();
}

#[test]
fn stop_retains_recorded_points() {
    let simulation = Simulation::new(shared(Decay), slow_config(0.01)).unwrap();
    let events = simulation.subscribe();

    simulation.run().unwrap();
    next_progress(&events, 5);
    let before = simulation.results().len();
    simulation.stop().unwrap();

    assert_eq!(simulation.wait(), State::Stopped);
    let after = simulation.results().len();
    assert!(after >= before);
    assert!(after < 101);

    let terminal: Vec<Event> = events.try_iter().filter(Event::is_terminal).collect();
    assert_eq!(terminal.len(), 1);
    assert!(matches!(terminal[0], Event::Stopped { .. }));
}

#[test]
fn negative_step_is_a_configuration_error() {
    let simulation = Simulation::new(shared(Decay), slow_config(-0.01)).unwrap();
    let events = simulation.subscribe();

    let error = simulation.run().unwrap_err();
    assert!(matches!(
        error,
        Error::Configuration(ConfigError::OutOfRange { .. })
    ));
    assert_eq!(simulation.state(), State::Idle);
    assert!(simulation.results().is_empty());
    assert!(!simulation.with_data(|data| data.is_modified()).unwrap());

    // No worker was started, so nothing is ever published.
    thread::sleep(Duration::from_millis(20));
    assert!(events.try_recv().is_err());
}

#[test]
fn rerun_after_reset_reproduces_the_results() {
    let simulation = Simulation::new(shared(Decay), slow_config(0.01)).unwrap();

    simulation.run().unwrap();
    assert_eq!(simulation.wait(), State::Finished);
    let first = simulation.points_since(0);

    simulation.reset().unwrap();
    simulation.run().unwrap();
    assert_eq!(simulation.wait(), State::Finished);

    assert_eq!(simulation.points_since(0), first);
}

#[test]
fn manager_keeps_one_simulation_per_model() {
    let manager = SimulationManager::new(load);

    let first = manager.acquire("decay.cellml").unwrap();
    let second = manager.acquire("decay.cellml").unwrap();
    assert!(first.ptr_eq(&second));

    first.configure(slow_config(0.01)).unwrap();
    second.run().unwrap();
    assert!(matches!(
        manager.release(&"decay.cellml".into()),
        Err(Error::InvalidOperation {
            operation: Operation::Release,
            state: State::Running | State::Paused,
        })
    ));

    manager.shutdown();
    assert!(manager.is_empty());
    assert_eq!(first.state(), State::Stopped);
}

#[test]
fn release_and_run_race_has_one_winner() {
    for _ in 0..20 {
        let manager = SimulationManager::new(load);
        let id = ModelId::from("race.cellml");
        let simulation = manager.acquire(id.clone()).unwrap();
        simulation.configure(slow_config(0.01)).unwrap();

        let (released, ran) = thread::scope(|scope| {
            let runner = scope.spawn(|| simulation.run());
            let released = manager.release(&id);
            (released, runner.join().unwrap())
        });

        match (&released, &ran) {
            (Ok(()), Err(Error::Released)) => assert!(!manager.contains(&id)),
            (Err(Error::InvalidOperation { .. }), Ok(())) => {
                assert!(manager.contains(&id));
                assert!(manager.get(&id).unwrap().ptr_eq(&simulation));
            }
            other => panic!("release and run both took effect: {other:?}"),
        }

        let _ = simulation.stop();
        simulation.wait();
    }
}

#[test]
fn manager_is_shared_across_threads() {
    let manager = SimulationManager::new(load);

    let simulations: Vec<Simulation> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| manager.acquire("shared.cellml").unwrap()))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert_eq!(manager.len(), 1);
    assert!(simulations.windows(2).all(|pair| pair[0].ptr_eq(&pair[1])));
}
