use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, PoisonError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use cellsim_core::{Fault, SolverError};
use cellsim_solvers::Solver;

use crate::{
    Event, Progress, SimulationData, SimulationSettings, State, simulation::Shared,
};

/// Starts the stepping loop for one run.
///
/// The worker takes the simulation data out of the shared control block when
/// it starts and puts it back when the run ends.
pub(crate) fn spawn(
    shared: Arc<Shared>,
    solver: Solver,
    settings: SimulationSettings,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("cellsim-worker".into())
        .spawn(move || run(&shared, solver, &settings))
}

/// Wall-clock time spent running, excluding pauses.
struct Clock {
    started: Instant,
    paused: Duration,
}

impl Clock {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            paused: Duration::ZERO,
        }
    }

    fn exclude(&mut self, paused: Duration) {
        self.paused += paused;
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed().saturating_sub(self.paused)
    }
}

fn run(shared: &Shared, solver: Solver, settings: &SimulationSettings) {
    let data = shared.lock_control().data.take();
    let Some(mut data) = data else {
        log::error!("simulation worker started without data");
        shared.lock_control().state = State::Idle;
        shared.signal.notify_all();
        return;
    };

    let mut clock = Clock::start();
    shared.publish(&Event::Started {
        time: settings.start,
    });
    log::info!(
        "simulation started: t = {} to {} every {} with {}",
        settings.start,
        settings.end,
        settings.point_interval,
        solver.name(),
    );

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        drive(shared, &mut data, solver, settings, &mut clock)
    }))
    .unwrap_or_else(|payload| {
        Err(SolverError::InvalidState {
            time: data.time(),
            fault: Fault::Panicked(panic_message(&*payload)),
        })
    });
    data.finish();

    let elapsed = clock.elapsed();
    let time = data.time();
    let (state, error) = match outcome {
        Ok(state) => (state, None),
        Err(error) => {
            log::warn!("simulation failed: {error}");
            (State::Failed, Some(error))
        }
    };
    let event = match (&error, state) {
        (Some(error), _) => Event::Failed {
            time,
            elapsed,
            error: error.clone(),
        },
        (None, State::Stopped) => Event::Stopped { time, elapsed },
        (None, _) => Event::Finished { time, elapsed },
    };
    log::info!("simulation {state} at t = {time} after {elapsed:?}");

    let mut control = shared.lock_control();
    control.data = Some(data);
    control.state = state;
    control.error = error;
    control.elapsed = elapsed;
    control.time = time;
    control.pause_requested = false;
    control.stop_requested = false;
    shared.publish(&event);
    shared.signal.notify_all();
}

/// Steps through every output point, recording each one.
///
/// Returns the state the run ended in.
fn drive(
    shared: &Shared,
    data: &mut SimulationData,
    solver: Solver,
    settings: &SimulationSettings,
    clock: &mut Clock,
) -> Result<State, SolverError> {
    data.start(settings.start, solver)?;
    record(shared, data, settings, 0);

    for index in 1..=settings.intervals() {
        if !settings.delay.is_zero() {
            thread::sleep(settings.delay);
        }
        if !checkpoint(shared, data.time(), clock) {
            return Ok(State::Stopped);
        }

        data.advance(settings.output_time(index))?;
        data.refresh()?;
        record(shared, data, settings, index);
    }

    Ok(State::Finished)
}

/// Honours pending pause and stop requests.
///
/// Blocks while paused. Returns `false` if the run should stop.
fn checkpoint(shared: &Shared, time: f64, clock: &mut Clock) -> bool {
    let mut control = shared.lock_control();
    control.time = time;

    if control.pause_requested && !control.stop_requested {
        control.pause_requested = false;
        control.state = State::Paused;
        shared.publish(&Event::Paused { time });
        log::debug!("simulation paused at t = {time}");

        let paused_at = Instant::now();
        while control.state == State::Paused && !control.stop_requested {
            control = shared
                .signal
                .wait(control)
                .unwrap_or_else(PoisonError::into_inner);
        }
        clock.exclude(paused_at.elapsed());
    }

    !control.stop_requested
}

fn record(shared: &Shared, data: &SimulationData, settings: &SimulationSettings, index: usize) {
    let point = data.point();
    let progress = Progress {
        index,
        time: point.time,
        fraction: settings.fraction(point.time),
        states: Arc::from(&*point.states),
        computed: Arc::from(&*point.computed),
    };

    shared.write_results().push(point);
    shared.publish(&Event::Progress(progress));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
