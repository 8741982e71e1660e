use std::{
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        mpsc::{self, Receiver, Sender},
    },
    thread::JoinHandle,
    time::Duration,
};

use cellsim_core::{Model, SolverConfig, SolverError};
use cellsim_solvers::Solver;

use crate::{
    Error, Event, Operation, Point, ResultsBuffer, SimulationConfig, SimulationData,
    SimulationSettings, State, worker,
};

/// A handle to one model's simulation.
///
/// Handles are cheap to clone and all refer to the same simulation. Every
/// operation returns immediately: [`run`](Self::run) hands the stepping loop
/// to a worker thread, and [`pause`](Self::pause) and [`stop`](Self::stop)
/// take effect at the worker's next output point.
#[derive(Clone)]
pub struct Simulation {
    shared: Arc<Shared>,
}

/// State shared between the handles and the worker.
pub(crate) struct Shared {
    pub(crate) model: Arc<dyn Model>,
    pub(crate) control: Mutex<Control>,
    pub(crate) signal: Condvar,
    pub(crate) results: RwLock<ResultsBuffer>,
    subscribers: Mutex<Vec<Sender<Event>>>,
}

pub(crate) struct Control {
    pub(crate) state: State,
    /// Taken by the worker for the length of a run.
    pub(crate) data: Option<SimulationData>,
    pub(crate) config: SimulationConfig,
    pub(crate) pause_requested: bool,
    pub(crate) stop_requested: bool,
    pub(crate) error: Option<SolverError>,
    pub(crate) elapsed: Duration,
    /// Time of the last output point reached.
    pub(crate) time: f64,
    /// Set once a manager lets go of the simulation; no further runs start.
    released: bool,
    worker: Option<JoinHandle<()>>,
}

impl Simulation {
    /// Creates an idle simulation of `model`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be initialized or its algebraic
    /// unknowns cannot be solved. The settings and solver selection are only
    /// checked by [`run`](Self::run).
    pub fn new(model: Arc<dyn Model>, config: SimulationConfig) -> Result<Self, Error> {
        let start = config.settings.start;
        let data = SimulationData::new(Arc::clone(&model), start)?;

        let control = Control {
            state: State::Idle,
            data: Some(data),
            config,
            pause_requested: false,
            stop_requested: false,
            error: None,
            elapsed: Duration::ZERO,
            time: start,
            released: false,
            worker: None,
        };

        Ok(Self {
            shared: Arc::new(Shared {
                model,
                control: Mutex::new(control),
                signal: Condvar::new(),
                results: RwLock::new(ResultsBuffer::default()),
                subscribers: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Returns `true` if both handles refer to the same simulation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    #[must_use]
    pub fn model(&self) -> &Arc<dyn Model> {
        &self.shared.model
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.shared.lock_control().state
    }

    /// Returns the error that ended the last run in [`State::Failed`].
    #[must_use]
    pub fn error(&self) -> Option<SolverError> {
        self.shared.lock_control().error.clone()
    }

    /// Wall-clock time spent stepping in the last run, excluding pauses.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.shared.lock_control().elapsed
    }

    /// Time of the last output point reached.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.shared.lock_control().time
    }

    #[must_use]
    pub fn config(&self) -> SimulationConfig {
        self.shared.lock_control().config.clone()
    }

    #[must_use]
    pub fn settings(&self) -> SimulationSettings {
        self.shared.lock_control().config.settings
    }

    /// Replaces the whole configuration.
    ///
    /// The new values are validated by the next [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] while a run is active.
    pub fn configure(&self, config: SimulationConfig) -> Result<(), Error> {
        self.update_config(|current| *current = config)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] while a run is active.
    pub fn set_settings(&self, settings: SimulationSettings) -> Result<(), Error> {
        self.update_config(|config| config.settings = settings)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] while a run is active.
    pub fn set_ode_solver(&self, ode: SolverConfig) -> Result<(), Error> {
        self.update_config(|config| config.ode = ode)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] while a run is active.
    pub fn set_nla_solver(&self, nla: Option<SolverConfig>) -> Result<(), Error> {
        self.update_config(|config| config.nla = nla)
    }

    fn update_config(&self, update: impl FnOnce(&mut SimulationConfig)) -> Result<(), Error> {
        let mut control = self.shared.lock_control();
        control.require(Operation::Configure, |state| !state.is_active())?;
        update(&mut control.config);
        Ok(())
    }

    /// Gives `f` access to the simulation data between runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] while a run is active.
    pub fn with_data<R>(&self, f: impl FnOnce(&mut SimulationData) -> R) -> Result<R, Error> {
        let mut control = self.shared.lock_control();
        let state = control.state;
        match control.data.as_mut() {
            Some(data) if !state.is_active() => Ok(f(data)),
            _ => Err(Error::InvalidOperation {
                operation: Operation::Configure,
                state,
            }),
        }
    }

    /// Starts a run on a worker thread.
    ///
    /// The settings and solver selection are validated first. If either is
    /// invalid, no worker is started and the simulation stays idle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] unless the simulation is idle,
    /// [`Error::Released`] once its manager has released it, a configuration
    /// error for invalid settings or solver selections,
    /// [`Error::ResultsAllocation`] if the output points do not fit in
    /// memory, or [`Error::Spawn`] if the worker thread cannot be created.
    pub fn run(&self) -> Result<(), Error> {
        let mut control = self.shared.lock_control();
        control.require(Operation::Run, |state| state == State::Idle)?;
        if control.released {
            return Err(Error::Released);
        }

        let settings = control.config.settings;
        settings.validate()?;
        let solver = Solver::build(
            &control.config.ode,
            control.config.nla.as_ref(),
            self.shared.model.as_ref(),
        )?;

        let points = settings.size();
        let results = ResultsBuffer::try_with_capacity(points)
            .map_err(|source| Error::ResultsAllocation { points, source })?;
        *self.shared.write_results() = results;
        control.state = State::Running;
        control.pause_requested = false;
        control.stop_requested = false;
        control.error = None;
        control.elapsed = Duration::ZERO;
        control.time = settings.start;

        match worker::spawn(Arc::clone(&self.shared), solver, settings) {
            Ok(handle) => {
                control.worker = Some(handle);
                Ok(())
            }
            Err(error) => {
                control.state = State::Idle;
                Err(Error::Spawn(error))
            }
        }
    }

    /// Asks the worker to pause at its next output point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] unless the simulation is running.
    pub fn pause(&self) -> Result<(), Error> {
        let mut control = self.shared.lock_control();
        control.require(Operation::Pause, |state| state == State::Running)?;
        control.pause_requested = true;
        Ok(())
    }

    /// Resumes a paused run, or cancels a pause that has not taken effect yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if there is nothing to resume.
    pub fn resume(&self) -> Result<(), Error> {
        let mut control = self.shared.lock_control();
        match control.state {
            State::Paused => {
                control.state = State::Running;
                self.shared.signal.notify_all();
                self.shared.publish(&Event::Resumed { time: control.time });
                log::debug!("simulation resumed at t = {}", control.time);
                Ok(())
            }
            State::Running if control.pause_requested => {
                control.pause_requested = false;
                Ok(())
            }
            state => Err(Error::InvalidOperation {
                operation: Operation::Resume,
                state,
            }),
        }
    }

    /// Asks the worker to stop at its next output point.
    ///
    /// Points recorded so far are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] unless a run is active.
    pub fn stop(&self) -> Result<(), Error> {
        let mut control = self.shared.lock_control();
        control.require(Operation::Stop, State::is_active)?;
        control.stop_requested = true;
        self.shared.signal.notify_all();
        Ok(())
    }

    /// Clears the results and restores the model's initial values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] unless the last run has ended, or
    /// an error if the model cannot be re-initialized.
    pub fn reset(&self) -> Result<(), Error> {
        let handle = {
            let mut control = self.shared.lock_control();
            control.require(Operation::Reset, State::is_terminal)?;
            control.worker.take()
        };
        join(handle);

        let mut control = self.shared.lock_control();
        control.require(Operation::Reset, State::is_terminal)?;

        let start = control.config.settings.start;
        if let Some(data) = control.data.as_mut() {
            data.reset(start)?;
        }
        self.shared.write_results().clear();
        control.state = State::Idle;
        control.error = None;
        control.elapsed = Duration::ZERO;
        control.time = start;
        Ok(())
    }

    /// Blocks until the current run has ended and its worker has exited.
    ///
    /// Returns the resulting state. Returns immediately if no run is active.
    pub fn wait(&self) -> State {
        let mut control = self.shared.lock_control();
        while control.state.is_active() {
            control = self
                .shared
                .signal
                .wait(control)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let state = control.state;
        let handle = control.worker.take();
        drop(control);

        join(handle);
        state
    }

    /// Marks the simulation as released so that it never runs again.
    ///
    /// The check and the mark happen under one lock, so a concurrent
    /// [`run`](Self::run) either starts first and makes this fail, or is
    /// refused afterwards.
    pub(crate) fn release(&self) -> Result<(), Error> {
        let mut control = self.shared.lock_control();
        control.require(Operation::Release, |state| !state.is_active())?;
        control.released = true;
        Ok(())
    }

    /// Returns a channel that receives every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<Event> {
        let (sender, receiver) = mpsc::channel();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    /// Read access to the recorded points.
    ///
    /// The worker cannot append while the guard is held, so keep it short.
    pub fn results(&self) -> RwLockReadGuard<'_, ResultsBuffer> {
        self.shared
            .results
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the points recorded at or after `index`.
    #[must_use]
    pub fn points_since(&self, index: usize) -> Vec<Point> {
        self.results().since(index).to_vec()
    }
}

impl Shared {
    pub(crate) fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_results(&self) -> RwLockWriteGuard<'_, ResultsBuffer> {
        self.results.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends `event` to every subscriber, dropping those that hung up.
    pub(crate) fn publish(&self, event: &Event) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

impl Control {
    fn require(
        &self,
        operation: Operation,
        allowed: impl FnOnce(State) -> bool,
    ) -> Result<(), Error> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(Error::InvalidOperation {
                operation,
                state: self.state,
            })
        }
    }
}

fn join(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        if handle.join().is_err() {
            log::error!("simulation worker panicked");
        }
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let control = self.shared.lock_control();
        f.debug_struct("Simulation")
            .field("state", &control.state)
            .field("time", &control.time)
            .field("settings", &control.config.settings)
            .finish_non_exhaustive()
    }
}
