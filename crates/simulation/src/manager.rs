use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use cellsim_core::{Model, ModelError};

use crate::{Error, Simulation, SimulationConfig};

/// Identifies an opened model, typically by its file name or URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ModelId(String);

impl ModelId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provides the compiled model behind a [`ModelId`].
///
/// Closures of the form `Fn(&ModelId) -> Result<Arc<dyn Model>, ModelError>`
/// implement this trait with the default configuration.
pub trait ModelSource: Send + Sync {
    /// Loads and compiles the model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    fn load(&self, id: &ModelId) -> Result<Arc<dyn Model>, ModelError>;

    /// Returns the configuration a new simulation of the model starts with.
    fn config(&self, _id: &ModelId) -> SimulationConfig {
        SimulationConfig::default()
    }
}

impl<F> ModelSource for F
where
    F: Fn(&ModelId) -> Result<Arc<dyn Model>, ModelError> + Send + Sync,
{
    fn load(&self, id: &ModelId) -> Result<Arc<dyn Model>, ModelError> {
        self(id)
    }
}

/// Keeps at most one [`Simulation`] per opened model.
///
/// Calls are serialized by an internal lock, so the manager can be shared by
/// reference across threads.
pub struct SimulationManager {
    source: Box<dyn ModelSource>,
    simulations: Mutex<HashMap<ModelId, Simulation>>,
}

impl SimulationManager {
    pub fn new(source: impl ModelSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            simulations: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the simulation of `id`, creating it on first use.
    ///
    /// Repeated calls return handles to the same simulation.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or initialized.
    pub fn acquire(&self, id: impl Into<ModelId>) -> Result<Simulation, Error> {
        let id = id.into();
        let mut simulations = self.lock();
        if let Some(simulation) = simulations.get(&id) {
            return Ok(simulation.clone());
        }

        let model = self.source.load(&id).map_err(Error::Model)?;
        let simulation = Simulation::new(model, self.source.config(&id))?;
        log::debug!("created simulation for `{id}`");
        simulations.insert(id, simulation.clone());
        Ok(simulation)
    }

    /// Returns the simulation of `id` without creating one.
    #[must_use]
    pub fn get(&self, id: &ModelId) -> Option<Simulation> {
        self.lock().get(id).cloned()
    }

    /// Forgets the simulation of `id`.
    ///
    /// Handles that are still held elsewhere keep their results but can no
    /// longer start a run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] while its run is active (stop it
    /// first), or [`Error::NotManaged`] if there is no such simulation.
    pub fn release(&self, id: &ModelId) -> Result<(), Error> {
        let mut simulations = self.lock();
        simulations
            .get(id)
            .ok_or_else(|| Error::NotManaged(id.clone()))?
            .release()?;
        simulations.remove(id);
        log::debug!("released simulation for `{id}`");
        Ok(())
    }

    /// Moves the simulation of `from` to `to`, as when a model file is renamed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotManaged`] if `from` has no simulation, or
    /// [`Error::AlreadyManaged`] if `to` already has one.
    pub fn rename(&self, from: &ModelId, to: impl Into<ModelId>) -> Result<(), Error> {
        let to = to.into();
        let mut simulations = self.lock();
        if simulations.contains_key(&to) {
            return Err(Error::AlreadyManaged(to));
        }
        let simulation = simulations
            .remove(from)
            .ok_or_else(|| Error::NotManaged(from.clone()))?;
        simulations.insert(to, simulation);
        Ok(())
    }

    /// Returns the managed model ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<ModelId> {
        let mut ids: Vec<ModelId> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn contains(&self, id: &ModelId) -> bool {
        self.lock().contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stops every active simulation, waits for the workers and forgets all
    /// simulations.
    pub fn shutdown(&self) {
        let simulations: Vec<Simulation> = self
            .lock()
            .drain()
            .map(|(_, simulation)| simulation)
            .collect();

        for simulation in &simulations {
            // Only fails if the run ended in the meantime.
            let _ = simulation.stop();
        }
        for simulation in &simulations {
            simulation.wait();
        }
        log::debug!("shut down {} simulations", simulations.len());
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ModelId, Simulation>> {
        self.simulations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SimulationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationManager")
            .field("ids", &self.ids())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use cellsim_core::SolverConfig;
    use cellsim_solvers::registry;

    use crate::{
        Operation, SimulationSettings, State,
        test_utils::{Decay, shared},
    };

    // --- Test fixtures ---

    fn load(id: &ModelId) -> Result<Arc<dyn Model>, ModelError> {
        match id.as_str() {
            "missing.cellml" => Err("no such file".into()),
            _ => Ok(shared(Decay)),
        }
    }

    /// Slow runs so that a simulation stays active long enough to observe.
    struct SlowSource;

    impl ModelSource for SlowSource {
        fn load(&self, id: &ModelId) -> Result<Arc<dyn Model>, ModelError> {
            load(id)
        }

        fn config(&self, _id: &ModelId) -> SimulationConfig {
            let settings = SimulationSettings::new(0.0, 1.0, 0.01)
                .unwrap()
                .with_delay(Duration::from_millis(2));
            SimulationConfig {
                ode: SolverConfig::new(registry::FOURTH_ORDER_RUNGE_KUTTA).with("Step", 0.01),
                ..SimulationConfig::new(settings)
            }
        }
    }

    #[test]
    fn acquire_returns_the_same_simulation() {
        let manager = SimulationManager::new(load);

        let first = manager.acquire("a.cellml").unwrap();
        let second = manager.acquire("a.cellml").unwrap();
        let other = manager.acquire("b.cellml").unwrap();

        assert!(first.ptr_eq(&second));
        assert!(!first.ptr_eq(&other));
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.ids(), [ModelId::from("a.cellml"), ModelId::from("b.cellml")]);
        assert!(manager.get(&"a.cellml".into()).unwrap().ptr_eq(&first));
    }

    #[test]
    fn load_failures_are_not_registered() {
        let manager = SimulationManager::new(load);

        assert!(matches!(
            manager.acquire("missing.cellml"),
            Err(Error::Model(_))
        ));
        assert!(manager.is_empty());
    }

    #[test]
    fn release_requires_an_inactive_simulation() {
        let manager = SimulationManager::new(SlowSource);
        let id = ModelId::from("a.cellml");
        let simulation = manager.acquire(id.clone()).unwrap();

        simulation.run().unwrap();
        assert!(matches!(
            manager.release(&id),
            Err(Error::InvalidOperation {
                operation: Operation::Release,
                state: State::Running,
            })
        ));
        assert!(manager.contains(&id));

        simulation.stop().unwrap();
        simulation.wait();
        manager.release(&id).unwrap();
        assert!(!manager.contains(&id));
        assert!(matches!(manager.release(&id), Err(Error::NotManaged(_))));

        let fresh = manager.acquire(id).unwrap();
        assert!(!fresh.ptr_eq(&simulation));
        assert_eq!(fresh.state(), State::Idle);
    }

    #[test]
    fn released_handles_cannot_run_again() {
        let manager = SimulationManager::new(load);
        let id = ModelId::from("a.cellml");
        let simulation = manager.acquire(id.clone()).unwrap();
        let other_handle = simulation.clone();

        manager.release(&id).unwrap();
        assert!(matches!(other_handle.run(), Err(Error::Released)));
        assert_eq!(simulation.state(), State::Idle);

        let fresh = manager.acquire(id).unwrap();
        assert!(!fresh.ptr_eq(&simulation));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn rename_moves_the_simulation() {
        let manager = SimulationManager::new(load);
        let simulation = manager.acquire("old.cellml").unwrap();
        manager.acquire("taken.cellml").unwrap();

        manager.rename(&"old.cellml".into(), "new.cellml").unwrap();
        assert!(manager.get(&"new.cellml".into()).unwrap().ptr_eq(&simulation));
        assert!(!manager.contains(&"old.cellml".into()));

        assert!(matches!(
            manager.rename(&"new.cellml".into(), "taken.cellml"),
            Err(Error::AlreadyManaged(_))
        ));
        assert!(matches!(
            manager.rename(&"old.cellml".into(), "other.cellml"),
            Err(Error::NotManaged(_))
        ));
    }

    #[test]
    fn shutdown_stops_active_runs() {
        let manager = SimulationManager::new(SlowSource);
        let running = manager.acquire("a.cellml").unwrap();
        let idle = manager.acquire("b.cellml").unwrap();

        running.run().unwrap();
        manager.shutdown();

        assert!(manager.is_empty());
        assert_eq!(running.state(), State::Stopped);
        assert_eq!(idle.state(), State::Idle);
    }
}
