use std::{sync::Arc, time::Duration};

use cellsim_core::SolverError;

/// A notification published by a running simulation.
///
/// Every run publishes `Started`, then one `Progress` per recorded point, and
/// ends with exactly one terminal event (`Stopped`, `Finished` or `Failed`).
#[derive(Debug, Clone)]
pub enum Event {
    Started {
        time: f64,
    },
    Progress(Progress),
    Paused {
        time: f64,
    },
    Resumed {
        time: f64,
    },
    Stopped {
        time: f64,
        elapsed: Duration,
    },
    Finished {
        time: f64,
        elapsed: Duration,
    },
    Failed {
        time: f64,
        elapsed: Duration,
        error: SolverError,
    },
}

impl Event {
    /// Returns `true` for the last event of a run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Stopped { .. } | Self::Finished { .. } | Self::Failed { .. }
        )
    }
}

/// A recorded output point, as seen by subscribers.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Position of the point in the results buffer.
    pub index: usize,
    pub time: f64,
    /// Fraction of the run completed, in `[0, 1]`.
    pub fraction: f64,
    pub states: Arc<[f64]>,
    pub computed: Arc<[f64]>,
}
