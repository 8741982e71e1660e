/// Actions an observer can take during a Newton iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop the solver and return the current iterate.
    StopEarly,
}
