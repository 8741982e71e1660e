/// Indicates why the solver returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The residual norm fell within tolerance.
    Converged,

    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

/// The result of a Newton solve. The solution itself is left in `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    pub status: Status,

    /// Max-norm of the residuals at the returned `x`.
    pub residual_norm: f64,

    /// Number of Newton iterations taken.
    pub iters: usize,
}
