/// Emitted after each accepted Newton iteration.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    /// Iteration number, starting at 1.
    pub iter: usize,

    /// The new iterate.
    pub x: &'a [f64],

    /// Max-norm of the residuals at `x`.
    pub residual_norm: f64,

    /// Fraction of the full Newton step that was taken.
    pub damping: f64,
}
