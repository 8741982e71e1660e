use std::error::Error as StdError;

/// Error type returned by model callbacks.
pub type ModelError = Box<dyn StdError + Send + Sync>;

/// Lengths of the vectors a model works on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sizes {
    /// Number of state variables (and rates).
    pub states: usize,
    /// Number of constants.
    pub constants: usize,
    /// Number of computed (algebraic) variables.
    pub computed: usize,
}

impl Sizes {
    /// Creates a new set of sizes.
    #[must_use]
    pub const fn new(states: usize, constants: usize, computed: usize) -> Self {
        Self {
            states,
            constants,
            computed,
        }
    }
}

/// The contract a compiled model fulfils.
///
/// A model owns no numeric buffers. Every callback receives the vectors it
/// reads and writes, so the same model can back several simulations and be
/// evaluated from a worker thread.
///
/// All slices passed to a callback have the lengths reported by [`sizes`].
///
/// [`sizes`]: Model::sizes
pub trait Model: Send + Sync {
    /// Returns the lengths of the state, constant and computed vectors.
    fn sizes(&self) -> Sizes;

    /// Writes initial values into the state, constant and computed vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot produce initial values.
    fn initialize(
        &self,
        states: &mut [f64],
        constants: &mut [f64],
        computed: &mut [f64],
    ) -> Result<(), ModelError>;

    /// Computes the rates of the states at `time`.
    ///
    /// Computed variables needed by the rates may be updated along the way.
    ///
    /// # Errors
    ///
    /// Returns an error if the rates cannot be evaluated.
    fn compute_rates(
        &self,
        time: f64,
        states: &[f64],
        rates: &mut [f64],
        constants: &[f64],
        computed: &mut [f64],
    ) -> Result<(), ModelError>;

    /// Updates the computed variables that are not needed by the rates.
    ///
    /// Called once per recorded output point. The default does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the variables cannot be evaluated.
    fn compute_essential_variables(
        &self,
        _time: f64,
        _states: &[f64],
        _rates: &[f64],
        _constants: &[f64],
        _computed: &mut [f64],
    ) -> Result<(), ModelError> {
        Ok(())
    }

    /// Indices into the computed vector that are unknowns of an algebraic
    /// system.
    ///
    /// A non-empty slice turns the model into a DAE: before every rate
    /// evaluation the unknowns are solved so that
    /// [`compute_root_finding`](Model::compute_root_finding) returns zero
    /// residuals.
    fn algebraic_unknowns(&self) -> &[usize] {
        &[]
    }

    /// Writes one residual per algebraic unknown.
    ///
    /// The current guesses are already stored at their indices in `computed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the residuals cannot be evaluated.
    fn compute_root_finding(
        &self,
        _time: f64,
        _states: &[f64],
        _constants: &[f64],
        _computed: &mut [f64],
        _residuals: &mut [f64],
    ) -> Result<(), ModelError> {
        Ok(())
    }
}
