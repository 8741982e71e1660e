//! Models shared by the solver tests.

use cellsim_core::{Model, ModelError, Sizes};

/// `dy/dt = -k y` with `k` stored as constant 0.
pub(crate) struct Decay;

impl Model for Decay {
    fn sizes(&self) -> Sizes {
        Sizes::new(1, 1, 0)
    }

    fn initialize(
        &self,
        states: &mut [f64],
        constants: &mut [f64],
        _: &mut [f64],
    ) -> Result<(), ModelError> {
        states[0] = 1.0;
        constants[0] = 1.0;
        Ok(())
    }

    fn compute_rates(
        &self,
        _time: f64,
        states: &[f64],
        rates: &mut [f64],
        constants: &[f64],
        _computed: &mut [f64],
    ) -> Result<(), ModelError> {
        rates[0] = -constants[0] * states[0];
        Ok(())
    }
}

/// A stiff pair: `y0` relaxes onto `cos t` with rate 1000, `y1` decays slowly.
///
/// With `y0(0) = 1` the exact solution is `y0 = cos t`, `y1 = exp(-t)`.
pub(crate) struct Stiff;

impl Model for Stiff {
    fn sizes(&self) -> Sizes {
        Sizes::new(2, 0, 0)
    }

    fn initialize(
        &self,
        states: &mut [f64],
        _: &mut [f64],
        _: &mut [f64],
    ) -> Result<(), ModelError> {
        states[0] = 1.0;
        states[1] = 1.0;
        Ok(())
    }

    fn compute_rates(
        &self,
        time: f64,
        states: &[f64],
        rates: &mut [f64],
        _constants: &[f64],
        _computed: &mut [f64],
    ) -> Result<(), ModelError> {
        rates[0] = -1000.0 * (states[0] - time.cos()) - time.sin();
        rates[1] = -states[1];
        Ok(())
    }
}

/// `dy/dt = -z` where the computed variable `z` solves `z^3 + z - y = 0`.
pub(crate) struct CubicConstraint;

impl Model for CubicConstraint {
    fn sizes(&self) -> Sizes {
        Sizes::new(1, 0, 1)
    }

    fn initialize(
        &self,
        states: &mut [f64],
        _: &mut [f64],
        computed: &mut [f64],
    ) -> Result<(), ModelError> {
        states[0] = 2.0;
        computed[0] = 0.0;
        Ok(())
    }

    fn compute_rates(
        &self,
        _time: f64,
        _states: &[f64],
        rates: &mut [f64],
        _constants: &[f64],
        computed: &mut [f64],
    ) -> Result<(), ModelError> {
        rates[0] = -computed[0];
        Ok(())
    }

    fn algebraic_unknowns(&self) -> &[usize] {
        &[0]
    }

    fn compute_root_finding(
        &self,
        _time: f64,
        states: &[f64],
        _constants: &[f64],
        computed: &mut [f64],
        residuals: &mut [f64],
    ) -> Result<(), ModelError> {
        let z = computed[0];
        residuals[0] = z * z * z + z - states[0];
        Ok(())
    }
}

/// Returns an error once time passes 0.5.
pub(crate) struct Breaks;

impl Model for Breaks {
    fn sizes(&self) -> Sizes {
        Sizes::new(1, 0, 0)
    }

    fn initialize(
        &self,
        states: &mut [f64],
        _: &mut [f64],
        _: &mut [f64],
    ) -> Result<(), ModelError> {
        states[0] = 0.0;
        Ok(())
    }

    fn compute_rates(
        &self,
        time: f64,
        _states: &[f64],
        rates: &mut [f64],
        _constants: &[f64],
        _computed: &mut [f64],
    ) -> Result<(), ModelError> {
        if time > 0.5 {
            return Err("rate table exhausted".into());
        }
        rates[0] = 1.0;
        Ok(())
    }
}

/// Initialised buffers for `model`.
pub(crate) struct Buffers {
    pub states: Vec<f64>,
    pub constants: Vec<f64>,
    pub computed: Vec<f64>,
}

impl Buffers {
    pub(crate) fn new(model: &dyn Model) -> Self {
        let sizes = model.sizes();
        let mut buffers = Self {
            states: vec![0.0; sizes.states],
            constants: vec![0.0; sizes.constants],
            computed: vec![0.0; sizes.computed],
        };
        model
            .initialize(&mut buffers.states, &mut buffers.constants, &mut buffers.computed)
            .expect("test model should initialize");
        buffers
    }
}
