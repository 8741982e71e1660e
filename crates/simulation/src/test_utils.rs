use std::sync::Arc;

use cellsim_core::{Model, ModelError, Sizes};

/// Wraps a model for sharing with a simulation.
pub(crate) fn shared(model: impl Model + 'static) -> Arc<dyn Model> {
    Arc::new(model)
}

/// Exponential decay `y' = -k * y` with `y(0) = 1`, `k = 1` and `z = 2 * y`.
pub(crate) struct Decay;

impl Model for Decay {
    fn sizes(&self) -> Sizes {
        Sizes::new(1, 1, 1)
    }

    fn initialize(
        &self,
        states: &mut [f64],
        constants: &mut [f64],
        _computed: &mut [f64],
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

    fn compute_essential_variables(
        &self,
        _time: f64,
        states: &[f64],
        _rates: &[f64],
        _constants: &[f64],
        computed: &mut [f64],
    ) -> Result<(), ModelError> {
        computed[0] = 2.0 * states[0];
        Ok(())
    }
}

/// Grows linearly until `t = 0.5`, then its rate becomes NaN.
pub(crate) struct NanAfterHalf;

impl Model for NanAfterHalf {
    fn sizes(&self) -> Sizes {
        Sizes::new(1, 0, 0)
    }

    fn initialize(
        &self,
        states: &mut [f64],
        _constants: &mut [f64],
        _computed: &mut [f64],
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
        rates[0] = if time < 0.5 { 1.0 } else { f64::NAN };
        Ok(())
    }
}

/// Fails to evaluate after `t = 0.5`.
pub(crate) struct FailsAfterHalf;

impl Model for FailsAfterHalf {
    fn sizes(&self) -> Sizes {
        Sizes::new(1, 0, 0)
    }

    fn initialize(
        &self,
        states: &mut [f64],
        _constants: &mut [f64],
        _computed: &mut [f64],
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
            return Err(format!("no rate defined at t = {time}").into());
        }
        rates[0] = 1.0;
        Ok(())
    }
}

/// Panics when evaluated after `t = 0.5`.
pub(crate) struct PanicsAfterHalf;

impl Model for PanicsAfterHalf {
    fn sizes(&self) -> Sizes {
        Sizes::new(1, 0, 0)
    }

    fn initialize(
        &self,
        states: &mut [f64],
        _constants: &mut [f64],
        _computed: &mut [f64],
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
        assert!(time <= 0.5, "rate evaluated out of range");
        rates[0] = 1.0;
        Ok(())
    }
}
