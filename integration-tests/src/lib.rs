//! Models shared by the integration tests.

pub mod models {
    use std::sync::Arc;

    use cellsim_core::{Model, ModelError, Sizes};

    /// Wraps a model for sharing with a simulation.
    pub fn shared(model: impl Model + 'static) -> Arc<dyn Model> {
        Arc::new(model)
    }

    /// Exponential decay `y' = -y` with `y(0) = 1`.
    pub struct Decay;

    impl Model for Decay {
        fn sizes(&self) -> Sizes {
            Sizes::new(1, 0, 0)
        }

        fn initialize(
            &self,
            states: &mut [f64],
            _constants: &mut [f64],
            _computed: &mut [f64],
        ) -> Result<(), ModelError> {
            states[0] = 1.0;
            Ok(())
        }

        fn compute_rates(
            &self,
            _time: f64,
            states: &[f64],
            rates: &mut [f64],
            _constants: &[f64],
            _computed: &mut [f64],
        ) -> Result<(), ModelError> {
            rates[0] = -states[0];
            Ok(())
        }
    }

    /// A stiff linear system with eigenvalues `-1000` and `-1`.
    ///
    /// ```text
    /// y0' = -1000 y0 + 999 y1,  y0(0) = 2
    /// y1' = -y1,                y1(0) = 1
    /// ```
    ///
    /// The solution is `y0 = exp(-t) + exp(-1000 t)` and `y1 = exp(-t)`.
    pub struct StiffLinear;

    impl StiffLinear {
        #[must_use]
        pub fn exact(time: f64) -> [f64; 2] {
            let slow = (-time).exp();
            [slow + (-1000.0 * time).exp(), slow]
        }
    }

    impl Model for StiffLinear {
        fn sizes(&self) -> Sizes {
            Sizes::new(2, 0, 0)
        }

        fn initialize(
            &self,
            states: &mut [f64],
            _constants: &mut [f64],
            _computed: &mut [f64],
        ) -> Result<(), ModelError> {
            states.copy_from_slice(&[2.0, 1.0]);
            Ok(())
        }

        fn compute_rates(
            &self,
            _time: f64,
            states: &[f64],
            rates: &mut [f64],
            _constants: &[f64],
            _computed: &mut [f64],
        ) -> Result<(), ModelError> {
            rates[0] = -1000.0 * states[0] + 999.0 * states[1];
            rates[1] = -states[1];
            Ok(())
        }
    }

    /// A state drained at a rate fixed by an algebraic constraint.
    ///
    /// ```text
    /// y' = -z,  y(0) = 2
    /// z^3 + z - y = 0
    /// ```
    pub struct Drained;

    impl Model for Drained {
        fn sizes(&self) -> Sizes {
            Sizes::new(1, 0, 1)
        }

        fn initialize(
            &self,
            states: &mut [f64],
            _constants: &mut [f64],
            computed: &mut [f64],
        ) -> Result<(), ModelError> {
            states[0] = 2.0;
            computed[0] = 0.5;
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

    /// A model without states whose only variable is `t^2`.
    pub struct Clock;

    impl Model for Clock {
        fn sizes(&self) -> Sizes {
            Sizes::new(0, 0, 1)
        }

        fn initialize(
            &self,
            _states: &mut [f64],
            _constants: &mut [f64],
            _computed: &mut [f64],
        ) -> Result<(), ModelError> {
            Ok(())
        }

        fn compute_rates(
            &self,
            _time: f64,
            _states: &[f64],
            _rates: &mut [f64],
            _constants: &[f64],
            _computed: &mut [f64],
        ) -> Result<(), ModelError> {
            Ok(())
        }

        fn compute_essential_variables(
            &self,
            time: f64,
            _states: &[f64],
            _rates: &[f64],
            _constants: &[f64],
            computed: &mut [f64],
        ) -> Result<(), ModelError> {
            computed[0] = time * time;
            Ok(())
        }
    }
}
