use cellsim_core::{
    ConfigError, Limit, PropertyKind, PropertySpec, PropertyValue, ResolvedProperties,
};

pub const MAXIMUM_STEP: &str = "MaximumStep";
pub const MAXIMUM_NUMBER_OF_STEPS: &str = "MaximumNumberOfSteps";
pub const RELATIVE_TOLERANCE: &str = "RelativeTolerance";
pub const ABSOLUTE_TOLERANCE: &str = "AbsoluteTolerance";
pub const INTERPOLATE_SOLUTION: &str = "InterpolateSolution";

pub(crate) static PROPERTIES: [PropertySpec; 5] = [
    PropertySpec {
        id: MAXIMUM_STEP,
        kind: PropertyKind::Double(Limit::NonNegative),
        default: PropertyValue::Double(0.0),
        has_time_unit: true,
    },
    PropertySpec {
        id: MAXIMUM_NUMBER_OF_STEPS,
        kind: PropertyKind::Integer(Limit::Positive),
        default: PropertyValue::Integer(500),
        has_time_unit: false,
    },
    PropertySpec {
        id: RELATIVE_TOLERANCE,
        kind: PropertyKind::Double(Limit::NonNegative),
        default: PropertyValue::Double(1e-7),
        has_time_unit: false,
    },
    PropertySpec {
        id: ABSOLUTE_TOLERANCE,
        kind: PropertyKind::Double(Limit::Positive),
        default: PropertyValue::Double(1e-7),
        has_time_unit: false,
    },
    PropertySpec {
        id: INTERPOLATE_SOLUTION,
        kind: PropertyKind::Boolean,
        default: PropertyValue::Boolean(true),
        has_time_unit: false,
    },
];

/// Smallest relative tolerance the error control can honour.
const MIN_RELATIVE_TOLERANCE: f64 = 100.0 * f64::EPSILON;

/// Configuration for the BDF solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    max_step: f64,
    max_steps: usize,
    rel_tol: f64,
    abs_tol: f64,
    interpolate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_step: f64::INFINITY,
            max_steps: 500,
            rel_tol: 1e-7,
            abs_tol: 1e-7,
            interpolate: true,
        }
    }
}

impl Config {
    /// Creates a config with validated tolerances.
    ///
    /// A `max_step` of zero leaves the step size unbounded. A relative
    /// tolerance below `100 * f64::EPSILON` is raised to that value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] if `max_step` or `rel_tol` is
    /// negative, `abs_tol` is not positive, `max_steps` is zero, or any value
    /// is not finite.
    pub fn new(
        max_step: f64,
        max_steps: usize,
        rel_tol: f64,
        abs_tol: f64,
        interpolate: bool,
    ) -> Result<Self, ConfigError> {
        let out_of_range = |property: &str, value: f64, limit: Limit| ConfigError::OutOfRange {
            property: property.to_string(),
            value,
            limit,
        };

        if !Limit::NonNegative.admits(max_step) {
            return Err(out_of_range(MAXIMUM_STEP, max_step, Limit::NonNegative));
        }
        if max_steps == 0 {
            return Err(out_of_range(MAXIMUM_NUMBER_OF_STEPS, 0.0, Limit::Positive));
        }
        if !Limit::NonNegative.admits(rel_tol) {
            return Err(out_of_range(RELATIVE_TOLERANCE, rel_tol, Limit::NonNegative));
        }
        if !Limit::Positive.admits(abs_tol) {
            return Err(out_of_range(ABSOLUTE_TOLERANCE, abs_tol, Limit::Positive));
        }

        Ok(Self {
            max_step: if max_step == 0.0 { f64::INFINITY } else { max_step },
            max_steps,
            rel_tol: rel_tol.max(MIN_RELATIVE_TOLERANCE),
            abs_tol,
            interpolate,
        })
    }

    /// Builds a config from resolved `BDF` properties.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a property is missing or out of range.
    pub fn from_properties(properties: &ResolvedProperties) -> Result<Self, ConfigError> {
        let steps = properties.integer(MAXIMUM_NUMBER_OF_STEPS)?;
        #[allow(clippy::cast_precision_loss)]
        let max_steps = usize::try_from(steps).map_err(|_| ConfigError::OutOfRange {
            property: MAXIMUM_NUMBER_OF_STEPS.to_string(),
            value: steps as f64,
            limit: Limit::Positive,
        })?;

        Self::new(
            properties.double(MAXIMUM_STEP)?,
            max_steps,
            properties.double(RELATIVE_TOLERANCE)?,
            properties.double(ABSOLUTE_TOLERANCE)?,
            properties.boolean(INTERPOLATE_SOLUTION)?,
        )
    }

    /// Returns the largest step the solver may take.
    #[must_use]
    pub fn max_step(&self) -> f64 {
        self.max_step
    }

    /// Returns the maximum number of internal steps per call to `solve`.
    #[must_use]
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    #[must_use]
    pub fn rel_tol(&self) -> f64 {
        self.rel_tol
    }

    #[must_use]
    pub fn abs_tol(&self) -> f64 {
        self.abs_tol
    }

    /// Returns whether the solver may step past a target and interpolate back.
    #[must_use]
    pub fn interpolate(&self) -> bool {
        self.interpolate
    }
}
