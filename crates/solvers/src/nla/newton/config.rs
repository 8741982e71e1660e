use cellsim_core::{
    ConfigError, Limit, PropertyKind, PropertySpec, PropertyValue, ResolvedProperties,
};

pub const MAXIMUM_NUMBER_OF_ITERATIONS: &str = "MaximumNumberOfIterations";
pub const TOLERANCE: &str = "Tolerance";

pub(crate) static PROPERTIES: [PropertySpec; 2] = [
    PropertySpec {
        id: MAXIMUM_NUMBER_OF_ITERATIONS,
        kind: PropertyKind::Integer(Limit::Positive),
        default: PropertyValue::Integer(200),
        has_time_unit: false,
    },
    PropertySpec {
        id: TOLERANCE,
        kind: PropertyKind::Double(Limit::Positive),
        default: PropertyValue::Double(1e-10),
        has_time_unit: false,
    },
];

/// Configuration for the Newton solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    max_iters: usize,
    tolerance: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iters: 200,
            tolerance: 1e-10,
        }
    }
}

impl Config {
    /// Creates a new config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] if `max_iters` is zero or
    /// `tolerance` is not finite and positive.
    pub fn new(max_iters: usize, tolerance: f64) -> Result<Self, ConfigError> {
        if max_iters == 0 {
            return Err(ConfigError::OutOfRange {
                property: MAXIMUM_NUMBER_OF_ITERATIONS.to_string(),
                value: 0.0,
                limit: Limit::Positive,
            });
        }
        if !Limit::Positive.admits(tolerance) {
            return Err(ConfigError::OutOfRange {
                property: TOLERANCE.to_string(),
                value: tolerance,
                limit: Limit::Positive,
            });
        }

        Ok(Self {
            max_iters,
            tolerance,
        })
    }

    /// Builds a config from resolved `Newton` properties.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a property is missing or out of range.
    pub fn from_properties(properties: &ResolvedProperties) -> Result<Self, ConfigError> {
        let iters = properties.integer(MAXIMUM_NUMBER_OF_ITERATIONS)?;
        #[allow(clippy::cast_precision_loss)]
        let max_iters = usize::try_from(iters).map_err(|_| ConfigError::OutOfRange {
            property: MAXIMUM_NUMBER_OF_ITERATIONS.to_string(),
            value: iters as f64,
            limit: Limit::Positive,
        })?;

        Self::new(max_iters, properties.double(TOLERANCE)?)
    }

    /// Returns the maximum number of Newton iterations.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Returns the max-norm residual tolerance.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }
}
