use std::time::Duration;

use cellsim_core::SolverConfig;
use cellsim_solvers::registry;
use thiserror::Error;

/// Relative slack when counting whole intervals in a range.
const INTERVAL_SNAP: f64 = 1e-9;

/// When a run starts and ends, and how often it records a point.
///
/// Times are in the model's time unit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationSettings {
    pub start: f64,
    pub end: f64,
    pub point_interval: f64,

    /// Pause between output points, to slow a run down for live display.
    #[cfg_attr(feature = "serde", serde(default))]
    pub delay: Duration,
}

/// Errors in [`SimulationSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SettingsError {
    #[error("the {field} must be finite (got {value})")]
    NonFinite { field: &'static str, value: f64 },

    #[error("the starting and ending points cannot have the same value")]
    EmptyRange,

    #[error("the starting point ({start}) cannot be greater than the ending point ({end})")]
    Reversed { start: f64, end: f64 },

    #[error("the point interval must be greater than zero (got {0})")]
    NonPositiveInterval(f64),
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            start: 0.0,
            end: 1000.0,
            point_interval: 1.0,
            delay: Duration::ZERO,
        }
    }
}

impl SimulationSettings {
    /// Creates validated settings with no delay.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if the settings fail [`validate`](Self::validate).
    pub fn new(start: f64, end: f64, point_interval: f64) -> Result<Self, SettingsError> {
        let settings = Self {
            start,
            end,
            point_interval,
            delay: Duration::ZERO,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Returns the settings with a pause of `delay` between output points.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Checks that the settings describe a non-empty forward run.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if a value is not finite, `start == end`,
    /// `start > end`, or the point interval is not positive.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (field, value) in [
            ("starting point", self.start),
            ("ending point", self.end),
            ("point interval", self.point_interval),
        ] {
            if !value.is_finite() {
                return Err(SettingsError::NonFinite { field, value });
            }
        }

        if self.start == self.end {
            return Err(SettingsError::EmptyRange);
        }
        if self.start > self.end {
            return Err(SettingsError::Reversed {
                start: self.start,
                end: self.end,
            });
        }
        if self.point_interval <= 0.0 {
            return Err(SettingsError::NonPositiveInterval(self.point_interval));
        }

        Ok(())
    }

    /// Number of intervals between the first and last output point.
    ///
    /// Only meaningful for valid settings.
    #[must_use]
    pub fn intervals(&self) -> usize {
        let ratio = (self.end - self.start) / self.point_interval;
        let whole = ratio.round();
        let intervals = if (ratio - whole).abs() <= INTERVAL_SNAP * whole.max(1.0) {
            whole
        } else {
            ratio.ceil()
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let intervals = intervals.max(1.0) as usize;
        intervals
    }

    /// Number of output points a complete run records.
    ///
    /// Saturates at `usize::MAX` for ranges too fine to count.
    #[must_use]
    pub fn size(&self) -> usize {
        self.intervals().saturating_add(1)
    }

    /// Time of output point `index`: `min(end, start + index * interval)`.
    #[must_use]
    pub fn output_time(&self, index: usize) -> f64 {
        if index >= self.intervals() {
            return self.end;
        }
        #[allow(clippy::cast_precision_loss)]
        let offset = index as f64 * self.point_interval;
        (self.start + offset).min(self.end)
    }

    /// Fraction of the run completed at `time`, in `[0, 1]`.
    #[must_use]
    pub fn fraction(&self, time: f64) -> f64 {
        ((time - self.start) / (self.end - self.start)).clamp(0.0, 1.0)
    }
}

/// Everything a simulation needs besides its model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    pub settings: SimulationSettings,

    /// The solver that advances the states.
    pub ode: SolverConfig,

    /// The solver for algebraic constraints. Newton with defaults when absent.
    #[cfg_attr(feature = "serde", serde(default))]
    pub nla: Option<SolverConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(SimulationSettings::default())
    }
}

impl SimulationConfig {
    /// Creates a config that integrates with BDF and default properties.
    #[must_use]
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            settings,
            ode: SolverConfig::new(registry::BDF),
            nla: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn size_counts_both_ends() {
        let settings = SimulationSettings::new(0.0, 1.0, 0.1).unwrap();
        assert_eq!(settings.size(), 11);
        assert_relative_eq!(settings.output_time(10), 1.0);

        let settings = SimulationSettings::new(0.0, 10.0, 1.0).unwrap();
        assert_eq!(settings.size(), 11);
    }

    #[test]
    fn partial_last_interval_is_clamped_to_the_end() {
        let settings = SimulationSettings::new(0.0, 1.0, 0.3).unwrap();

        assert_eq!(settings.size(), 5);
        let times: Vec<f64> = (0..settings.size())
            .map(|k| settings.output_time(k))
            .collect();
        for (time, expected) in times.iter().zip([0.0, 0.3, 0.6, 0.9, 1.0]) {
            assert_relative_eq!(*time, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn interval_longer_than_the_range() {
        let settings = SimulationSettings::new(2.0, 3.0, 5.0).unwrap();
        assert_eq!(settings.size(), 2);
        assert_relative_eq!(settings.output_time(1), 3.0);
    }

    #[test]
    fn size_saturates_for_uncountable_ranges() {
        let settings = SimulationSettings::new(0.0, 1e300, 1e-300).unwrap();
        assert_eq!(settings.intervals(), usize::MAX);
        assert_eq!(settings.size(), usize::MAX);
        assert_eq!(settings.output_time(usize::MAX), 1e300);
    }

    #[test]
    fn rejects_invalid_settings() {
        assert_eq!(
            SimulationSettings::new(1.0, 1.0, 0.1),
            Err(SettingsError::EmptyRange)
        );
        assert!(matches!(
            SimulationSettings::new(2.0, 1.0, 0.1),
            Err(SettingsError::Reversed { .. })
        ));
        assert!(matches!(
            SimulationSettings::new(0.0, 1.0, 0.0),
            Err(SettingsError::NonPositiveInterval(_))
        ));
        assert!(matches!(
            SimulationSettings::new(0.0, f64::INFINITY, 1.0),
            Err(SettingsError::NonFinite {
                field: "ending point",
                ..
            })
        ));
    }

    #[test]
    fn fraction_is_clamped() {
        let settings = SimulationSettings::new(10.0, 20.0, 1.0).unwrap();
        assert_relative_eq!(settings.fraction(15.0), 0.5);
        assert_relative_eq!(settings.fraction(25.0), 1.0);
        assert_relative_eq!(settings.fraction(5.0), 0.0);
    }
}
