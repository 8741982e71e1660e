use std::fmt;

use crate::PropertyValue;

/// The role a solver plays in a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverKind {
    /// Integrates the differential part of a model over time.
    Ode,
    /// Solves systems of nonlinear algebraic equations.
    Nla,
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ode => f.write_str("ODE"),
            Self::Nla => f.write_str("NLA"),
        }
    }
}

/// A bound on a numeric property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    /// Any value `>= 0`.
    NonNegative,
    /// Any value `> 0`.
    Positive,
    /// Any value in `[min, max]`.
    Between { min: f64, max: f64 },
}

impl Limit {
    /// Returns whether `value` satisfies the limit.
    ///
    /// Non-finite values never do.
    #[must_use]
    pub fn admits(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match *self {
            Self::NonNegative => value >= 0.0,
            Self::Positive => value > 0.0,
            Self::Between { min, max } => (min..=max).contains(&value),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonNegative => f.write_str(">= 0"),
            Self::Positive => f.write_str("> 0"),
            Self::Between { min, max } => write!(f, "between {min} and {max}"),
        }
    }
}

/// The type of a solver property and the values it accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyKind {
    Boolean,
    Integer(Limit),
    Double(Limit),
    /// One of a fixed set of names.
    List(&'static [&'static str]),
}

impl PropertyKind {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Self::Boolean => "a boolean",
            Self::Integer(_) => "an integer",
            Self::Double(_) => "a number",
            Self::List(_) => "a text",
        }
    }
}

/// Describes one configurable property of a solver.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    /// Name used in [`SolverProperties`](crate::SolverProperties).
    pub id: &'static str,
    pub kind: PropertyKind,
    /// Value used when the property is not given.
    pub default: PropertyValue,
    /// Whether the value is expressed in the model's time unit.
    pub has_time_unit: bool,
}

/// Describes a solver that can be selected by name.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverInfo {
    pub name: &'static str,
    pub kind: SolverKind,
    pub properties: &'static [PropertySpec],
}

impl SolverInfo {
    /// Returns the schema of the property named `id`.
    #[must_use]
    pub fn property(&self, id: &str) -> Option<&'static PropertySpec> {
        self.properties.iter().find(|spec| spec.id == id)
    }
}
