use std::{borrow::Cow, collections::BTreeMap, fmt};

use crate::{ConfigError, PropertyKind, SolverInfo};

/// The value of a single solver property.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(untagged)
)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Text(Cow<'static, str>),
}

impl PropertyValue {
    /// Creates a text value.
    #[must_use]
    pub fn text(value: impl Into<Cow<'static, str>>) -> Self {
        Self::Text(value.into())
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&'static str> for PropertyValue {
    fn from(value: &'static str) -> Self {
        Self::Text(Cow::Borrowed(value))
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(Cow::Owned(value))
    }
}

/// Solver-specific configuration, keyed by property id.
///
/// Ids and values are checked against the solver's schema when the solver is
/// built, not when they are set.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct SolverProperties(BTreeMap<String, PropertyValue>);

impl SolverProperties {
    /// Creates an empty property set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the set with `id` set to `value`.
    #[must_use]
    pub fn with(mut self, id: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set(id, value);
        self
    }

    /// Sets `id` to `value`, returning the previous value.
    pub fn set(
        &mut self,
        id: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.0.insert(id.into(), value.into())
    }

    /// Removes `id`, returning its value.
    pub fn remove(&mut self, id: &str) -> Option<PropertyValue> {
        self.0.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PropertyValue> {
        self.0.get(id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(id, value)| (id.as_str(), value))
    }

    /// Checks the properties against `info` and fills in defaults.
    ///
    /// Integers are accepted where a double is expected.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an unknown id, a value of the wrong type,
    /// a number outside its limit, or a name missing from a list.
    pub fn resolve(&self, info: &SolverInfo) -> Result<ResolvedProperties, ConfigError> {
        if let Some(id) = self.0.keys().find(|id| info.property(id).is_none()) {
            return Err(ConfigError::UnknownProperty {
                solver: info.name.to_string(),
                property: id.clone(),
            });
        }

        let values = info
            .properties
            .iter()
            .map(|spec| {
                let given = self.0.get(spec.id).unwrap_or(&spec.default);
                check(spec.id, spec.kind, given).map(|value| (spec.id, value))
            })
            .collect::<Result<_, _>>()?;

        Ok(ResolvedProperties { values })
    }
}

impl<K, V> FromIterator<(K, V)> for SolverProperties
where
    K: Into<String>,
    V: Into<PropertyValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(id, value)| (id.into(), value.into()))
                .collect(),
        )
    }
}

fn check(
    id: &str,
    kind: PropertyKind,
    value: &PropertyValue,
) -> Result<PropertyValue, ConfigError> {
    let wrong_type = || ConfigError::WrongType {
        property: id.to_string(),
        expected: kind.describe(),
    };
    let out_of_range = |value: f64, limit| ConfigError::OutOfRange {
        property: id.to_string(),
        value,
        limit,
    };

    match (kind, value) {
        (PropertyKind::Boolean, PropertyValue::Boolean(_)) => Ok(value.clone()),
        (PropertyKind::Integer(limit), PropertyValue::Integer(n)) => {
            #[allow(clippy::cast_precision_loss)]
            let n = *n as f64;
            if limit.admits(n) {
                Ok(value.clone())
            } else {
                Err(out_of_range(n, limit))
            }
        }
        (PropertyKind::Double(limit), PropertyValue::Double(x)) => {
            if limit.admits(*x) {
                Ok(value.clone())
            } else {
                Err(out_of_range(*x, limit))
            }
        }
        (PropertyKind::Double(limit), PropertyValue::Integer(n)) => {
            #[allow(clippy::cast_precision_loss)]
            let x = *n as f64;
            if limit.admits(x) {
                Ok(PropertyValue::Double(x))
            } else {
                Err(out_of_range(x, limit))
            }
        }
        (PropertyKind::List(allowed), PropertyValue::Text(name)) => {
            if allowed.contains(&&**name) {
                Ok(value.clone())
            } else {
                Err(ConfigError::NotInList {
                    property: id.to_string(),
                    value: name.to_string(),
                    allowed,
                })
            }
        }
        _ => Err(wrong_type()),
    }
}

/// Solver properties that passed validation, with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProperties {
    values: Vec<(&'static str, PropertyValue)>,
}

impl ResolvedProperties {
    fn get(&self, id: &str) -> Result<&PropertyValue, ConfigError> {
        self.values
            .iter()
            .find_map(|(key, value)| (*key == id).then_some(value))
            .ok_or_else(|| ConfigError::Unresolved(id.to_string()))
    }

    /// Returns a boolean property.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a resolved boolean.
    pub fn boolean(&self, id: &str) -> Result<bool, ConfigError> {
        match self.get(id)? {
            PropertyValue::Boolean(value) => Ok(*value),
            _ => Err(ConfigError::Unresolved(id.to_string())),
        }
    }

    /// Returns an integer property.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a resolved integer.
    pub fn integer(&self, id: &str) -> Result<i64, ConfigError> {
        match self.get(id)? {
            PropertyValue::Integer(value) => Ok(*value),
            _ => Err(ConfigError::Unresolved(id.to_string())),
        }
    }

    /// Returns a double property.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a resolved double.
    pub fn double(&self, id: &str) -> Result<f64, ConfigError> {
        match self.get(id)? {
            PropertyValue::Double(value) => Ok(*value),
            _ => Err(ConfigError::Unresolved(id.to_string())),
        }
    }

    /// Returns a list property.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a resolved list value.
    pub fn text(&self, id: &str) -> Result<&str, ConfigError> {
        match self.get(id)? {
            PropertyValue::Text(value) => Ok(&**value),
            _ => Err(ConfigError::Unresolved(id.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &PropertyValue)> {
        self.values.iter().map(|(id, value)| (*id, value))
    }
}

/// Selects a solver by name and configures it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverConfig {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub properties: SolverProperties,
}

impl SolverConfig {
    /// Selects `name` with default properties.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: SolverProperties::new(),
        }
    }

    /// Returns the config with `id` set to `value`.
    #[must_use]
    pub fn with(mut self, id: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.set(id, value);
        self
    }
}
