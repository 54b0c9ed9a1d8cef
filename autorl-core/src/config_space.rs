//! Declarative hyperparameter spaces and configurations.
//!
//! Algorithms publish a [`ConfigSpace`] of named parameters with bounds and
//! defaults, and read a [`Config`] mapping at construction. The core never
//! validates ranges; that is the job of whoever samples configurations.
use crate::error::AutorlError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A hyperparameter value.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum ParamValue {
    /// An integer value.
    Int(i64),
    /// A floating point value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
    /// A categorical string value.
    Str(String),
}

/// The domain a parameter ranges over.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum Domain {
    /// Integers in `[low, high]`.
    IntRange {
        /// Lower bound, inclusive.
        low: i64,
        /// Upper bound, inclusive.
        high: i64,
    },
    /// Floats in `[low, high]`.
    FloatRange {
        /// Lower bound, inclusive.
        low: f64,
        /// Upper bound, inclusive.
        high: f64,
    },
    /// One of a fixed set of values.
    Categorical(Vec<ParamValue>),
}

/// A named parameter with its domain and default.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// Domain of admissible values.
    pub domain: Domain,
    /// Default value.
    pub default: ParamValue,
}

/// A named set of parameters with declared bounds and defaults.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ConfigSpace {
    /// Name of the space.
    pub name: String,
    params: Vec<Param>,
}

impl ConfigSpace {
    /// Creates an empty space.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Adds a parameter.
    pub fn param(
        mut self,
        name: impl Into<String>,
        domain: Domain,
        default: ParamValue,
    ) -> Self {
        self.params.push(Param {
            name: name.into(),
            domain,
            default,
        });
        self
    }

    /// Looks a parameter up by name.
    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Iterates over the declared parameters.
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if no parameters are declared.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The configuration holding every parameter's default.
    pub fn default_configuration(&self) -> Config {
        let mut config = Config::new();
        for p in &self.params {
            config = config.with(&p.name, p.default.clone());
        }
        config
    }
}

/// An immutable name-to-value mapping read by algorithms.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Config(BTreeMap<String, ParamValue>);

impl Config {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns a copy with `name` set to `value`.
    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Returns `true` if `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Raw value lookup.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// Reads an integer parameter.
    pub fn int(&self, name: &str) -> Result<i64, AutorlError> {
        match self.0.get(name) {
            Some(ParamValue::Int(v)) => Ok(*v),
            _ => Err(AutorlError::BadHyperparameter(name.into())),
        }
    }

    /// Reads a float parameter, widening integers.
    pub fn float(&self, name: &str) -> Result<f64, AutorlError> {
        match self.0.get(name) {
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            _ => Err(AutorlError::BadHyperparameter(name.into())),
        }
    }

    /// Reads a boolean parameter.
    pub fn bool(&self, name: &str) -> Result<bool, AutorlError> {
        match self.0.get(name) {
            Some(ParamValue::Bool(v)) => Ok(*v),
            _ => Err(AutorlError::BadHyperparameter(name.into())),
        }
    }

    /// Reads a categorical string parameter.
    pub fn str(&self, name: &str) -> Result<&str, AutorlError> {
        match self.0.get(name) {
            Some(ParamValue::Str(v)) => Ok(v),
            _ => Err(AutorlError::BadHyperparameter(name.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> ConfigSpace {
        ConfigSpace::new("TestSpace")
            .param(
                "lr",
                Domain::FloatRange {
                    low: 1e-5,
                    high: 0.1,
                },
                ParamValue::Float(2.5e-4),
            )
            .param(
                "batch",
                Domain::IntRange { low: 1, high: 1024 },
                ParamValue::Int(64),
            )
            .param(
                "activation",
                Domain::Categorical(vec![
                    ParamValue::Str("tanh".into()),
                    ParamValue::Str("relu".into()),
                ]),
                ParamValue::Str("tanh".into()),
            )
    }

    #[test]
    fn default_configuration_carries_every_default() {
        let config = space().default_configuration();
        assert_eq!(config.float("lr").unwrap(), 2.5e-4);
        assert_eq!(config.int("batch").unwrap(), 64);
        assert_eq!(config.str("activation").unwrap(), "tanh");
    }

    #[test]
    fn typed_getters_reject_missing_and_mistyped_keys() {
        let config = space().default_configuration();
        assert!(config.int("lr").is_err());
        assert!(config.float("missing").is_err());
        assert_eq!(config.float("batch").unwrap(), 64.0);
    }

    #[test]
    fn lookup_by_name() {
        let s = space();
        assert_eq!(s.len(), 3);
        assert!(s.get("batch").is_some());
        assert!(s.get("nope").is_none());
    }
}
