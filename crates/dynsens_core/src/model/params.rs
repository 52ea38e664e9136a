//! Named parameter schemas and the parameter sets bound to them.
//!
//! A [`ParameterSchema`] is the single source of truth for parameter names
//! and column order. Models declare one, the sampler lays out matrix columns
//! by it, and the evaluator binds each sample row to it, so a name can never
//! silently refer to the wrong column.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Ordered, unique, non-empty list of parameter names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ParameterSchema {
    names: Vec<String>,
}

impl ParameterSchema {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ConfigError::Empty {
                field: "parameters",
            });
        }
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConfigError::Parameter {
                    name: format!("#{i}"),
                    reason: "name must not be blank".to_string(),
                });
            }
            if names[..i].contains(name) {
                return Err(ConfigError::Parameter {
                    name: name.clone(),
                    reason: "duplicate parameter name".to_string(),
                });
            }
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Bind a row of values to this schema.
    pub fn bind<'a>(&'a self, values: &'a [f64]) -> Result<ParameterSet<'a>> {
        if values.len() != self.names.len() {
            return Err(ConfigError::LengthMismatch {
                field: "parameter row",
                expected: self.names.len(),
                actual: values.len(),
            });
        }
        Ok(ParameterSet {
            schema: self,
            values,
        })
    }

    /// Check that `other` lists exactly these names in exactly this order.
    pub fn ensure_matches(&self, other: &[String]) -> Result<()> {
        for name in other {
            if self.index_of(name).is_none() {
                return Err(ConfigError::Parameter {
                    name: name.clone(),
                    reason: format!("not a parameter of this model (expected one of {:?})", self.names),
                });
            }
        }
        for (i, name) in self.names.iter().enumerate() {
            match other.get(i) {
                Some(given) if given == name => {}
                Some(_) => {
                    return Err(ConfigError::Parameter {
                        name: name.clone(),
                        reason: format!("expected at position {i} to match model order {:?}", self.names),
                    });
                }
                None => {
                    return Err(ConfigError::Parameter {
                        name: name.clone(),
                        reason: "missing a distribution".to_string(),
                    });
                }
            }
        }
        if other.len() != self.names.len() {
            return Err(ConfigError::LengthMismatch {
                field: "parameters",
                expected: self.names.len(),
                actual: other.len(),
            });
        }
        Ok(())
    }
}

impl TryFrom<Vec<String>> for ParameterSchema {
    type Error = ConfigError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(names)
    }
}

impl From<ParameterSchema> for Vec<String> {
    fn from(schema: ParameterSchema) -> Self {
        schema.names
    }
}

/// One row of parameter values viewed through its schema.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSet<'a> {
    schema: &'a ParameterSchema,
    values: &'a [f64],
}

impl<'a> ParameterSet<'a> {
    pub fn schema(&self) -> &'a ParameterSchema {
        self.schema
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    /// Value by column index. Models resolve their indices against the
    /// schema they declare, so positional access is the hot path.
    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema.index_of(name).map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        let values = self.values;
        self.schema
            .names
            .iter()
            .map(String::as_str)
            .zip(values.iter().copied())
    }
}
