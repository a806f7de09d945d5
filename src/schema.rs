//! # Attribute Schema
//!
//! Declares the attributes facts may use, each with a value type and a
//! cardinality. The schema is immutable for the lifetime of an engine
//! instance; predicates and rules are validated against it at
//! construction time.

use crate::error::{Error, Result};
use crate::value::OrdinalType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How many values a `(entity, attribute)` pair may hold at once.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// At most one valid value; a new assertion supersedes the old one.
    One,
    /// Any number of valid values.
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::One => write!(f, "one"),
            Cardinality::Many => write!(f, "many"),
        }
    }
}

/// A declared attribute: name, value type and cardinality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub data_type: OrdinalType,
    pub cardinality: Cardinality,
}

impl Attribute {
    /// Declare an attribute.
    pub fn new(
        name: impl Into<String>,
        data_type: OrdinalType,
        cardinality: Cardinality,
    ) -> Self {
        Attribute {
            name: name.into(),
            data_type,
            cardinality,
        }
    }

    /// Shorthand for a string-valued attribute.
    pub fn string(name: impl Into<String>, cardinality: Cardinality) -> Self {
        Attribute::new(name, OrdinalType::String, cardinality)
    }

    /// Shorthand for an integer-valued attribute.
    pub fn int(name: impl Into<String>, cardinality: Cardinality) -> Self {
        Attribute::new(name, OrdinalType::Int, cardinality)
    }

    /// Shorthand for a float-valued attribute.
    pub fn float(name: impl Into<String>, cardinality: Cardinality) -> Self {
        Attribute::new(name, OrdinalType::Float, cardinality)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}/{}", self.name, self.data_type, self.cardinality)
    }
}

/// Immutable name → attribute mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    attributes: BTreeMap<String, Attribute>,
}

impl AttributeSchema {
    /// Build a schema from attribute declarations. A repeated name keeps
    /// the last declaration.
    pub fn new(attributes: impl IntoIterator<Item = Attribute>) -> Self {
        AttributeSchema {
            attributes: attributes
                .into_iter()
                .map(|a| (a.name.clone(), a))
                .collect(),
        }
    }

    /// Look up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Check whether an attribute is declared.
    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Look up an attribute, failing with `UnknownAttribute`.
    pub fn require(&self, name: &str) -> Result<&Attribute> {
        self.attributes
            .get(name)
            .ok_or_else(|| Error::UnknownAttribute(name.to_string()))
    }

    /// Declared attribute names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Number of declared attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the schema declares no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
