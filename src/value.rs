//! # Ordinal Value Types
//!
//! Core value domain for facts: `String`, `Int` and `Float` ordinals.
//! Values are totally ordered within a type and never compare across
//! types; the cross-variant `Ord` impl exists only so ordinals can be
//! kept in sorted collections.
//!
//! ## Usage
//!
//! ```rust
//! use factlog::value::{Fact, OrdinalType};
//!
//! let fact = Fact::new("winterfell", "temperature_c", -2i64);
//! assert_eq!(fact.value.ordinal_type(), OrdinalType::Int);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Value types an attribute can range over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OrdinalType {
    String,
    Int,
    Float,
}

impl OrdinalType {
    /// Short name used in canonical encodings and error messages.
    pub fn name(self) -> &'static str {
        match self {
            OrdinalType::String => "str",
            OrdinalType::Int => "int",
            OrdinalType::Float => "float",
        }
    }
}

impl fmt::Display for OrdinalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single value: one variant per ordinal type.
///
/// Floats are compared with `total_cmp` and hashed by bit pattern so
/// ordinals can live in `BTreeSet`s and serve as map keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Ordinal {
    String(String),
    Int(i64),
    Float(f64),
}

impl Ordinal {
    /// The type of this value.
    pub fn ordinal_type(&self) -> OrdinalType {
        match self {
            Ordinal::String(_) => OrdinalType::String,
            Ordinal::Int(_) => OrdinalType::Int,
            Ordinal::Float(_) => OrdinalType::Float,
        }
    }

    /// Stable textual encoding `type:value`, used as hashing input.
    pub fn canonical(&self) -> String {
        match self {
            Ordinal::String(s) => format!("str:{s}"),
            Ordinal::Int(i) => format!("int:{i}"),
            Ordinal::Float(x) => format!("float:{x}"),
        }
    }

    /// Compare two ordinals of the same type. `None` when the types differ.
    pub fn compare(&self, other: &Ordinal) -> Option<Ordering> {
        match (self, other) {
            (Ordinal::String(a), Ordinal::String(b)) => Some(a.cmp(b)),
            (Ordinal::Int(a), Ordinal::Int(b)) => Some(a.cmp(b)),
            (Ordinal::Float(a), Ordinal::Float(b)) => Some(a.total_cmp(b)),
            _ => None,
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            Ordinal::String(_) => 0,
            Ordinal::Int(_) => 1,
            Ordinal::Float(_) => 2,
        }
    }
}

impl PartialEq for Ordinal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ordinal {}

impl PartialOrd for Ordinal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ordinal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
            .unwrap_or_else(|| self.variant_rank().cmp(&other.variant_rank()))
    }
}

impl Hash for Ordinal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.variant_rank().hash(state);
        match self {
            Ordinal::String(s) => s.hash(state),
            Ordinal::Int(i) => i.hash(state),
            Ordinal::Float(x) => x.to_bits().hash(state),
        }
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ordinal::String(s) => write!(f, "\"{s}\""),
            Ordinal::Int(i) => write!(f, "{i}"),
            Ordinal::Float(x) => write!(f, "{x}"),
        }
    }
}

impl From<&str> for Ordinal {
    fn from(s: &str) -> Self {
        Ordinal::String(s.to_string())
    }
}

impl From<String> for Ordinal {
    fn from(s: String) -> Self {
        Ordinal::String(s)
    }
}

impl From<i64> for Ordinal {
    fn from(i: i64) -> Self {
        Ordinal::Int(i)
    }
}

impl From<i32> for Ordinal {
    fn from(i: i32) -> Self {
        Ordinal::Int(i64::from(i))
    }
}

impl From<f64> for Ordinal {
    fn from(x: f64) -> Self {
        Ordinal::Float(x)
    }
}

/// A ground triple `(entity, attribute, value)`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Fact {
    pub entity: String,
    pub attr: String,
    pub value: Ordinal,
}

impl Fact {
    /// Create a fact from owned or borrowed parts.
    pub fn new(
        entity: impl Into<String>,
        attr: impl Into<String>,
        value: impl Into<Ordinal>,
    ) -> Self {
        Fact {
            entity: entity.into(),
            attr: attr.into(),
            value: value.into(),
        }
    }

    /// Stable textual encoding used as hashing input.
    pub fn canonical(&self) -> String {
        format!("fact:({},{},{})", self.entity, self.attr, self.value.canonical())
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.entity, self.attr, self.value)
    }
}

impl<E, V> From<(E, &str, V)> for Fact
where
    E: Into<String>,
    V: Into<Ordinal>,
{
    fn from((entity, attr, value): (E, &str, V)) -> Self {
        Fact::new(entity, attr, value)
    }
}
