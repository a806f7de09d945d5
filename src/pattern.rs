//! # Surface Patterns
//!
//! Untyped triple patterns used to declare queries and rules. Patterns
//! carry no type information; they are checked against the attribute
//! schema when a clause or rule is built, which is where unknown
//! attributes and type conflicts surface.
//!
//! ## Usage
//!
//! ```rust
//! use factlog::pattern::{var, one_of};
//!
//! // (?child, child_of, ?parent)
//! let triple = (var("child"), "child_of", var("parent"));
//!
//! // (?place in {winterfell, tropic}, temperature_c, ?t where ?t <= 0)
//! let guarded = (
//!     one_of("place", ["winterfell", "tropic"]),
//!     "temperature_c",
//!     var("t").le(0i64),
//! );
//! # let _ = (triple, guarded);
//! ```

use crate::value::Ordinal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Comparison operators usable in guards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Evaluate the operator over two same-typed ordinals. Mixed types
    /// never hold.
    pub fn eval(self, left: &Ordinal, right: &Ordinal) -> bool {
        match left.compare(right) {
            Some(Ordering::Less) => matches!(self, CmpOp::Lt | CmpOp::Le),
            Some(Ordering::Equal) => matches!(self, CmpOp::Le | CmpOp::Ge),
            Some(Ordering::Greater) => matches!(self, CmpOp::Gt | CmpOp::Ge),
            None => false,
        }
    }

    /// The operator's source symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Operand of a comparison: a named variable or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Var(String),
    Const(Ordinal),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(name) => write!(f, "?{name}"),
            Operand::Const(value) => write!(f, "{value}"),
        }
    }
}

/// One side of an untyped triple pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pattern {
    /// A literal value.
    Is(Ordinal),
    /// A named variable.
    Var(String),
    /// A variable constrained to a finite set of values.
    In(String, BTreeSet<Ordinal>),
    /// An anonymous wildcard.
    Any,
    /// A comparison guard; unbound variable operands bind to the
    /// candidate value when matched.
    Cmp(CmpOp, Operand, Operand),
    /// Conjunction of two constraints over the same position.
    And(Box<Pattern>, Box<Pattern>),
}

impl Pattern {
    /// Conjoin another constraint onto this pattern.
    pub fn and(self, other: Pattern) -> Pattern {
        Pattern::And(Box::new(self), Box::new(other))
    }

    /// Guard this pattern's variable with `< value`.
    pub fn lt(self, value: impl Into<Ordinal>) -> Pattern {
        self.guard(CmpOp::Lt, Operand::Const(value.into()))
    }

    /// Guard this pattern's variable with `<= value`.
    pub fn le(self, value: impl Into<Ordinal>) -> Pattern {
        self.guard(CmpOp::Le, Operand::Const(value.into()))
    }

    /// Guard this pattern's variable with `> value`.
    pub fn gt(self, value: impl Into<Ordinal>) -> Pattern {
        self.guard(CmpOp::Gt, Operand::Const(value.into()))
    }

    /// Guard this pattern's variable with `>= value`.
    pub fn ge(self, value: impl Into<Ordinal>) -> Pattern {
        self.guard(CmpOp::Ge, Operand::Const(value.into()))
    }

    /// Guard this pattern's variable against another variable.
    pub fn lt_var(self, name: impl Into<String>) -> Pattern {
        self.guard(CmpOp::Lt, Operand::Var(name.into()))
    }

    /// Guard this pattern's variable against another variable.
    pub fn gt_var(self, name: impl Into<String>) -> Pattern {
        self.guard(CmpOp::Gt, Operand::Var(name.into()))
    }

    /// Guard this pattern's variable against another variable.
    pub fn le_var(self, name: impl Into<String>) -> Pattern {
        self.guard(CmpOp::Le, Operand::Var(name.into()))
    }

    /// Guard this pattern's variable against another variable.
    pub fn ge_var(self, name: impl Into<String>) -> Pattern {
        self.guard(CmpOp::Ge, Operand::Var(name.into()))
    }

    fn guard(self, op: CmpOp, right: Operand) -> Pattern {
        let name = self
            .primary_var()
            .expect("comparison guards require a variable pattern")
            .to_string();
        let cmp = Pattern::Cmp(op, Operand::Var(name), right);
        match self {
            Pattern::Var(_) => cmp,
            other => other.and(cmp),
        }
    }

    /// The first variable name bound by this pattern, if any.
    pub fn primary_var(&self) -> Option<&str> {
        match self {
            Pattern::Var(name) | Pattern::In(name, _) => Some(name),
            Pattern::Is(_) | Pattern::Any => None,
            Pattern::Cmp(_, left, right) => match (left, right) {
                (Operand::Var(name), _) | (_, Operand::Var(name)) => Some(name),
                _ => None,
            },
            Pattern::And(left, right) => {
                left.primary_var().or_else(|| right.primary_var())
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Is(value) => write!(f, "{value}"),
            Pattern::Var(name) => write!(f, "?{name}"),
            Pattern::In(name, values) => {
                let rendered: Vec<String> =
                    values.iter().map(Ordinal::to_string).collect();
                write!(f, "?{name} in {{{}}}", rendered.join(", "))
            }
            Pattern::Any => write!(f, "?"),
            Pattern::Cmp(op, left, right) => write!(f, "{left} {op} {right}"),
            Pattern::And(left, right) => write!(f, "({left} and {right})"),
        }
    }
}

/// Create a variable pattern.
pub fn var(name: impl Into<String>) -> Pattern {
    Pattern::Var(name.into())
}

/// Create a literal pattern.
pub fn is(value: impl Into<Ordinal>) -> Pattern {
    Pattern::Is(value.into())
}

/// Create an anonymous wildcard pattern.
pub fn any() -> Pattern {
    Pattern::Any
}

/// Create a membership pattern: a variable restricted to a value set.
pub fn one_of<V>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Pattern
where
    V: Into<Ordinal>,
{
    Pattern::In(
        name.into(),
        values.into_iter().map(Into::into).collect(),
    )
}

/// An untyped triple pattern: entity side, attribute, value side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriplePattern {
    pub entity: Pattern,
    pub attr: String,
    pub value: Pattern,
}

impl TriplePattern {
    /// Create a triple pattern.
    pub fn new(entity: Pattern, attr: impl Into<String>, value: Pattern) -> Self {
        TriplePattern {
            entity,
            attr: attr.into(),
            value,
        }
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.entity, self.attr, self.value)
    }
}

impl<A: Into<String>> From<(Pattern, A, Pattern)> for TriplePattern {
    fn from((entity, attr, value): (Pattern, A, Pattern)) -> Self {
        TriplePattern::new(entity, attr, value)
    }
}

impl<A: Into<String>> From<(&str, A, Pattern)> for TriplePattern {
    fn from((entity, attr, value): (&str, A, Pattern)) -> Self {
        TriplePattern::new(is(entity), attr, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmp_eval() {
        let low = Ordinal::from(-2i64);
        let zero = Ordinal::from(0i64);
        assert!(CmpOp::Le.eval(&low, &zero));
        assert!(CmpOp::Lt.eval(&low, &zero));
        assert!(!CmpOp::Gt.eval(&low, &zero));
        assert!(CmpOp::Ge.eval(&zero, &zero));
        // mixed types never hold
        assert!(!CmpOp::Lt.eval(&Ordinal::from("a"), &zero));
    }

    #[test]
    fn test_guard_builders() {
        let guarded = var("t").le(0i64);
        assert_eq!(
            guarded,
            Pattern::Cmp(
                CmpOp::Le,
                Operand::Var("t".to_string()),
                Operand::Const(Ordinal::Int(0)),
            )
        );

        let double = var("x").ge(0i64).le(100i64);
        assert!(matches!(double, Pattern::And(_, _)));
        assert_eq!(double.primary_var(), Some("x"));
    }

    #[test]
    fn test_var_to_var_guard() {
        let guarded = var("cold").lt_var("warm");
        assert_eq!(
            guarded,
            Pattern::Cmp(
                CmpOp::Lt,
                Operand::Var("cold".to_string()),
                Operand::Var("warm".to_string()),
            )
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(var("x").to_string(), "?x");
        assert_eq!(is("m").to_string(), "\"m\"");
        assert_eq!(any().to_string(), "?");
        assert_eq!(var("t").ge(50i64).to_string(), "?t >= 50");
        assert_eq!(
            one_of("p", ["a", "b"]).to_string(),
            "?p in {\"a\", \"b\"}"
        );
    }

    #[test]
    fn test_triple_pattern_from_tuple() {
        let triple: TriplePattern = (var("child"), "child_of", var("parent")).into();
        assert_eq!(triple.attr, "child_of");

        let grounded: TriplePattern = ("juan", "child_of", var("parent")).into();
        assert_eq!(grounded.entity, is("juan"));
    }
}
