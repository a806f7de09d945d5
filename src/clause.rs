//! # Clauses
//!
//! A clause is a triple pattern `(entity expression, attribute, value
//! expression)`. The entity side is always string-typed; the value side
//! is typed by the attribute's declaration. Clauses are built from
//! surface patterns against a schema, which is where unknown attributes
//! and type conflicts are reported.

use crate::error::{Error, Result, TypeConflicts};
use crate::expr::{merge_contexts, Context, Expr, VarTypes};
use crate::pattern::TriplePattern;
use crate::schema::AttributeSchema;
use crate::value::{Fact, Ordinal, OrdinalType};
use std::collections::BTreeSet;
use std::fmt;

/// A single triple pattern inside a query or rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub entity: Expr,
    pub attr: String,
    pub value: Expr,
}

impl Clause {
    /// Type a surface triple pattern against the schema.
    pub fn from_pattern(schema: &AttributeSchema, pattern: &TriplePattern) -> Result<Self> {
        let attribute = schema.require(&pattern.attr)?;
        let mut conflicts = TypeConflicts::new();
        let entity = Expr::from_pattern(
            &pattern.entity,
            &pattern.attr,
            OrdinalType::String,
            &mut conflicts,
        );
        let value = Expr::from_pattern(
            &pattern.value,
            &pattern.attr,
            attribute.data_type,
            &mut conflicts,
        );
        if !conflicts.is_empty() {
            return Err(Error::TypeMismatch(conflicts));
        }
        Ok(Clause {
            entity,
            attr: pattern.attr.clone(),
            value,
        })
    }

    /// Build a clause directly from typed expressions.
    pub fn new(entity: Expr, attr: impl Into<String>, value: Expr) -> Self {
        Clause {
            entity,
            attr: attr.into(),
            value,
        }
    }

    /// Name → type obligations from both sides.
    pub fn variable_types(&self) -> VarTypes {
        let mut types = self.entity.variable_types();
        types.extend(self.value.variable_types());
        types
    }

    /// Free variable names, per side.
    pub fn free_vars(&self) -> (BTreeSet<String>, BTreeSet<String>) {
        (self.entity.var_names(), self.value.var_names())
    }

    /// Narrow both sides under a batch of candidate bindings.
    pub fn substitute(&self, contexts: &[Context]) -> Clause {
        Clause {
            entity: self.entity.substitute(contexts),
            attr: self.attr.clone(),
            value: self.value.substitute(contexts),
        }
    }

    /// Every binding under which `fact` satisfies this clause.
    pub fn matches(&self, fact: &Fact) -> Vec<Context> {
        if fact.attr != self.attr {
            return vec![];
        }
        let entity_value = Ordinal::String(fact.entity.clone());
        let mut bindings = Vec::new();
        for entity_ctx in self.entity.matches(&entity_value) {
            for value_ctx in self.value.matches(&fact.value) {
                if let Some(merged) = merge_contexts(&entity_ctx, &value_ctx) {
                    bindings.push(merged);
                }
            }
        }
        bindings
    }

    /// The ground fact this clause denotes, when both sides are literal.
    pub fn as_fact(&self) -> Option<Fact> {
        let entity = match self.entity.as_const()? {
            Ordinal::String(name) => name.clone(),
            _ => return None,
        };
        let value = self.value.as_const()?.clone();
        Some(Fact {
            entity,
            attr: self.attr.clone(),
            value,
        })
    }

    /// Whether either side can never match.
    pub fn is_dead(&self) -> bool {
        self.entity.is_unsatisfiable() || self.value.is_unsatisfiable()
    }

    /// A clause can stand alone when each side leaves at most one
    /// variable free; anything broader needs substitution first.
    pub fn is_ready(&self) -> bool {
        let (left, right) = self.free_vars();
        left.len() <= 1 && right.len() <= 1
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.entity, self.attr, self.value)
    }
}
