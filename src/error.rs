//! Engine Error Types
//!
//! Every failure mode is a distinct variant, never a bare string.
//! Construction-time errors (unknown attributes, type conflicts,
//! unplannable predicates, ill-formed rules) are raised before the
//! store is touched; anything raised after a transaction begins rolls
//! that transaction back.

use crate::clause::Clause;
use crate::store::StoreError;
use crate::value::{Fact, OrdinalType};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Observed types per variable (or per attribute, for literals).
pub type TypeConflicts = BTreeMap<String, BTreeSet<OrdinalType>>;

/// Engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// A clause or fact refers to an attribute not in the schema
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    /// One or more variables were used with conflicting types
    #[error("conflicting types: {}", format_conflicts(.0))]
    TypeMismatch(TypeConflicts),

    /// The planner could not schedule any remaining clause
    #[error("no clause is ready to be scheduled: {}", format_clauses(.0))]
    UnsolvablePredicate(Vec<Clause>),

    /// A rule declaration violates the head restrictions
    #[error("rule '{rule}' is ill-formed: {}", .reasons.join("; "))]
    RuleHeadIllFormed { rule: String, reasons: Vec<String> },

    /// A rule failed compilation for a reason reported by the inner error
    #[error("rule '{rule}': {source}")]
    RuleInvalid {
        rule: String,
        #[source]
        source: Box<Error>,
    },

    /// One or more rule declarations failed to compile
    #[error("{} rule(s) failed to compile: {}", .0.len(), format_errors(.0))]
    InvalidRules(Vec<Error>),

    /// The user asked to retract a fact produced by a rule
    #[error("cannot retract inferred fact {0}")]
    CannotRetractDerived(Fact),

    /// A rule head did not become ground after substitution (strict mode)
    #[error("rule '{rule}' produced an unground conclusion {clause}")]
    UngroundedDerivation { rule: String, clause: String },

    /// Saturation exceeded the configured round bound
    #[error("inference did not settle within {rounds} round(s)")]
    SaturationLimit { rounds: u64 },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),

    /// The storage adapter failed
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

fn format_conflicts(conflicts: &TypeConflicts) -> String {
    conflicts
        .iter()
        .map(|(name, types)| {
            let observed: Vec<&str> = types.iter().map(|t| t.name()).collect();
            format!("{name} was used as {}", observed.join(" and "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_clauses(clauses: &[Clause]) -> String {
    clauses
        .iter()
        .map(Clause::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(Error::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
