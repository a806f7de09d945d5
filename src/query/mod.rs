//! # Predicates and Solutions
//!
//! A predicate is an ordered conjunction of clauses together with the
//! unified variable-type environment computed from all of them. A
//! solution is a variable binding plus the set of stored facts that
//! justify it; the empty solution is the identity for joins.
//!
//! ## Pipeline
//!
//! ```text
//! surface patterns
//!     ↓
//! [Predicate construction]   → typed clauses + variable types
//!     ↓
//! [Planner]                  → clauses reordered by boundness
//!     ↓
//! [Evaluator]                → solutions (bindings + justifications)
//! ```

pub mod planner;
pub mod solve;

use crate::clause::Clause;
use crate::error::{Error, Result, TypeConflicts};
use crate::expr::{merge_contexts, Context, Expr, VarTypes};
use crate::pattern::TriplePattern;
use crate::schema::AttributeSchema;
use crate::value::Fact;
use std::collections::BTreeSet;
use std::fmt;

/// An ordered conjunction of clauses with its variable-type environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    clauses: Vec<Clause>,
    var_types: VarTypes,
    planned: bool,
}

impl Predicate {
    /// Type a list of surface triple patterns against the schema.
    /// Type conflicts are accumulated across every clause and reported
    /// together; an unknown attribute aborts immediately.
    pub fn from_patterns<I>(schema: &AttributeSchema, patterns: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<TriplePattern>,
    {
        let mut conflicts = TypeConflicts::new();
        let mut clauses = Vec::new();
        for pattern in patterns {
            let pattern = pattern.into();
            let attribute = schema.require(&pattern.attr)?;
            let entity = Expr::from_pattern(
                &pattern.entity,
                &pattern.attr,
                crate::value::OrdinalType::String,
                &mut conflicts,
            );
            let value = Expr::from_pattern(
                &pattern.value,
                &pattern.attr,
                attribute.data_type,
                &mut conflicts,
            );
            clauses.push(Clause::new(entity, pattern.attr, value));
        }
        let var_types = unify_types(&clauses, &mut conflicts);
        if !conflicts.is_empty() {
            return Err(Error::TypeMismatch(conflicts));
        }
        Ok(Predicate {
            clauses,
            var_types,
            planned: false,
        })
    }

    /// Build a predicate from already-typed clauses, re-unifying the
    /// variable-type environment.
    pub fn from_clauses(clauses: Vec<Clause>) -> Result<Self> {
        let mut conflicts = TypeConflicts::new();
        let var_types = unify_types(&clauses, &mut conflicts);
        if !conflicts.is_empty() {
            return Err(Error::TypeMismatch(conflicts));
        }
        Ok(Predicate {
            clauses,
            var_types,
            planned: false,
        })
    }

    pub(crate) fn with_order(clauses: Vec<Clause>, var_types: VarTypes) -> Self {
        Predicate {
            clauses,
            var_types,
            planned: true,
        }
    }

    /// The clauses, in current order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// The unified variable-type environment.
    pub fn var_types(&self) -> &VarTypes {
        &self.var_types
    }

    /// Whether the clause order came from the planner.
    pub fn is_planned(&self) -> bool {
        self.planned
    }

    /// Number of clauses.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Whether the predicate has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.clauses.iter().map(Clause::to_string).collect();
        write!(f, "{}", rendered.join(", "))
    }
}

fn unify_types(clauses: &[Clause], conflicts: &mut TypeConflicts) -> VarTypes {
    let mut var_types = VarTypes::new();
    for clause in clauses {
        for (name, data_type) in clause.variable_types() {
            match var_types.get(&name) {
                Some(known) if *known != data_type => {
                    let entry = conflicts.entry(name.clone()).or_default();
                    entry.insert(*known);
                    entry.insert(data_type);
                }
                _ => {
                    var_types.insert(name, data_type);
                }
            }
        }
    }
    var_types
}

/// A variable binding together with the facts that justify it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Solution {
    pub context: Context,
    pub justification: BTreeSet<Fact>,
}

impl Solution {
    /// The join identity: no bindings, no justification.
    pub fn identity() -> Self {
        Solution {
            context: Context::new(),
            justification: BTreeSet::new(),
        }
    }

    /// Build a solution from parts.
    pub fn new(context: Context, justification: BTreeSet<Fact>) -> Self {
        Solution {
            context,
            justification,
        }
    }

    /// Whether this is the join identity.
    pub fn is_identity(&self) -> bool {
        self.context.is_empty() && self.justification.is_empty()
    }

    /// Join this solution with one micro-binding of `fact` against
    /// `clause` (the clause as written, before any substitution).
    ///
    /// The join succeeds when:
    /// 1. the fact does not already justify this solution (a fact
    ///    never satisfies two clauses of the same conjunction);
    /// 2. the contexts agree on every shared variable;
    /// 3. the merged context binds every variable the clause mentions;
    /// 4. the fact still satisfies the clause once it is fully
    ///    narrowed by the merged context, which re-applies any
    ///    constraint an earlier substitution may have relaxed.
    pub fn join(&self, clause: &Clause, fact: &Fact, micro: &Context) -> Option<Solution> {
        if !self.is_identity() && self.justification.contains(fact) {
            return None;
        }
        let merged = merge_contexts(&self.context, micro)?;
        if !clause
            .variable_types()
            .keys()
            .all(|name| merged.contains_key(name))
        {
            return None;
        }
        let narrowed = clause.substitute(std::slice::from_ref(&merged));
        if narrowed.matches(fact).is_empty() {
            return None;
        }
        let mut justification = self.justification.clone();
        justification.insert(fact.clone());
        Some(Solution {
            context: merged,
            justification,
        })
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bindings: Vec<String> = self
            .context
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        write!(f, "{{{}}}", bindings.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{is, var};
    use crate::schema::{Attribute, Cardinality};
    use crate::value::{Ordinal, OrdinalType};

    fn schema() -> AttributeSchema {
        AttributeSchema::new([
            Attribute::string("child_of", Cardinality::Many),
            Attribute::string("gender", Cardinality::One),
            Attribute::int("age", Cardinality::One),
        ])
    }

    #[test]
    fn test_predicate_unifies_variable_types() {
        let predicate = Predicate::from_patterns(
            &schema(),
            [
                (var("child"), "child_of", var("parent")),
                (var("child"), "age", var("years")),
            ],
        )
        .expect("well-typed predicate");
        assert_eq!(
            predicate.var_types().get("child"),
            Some(&OrdinalType::String)
        );
        assert_eq!(predicate.var_types().get("years"), Some(&OrdinalType::Int));
        assert!(!predicate.is_planned());
    }

    #[test]
    fn test_predicate_reports_every_conflict_at_once() {
        // ?x is used as a string entity and an int value, ?g as an int
        // value and a string value
        let err = Predicate::from_patterns(
            &schema(),
            [
                (var("x"), "age", var("g")),
                (var("y"), "gender", var("g")),
                (var("y"), "age", var("x")),
            ],
        )
        .unwrap_err();
        match err {
            Error::TypeMismatch(conflicts) => {
                assert!(conflicts.contains_key("x"));
                assert!(conflicts.contains_key("g"));
            }
            other => panic!("expected TypeMismatch, got {other}"),
        }
    }

    #[test]
    fn test_identity_join() {
        let sch = schema();
        let clause = Clause::from_pattern(
            &sch,
            &(var("child"), "child_of", var("parent")).into(),
        )
        .expect("well-typed");
        let fact = Fact::new("brother", "child_of", "father");
        let micro = &clause.matches(&fact)[0];

        let joined = Solution::identity()
            .join(&clause, &fact, micro)
            .expect("identity joins with anything");
        assert_eq!(
            joined.context.get("child"),
            Some(&Ordinal::from("brother"))
        );
        assert_eq!(joined.justification.len(), 1);
    }

    #[test]
    fn test_join_rejects_reused_facts() {
        let sch = schema();
        let clause = Clause::from_pattern(
            &sch,
            &(var("b"), "child_of", var("p")).into(),
        )
        .expect("well-typed");
        let fact = Fact::new("brother", "child_of", "father");

        let sol = Solution::new(
            [("a".to_string(), Ordinal::from("brother"))].into_iter().collect(),
            [fact.clone()].into_iter().collect(),
        );
        let micro = &clause.matches(&fact)[0];
        assert_eq!(sol.join(&clause, &fact, micro), None);
    }

    #[test]
    fn test_join_rejects_conflicting_contexts() {
        let sch = schema();
        let clause = Clause::from_pattern(
            &sch,
            &(var("b"), "child_of", var("p")).into(),
        )
        .expect("well-typed");
        let fact = Fact::new("sister", "child_of", "mother");
        let micro = &clause.matches(&fact)[0];

        let sol = Solution::new(
            [("p".to_string(), Ordinal::from("father"))].into_iter().collect(),
            [Fact::new("brother", "child_of", "father")].into_iter().collect(),
        );
        assert_eq!(sol.join(&clause, &fact, micro), None);
    }

    #[test]
    fn test_join_reapplies_relaxed_guards() {
        let sch = schema();
        // ?cold < ?warm over the value side
        let clause = Clause::from_pattern(
            &sch,
            &(var("place"), "age", var("cold").lt_var("warm")).into(),
        )
        .expect("well-typed");
        let fact = Fact::new("winterfell", "age", 10i64);

        let warm_sol = Solution::new(
            [("warm".to_string(), Ordinal::from(34i64))].into_iter().collect(),
            [Fact::new("tropic", "age", 34i64)].into_iter().collect(),
        );
        let cold_micro: Context = [
            ("place".to_string(), Ordinal::from("winterfell")),
            ("cold".to_string(), Ordinal::from(10i64)),
        ]
        .into_iter()
        .collect();
        let joined = warm_sol
            .join(&clause, &fact, &cold_micro)
            .expect("10 < 34 holds");
        assert_eq!(joined.context.get("cold"), Some(&Ordinal::from(10i64)));

        let too_warm = Solution::new(
            [("warm".to_string(), Ordinal::from(5i64))].into_iter().collect(),
            [Fact::new("desert", "age", 5i64)].into_iter().collect(),
        );
        assert_eq!(too_warm.join(&clause, &fact, &cold_micro), None);
    }

    #[test]
    fn test_join_requires_all_clause_variables_bound() {
        let sch = schema();
        let clause = Clause::from_pattern(
            &sch,
            &(var("place"), "age", var("cold").lt_var("warm")).into(),
        )
        .expect("well-typed");
        let fact = Fact::new("winterfell", "age", 10i64);
        // a micro-binding for the warm side alone leaves ?cold dangling
        let partial: Context = [
            ("place".to_string(), Ordinal::from("winterfell")),
            ("warm".to_string(), Ordinal::from(10i64)),
        ]
        .into_iter()
        .collect();
        assert_eq!(Solution::identity().join(&clause, &fact, &partial), None);
    }

    #[test]
    fn test_ground_query_yields_the_empty_binding() {
        let sch = schema();
        let clause =
            Clause::from_pattern(&sch, &(is("juan"), "child_of", is("perico")).into())
                .expect("well-typed");
        let fact = Fact::new("juan", "child_of", "perico");
        let micro = &clause.matches(&fact)[0];
        let joined = Solution::identity().join(&clause, &fact, micro).expect("match");
        assert!(joined.context.is_empty());
        assert_eq!(joined.justification.len(), 1);
    }
}
