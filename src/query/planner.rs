//! # Query Planner
//!
//! Orders the clauses of a predicate so the nested-loop evaluator
//! always executes the most-bound clause first. Planning is greedy and
//! deterministic:
//!
//! 1. Narrow every clause with the already-known bindings.
//! 2. A clause is ready when each side has at most one free variable.
//! 3. Ready clauses are scored by the sum of their free-variable
//!    weights: a named variable costs 1, a wildcard 10 (its fanout is
//!    the whole attribute partition). Lowest score wins; ties keep the
//!    input order.
//! 4. The winner's variables count as bound for the remaining rounds.
//!
//! The planner never touches the store. When no remaining clause is
//! ready the predicate cannot be scheduled and planning fails.

use crate::clause::Clause;
use crate::error::{Error, Result};
use crate::expr::Context;
use crate::query::Predicate;
use std::collections::BTreeSet;

/// Reorder a predicate's clauses for evaluation given already-known
/// bindings. Returns a predicate marked as planned.
pub fn plan(predicate: &Predicate, contexts: &[Context]) -> Result<Predicate> {
    let originals = predicate.clauses();
    let working: Vec<Clause> =
        originals.iter().map(|c| c.substitute(contexts)).collect();
    let mut scheduled = vec![false; originals.len()];
    let mut solved: BTreeSet<String> = BTreeSet::new();
    let mut ordered = Vec::with_capacity(originals.len());

    while ordered.len() < originals.len() {
        let mut best: Option<(usize, u32)> = None;
        for (index, clause) in working.iter().enumerate() {
            if scheduled[index] {
                continue;
            }
            let Some(score) = readiness_score(clause, &solved) else {
                continue;
            };
            if best.map_or(true, |(_, best_score)| score < best_score) {
                best = Some((index, score));
            }
        }
        let Some((index, _)) = best else {
            let stuck: Vec<Clause> = working
                .iter()
                .zip(&scheduled)
                .filter(|(_, done)| !**done)
                .map(|(clause, _)| clause.clone())
                .collect();
            return Err(Error::UnsolvablePredicate(stuck));
        };
        scheduled[index] = true;
        let (left, right) = working[index].free_vars();
        solved.extend(left);
        solved.extend(right);
        ordered.push(originals[index].clone());
    }

    Ok(Predicate::with_order(ordered, predicate.var_types().clone()))
}

/// Score a clause against the solved set, or `None` when it is not
/// ready (more than one unbound variable on either side).
fn readiness_score(clause: &Clause, solved: &BTreeSet<String>) -> Option<u32> {
    let (left, right) = clause.free_vars();
    let left_free: Vec<&String> = left.iter().filter(|v| !solved.contains(*v)).collect();
    let right_free: Vec<&String> =
        right.iter().filter(|v| !solved.contains(*v)).collect();
    if left_free.len() > 1 || right_free.len() > 1 {
        return None;
    }
    let vars = u32::try_from(left_free.len() + right_free.len()).unwrap_or(u32::MAX);
    let wildcards = clause.entity.wildcards() + clause.value.wildcards();
    Some(vars + 10 * wildcards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Context;
    use crate::pattern::{any, is, var};
    use crate::schema::{Attribute, AttributeSchema, Cardinality};
    use crate::value::Ordinal;

    fn schema() -> AttributeSchema {
        AttributeSchema::new([
            Attribute::string("child_of", Cardinality::Many),
            Attribute::string("gender", Cardinality::One),
            Attribute::int("age", Cardinality::One),
        ])
    }

    fn predicate(
        patterns: impl IntoIterator<Item = (crate::pattern::Pattern, &'static str, crate::pattern::Pattern)>,
    ) -> Predicate {
        Predicate::from_patterns(&schema(), patterns).expect("well-typed predicate")
    }

    #[test]
    fn test_most_bound_clause_goes_first() {
        let p = predicate([
            (var("sibling"), "child_of", var("parent")),
            (is("juan"), "child_of", var("parent")),
        ]);
        let planned = plan(&p, &[]).expect("plannable");
        assert!(planned.is_planned());
        assert_eq!(planned.clauses()[0], p.clauses()[1]);
        assert_eq!(planned.clauses()[1], p.clauses()[0]);
    }

    #[test]
    fn test_known_bindings_change_the_order() {
        let p = predicate([
            (var("grandchild"), "child_of", var("parent")),
            (var("parent"), "child_of", var("grandparent")),
        ]);
        let contexts: Vec<Context> = vec![[(
            "grandparent".to_string(),
            Ordinal::from("emilio"),
        )]
        .into_iter()
        .collect()];
        let planned = plan(&p, &contexts).expect("plannable");
        // with the grandparent known, the second clause is cheaper
        assert_eq!(planned.clauses()[0], p.clauses()[1]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let p = predicate([
            (var("a"), "child_of", var("p")),
            (var("b"), "child_of", var("p")),
        ]);
        let planned = plan(&p, &[]).expect("plannable");
        assert_eq!(planned.clauses(), p.clauses());
    }

    #[test]
    fn test_wildcards_are_expensive() {
        let p = predicate([
            (any(), "gender", var("g")),
            (var("person"), "gender", var("g")),
        ]);
        let planned = plan(&p, &[]).expect("plannable");
        // the named-variable clause scores 2, the wildcard clause 11
        assert_eq!(planned.clauses()[0], p.clauses()[1]);
    }

    #[test]
    fn test_unsolvable_predicate_is_rejected() {
        // both value-side variables stay free in every clause
        let p = predicate([(var("place"), "age", var("cold").lt_var("warm"))]);
        let err = plan(&p, &[]).unwrap_err();
        assert!(matches!(err, Error::UnsolvablePredicate(clauses) if clauses.len() == 1));
    }

    #[test]
    fn test_comparison_clause_becomes_ready_once_one_side_is_bound() {
        let p = predicate([
            (var("warm_place"), "age", var("warm")),
            (var("cold_place"), "age", var("cold").lt_var("warm")),
        ]);
        let planned = plan(&p, &[]).expect("plannable");
        assert_eq!(planned.clauses()[0], p.clauses()[0]);
        assert_eq!(planned.clauses()[1], p.clauses()[1]);
    }

    #[test]
    fn test_planning_is_pure() {
        let p = predicate([
            (var("sibling"), "child_of", var("parent")),
            (is("juan"), "child_of", var("parent")),
        ]);
        let before = p.clone();
        let _ = plan(&p, &[]).expect("plannable");
        assert_eq!(p, before);
    }
}
