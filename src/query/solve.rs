//! # Query Evaluator
//!
//! Nested-loop join driven by the planner's clause order. Each step
//! narrows the next clause with the contexts accumulated so far, asks
//! the lookup source for candidate facts, matches the candidates
//! against the clause *as written* (so cross-clause variable equality
//! is re-checked), and joins the micro-bindings into the running
//! solution set.
//!
//! The lookup source may over-approximate; `Solution::join` re-filters
//! every candidate. A clause narrowed to an unsatisfiable expression
//! short-circuits the whole conjunction.

use crate::error::Result;
use crate::expr::Context;
use crate::query::{Predicate, Solution};
use crate::store::Lookup;

/// Evaluate a predicate against a lookup source, starting from the
/// given solutions (usually just the identity). The result is
/// set-semantic: duplicates are removed and order is not meaningful.
pub fn solve(
    source: &impl Lookup,
    predicate: &Predicate,
    seeds: Vec<Solution>,
) -> Result<Vec<Solution>> {
    let mut solutions = seeds;
    for clause in predicate.clauses() {
        if solutions.is_empty() {
            return Ok(solutions);
        }
        let contexts: Vec<Context> =
            solutions.iter().map(|s| s.context.clone()).collect();
        let narrowed = clause.substitute(&contexts);
        if narrowed.is_dead() {
            return Ok(vec![]);
        }
        let candidates = source.lookup(&narrowed)?;
        let mut merged = Vec::new();
        for fact in &candidates {
            for micro in clause.matches(fact) {
                for solution in &solutions {
                    if let Some(joined) = solution.join(clause, fact, &micro) {
                        merged.push(joined);
                    }
                }
            }
        }
        merged.sort_unstable();
        merged.dedup();
        solutions = merged;
    }
    Ok(solutions)
}
