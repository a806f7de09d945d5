//! # Inference Rules
//!
//! A rule pairs a body predicate (the premise) with a head predicate
//! (the conclusions). Compilation validates the declaration against
//! the schema: every head variable must be bound by the body, head
//! clauses may only use literals and variables, and body and head must
//! share one consistent type environment. The rule id is a content
//! hash of the rule's printable form, stable across processes, and is
//! what justification rows reference.
//!
//! Matching an incoming fact against a rule produces *specialized*
//! rules: the remaining body narrowed by the micro-binding, seeded
//! with a solution that already carries the fact as justification.
//! Running a specialized rule evaluates its body as a query and
//! instantiates the head clauses for every solution found.

pub mod catalog;

use crate::clause::Clause;
use crate::error::{Error, Result};
use crate::hash::{content_hash, fact_hash, fact_set_hash};
use crate::pattern::TriplePattern;
use crate::query::planner::plan;
use crate::query::solve::solve;
use crate::query::{Predicate, Solution};
use crate::schema::AttributeSchema;
use crate::store::{JustificationRow, Lookup};
use crate::value::Fact;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable identifier of a compiled rule: 128-bit content hash of its
/// printable form, in hex.
pub type RuleId = String;

/// A rule as declared by the user: premise and conclusion patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDecl {
    pub name: String,
    /// Premise: the conjunction the rule matches against stored facts.
    pub when: Vec<TriplePattern>,
    /// Conclusions derived for every premise solution.
    pub then: Vec<TriplePattern>,
}

impl RuleDecl {
    /// Declare a rule from premise and conclusion triples.
    pub fn new<W, T>(name: impl Into<String>, when: W, then: T) -> Self
    where
        W: IntoIterator,
        W::Item: Into<TriplePattern>,
        T: IntoIterator,
        T::Item: Into<TriplePattern>,
    {
        RuleDecl {
            name: name.into(),
            when: when.into_iter().map(Into::into).collect(),
            then: then.into_iter().map(Into::into).collect(),
        }
    }
}

/// A compiled, validated rule with a planned body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    name: String,
    id: RuleId,
    body: Predicate,
    head: Predicate,
    /// Printable form the id was computed from.
    canonical: String,
}

impl Rule {
    /// Compile and validate one declaration against the schema.
    pub fn compile(schema: &AttributeSchema, decl: &RuleDecl) -> Result<Rule> {
        let in_rule = |source: Error| Error::RuleInvalid {
            rule: decl.name.clone(),
            source: Box::new(source),
        };

        let body =
            Predicate::from_patterns(schema, decl.when.iter().cloned()).map_err(in_rule)?;
        let head =
            Predicate::from_patterns(schema, decl.then.iter().cloned()).map_err(in_rule)?;

        let mut reasons = Vec::new();
        if body.is_empty() {
            reasons.push("the premise is empty".to_string());
        }
        if head.is_empty() {
            reasons.push("the conclusion is empty".to_string());
        }
        for clause in head.clauses() {
            for expr in [&clause.entity, &clause.value] {
                if !matches!(
                    expr,
                    crate::expr::Expr::Const(_) | crate::expr::Expr::Var { .. }
                ) {
                    reasons.push(format!(
                        "conclusion {clause} may only use literals and variables"
                    ));
                }
            }
        }
        for name in head.var_types().keys() {
            if !body.var_types().contains_key(name) {
                reasons.push(format!(
                    "conclusion uses ?{name} which the premise never binds"
                ));
            }
        }
        if !reasons.is_empty() {
            return Err(Error::RuleHeadIllFormed {
                rule: decl.name.clone(),
                reasons,
            });
        }

        // one type environment across premise and conclusion
        let mut conflicts = crate::error::TypeConflicts::new();
        let mut env = body.var_types().clone();
        for (name, data_type) in head.var_types() {
            match env.get(name) {
                Some(known) if known != data_type => {
                    let entry = conflicts.entry(name.clone()).or_default();
                    entry.insert(*known);
                    entry.insert(*data_type);
                }
                _ => {
                    env.insert(name.clone(), *data_type);
                }
            }
        }
        if !conflicts.is_empty() {
            return Err(in_rule(Error::TypeMismatch(conflicts)));
        }

        let canonical = format!("rule {}: {} => {}", decl.name, body, head);
        let id = content_hash(&canonical);
        let body = plan(&body, &[]).map_err(in_rule)?;
        Ok(Rule {
            name: decl.name.clone(),
            id,
            body,
            head,
            canonical,
        })
    }

    /// The rule's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rule's stable content-hash id.
    pub fn id(&self) -> &RuleId {
        &self.id
    }

    /// The planned premise.
    pub fn body(&self) -> &Predicate {
        &self.body
    }

    /// The conclusion predicate.
    pub fn head(&self) -> &Predicate {
        &self.head
    }

    /// Specialize this rule for an incoming fact: one specialized rule
    /// per body clause the fact matches, with the remaining body
    /// narrowed by the micro-binding. A matched clause that still has
    /// free variables after narrowing is a constraint rather than a
    /// source: it becomes a guard, re-checked against the matched fact
    /// once the rest of the body has bound its variables.
    pub fn matches(&self, fact: &Fact) -> Result<Vec<SpecializedRule>> {
        let mut specialized = Vec::new();
        for (index, clause) in self.body.clauses().iter().enumerate() {
            for micro in clause.matches(fact) {
                let contexts = std::slice::from_ref(&micro);
                let remaining: Vec<Clause> = self
                    .body
                    .clauses()
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != index)
                    .map(|(_, c)| c.substitute(contexts))
                    .collect();
                let mut guards = Vec::new();
                let residual = clause.substitute(contexts);
                let (left, right) = residual.free_vars();
                if !left.is_empty() || !right.is_empty() {
                    guards.push(residual);
                }
                let body = Predicate::from_clauses(remaining)?;
                specialized.push(SpecializedRule {
                    rule_id: self.id.clone(),
                    rule_name: self.name.clone(),
                    body,
                    head: self.head.clone(),
                    guards,
                    matched: fact.clone(),
                    seed: Solution::new(
                        micro,
                        [fact.clone()].into_iter().collect(),
                    ),
                });
            }
        }
        Ok(specialized)
    }

    /// Evaluate the whole premise against a lookup source and derive
    /// every conclusion. Used when re-seeding inference from scratch.
    pub fn run_full(&self, source: &impl Lookup, strict: bool) -> Result<Vec<Derivation>> {
        let solutions = solve(source, &self.body, vec![Solution::identity()])?;
        instantiate_heads(&self.id, &self.name, &self.head, &solutions, strict)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

/// Compile a set of declarations, accumulating every error before
/// reporting.
pub fn compile_rules(schema: &AttributeSchema, decls: &[RuleDecl]) -> Result<Vec<Rule>> {
    let mut rules = Vec::with_capacity(decls.len());
    let mut errors = Vec::new();
    for decl in decls {
        match Rule::compile(schema, decl) {
            Ok(rule) => rules.push(rule),
            Err(error) => errors.push(error),
        }
    }
    if errors.is_empty() {
        Ok(rules)
    } else {
        Err(Error::InvalidRules(errors))
    }
}

/// A rule narrowed by one matched fact, ready to run as a query.
#[derive(Debug, Clone)]
pub struct SpecializedRule {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub body: Predicate,
    pub head: Predicate,
    /// Constraint clauses the matched fact satisfied only partially;
    /// re-checked against it per solution.
    pub guards: Vec<Clause>,
    /// The fact this specialization was built from.
    pub matched: Fact,
    pub seed: Solution,
}

impl SpecializedRule {
    /// Evaluate the remaining body from the seed solution, keep the
    /// solutions that pass every guard, and derive the head
    /// conclusions.
    pub fn run(&self, source: &impl Lookup, strict: bool) -> Result<Vec<Derivation>> {
        let planned = plan(&self.body, std::slice::from_ref(&self.seed.context))?;
        let solutions = solve(source, &planned, vec![self.seed.clone()])?;
        let admitted: Vec<Solution> = solutions
            .into_iter()
            .filter(|solution| self.passes_guards(solution))
            .collect();
        instantiate_heads(&self.rule_id, &self.rule_name, &self.head, &admitted, strict)
    }

    /// A solution passes a guard when the guard grounds completely
    /// under the solution's bindings and the matched fact still
    /// satisfies it. A guard left with free variables marks a branch
    /// that cannot bind the whole body; such solutions are dropped.
    fn passes_guards(&self, solution: &Solution) -> bool {
        self.guards.iter().all(|guard| {
            let grounded = guard.substitute(std::slice::from_ref(&solution.context));
            let (left, right) = grounded.free_vars();
            left.is_empty() && right.is_empty() && !grounded.matches(&self.matched).is_empty()
        })
    }
}

/// A derived fact together with the rule and support that produced it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Derivation {
    pub rule_id: RuleId,
    pub fact: Fact,
    pub support: BTreeSet<Fact>,
}

impl Derivation {
    /// The justification row recording this derivation.
    pub fn row(&self) -> JustificationRow {
        JustificationRow {
            derived: self.fact.clone(),
            derived_hash: fact_hash(&self.fact),
            rule_id: self.rule_id.clone(),
            justification_hash: fact_set_hash(&self.support),
        }
    }
}

fn instantiate_heads(
    rule_id: &RuleId,
    rule_name: &str,
    head: &Predicate,
    solutions: &[Solution],
    strict: bool,
) -> Result<Vec<Derivation>> {
    let mut derivations = Vec::new();
    for solution in solutions {
        for clause in head.clauses() {
            let grounded = clause.substitute(std::slice::from_ref(&solution.context));
            match grounded.as_fact() {
                Some(fact) => {
                    // a fact cannot justify itself; such a conclusion
                    // is already stored and the row would never let
                    // its support count reach zero
                    if solution.justification.contains(&fact) {
                        continue;
                    }
                    derivations.push(Derivation {
                        rule_id: rule_id.clone(),
                        fact,
                        support: solution.justification.clone(),
                    });
                }
                None => {
                    if strict {
                        return Err(Error::UngroundedDerivation {
                            rule: rule_name.to_string(),
                            clause: grounded.to_string(),
                        });
                    }
                    tracing::warn!(
                        rule = rule_name,
                        clause = %grounded,
                        "skipping unground conclusion"
                    );
                }
            }
        }
    }
    Ok(derivations)
}
