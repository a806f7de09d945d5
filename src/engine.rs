//! # Knowledge Base Engine
//!
//! The public entry point: assert and retract facts, query the
//! closure, and keep derived facts consistent as the base changes.
//!
//! Every write runs inside one store transaction:
//!
//! 1. cardinality-one conflicts are superseded (a cascading removal
//!    in the same transaction);
//! 2. the batch is appended;
//! 3. rule saturation derives the closure of the new facts, recording
//!    a justification row for every way a fact was derived;
//! 4. derived facts whose support vanished are collected;
//! 5. the transaction commits, or rolls back on any error.
//!
//! Retraction rejects derived facts, deletes the justification rows
//! the retracted facts supported, and cascades into derived facts
//! left without support.

use crate::clause::Clause;
use crate::config::EngineConfig;
use crate::error::{Error, Result, TypeConflicts};
use crate::expr::{Context, Expr};
use crate::pattern::TriplePattern;
use crate::query::planner::plan;
use crate::query::solve::solve as evaluate;
use crate::query::{Predicate, Solution};
use crate::rules::{Derivation, Rule, RuleId};
use crate::schema::{AttributeSchema, Cardinality};
use crate::store::memory::MemoryStore;
use crate::store::{
    AsOf, AsOfView, FactStore, JustificationKey, JustificationRow, Lookup, TxId,
};
use crate::value::{Fact, Ordinal};
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, info, trace};

/// An EAV knowledge base over a fact store, with forward-chaining
/// inference and truth maintenance.
pub struct KnowledgeBase<S: FactStore> {
    schema: AttributeSchema,
    rules: Vec<Rule>,
    store: S,
    config: EngineConfig,
}

impl KnowledgeBase<MemoryStore> {
    /// A knowledge base over the in-memory reference store.
    pub fn in_memory(schema: AttributeSchema, rules: Vec<Rule>) -> Self {
        KnowledgeBase::new(schema, rules, MemoryStore::new())
    }
}

impl<S: FactStore> KnowledgeBase<S> {
    /// Build an engine with the default configuration. The schema and
    /// compiled rule set are fixed for the engine's lifetime.
    pub fn new(schema: AttributeSchema, rules: Vec<Rule>, store: S) -> Self {
        KnowledgeBase::with_config(schema, rules, store, EngineConfig::default())
    }

    /// Build an engine with an explicit configuration.
    pub fn with_config(
        schema: AttributeSchema,
        rules: Vec<Rule>,
        store: S,
        config: EngineConfig,
    ) -> Self {
        KnowledgeBase {
            schema,
            rules,
            store,
            config,
        }
    }

    /// The attribute schema.
    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// The compiled rule set.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the engine and hand back its store, e.g. to rebuild the
    /// engine with a different rule set over the same facts.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Assert one fact. Convenience for [`Self::bulk_add`].
    pub fn add(&mut self, fact: impl Into<Fact>) -> Result<TxId> {
        self.bulk_add([fact.into()])
    }

    /// Assert a batch of facts in one transaction: supersede
    /// cardinality-one conflicts, append, saturate the rules, and
    /// commit. Returns the transaction id.
    pub fn bulk_add<I>(&mut self, facts: I) -> Result<TxId>
    where
        I: IntoIterator,
        I::Item: Into<Fact>,
    {
        let facts: Vec<Fact> = facts.into_iter().map(Into::into).collect();
        for fact in &facts {
            self.validate_fact(fact)?;
        }
        let tx = self.store.begin()?.id;
        match self.apply_add(&facts, tx) {
            Ok(()) => {
                self.store.commit(tx)?;
                Ok(tx)
            }
            Err(error) => Err(self.abort(tx, error)),
        }
    }

    /// Assert a batch inside an enclosing transaction. The caller owns
    /// commit and rollback.
    pub fn bulk_add_tx<I>(&mut self, facts: I, tx: TxId) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Fact>,
    {
        let facts: Vec<Fact> = facts.into_iter().map(Into::into).collect();
        for fact in &facts {
            self.validate_fact(fact)?;
        }
        self.apply_add(&facts, tx)
    }

    /// Retract one base fact. Convenience for [`Self::bulk_remove`].
    pub fn remove(&mut self, fact: impl Into<Fact>) -> Result<TxId> {
        self.bulk_remove([fact.into()])
    }

    /// Retract a batch of base facts, cascading into derived facts
    /// whose support vanishes. Fails with `CannotRetractDerived` when
    /// any requested fact was produced by a rule; facts that are not
    /// currently valid are ignored.
    pub fn bulk_remove<I>(&mut self, facts: I) -> Result<TxId>
    where
        I: IntoIterator,
        I::Item: Into<Fact>,
    {
        let facts: Vec<Fact> = facts.into_iter().map(Into::into).collect();
        let mut present = Vec::new();
        for fact in facts {
            match self.store.is_inferred(&fact)? {
                Some(true) => return Err(Error::CannotRetractDerived(fact)),
                Some(false) => present.push(fact),
                None => {}
            }
        }
        let tx = self.store.begin()?.id;
        let outcome = self
            .cascade_remove(present, tx)
            .and_then(|()| self.sweep(tx));
        match outcome {
            Ok(()) => {
                self.store.commit(tx)?;
                Ok(tx)
            }
            Err(error) => Err(self.abort(tx, error)),
        }
    }

    /// Solve a query against the currently-valid facts, returning the
    /// set of variable bindings.
    pub fn solve<Q>(&self, query: Q) -> Result<BTreeSet<Context>>
    where
        Q: IntoIterator,
        Q::Item: Into<TriplePattern>,
    {
        Ok(self
            .explain_solutions(query)?
            .into_iter()
            .map(|solution| solution.context)
            .collect())
    }

    /// Solve a query against the facts visible at a past transaction
    /// or instant.
    pub fn solve_as_of<Q>(&self, query: Q, as_of: AsOf) -> Result<BTreeSet<Context>>
    where
        Q: IntoIterator,
        Q::Item: Into<TriplePattern>,
    {
        Ok(self
            .explain_solutions_as_of(query, as_of)?
            .into_iter()
            .map(|solution| solution.context)
            .collect())
    }

    /// Solve a query, returning every binding together with the exact
    /// stored facts that justify it.
    pub fn explain_solutions<Q>(&self, query: Q) -> Result<BTreeSet<Solution>>
    where
        Q: IntoIterator,
        Q::Item: Into<TriplePattern>,
    {
        let planned = self.prepare(query)?;
        let solutions = evaluate(&self.store, &planned, vec![Solution::identity()])?;
        Ok(solutions.into_iter().collect())
    }

    /// [`Self::explain_solutions`] against a past state.
    pub fn explain_solutions_as_of<Q>(
        &self,
        query: Q,
        as_of: AsOf,
    ) -> Result<BTreeSet<Solution>>
    where
        Q: IntoIterator,
        Q::Item: Into<TriplePattern>,
    {
        let planned = self.prepare(query)?;
        let Some(tx) = self.store.resolve_as_of(&as_of)? else {
            return Ok(BTreeSet::new());
        };
        let view = AsOfView::new(&self.store, tx);
        let solutions = evaluate(&view, &planned, vec![Solution::identity()])?;
        Ok(solutions.into_iter().collect())
    }

    /// Reconcile derived facts after the rule set changed between
    /// process lifetimes: drop justifications of retired rules,
    /// collect the facts they supported, and re-run the current rules
    /// over the whole store.
    pub fn refresh_inference(&mut self) -> Result<TxId> {
        let tx = self.store.begin()?.id;
        match self.apply_refresh(tx) {
            Ok(()) => {
                self.store.commit(tx)?;
                info!(tx, rules = self.rules.len(), "inference refreshed");
                Ok(tx)
            }
            Err(error) => Err(self.abort(tx, error)),
        }
    }

    fn prepare<Q>(&self, query: Q) -> Result<Predicate>
    where
        Q: IntoIterator,
        Q::Item: Into<TriplePattern>,
    {
        let predicate = Predicate::from_patterns(&self.schema, query)?;
        plan(&predicate, &[])
    }

    fn validate_fact(&self, fact: &Fact) -> Result<()> {
        let attribute = self.schema.require(&fact.attr)?;
        let found = fact.value.ordinal_type();
        if found != attribute.data_type {
            let mut conflicts = TypeConflicts::new();
            let entry = conflicts.entry(fact.attr.clone()).or_default();
            entry.insert(attribute.data_type);
            entry.insert(found);
            return Err(Error::TypeMismatch(conflicts));
        }
        Ok(())
    }

    fn abort(&mut self, tx: TxId, error: Error) -> Error {
        if let Err(rollback_error) = self.store.rollback(tx) {
            tracing::error!(tx, %rollback_error, "rollback failed");
        }
        error
    }

    fn apply_add(&mut self, facts: &[Fact], tx: TxId) -> Result<()> {
        let batch = self.dedupe_cardinality_one(facts)?;
        self.supersede(&batch, tx)?;
        let pairs: Vec<(Fact, bool)> =
            batch.iter().map(|fact| (fact.clone(), false)).collect();
        let outcomes = self.store.append(&pairs, tx)?;
        let created: Vec<Fact> = outcomes
            .into_iter()
            .filter(|outcome| outcome.created)
            .map(|outcome| outcome.fact)
            .collect();
        debug!(tx, asserted = created.len(), "base facts appended");
        self.saturate(created, tx)?;
        self.sweep(tx)
    }

    fn apply_refresh(&mut self, tx: TxId) -> Result<()> {
        let ids: Vec<RuleId> = self.rules.iter().map(|rule| rule.id().clone()).collect();
        self.store.retain_justification_rules(&ids)?;
        self.sweep(tx)?;
        let mut derivations = Vec::new();
        for rule in &self.rules {
            derivations.extend(rule.run_full(&self.store, self.config.strict_heads)?);
        }
        let created = self.apply_derivations(&derivations, tx)?;
        self.saturate(created, tx)?;
        self.sweep(tx)
    }

    /// Keep the last assertion per `(entity, attribute)` pair for
    /// cardinality-one attributes, and drop exact duplicates.
    fn dedupe_cardinality_one(&self, facts: &[Fact]) -> Result<Vec<Fact>> {
        let mut batch: Vec<Fact> = Vec::with_capacity(facts.len());
        for fact in facts {
            let attribute = self.schema.require(&fact.attr)?;
            if attribute.cardinality == Cardinality::One {
                batch.retain(|prev| {
                    !(prev.entity == fact.entity && prev.attr == fact.attr)
                });
            } else if batch.contains(fact) {
                continue;
            }
            batch.push(fact.clone());
        }
        Ok(batch)
    }

    /// Remove the currently-valid value of every cardinality-one
    /// `(entity, attribute)` pair the batch is about to overwrite.
    fn supersede(&mut self, facts: &[Fact], tx: TxId) -> Result<()> {
        let mut superseded = Vec::new();
        for fact in facts {
            let attribute = self.schema.require(&fact.attr)?;
            if attribute.cardinality != Cardinality::One {
                continue;
            }
            let current = Clause::new(
                Expr::Const(Ordinal::String(fact.entity.clone())),
                fact.attr.clone(),
                Expr::Any {
                    data_type: attribute.data_type,
                },
            );
            for existing in self.store.lookup(&current)? {
                if existing.value != fact.value {
                    superseded.push(existing);
                }
            }
        }
        if !superseded.is_empty() {
            debug!(tx, count = superseded.len(), "superseding prior values");
            self.cascade_remove(superseded, tx)?;
        }
        Ok(())
    }

    /// Run the rules to a fixed point, seeding each round with the
    /// facts the previous round actually added.
    fn saturate(&mut self, seed: Vec<Fact>, tx: TxId) -> Result<()> {
        let mut frontier = seed;
        let mut rounds: u64 = 0;
        while !frontier.is_empty() {
            rounds += 1;
            let limit = self.config.max_saturation_rounds;
            if limit > 0 && rounds > limit {
                return Err(Error::SaturationLimit { rounds: limit });
            }
            let mut derivations = Vec::new();
            for fact in &frontier {
                derivations.extend(self.derive_from(fact)?);
            }
            frontier = self.apply_derivations(&derivations, tx)?;
            trace!(tx, round = rounds, derived = frontier.len(), "saturation round");
        }
        Ok(())
    }

    /// Every derivation an incoming fact enables against the current
    /// store, across all rules.
    fn derive_from(&self, fact: &Fact) -> Result<Vec<Derivation>> {
        let mut derivations = Vec::new();
        for rule in &self.rules {
            for specialized in rule.matches(fact)? {
                derivations
                    .extend(specialized.run(&self.store, self.config.strict_heads)?);
            }
        }
        Ok(derivations)
    }

    /// Append derived facts and their justification rows; returns the
    /// facts that were actually new.
    fn apply_derivations(
        &mut self,
        derivations: &[Derivation],
        tx: TxId,
    ) -> Result<Vec<Fact>> {
        if derivations.is_empty() {
            return Ok(vec![]);
        }
        let distinct: Vec<Fact> = derivations
            .iter()
            .map(|d| d.fact.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let batch = self.dedupe_cardinality_one(&distinct)?;
        self.supersede(&batch, tx)?;
        let kept: BTreeSet<&Fact> = batch.iter().collect();
        let pairs: Vec<(Fact, bool)> =
            batch.iter().map(|fact| (fact.clone(), true)).collect();
        let outcomes = self.store.append(&pairs, tx)?;
        let rows: Vec<JustificationRow> = derivations
            .iter()
            .filter(|d| kept.contains(&d.fact))
            .map(Derivation::row)
            .collect();
        self.store.append_justifications(&rows, tx)?;
        Ok(outcomes
            .into_iter()
            .filter(|outcome| outcome.created)
            .map(|outcome| outcome.fact)
            .collect())
    }

    /// Remove facts and everything that only they supported. Each fact
    /// is processed while still visible: the justification rows it
    /// participates in are recomputed, deleted, and any derived fact
    /// left without support joins the queue.
    fn cascade_remove(&mut self, seeds: Vec<Fact>, tx: TxId) -> Result<()> {
        let mut queue: VecDeque<Fact> = seeds.into();
        let mut processed: BTreeSet<Fact> = BTreeSet::new();
        while let Some(fact) = queue.pop_front() {
            if !processed.insert(fact.clone()) {
                continue;
            }
            let derivations = self.derive_from(&fact)?;
            let keys: Vec<JustificationKey> =
                derivations.iter().map(|d| d.row().key()).collect();
            self.store.delete_justifications(&keys)?;
            self.store.mark_removed(std::slice::from_ref(&fact), tx)?;
            let affected: BTreeSet<Fact> =
                derivations.into_iter().map(|d| d.fact).collect();
            for derived in affected {
                if self.store.count_justifications_for(&derived)? == 0
                    && self.store.is_inferred(&derived)? == Some(true)
                {
                    queue.push_back(derived);
                }
            }
        }
        if !processed.is_empty() {
            debug!(tx, removed = processed.len(), "facts removed");
        }
        Ok(())
    }

    /// Collect derived facts whose last justification disappeared.
    fn sweep(&mut self, tx: TxId) -> Result<()> {
        let orphans = self.store.unsupported_inferred_facts()?;
        if orphans.is_empty() {
            return Ok(());
        }
        debug!(tx, count = orphans.len(), "collecting unsupported derived facts");
        self.cascade_remove(orphans, tx)
    }
}
