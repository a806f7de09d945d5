//! # Fact Store Contract
//!
//! The engine consumes storage through the [`FactStore`] trait: an
//! append-only bitemporal fact log plus the justification relation the
//! truth-maintenance bookkeeping lives in. Facts are never updated in
//! place; removal marks the row with the removing transaction, and
//! as-of reads reconstruct the state at any past transaction.
//!
//! [`memory::MemoryStore`] is the reference implementation; a
//! relational adapter only needs to honor this contract (lookups may
//! over-approximate, since the evaluator re-filters every candidate).

pub mod error;
pub mod memory;

pub use error::{StoreError, StoreResult};

use crate::clause::Clause;
use crate::rules::RuleId;
use crate::value::Fact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transaction identifier. Ids are allocated in time order.
pub type TxId = u64;

/// Storage-assigned fact row identifier.
pub type FactId = u64;

/// A committed transaction: id plus wall-clock timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub id: TxId,
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time selector for historical reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsOf {
    /// The state right after the given transaction committed.
    Tx(TxId),
    /// The state at the last transaction whose timestamp is at or
    /// before the instant.
    Timestamp(DateTime<Utc>),
}

/// Result of appending one fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    pub id: FactId,
    pub fact: Fact,
    /// False when an identical fact was already valid and the append
    /// deduplicated against it.
    pub created: bool,
}

/// One way a derived fact was produced: the rule plus the hash of the
/// exact support set. The same fact may be justified many times.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JustificationRow {
    pub derived: Fact,
    pub derived_hash: String,
    pub rule_id: RuleId,
    pub justification_hash: String,
}

impl JustificationRow {
    /// The deduplication key for this row.
    pub fn key(&self) -> JustificationKey {
        JustificationKey {
            rule_id: self.rule_id.clone(),
            justification_hash: self.justification_hash.clone(),
            derived_hash: self.derived_hash.clone(),
        }
    }
}

/// Unique key of a justification row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JustificationKey {
    pub rule_id: RuleId,
    pub justification_hash: String,
    pub derived_hash: String,
}

/// Read access to valid facts. Implemented both by stores (valid-now)
/// and by as-of views.
pub trait Lookup {
    /// Every visible fact with the clause's attribute whose entity and
    /// value satisfy the clause expressions. Over-approximation is
    /// allowed; the evaluator re-filters.
    fn lookup(&self, clause: &Clause) -> StoreResult<Vec<Fact>>;
}

/// The transactional storage contract the engine writes through.
pub trait FactStore: Lookup {
    /// Open a transaction. The store serializes writers: at most one
    /// transaction is open at a time.
    fn begin(&mut self) -> StoreResult<TxRecord>;

    /// Commit an open transaction.
    fn commit(&mut self, tx: TxId) -> StoreResult<()>;

    /// Roll back an open transaction, undoing its appends, removals
    /// and justification changes.
    fn rollback(&mut self, tx: TxId) -> StoreResult<()>;

    /// Append facts. Idempotent against currently-valid rows: an
    /// identical valid fact reports `created = false`.
    fn append(&mut self, facts: &[(Fact, bool)], tx: TxId) -> StoreResult<Vec<AppendOutcome>>;

    /// Append justification rows, deduplicating on the row key.
    fn append_justifications(
        &mut self,
        rows: &[JustificationRow],
        tx: TxId,
    ) -> StoreResult<()>;

    /// Mark currently-valid facts as removed by `tx`.
    fn mark_removed(&mut self, facts: &[Fact], tx: TxId) -> StoreResult<()>;

    /// Delete justification rows by key.
    fn delete_justifications(&mut self, keys: &[JustificationKey]) -> StoreResult<()>;

    /// Delete every justification row whose rule id is not listed.
    fn retain_justification_rules(&mut self, rule_ids: &[RuleId]) -> StoreResult<()>;

    /// Number of justification rows supporting a fact.
    fn count_justifications_for(&self, fact: &Fact) -> StoreResult<usize>;

    /// Currently-valid inferred facts with no supporting row left.
    fn unsupported_inferred_facts(&self) -> StoreResult<Vec<Fact>>;

    /// Whether a currently-valid fact is inferred. `None` when the
    /// fact is not valid now.
    fn is_inferred(&self, fact: &Fact) -> StoreResult<Option<bool>>;

    /// Every currently-valid fact.
    fn valid_facts(&self) -> StoreResult<Vec<Fact>>;

    /// Lookup against the state as of a past transaction.
    fn lookup_as_of(&self, clause: &Clause, tx: TxId) -> StoreResult<Vec<Fact>>;

    /// Resolve a point-in-time selector to a transaction id. `None`
    /// means no transaction existed yet, i.e. the view is empty.
    fn resolve_as_of(&self, as_of: &AsOf) -> StoreResult<Option<TxId>>;
}

/// Read-only view of a store at a past transaction.
pub struct AsOfView<'a, S: FactStore> {
    store: &'a S,
    tx: TxId,
}

impl<'a, S: FactStore> AsOfView<'a, S> {
    /// View the store as of the given transaction.
    pub fn new(store: &'a S, tx: TxId) -> Self {
        AsOfView { store, tx }
    }
}

impl<S: FactStore> Lookup for AsOfView<'_, S> {
    fn lookup(&self, clause: &Clause) -> StoreResult<Vec<Fact>> {
        self.store.lookup_as_of(clause, self.tx)
    }
}
