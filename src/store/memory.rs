//! # In-Memory Bitemporal Store
//!
//! Reference implementation of the [`FactStore`] contract. Facts live
//! in an append-only log; removal stamps the row with the removing
//! transaction, so any past state can be reconstructed. Writes are
//! serialized through a single open transaction whose effects can be
//! rolled back in full.

use crate::clause::Clause;
use crate::rules::RuleId;
use crate::store::{
    AppendOutcome, AsOf, FactStore, JustificationKey, JustificationRow, Lookup,
    StoreError, StoreResult, TxId, TxRecord,
};
use crate::value::Fact;
use chrono::Utc;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
struct StoredFact {
    id: u64,
    fact: Fact,
    is_inferred: bool,
    added_tx: TxId,
    removed_tx: Option<TxId>,
}

impl StoredFact {
    fn valid_now(&self) -> bool {
        self.removed_tx.is_none()
    }

    fn visible_at(&self, tx: TxId) -> bool {
        self.added_tx <= tx && self.removed_tx.map_or(true, |removed| removed > tx)
    }
}

#[derive(Debug, Clone)]
struct StoredRow {
    row: JustificationRow,
    added_tx: TxId,
}

/// Append-only fact log with justification rows and a transaction log.
#[derive(Debug, Default)]
pub struct MemoryStore {
    facts: Vec<StoredFact>,
    rows: Vec<StoredRow>,
    transactions: Vec<TxRecord>,
    open_tx: Option<TxId>,
    next_fact_id: u64,
    /// Rows deleted inside the open transaction, kept for rollback.
    stashed_rows: Vec<StoredRow>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Facts added and facts removed by a transaction, for inspecting
    /// the change log.
    pub fn tx_changes(&self, tx: TxId) -> (Vec<Fact>, Vec<Fact>) {
        let added = self
            .facts
            .iter()
            .filter(|f| f.added_tx == tx)
            .map(|f| f.fact.clone())
            .collect();
        let removed = self
            .facts
            .iter()
            .filter(|f| f.removed_tx == Some(tx))
            .map(|f| f.fact.clone())
            .collect();
        (added, removed)
    }

    /// The committed transaction log.
    pub fn transactions(&self) -> &[TxRecord] {
        &self.transactions
    }

    /// Number of currently-valid facts.
    pub fn valid_count(&self) -> usize {
        self.facts.iter().filter(|f| f.valid_now()).count()
    }

    /// Number of justification rows.
    pub fn justification_count(&self) -> usize {
        self.rows.len()
    }

    fn check_open(&self, tx: TxId) -> StoreResult<()> {
        match self.open_tx {
            Some(open) if open == tx => Ok(()),
            _ if self.transactions.iter().any(|t| t.id == tx) => {
                Err(StoreError::TransactionClosed(tx))
            }
            _ => Err(StoreError::UnknownTransaction(tx)),
        }
    }
}

impl Lookup for MemoryStore {
    fn lookup(&self, clause: &Clause) -> StoreResult<Vec<Fact>> {
        Ok(self
            .facts
            .iter()
            .filter(|f| f.valid_now() && !clause.matches(&f.fact).is_empty())
            .map(|f| f.fact.clone())
            .collect())
    }
}

impl FactStore for MemoryStore {
    fn begin(&mut self) -> StoreResult<TxRecord> {
        if let Some(open) = self.open_tx {
            return Err(StoreError::TransactionOpen(open));
        }
        let record = TxRecord {
            id: self.transactions.last().map_or(1, |t| t.id + 1),
            timestamp: Utc::now(),
        };
        self.transactions.push(record);
        self.open_tx = Some(record.id);
        Ok(record)
    }

    fn commit(&mut self, tx: TxId) -> StoreResult<()> {
        self.check_open(tx)?;
        self.open_tx = None;
        self.stashed_rows.clear();
        Ok(())
    }

    fn rollback(&mut self, tx: TxId) -> StoreResult<()> {
        self.check_open(tx)?;
        self.facts.retain(|f| f.added_tx != tx);
        for fact in &mut self.facts {
            if fact.removed_tx == Some(tx) {
                fact.removed_tx = None;
            }
        }
        self.rows.retain(|r| r.added_tx != tx);
        let restored = std::mem::take(&mut self.stashed_rows);
        self.rows.extend(restored);
        self.transactions.retain(|t| t.id != tx);
        self.open_tx = None;
        Ok(())
    }

    fn append(&mut self, facts: &[(Fact, bool)], tx: TxId) -> StoreResult<Vec<AppendOutcome>> {
        self.check_open(tx)?;
        let mut outcomes = Vec::with_capacity(facts.len());
        for (fact, is_inferred) in facts {
            if let Some(existing) = self
                .facts
                .iter()
                .find(|f| f.valid_now() && f.fact == *fact)
            {
                outcomes.push(AppendOutcome {
                    id: existing.id,
                    fact: fact.clone(),
                    created: false,
                });
                continue;
            }
            self.next_fact_id += 1;
            self.facts.push(StoredFact {
                id: self.next_fact_id,
                fact: fact.clone(),
                is_inferred: *is_inferred,
                added_tx: tx,
                removed_tx: None,
            });
            outcomes.push(AppendOutcome {
                id: self.next_fact_id,
                fact: fact.clone(),
                created: true,
            });
        }
        Ok(outcomes)
    }

    fn append_justifications(
        &mut self,
        rows: &[JustificationRow],
        tx: TxId,
    ) -> StoreResult<()> {
        self.check_open(tx)?;
        for row in rows {
            let key = row.key();
            if !self.rows.iter().any(|stored| stored.row.key() == key) {
                self.rows.push(StoredRow {
                    row: row.clone(),
                    added_tx: tx,
                });
            }
        }
        Ok(())
    }

    fn mark_removed(&mut self, facts: &[Fact], tx: TxId) -> StoreResult<()> {
        self.check_open(tx)?;
        for fact in facts {
            for stored in &mut self.facts {
                if stored.valid_now() && stored.fact == *fact {
                    stored.removed_tx = Some(tx);
                }
            }
        }
        Ok(())
    }

    fn delete_justifications(&mut self, keys: &[JustificationKey]) -> StoreResult<()> {
        let key_set: BTreeSet<&JustificationKey> = keys.iter().collect();
        let mut kept = Vec::with_capacity(self.rows.len());
        let in_tx = self.open_tx.is_some();
        for stored in self.rows.drain(..) {
            if key_set.contains(&stored.row.key()) {
                if in_tx {
                    self.stashed_rows.push(stored);
                }
            } else {
                kept.push(stored);
            }
        }
        self.rows = kept;
        Ok(())
    }

    fn retain_justification_rules(&mut self, rule_ids: &[RuleId]) -> StoreResult<()> {
        let keep: BTreeSet<&RuleId> = rule_ids.iter().collect();
        let mut kept = Vec::with_capacity(self.rows.len());
        let in_tx = self.open_tx.is_some();
        for stored in self.rows.drain(..) {
            if keep.contains(&stored.row.rule_id) {
                kept.push(stored);
            } else if in_tx {
                self.stashed_rows.push(stored);
            }
        }
        self.rows = kept;
        Ok(())
    }

    fn count_justifications_for(&self, fact: &Fact) -> StoreResult<usize> {
        Ok(self.rows.iter().filter(|r| r.row.derived == *fact).count())
    }

    fn unsupported_inferred_facts(&self) -> StoreResult<Vec<Fact>> {
        let supported: BTreeSet<&Fact> =
            self.rows.iter().map(|r| &r.row.derived).collect();
        Ok(self
            .facts
            .iter()
            .filter(|f| f.valid_now() && f.is_inferred && !supported.contains(&f.fact))
            .map(|f| f.fact.clone())
            .collect())
    }

    fn is_inferred(&self, fact: &Fact) -> StoreResult<Option<bool>> {
        Ok(self
            .facts
            .iter()
            .find(|f| f.valid_now() && f.fact == *fact)
            .map(|f| f.is_inferred))
    }

    fn valid_facts(&self) -> StoreResult<Vec<Fact>> {
        Ok(self
            .facts
            .iter()
            .filter(|f| f.valid_now())
            .map(|f| f.fact.clone())
            .collect())
    }

    fn lookup_as_of(&self, clause: &Clause, tx: TxId) -> StoreResult<Vec<Fact>> {
        Ok(self
            .facts
            .iter()
            .filter(|f| f.visible_at(tx) && !clause.matches(&f.fact).is_empty())
            .map(|f| f.fact.clone())
            .collect())
    }

    fn resolve_as_of(&self, as_of: &AsOf) -> StoreResult<Option<TxId>> {
        match as_of {
            AsOf::Tx(tx) => {
                let Some(last) = self.transactions.last() else {
                    return Ok(None);
                };
                if *tx == 0 {
                    return Ok(None);
                }
                Ok(Some((*tx).min(last.id)))
            }
            AsOf::Timestamp(at) => Ok(self
                .transactions
                .iter()
                .filter(|t| t.timestamp <= *at)
                .map(|t| t.id)
                .max()),
        }
    }
}
