//! Snapshot: the ordered, duplicate-free record list behind a live
//! collection, and the reconciliation rules that merge change events into it.
//!
//! Reconciliation is idempotent so that at-least-once, unordered delivery
//! converges:
//!   - an insert for a known id is treated as an update,
//!   - a delete for an unknown id is a no-op,
//!   - a record that no longer satisfies the filter is removed whatever the
//!     event kind.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;

use crate::{
    query::{compare_rows, matches_filter, SortEntry},
    types::{ChangeEvent, Record, RecordId},
};

use super::options::{CollectionOptions, DeriveFn};

/// What a single reconciliation did to the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Inserted,
    Updated,
    Removed,
    Unchanged,
}

/// Filter, sort and derive rules a snapshot is kept consistent with.
#[derive(Clone, Default)]
pub struct ViewRules {
    pub filter: Option<Value>,
    pub sort: Vec<SortEntry>,
    pub derive: Option<Arc<DeriveFn>>,
}

impl ViewRules {
    /// Whether a raw row belongs in the view. A filter that cannot be
    /// evaluated excludes the row.
    pub fn admits(&self, row: &Value) -> bool {
        let Some(filter) = &self.filter else {
            return true;
        };
        matches_filter(row, filter).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "filter evaluation failed, excluding row");
            false
        })
    }

    /// Apply `derive`, keeping the record's id.
    pub fn derive(&self, record: Record) -> Record {
        match &self.derive {
            Some(derive) => {
                let id = record.id.clone();
                Record { id, ..derive(record) }
            }
            None => record,
        }
    }
}

impl From<&CollectionOptions> for ViewRules {
    fn from(opts: &CollectionOptions) -> Self {
        Self {
            filter: opts.query.filter.clone(),
            sort: opts.query.sort_entries(),
            derive: opts.derive.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: Vec<Record>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|r| &r.id == id)
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.position(id).map(|i| &self.records[i])
    }

    /// Replace the contents wholesale, keeping the given order. Repeated ids
    /// keep their first position and take the last value.
    pub fn replace(&mut self, records: Vec<Record>) {
        self.records.clear();
        for record in records {
            match self.position(&record.id) {
                Some(i) => {
                    tracing::warn!(id = %record.id, "duplicate id in fetched rows");
                    self.records[i] = record;
                }
                None => self.records.push(record),
            }
        }
    }

    /// Merge one change event.
    pub fn reconcile(&mut self, event: ChangeEvent, rules: &ViewRules) -> Reconciled {
        match event {
            ChangeEvent::Deleted(id) => self.remove(&id),
            ChangeEvent::Inserted(record) | ChangeEvent::Updated(record) => {
                if !rules.admits(&record.data) {
                    return self.remove(&record.id);
                }
                self.upsert(rules.derive(record), &rules.sort)
            }
        }
    }

    fn remove(&mut self, id: &RecordId) -> Reconciled {
        match self.position(id) {
            Some(i) => {
                self.records.remove(i);
                Reconciled::Removed
            }
            None => Reconciled::Unchanged,
        }
    }

    fn upsert(&mut self, record: Record, sort: &[SortEntry]) -> Reconciled {
        let Some(i) = self.position(&record.id) else {
            self.insert_sorted(record, sort);
            return Reconciled::Inserted;
        };
        if self.records[i] == record {
            return Reconciled::Unchanged;
        }
        self.records[i] = record;
        if self.out_of_place(i, sort) {
            let moved = self.records.remove(i);
            self.insert_sorted(moved, sort);
        }
        Reconciled::Updated
    }

    /// Binary-search insertion after any records with an equal sort key;
    /// append when there is no sort key.
    fn insert_sorted(&mut self, record: Record, sort: &[SortEntry]) {
        if sort.is_empty() {
            self.records.push(record);
            return;
        }
        let at = self
            .records
            .partition_point(|r| compare_rows(&r.data, &record.data, sort) != Ordering::Greater);
        self.records.insert(at, record);
    }

    fn out_of_place(&self, i: usize, sort: &[SortEntry]) -> bool {
        if sort.is_empty() {
            return false;
        }
        let here = &self.records[i].data;
        let after_prev = i == 0
            || compare_rows(&self.records[i - 1].data, here, sort) != Ordering::Greater;
        let before_next = i + 1 == self.records.len()
            || compare_rows(here, &self.records[i + 1].data, sort) != Ordering::Greater;
        !(after_prev && before_next)
    }
}
