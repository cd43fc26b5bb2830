//! Query definitions shared by the remote source and the live snapshot:
//! a JSON filter plus an ordered sort specification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub field: String,
    pub direction: SortDirection,
}

impl SortEntry {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Sort input: a bare field name (ascending) or explicit entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortInput {
    Field(String),
    Entries(Vec<SortEntry>),
}

/// Normalize sort input to a list of entries. `None` means insertion order.
pub fn normalize_sort(sort: Option<&SortInput>) -> Vec<SortEntry> {
    match sort {
        None => Vec::new(),
        Some(SortInput::Field(f)) => vec![SortEntry::asc(f.clone())],
        Some(SortInput::Entries(e)) => e.clone(),
    }
}

/// Filter and sort applied on fetch and when placing reconciled records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// MongoDB-style filter object. `None` matches every row.
    pub filter: Option<Value>,
    pub sort: Option<SortInput>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Append a sort key; the first key added has the highest priority.
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        let entry = SortEntry {
            field: field.into(),
            direction,
        };
        self.sort = Some(match self.sort.take() {
            None => SortInput::Entries(vec![entry]),
            Some(SortInput::Field(f)) => SortInput::Entries(vec![SortEntry::asc(f), entry]),
            Some(SortInput::Entries(mut entries)) => {
                entries.push(entry);
                SortInput::Entries(entries)
            }
        });
        self
    }

    pub fn sort_entries(&self) -> Vec<SortEntry> {
        normalize_sort(self.sort.as_ref())
    }
}
