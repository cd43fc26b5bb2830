use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// Stable identifier of a remote row.
///
/// Backends hand out either string or integer ids; integers are normalized to
/// their decimal form so both compare the same way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an id out of a JSON value. Accepts non-empty strings and integers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| de::Error::custom(format!("invalid record id: {value}")))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

/// One row of a remote table.
///
/// `data` is the complete row object, including its `id` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub data: Value,
}

impl Record {
    /// Build a record from a raw row, reading the id from the `id` field.
    pub fn from_value(data: Value) -> Result<Self, SyncError> {
        if !data.is_object() {
            return Err(SyncError::InvalidRecord(format!(
                "expected an object row, received {data}"
            )));
        }
        let id = data
            .get("id")
            .and_then(RecordId::from_value)
            .ok_or_else(|| SyncError::InvalidRecord(format!("row without usable id: {data}")))?;
        Ok(Self { id, data })
    }

    /// Field lookup on the top level of the row.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// String field shorthand; `None` when absent or not a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }
}

// ============================================================================
// Change events
// ============================================================================

/// Kind of row change carried by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Insert,
    Update,
    Delete,
}

/// A row change delivered asynchronously by a subscription.
///
/// Delivery is at-least-once and not ordered relative to fetches.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Inserted(Record),
    Updated(Record),
    Deleted(RecordId),
}

impl ChangeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Inserted(_) => EventKind::Insert,
            Self::Updated(_) => EventKind::Update,
            Self::Deleted(_) => EventKind::Delete,
        }
    }

    /// Id of the affected row.
    pub fn id(&self) -> &RecordId {
        match self {
            Self::Inserted(r) | Self::Updated(r) => &r.id,
            Self::Deleted(id) => id,
        }
    }
}

/// Which change-event kinds a subscription accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EventFilter {
    #[default]
    All,
    Only(Vec<EventKind>),
}

impl EventFilter {
    pub fn only(kinds: &[EventKind]) -> Self {
        Self::Only(kinds.to_vec())
    }

    pub fn accepts(&self, kind: EventKind) -> bool {
        match self {
            Self::All => true,
            Self::Only(kinds) => kinds.contains(&kind),
        }
    }
}

// ============================================================================
// Mutations
// ============================================================================

/// A write issued against the remote source.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert(Value),
    Update(RecordId, Value),
    Delete(RecordId),
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::Insert(_) => MutationKind::Insert,
            Self::Update(..) => MutationKind::Update,
            Self::Delete(_) => MutationKind::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}
