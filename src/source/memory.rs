//! MemorySource: an in-process [`RemoteSource`] backed by insertion-ordered
//! tables.
//!
//! Behaves like the hosted backend from a client's point of view: it assigns
//! integer ids and `created_at` stamps, merges updates, and fans change events
//! out to matching subscriptions. A handful of controls simulate the failure
//! modes a real backend exhibits (outages, refused realtime connections,
//! duplicated or reordered events, slow queries).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{
    error::SourceError,
    query::{execute_query, Query},
    types::{ChangeEvent, EventFilter, Record, RecordId},
};

use super::traits::{RemoteSource, Subscription};

struct Subscriber {
    id: u64,
    table: String,
    filter: EventFilter,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    subscribers: Vec<Subscriber>,
    next_row_id: i64,
    next_sub_id: u64,
    clock: i64,
    available: bool,
    live_updates: bool,
    query_gate: Option<oneshot::Receiver<()>>,
    query_count: usize,
    released: usize,
}

impl MemoryState {
    fn table_mut(&mut self, table: &str) -> &mut Vec<Value> {
        self.tables.entry(table.to_string()).or_default()
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.available {
            Ok(())
        } else {
            Err(SourceError::RemoteUnavailable("backend offline".to_string()))
        }
    }

    /// Send `event` to every live subscriber of `table` that accepts it.
    /// Subscribers whose receiver is gone are dropped.
    fn broadcast(&mut self, table: &str, event: &ChangeEvent) {
        self.subscribers.retain(|sub| {
            if sub.table != table || !sub.filter.accepts(event.kind()) {
                return true;
            }
            sub.tx.send(event.clone()).is_ok()
        });
    }
}

fn position_of(rows: &[Value], id: &RecordId) -> Option<usize> {
    rows.iter()
        .position(|row| row.get("id").and_then(RecordId::from_value).as_ref() == Some(id))
}

fn to_record(row: &Value) -> Result<Record, SourceError> {
    Record::from_value(row.clone()).map_err(|e| SourceError::WriteRejected(e.to_string()))
}

/// In-memory backend. Cheap to clone; clones share the same tables.
#[derive(Clone)]
pub struct MemorySource {
    state: Arc<Mutex<MemoryState>>,
    epoch: DateTime<Utc>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                tables: HashMap::new(),
                subscribers: Vec::new(),
                next_row_id: 1,
                next_sub_id: 1,
                clock: 0,
                available: true,
                live_updates: true,
                query_gate: None,
                query_count: 0,
                released: 0,
            })),
            epoch: Utc::now(),
        }
    }

    /// Store rows directly, without assigning fields or emitting events.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut st = self.state.lock();
        st.table_mut(table).extend(rows);
    }

    /// Current rows of `table` in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// When `false`, every read and write fails with `RemoteUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    /// When `false`, `subscribe` is refused.
    pub fn set_live_updates(&self, enabled: bool) {
        self.state.lock().live_updates = enabled;
    }

    /// Deliver a raw event to subscribers of `table` without touching the
    /// stored rows. Used to replay duplicates or out-of-order deliveries.
    pub fn inject(&self, table: &str, event: ChangeEvent) {
        self.state.lock().broadcast(table, &event);
    }

    /// Drop every open feed of `table`, as a lost realtime connection would.
    pub fn close_feeds(&self, table: &str) {
        self.state.lock().subscribers.retain(|sub| sub.table != table);
    }

    /// Hold the next query: its result is computed immediately but returned
    /// only once the returned sender fires (or is dropped).
    pub fn hold_next_query(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().query_gate = Some(rx);
        tx
    }

    pub fn active_subscriptions(&self, table: &str) -> usize {
        self.state
            .lock()
            .subscribers
            .iter()
            .filter(|sub| sub.table == table)
            .count()
    }

    /// Number of subscription release calls observed.
    pub fn released_subscriptions(&self) -> usize {
        self.state.lock().released
    }

    pub fn query_count(&self) -> usize {
        self.state.lock().query_count
    }

    fn next_timestamp(&self, st: &mut MemoryState) -> String {
        st.clock += 1;
        (self.epoch + Duration::milliseconds(st.clock)).to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteSource for MemorySource {
    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Value>, SourceError> {
        let (result, gate) = {
            let mut st = self.state.lock();
            st.check_available()?;
            st.query_count += 1;
            let rows = st.tables.get(table).cloned().unwrap_or_default();
            let result = execute_query(rows, query)
                .map_err(|e| SourceError::QueryRejected(e.to_string()));
            (result, st.query_gate.take())
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }

    async fn insert(&self, table: &str, fields: Value) -> Result<Value, SourceError> {
        let mut st = self.state.lock();
        st.check_available()?;
        let Value::Object(mut row) = fields else {
            return Err(SourceError::WriteRejected("insert expects an object".to_string()));
        };

        match row.get("id").and_then(RecordId::from_value) {
            Some(id) => {
                if position_of(st.table_mut(table), &id).is_some() {
                    return Err(SourceError::WriteRejected(format!(
                        "duplicate key {table}/{id}"
                    )));
                }
            }
            None => {
                let id = st.next_row_id;
                st.next_row_id += 1;
                row.insert("id".to_string(), Value::from(id));
            }
        }
        if !row.contains_key("created_at") {
            let stamp = self.next_timestamp(&mut st);
            row.insert("created_at".to_string(), Value::String(stamp));
        }

        let row = Value::Object(row);
        let record = to_record(&row)?;
        st.table_mut(table).push(row.clone());
        st.broadcast(table, &ChangeEvent::Inserted(record));
        Ok(row)
    }

    async fn update(&self, table: &str, id: &RecordId, fields: Value) -> Result<(), SourceError> {
        let mut st = self.state.lock();
        st.check_available()?;
        let Value::Object(fields) = fields else {
            return Err(SourceError::WriteRejected("update expects an object".to_string()));
        };
        let rows = st.table_mut(table);
        let pos = position_of(rows, id).ok_or_else(|| SourceError::NotFound {
            table: table.to_string(),
            id: id.clone(),
        })?;
        if let Some(row) = rows[pos].as_object_mut() {
            for (key, value) in fields {
                if key != "id" {
                    row.insert(key, value);
                }
            }
        }
        let record = to_record(&rows[pos])?;
        st.broadcast(table, &ChangeEvent::Updated(record));
        Ok(())
    }

    async fn delete(&self, table: &str, id: &RecordId) -> Result<(), SourceError> {
        let mut st = self.state.lock();
        st.check_available()?;
        let rows = st.table_mut(table);
        let pos = position_of(rows, id).ok_or_else(|| SourceError::NotFound {
            table: table.to_string(),
            id: id.clone(),
        })?;
        rows.remove(pos);
        st.broadcast(table, &ChangeEvent::Deleted(id.clone()));
        Ok(())
    }

    async fn subscribe(
        &self,
        table: &str,
        filter: &EventFilter,
    ) -> Result<Subscription, SourceError> {
        let mut st = self.state.lock();
        st.check_available()?;
        if !st.live_updates {
            return Err(SourceError::RemoteUnavailable(
                "realtime channel refused".to_string(),
            ));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let id = st.next_sub_id;
        st.next_sub_id += 1;
        st.subscribers.push(Subscriber {
            id,
            table: table.to_string(),
            filter: filter.clone(),
            tx,
        });

        let state = Arc::clone(&self.state);
        Ok(Subscription::new(
            rx,
            Box::new(move || {
                let mut st = state.lock();
                st.released += 1;
                st.subscribers.retain(|sub| sub.id != id);
            }),
        ))
    }
}
