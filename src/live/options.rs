use std::fmt;
use std::sync::Arc;

use crate::{
    error::QueryError,
    query::{validate_filter, Query},
    types::{EventFilter, Record},
};

/// Pure function producing derived fields (joined names, projections) from a
/// raw record.
pub type DeriveFn = dyn Fn(Record) -> Record + Send + Sync;

/// How a subscribed collection reacts to change events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshMode {
    /// Merge each event into the snapshot.
    #[default]
    Reconcile,
    /// Re-fetch the whole snapshot on any accepted event.
    Reload,
}

/// Configuration of one [`LiveCollection`](super::LiveCollection).
#[derive(Clone)]
pub struct CollectionOptions {
    pub table: String,
    pub query: Query,
    /// Change-event kinds to accept (default: all).
    pub event_filter: EventFilter,
    pub derive: Option<Arc<DeriveFn>>,
    pub refresh: RefreshMode,
}

impl CollectionOptions {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            query: Query::default(),
            event_filter: EventFilter::All,
            derive: None,
            refresh: RefreshMode::Reconcile,
        }
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn event_filter(mut self, filter: EventFilter) -> Self {
        self.event_filter = filter;
        self
    }

    pub fn derive(mut self, derive: impl Fn(Record) -> Record + Send + Sync + 'static) -> Self {
        self.derive = Some(Arc::new(derive));
        self
    }

    pub fn refresh(mut self, mode: RefreshMode) -> Self {
        self.refresh = mode;
        self
    }

    /// Reject filters that could only fail later, per event.
    pub fn validate(&self) -> Result<(), QueryError> {
        match &self.query.filter {
            Some(filter) => validate_filter(filter),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for CollectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionOptions")
            .field("table", &self.table)
            .field("query", &self.query)
            .field("event_filter", &self.event_filter)
            .field("derive", &self.derive.is_some())
            .field("refresh", &self.refresh)
            .finish()
    }
}
