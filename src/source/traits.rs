//! Boundary to the hosted backend: filtered reads, row writes and per-table
//! change feeds.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    error::SourceError,
    query::Query,
    types::{ChangeEvent, EventFilter, RecordId},
};

/// An owned one-shot closure that tears down a registration when called.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

/// Remote data source consumed by [`LiveCollection`](crate::live::LiveCollection).
///
/// Implementations wrap the backend client (REST + realtime socket, or the
/// in-memory [`MemorySource`](super::MemorySource)).
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Rows of `table` matching the filter, in the requested order.
    async fn query(&self, table: &str, query: &Query) -> Result<Vec<Value>, SourceError>;

    /// Insert a row; returns the stored row including server-assigned fields.
    async fn insert(&self, table: &str, fields: Value) -> Result<Value, SourceError>;

    /// Merge `fields` into the row with `id`.
    async fn update(&self, table: &str, id: &RecordId, fields: Value) -> Result<(), SourceError>;

    async fn delete(&self, table: &str, id: &RecordId) -> Result<(), SourceError>;

    /// Open a change feed for `table`.
    ///
    /// Delivery is at-least-once and best-effort: events may be duplicated,
    /// reordered, or dropped across a reconnect.
    async fn subscribe(&self, table: &str, filter: &EventFilter)
        -> Result<Subscription, SourceError>;
}

// ============================================================================
// Subscription handle
// ============================================================================

/// Releases a feed registration exactly once: on [`release`](Self::release)
/// or on drop, whichever comes first.
pub struct ReleaseGuard {
    release: Option<Unsubscribe>,
}

impl ReleaseGuard {
    pub fn new(release: Unsubscribe) -> Self {
        Self {
            release: Some(release),
        }
    }

    /// Run the release closure. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// One open change feed: an event channel plus its release guard.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    guard: ReleaseGuard,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<ChangeEvent>, release: Unsubscribe) -> Self {
        Self {
            events,
            guard: ReleaseGuard::new(release),
        }
    }

    /// Next event, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    pub fn release(&mut self) {
        self.guard.release();
        self.events.close();
    }

    /// Split into the event receiver and the guard so that the receiver can
    /// move into a consumer task while the owner keeps release control.
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<ChangeEvent>, ReleaseGuard) {
        (self.events, self.guard)
    }
}
