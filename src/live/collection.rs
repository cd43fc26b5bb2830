//! LiveCollection: a client-side snapshot of one remote table that is loaded
//! on demand and kept current from the table's change feed.
//!
//! State lives behind a `parking_lot::Mutex` that is never held across an
//! await point. Every observable change bumps a version counter published on
//! a `tokio::sync::watch` channel.
//!
//! Load ordering: each `load()` takes a new epoch and only the newest epoch
//! may replace the snapshot; older completions resolve to
//! [`SyncError::Superseded`]. Events that arrive while a load is in flight are
//! applied immediately and recorded, then replayed on top of the fetched rows
//! so they are not lost when the snapshot is replaced. A load that is
//! cancelled before it lands (feed task aborted, caller timeout) restores the
//! last settled status and forgets its recorded events.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    error::{QueryError, SyncError},
    source::{ReleaseGuard, RemoteSource, Unsubscribe},
    types::{ChangeEvent, Mutation, Record, RecordId},
};

use super::{
    condition::{ConditionListeners, LiveStatus, SyncCondition, SyncStatus},
    options::{CollectionOptions, RefreshMode},
    snapshot::{Reconciled, Snapshot, ViewRules},
};

// ============================================================================
// Internal state
// ============================================================================

struct State {
    status: SyncStatus,
    /// Status before the current run of loads; restored if that run is cut short.
    settled: SyncStatus,
    live: LiveStatus,
    snapshot: Snapshot,
    load_epoch: u64,
    /// Events applied during the in-flight load, replayed after it lands.
    pending: Vec<ChangeEvent>,
    /// Identifies the current feed; bumped whenever a feed is replaced or
    /// released so that a stale feed task cannot report its own end.
    feed_epoch: u64,
    last_condition: Option<SyncCondition>,
    disposed: bool,
}

struct Inner {
    source: Arc<dyn RemoteSource>,
    options: CollectionOptions,
    rules: ViewRules,
    state: Mutex<State>,
    version: watch::Sender<u64>,
    listeners: ConditionListeners,
}

struct Feed {
    guard: ReleaseGuard,
    task: JoinHandle<()>,
}

impl Feed {
    fn shutdown(mut self) {
        self.task.abort();
        self.guard.release();
    }
}

// ============================================================================
// LiveCollection
// ============================================================================

pub struct LiveCollection {
    inner: Arc<Inner>,
    feed: Mutex<Option<Feed>>,
}

impl LiveCollection {
    /// Create an idle collection. Fails if the query filter uses an unknown
    /// operator or an invalid pattern.
    pub fn new(
        source: Arc<dyn RemoteSource>,
        options: CollectionOptions,
    ) -> Result<Self, QueryError> {
        options.validate()?;
        let (version, _) = watch::channel(0);
        let rules = ViewRules::from(&options);
        Ok(Self {
            inner: Arc::new(Inner {
                source,
                options,
                rules,
                state: Mutex::new(State {
                    status: SyncStatus::Idle,
                    settled: SyncStatus::Idle,
                    live: LiveStatus::Off,
                    snapshot: Snapshot::new(),
                    load_epoch: 0,
                    pending: Vec::new(),
                    feed_epoch: 0,
                    last_condition: None,
                    disposed: false,
                }),
                version,
                listeners: ConditionListeners::new(),
            }),
            feed: Mutex::new(None),
        })
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Fetch the rows matching the query and replace the snapshot with them.
    /// Returns the number of records in the new snapshot.
    ///
    /// On failure the previous snapshot is kept, the status becomes
    /// [`SyncStatus::Error`] and a `FetchFailed` condition is reported.
    pub async fn load(&self) -> Result<usize, SyncError> {
        self.inner.load().await
    }

    /// Attach to the table's change feed. Any existing feed is released first.
    pub async fn subscribe(&self) -> Result<(), SyncError> {
        if self.inner.state.lock().disposed {
            return Err(SyncError::Disposed);
        }
        self.unsubscribe();

        let opts = &self.inner.options;
        let subscription = match self.inner.source.subscribe(&opts.table, &opts.event_filter).await
        {
            Ok(subscription) => subscription,
            Err(source) => {
                let err = SyncError::LiveUpdatesUnavailable {
                    table: opts.table.clone(),
                    source,
                };
                {
                    let mut st = self.inner.state.lock();
                    if st.disposed {
                        return Err(SyncError::Disposed);
                    }
                    st.live = LiveStatus::Unavailable(err.to_string());
                }
                self.inner.report(&err);
                self.inner.bump();
                return Err(err);
            }
        };

        let (events, guard) = subscription.into_parts();
        {
            // Lock order: feed, then state. `dispose` takes them in the same
            // order, so a dispose racing this block either sees the new feed
            // or is seen here.
            let mut feed = self.feed.lock();
            let feed_epoch = {
                let mut st = self.inner.state.lock();
                if st.disposed {
                    drop(guard);
                    return Err(SyncError::Disposed);
                }
                st.feed_epoch += 1;
                st.live = LiveStatus::Connected;
                st.feed_epoch
            };
            let task = tokio::spawn(run_feed(Arc::clone(&self.inner), events, feed_epoch));
            if let Some(previous) = feed.replace(Feed { guard, task }) {
                previous.shutdown();
            }
        }
        debug!(table = %opts.table, "change feed attached");
        self.inner.bump();
        Ok(())
    }

    /// Release the change feed, if any. No event is applied afterwards.
    pub fn unsubscribe(&self) {
        let Some(feed) = self.feed.lock().take() else {
            return;
        };
        {
            let mut st = self.inner.state.lock();
            st.feed_epoch += 1;
            st.live = LiveStatus::Off;
        }
        feed.shutdown();
        debug!(table = %self.inner.options.table, "change feed released");
        self.inner.bump();
    }

    /// Merge one change event into the snapshot, as the feed would.
    /// Events whose kind the event filter rejects are ignored.
    pub fn apply_event(&self, event: ChangeEvent) -> Result<Reconciled, SyncError> {
        self.inner.apply(event)
    }

    /// Forward a write to the remote source. The snapshot is not touched:
    /// the change arrives through the feed, or through the next `load()`
    /// when no feed is attached.
    ///
    /// Inserts return the stored row as reported by the source.
    pub async fn mutate(&self, mutation: Mutation) -> Result<Option<Record>, SyncError> {
        if self.inner.state.lock().disposed {
            return Err(SyncError::Disposed);
        }
        let table = self.inner.options.table.as_str();
        let op = mutation.kind();
        let result = match mutation {
            Mutation::Insert(fields) => self.inner.source.insert(table, fields).await.map(Some),
            Mutation::Update(id, fields) => {
                self.inner.source.update(table, &id, fields).await.map(|_| None)
            }
            Mutation::Delete(id) => self.inner.source.delete(table, &id).await.map(|_| None),
        };

        let stored = match result {
            Ok(stored) => stored,
            Err(source) => {
                let err = SyncError::MutationFailed {
                    table: table.to_string(),
                    op,
                    source,
                };
                self.inner.report(&err);
                return Err(err);
            }
        };

        if self.inner.state.lock().live != LiveStatus::Connected {
            debug!(table, %op, "write sent without a live feed; reload to observe it");
        }

        Ok(stored.and_then(|row: Value| match Record::from_value(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(table, error = %e, "source returned an unusable inserted row");
                None
            }
        }))
    }

    /// Stop all activity. Late load results and feed events are discarded
    /// and every later operation fails with [`SyncError::Disposed`].
    /// Calling it again does nothing.
    pub fn dispose(&self) {
        let mut feed = self.feed.lock();
        {
            let mut st = self.inner.state.lock();
            if st.disposed {
                return;
            }
            st.disposed = true;
            st.feed_epoch += 1;
            st.pending.clear();
        }
        if let Some(feed) = feed.take() {
            feed.shutdown();
        }
        debug!(table = %self.inner.options.table, "live collection disposed");
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    pub fn table(&self) -> &str {
        &self.inner.options.table
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.inner.options
    }

    /// A copy of the current snapshot, in order.
    pub fn records(&self) -> Vec<Record> {
        self.inner.state.lock().snapshot.records().to_vec()
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.inner.state.lock().snapshot.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.state.lock().status
    }

    pub fn live_status(&self) -> LiveStatus {
        self.inner.state.lock().live.clone()
    }

    pub fn last_condition(&self) -> Option<SyncCondition> {
        self.inner.state.lock().last_condition.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// A receiver whose value changes whenever observable state changes.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    /// Register a listener for reported conditions.
    pub fn on_condition(
        &self,
        callback: impl Fn(&SyncCondition) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let id = self.inner.listeners.on(callback);
        let inner = Arc::clone(&self.inner);
        Box::new(move || inner.listeners.off(id))
    }
}

impl Drop for LiveCollection {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ============================================================================
// Inner
// ============================================================================

impl Inner {
    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    fn report(&self, err: &SyncError) {
        let Some(condition) = SyncCondition::from_error(err) else {
            return;
        };
        warn!(table = %self.options.table, error = %err, "sync condition");
        self.state.lock().last_condition = Some(condition.clone());
        self.listeners.emit(&condition);
    }

    async fn load(&self) -> Result<usize, SyncError> {
        let epoch = {
            let mut st = self.state.lock();
            if st.disposed {
                return Err(SyncError::Disposed);
            }
            // The fetch below starts after every event seen so far, so none of
            // them needs replaying.
            st.pending.clear();
            st.load_epoch += 1;
            st.status = SyncStatus::Loading;
            st.load_epoch
        };
        let _cancel = LoadCancelGuard { inner: self, epoch };
        self.bump();
        debug!(table = %self.options.table, epoch, "loading snapshot");

        let fetched = self.source.query(&self.options.table, &self.options.query).await;

        let outcome = {
            let mut st = self.state.lock();
            if st.disposed {
                debug!(table = %self.options.table, epoch, "discarding load after dispose");
                return Err(SyncError::Disposed);
            }
            if st.load_epoch != epoch {
                debug!(table = %self.options.table, epoch, "discarding superseded load");
                return Err(SyncError::Superseded {
                    table: self.options.table.clone(),
                });
            }
            match fetched {
                Ok(rows) => {
                    st.snapshot.replace(self.materialize(rows));
                    let replay = std::mem::take(&mut st.pending);
                    for event in replay {
                        st.snapshot.reconcile(event, &self.rules);
                    }
                    st.status = SyncStatus::Ready;
                    st.settled = SyncStatus::Ready;
                    Ok(st.snapshot.len())
                }
                Err(source) => {
                    st.pending.clear();
                    st.status = SyncStatus::Error;
                    st.settled = SyncStatus::Error;
                    Err(SyncError::FetchFailed {
                        table: self.options.table.clone(),
                        source,
                    })
                }
            }
        };

        if let Err(err) = &outcome {
            self.report(err);
        }
        self.bump();
        outcome
    }

    /// Convert fetched rows into derived records, skipping rows without a
    /// usable id.
    fn materialize(&self, rows: Vec<Value>) -> Vec<Record> {
        rows.into_iter()
            .filter_map(|row| match Record::from_value(row) {
                Ok(record) => Some(self.rules.derive(record)),
                Err(e) => {
                    warn!(table = %self.options.table, error = %e, "skipping fetched row");
                    None
                }
            })
            .collect()
    }

    fn apply(&self, event: ChangeEvent) -> Result<Reconciled, SyncError> {
        if !self.options.event_filter.accepts(event.kind()) {
            return Ok(Reconciled::Unchanged);
        }
        let outcome = {
            let mut st = self.state.lock();
            if st.disposed {
                return Err(SyncError::Disposed);
            }
            if st.status == SyncStatus::Loading {
                st.pending.push(event.clone());
            }
            st.snapshot.reconcile(event, &self.rules)
        };
        if outcome != Reconciled::Unchanged {
            self.bump();
        }
        Ok(outcome)
    }

    /// Called when a feed's channel closes without the collection releasing
    /// it.
    fn feed_ended(&self, feed_epoch: u64) {
        {
            let mut st = self.state.lock();
            if st.disposed || st.feed_epoch != feed_epoch {
                return;
            }
            st.live = LiveStatus::Unavailable("change feed closed".to_string());
        }
        let condition = SyncCondition::LiveUpdatesUnavailable {
            table: self.options.table.clone(),
            message: "change feed closed".to_string(),
        };
        warn!(table = %self.options.table, "change feed closed by source");
        self.state.lock().last_condition = Some(condition.clone());
        self.listeners.emit(&condition);
        self.bump();
    }
}

/// Lives for the duration of one `Inner::load` call. If the load future is
/// dropped while it is still the newest load, the status falls back to the
/// last settled value and recorded events are discarded.
struct LoadCancelGuard<'a> {
    inner: &'a Inner,
    epoch: u64,
}

impl Drop for LoadCancelGuard<'_> {
    fn drop(&mut self) {
        let restored = {
            let mut st = self.inner.state.lock();
            if st.disposed || st.load_epoch != self.epoch || st.status != SyncStatus::Loading {
                return;
            }
            st.status = st.settled;
            st.pending.clear();
            st.status
        };
        debug!(
            table = %self.inner.options.table,
            epoch = self.epoch,
            status = ?restored,
            "load cancelled"
        );
        self.inner.bump();
    }
}

async fn run_feed(
    inner: Arc<Inner>,
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
    feed_epoch: u64,
) {
    while let Some(event) = events.recv().await {
        match inner.options.refresh {
            RefreshMode::Reconcile => {
                if let Err(SyncError::Disposed) = inner.apply(event) {
                    return;
                }
            }
            RefreshMode::Reload => {
                if !inner.options.event_filter.accepts(event.kind()) {
                    continue;
                }
                // Collapse a burst of queued events into one reload.
                while events.try_recv().is_ok() {}
                if let Err(SyncError::Disposed) = inner.load().await {
                    return;
                }
            }
        }
    }
    inner.feed_ended(feed_epoch);
}
