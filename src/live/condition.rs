//! Observable state of a live collection that is not the records themselves:
//! load status, live-feed status and reported error conditions.
//!
//! Conditions are delivered through [`ConditionListeners`], a typed pub/sub
//! list. Listeners are snapshotted before each emission and the lock is never
//! held during a callback, so a listener may register or remove listeners
//! (including itself) while being called.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{error::SyncError, types::MutationKind};

/// Lifecycle of the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// Whether a change feed is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LiveStatus {
    #[default]
    Off,
    Connected,
    /// The feed could not be opened or ended without being released.
    Unavailable(String),
}

/// A reported failure. The snapshot stays usable when one is raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCondition {
    FetchFailed {
        table: String,
        message: String,
    },
    MutationFailed {
        table: String,
        op: MutationKind,
        message: String,
    },
    LiveUpdatesUnavailable {
        table: String,
        message: String,
    },
}

impl SyncCondition {
    pub fn table(&self) -> &str {
        match self {
            Self::FetchFailed { table, .. }
            | Self::MutationFailed { table, .. }
            | Self::LiveUpdatesUnavailable { table, .. } => table,
        }
    }

    /// The condition to surface for `err`, if it is one that observers see.
    /// `Superseded` and `Disposed` are control flow, not conditions.
    pub fn from_error(err: &SyncError) -> Option<Self> {
        match err {
            SyncError::FetchFailed { table, source } => Some(Self::FetchFailed {
                table: table.clone(),
                message: source.to_string(),
            }),
            SyncError::MutationFailed { table, op, source } => Some(Self::MutationFailed {
                table: table.clone(),
                op: *op,
                message: source.to_string(),
            }),
            SyncError::LiveUpdatesUnavailable { table, source } => {
                Some(Self::LiveUpdatesUnavailable {
                    table: table.clone(),
                    message: source.to_string(),
                })
            }
            SyncError::InvalidRecord(_) | SyncError::Superseded { .. } | SyncError::Disposed => {
                None
            }
        }
    }
}

// ============================================================================
// Listener list
// ============================================================================

pub type ListenerId = u64;

type ConditionFn = dyn Fn(&SyncCondition) + Send + Sync;

pub struct ConditionListeners {
    listeners: Mutex<Vec<(ListenerId, Arc<ConditionFn>)>>,
    next_id: AtomicU64,
}

impl ConditionListeners {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn on(&self, callback: impl Fn(&SyncCondition) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(callback)));
        id
    }

    pub fn off(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Call every registered listener. A panicking listener is logged and
    /// does not stop the others.
    pub fn emit(&self, condition: &SyncCondition) {
        let snapshot: Vec<Arc<ConditionFn>> = {
            let guard = self.listeners.lock();
            guard.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for cb in snapshot {
            if catch_unwind(AssertUnwindSafe(|| cb(condition))).is_err() {
                tracing::warn!(table = condition.table(), "condition listener panicked");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConditionListeners {
    fn default() -> Self {
        Self::new()
    }
}
