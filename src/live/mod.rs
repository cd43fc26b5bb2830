//! Live collections: remote-table snapshots kept current from change feeds.
//!
//! - [`options`]: [`CollectionOptions`], [`RefreshMode`].
//! - [`snapshot`]: ordered record list and event reconciliation.
//! - [`condition`]: status enums, [`SyncCondition`] and its listeners.
//! - [`collection`]: [`LiveCollection`].

pub mod collection;
pub mod condition;
pub mod options;
pub mod snapshot;

pub use collection::LiveCollection;
pub use condition::{ConditionListeners, ListenerId, LiveStatus, SyncCondition, SyncStatus};
pub use options::{CollectionOptions, DeriveFn, RefreshMode};
pub use snapshot::{Reconciled, Snapshot, ViewRules};
