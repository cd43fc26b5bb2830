#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use household_sync::live::{CollectionOptions, LiveCollection, SyncCondition};
use household_sync::source::MemorySource;

/// Route crate logs to the test writer; `RUST_LOG=household_sync=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn collection(source: &MemorySource, options: CollectionOptions) -> LiveCollection {
    init_tracing();
    LiveCollection::new(Arc::new(source.clone()), options).unwrap()
}

pub fn shared(source: &MemorySource, options: CollectionOptions) -> Arc<LiveCollection> {
    Arc::new(collection(source, options))
}

/// Ids of the snapshot, in order.
pub fn ids(coll: &LiveCollection) -> Vec<String> {
    coll.records()
        .iter()
        .map(|r| r.id.as_str().to_string())
        .collect()
}

/// Poll `check` until it holds, letting spawned feed tasks run in between.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached within 2s");
}

/// Give the feed task a chance to run, for asserting that nothing happened.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

/// Records every condition the collection reports.
pub fn record_conditions(coll: &LiveCollection) -> Arc<Mutex<Vec<SyncCondition>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    // Listener lives as long as the collection.
    let _keep = coll.on_condition(move |c| sink.lock().push(c.clone()));
    seen
}
