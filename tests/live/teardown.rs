//! Unsubscribe, dispose and drop.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use household_sync::error::SyncError;
use household_sync::live::{CollectionOptions, LiveStatus, RefreshMode, SyncStatus};
use household_sync::source::{MemorySource, RemoteSource};
use household_sync::types::{ChangeEvent, Mutation, Record};

use super::support::{collection, eventually, ids, settle, shared};

#[tokio::test]
async fn unsubscribe_stops_events() {
    let source = MemorySource::new();
    let coll = collection(&source, CollectionOptions::new("chores"));
    coll.subscribe().await.unwrap();
    coll.unsubscribe();

    assert_eq!(coll.live_status(), LiveStatus::Off);
    assert_eq!(source.active_subscriptions("chores"), 0);
    source.insert("chores", json!({ "task": "Müll" })).await.unwrap();
    settle().await;
    assert!(coll.is_empty());

    // Releasing again is harmless.
    coll.unsubscribe();
    assert_eq!(source.released_subscriptions(), 1);
}

#[tokio::test]
async fn dispose_releases_subscription_exactly_once() {
    let source = MemorySource::new();
    let coll = collection(&source, CollectionOptions::new("chores"));
    coll.subscribe().await.unwrap();

    coll.dispose();
    coll.dispose();
    drop(coll);
    assert_eq!(source.released_subscriptions(), 1);
    assert_eq!(source.active_subscriptions("chores"), 0);
}

#[tokio::test]
async fn drop_releases_subscription() {
    let source = MemorySource::new();
    {
        let coll = collection(&source, CollectionOptions::new("chores"));
        coll.subscribe().await.unwrap();
        assert_eq!(source.active_subscriptions("chores"), 1);
    }
    assert_eq!(source.released_subscriptions(), 1);
}

#[tokio::test]
async fn late_load_after_dispose_is_discarded() {
    let source = MemorySource::new();
    source.seed("chores", vec![json!({ "id": 1 })]);
    let coll = shared(&source, CollectionOptions::new("chores"));

    let gate = source.hold_next_query();
    let pending = {
        let coll = Arc::clone(&coll);
        tokio::spawn(async move { coll.load().await })
    };
    eventually(|| source.query_count() == 1).await;

    coll.dispose();
    let status = coll.status();
    gate.send(()).unwrap();

    assert!(matches!(pending.await.unwrap(), Err(SyncError::Disposed)));
    assert!(coll.is_empty());
    assert_eq!(coll.status(), status);
}

#[tokio::test]
async fn operations_after_dispose_fail() {
    let source = MemorySource::new();
    let coll = collection(&source, CollectionOptions::new("chores"));
    coll.dispose();

    assert!(matches!(coll.load().await, Err(SyncError::Disposed)));
    assert!(matches!(coll.subscribe().await, Err(SyncError::Disposed)));
    assert!(matches!(
        coll.mutate(Mutation::Insert(json!({ "task": "x" }))).await,
        Err(SyncError::Disposed)
    ));
    let record = Record::from_value(json!({ "id": 1 })).unwrap();
    assert!(matches!(
        coll.apply_event(ChangeEvent::Inserted(record)),
        Err(SyncError::Disposed)
    ));
    assert_eq!(source.query_count(), 0);
    assert!(source.rows("chores").is_empty());
}

#[tokio::test]
async fn unsubscribe_during_reload_settles_status() {
    let source = MemorySource::new();
    source.seed("chores", vec![json!({ "id": 1, "task": "Müll" })]);
    let coll = collection(
        &source,
        CollectionOptions::new("chores").refresh(RefreshMode::Reload),
    );
    coll.load().await.unwrap();
    coll.subscribe().await.unwrap();

    let gate = source.hold_next_query();
    source
        .insert("chores", json!({ "id": 2, "task": "Spülen" }))
        .await
        .unwrap();
    eventually(|| source.query_count() == 2).await;
    assert_eq!(coll.status(), SyncStatus::Loading);

    coll.unsubscribe();
    let _ = gate.send(());
    eventually(|| coll.status() == SyncStatus::Ready).await;

    // Nothing recorded during the aborted refresh may outlive it.
    let ghost = Record::from_value(json!({ "id": "ghost" })).unwrap();
    coll.apply_event(ChangeEvent::Inserted(ghost)).unwrap();
    coll.load().await.unwrap();
    assert_eq!(ids(&coll), vec!["1", "2"]);
}

#[tokio::test]
async fn timed_out_load_leaves_no_trace() {
    let source = MemorySource::new();
    source.seed("chores", vec![json!({ "id": 1, "task": "Müll" })]);
    let coll = collection(&source, CollectionOptions::new("chores"));

    let _gate = source.hold_next_query();
    let timed_out = tokio::time::timeout(Duration::from_millis(20), coll.load()).await;
    assert!(timed_out.is_err());
    assert_eq!(coll.status(), SyncStatus::Idle);

    let ghost = Record::from_value(json!({ "id": "ghost" })).unwrap();
    coll.apply_event(ChangeEvent::Inserted(ghost)).unwrap();
    assert_eq!(coll.load().await.unwrap(), 1);
    assert_eq!(ids(&coll), vec!["1"]);
    assert_eq!(coll.status(), SyncStatus::Ready);
}
