//! Feed attachment, replacement and loss.

use serde_json::json;

use household_sync::error::SyncError;
use household_sync::live::{CollectionOptions, LiveStatus, SyncCondition};
use household_sync::source::{MemorySource, RemoteSource};
use household_sync::types::Mutation;

use super::support::{collection, eventually, record_conditions};

#[tokio::test]
async fn subscribe_twice_keeps_one_feed() {
    let source = MemorySource::new();
    let coll = collection(&source, CollectionOptions::new("chores"));

    coll.subscribe().await.unwrap();
    coll.subscribe().await.unwrap();
    assert_eq!(source.active_subscriptions("chores"), 1);
    assert_eq!(source.released_subscriptions(), 1);
    assert_eq!(coll.live_status(), LiveStatus::Connected);

    source.insert("chores", json!({ "task": "Müll" })).await.unwrap();
    eventually(|| coll.len() == 1).await;
}

#[tokio::test]
async fn refused_feed_falls_back_to_fetch_only() {
    let source = MemorySource::new();
    source.set_live_updates(false);
    let coll = collection(&source, CollectionOptions::new("chores"));
    let seen = record_conditions(&coll);

    let err = coll.subscribe().await.unwrap_err();
    assert!(matches!(err, SyncError::LiveUpdatesUnavailable { .. }));
    assert!(matches!(coll.live_status(), LiveStatus::Unavailable(_)));
    assert!(matches!(
        seen.lock().as_slice(),
        [SyncCondition::LiveUpdatesUnavailable { .. }]
    ));

    // Reads and writes keep working.
    coll.mutate(Mutation::Insert(json!({ "task": "Bad" })))
        .await
        .unwrap();
    assert!(coll.is_empty());
    assert_eq!(coll.load().await.unwrap(), 1);
}

#[tokio::test]
async fn lost_feed_is_reported() {
    let source = MemorySource::new();
    let coll = collection(&source, CollectionOptions::new("news"));
    let seen = record_conditions(&coll);
    coll.subscribe().await.unwrap();

    source.close_feeds("news");
    eventually(|| matches!(coll.live_status(), LiveStatus::Unavailable(_))).await;
    assert!(matches!(
        coll.last_condition(),
        Some(SyncCondition::LiveUpdatesUnavailable { ref table, .. }) if table == "news"
    ));
    assert_eq!(seen.lock().len(), 1);

    // Resubscribing restores the feed.
    coll.subscribe().await.unwrap();
    assert_eq!(coll.live_status(), LiveStatus::Connected);
    source.insert("news", json!({ "title": "Grillfest" })).await.unwrap();
    eventually(|| coll.len() == 1).await;
}

#[tokio::test]
async fn condition_listener_can_be_removed() {
    let source = MemorySource::new();
    source.set_available(false);
    let coll = collection(&source, CollectionOptions::new("chores"));

    let seen = std::sync::Arc::new(parking_lot::Mutex::new(0usize));
    let counter = std::sync::Arc::clone(&seen);
    let unsubscribe = coll.on_condition(move |_| *counter.lock() += 1);

    assert!(coll.load().await.is_err());
    unsubscribe();
    assert!(coll.load().await.is_err());
    assert_eq!(*seen.lock(), 1);
}

#[tokio::test]
async fn watch_wakes_on_feed_events() {
    let source = MemorySource::new();
    let coll = collection(&source, CollectionOptions::new("shopping_list"));
    coll.subscribe().await.unwrap();
    let mut changes = coll.watch();
    changes.borrow_and_update();

    source
        .insert("shopping_list", json!({ "item": "Brot" }))
        .await
        .unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(2), changes.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coll.len(), 1);
}
