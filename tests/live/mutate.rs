//! `mutate()`: writes go to the source; the snapshot follows the feed.

use serde_json::json;

use household_sync::error::{SourceError, SyncError};
use household_sync::live::{CollectionOptions, SyncCondition};
use household_sync::source::MemorySource;
use household_sync::types::{ChangeEvent, Mutation, MutationKind, RecordId};

use super::support::{collection, eventually, ids, settle};

#[tokio::test]
async fn insert_returns_stored_row_without_touching_snapshot() {
    let source = MemorySource::new();
    let coll = collection(&source, CollectionOptions::new("chores"));
    coll.load().await.unwrap();

    let stored = coll
        .mutate(Mutation::Insert(json!({ "task": "Müll" })))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id.as_str(), "1");
    assert!(stored.data.get("created_at").is_some());
    assert!(coll.is_empty());

    coll.load().await.unwrap();
    assert_eq!(ids(&coll), vec!["1"]);
}

#[tokio::test]
async fn insert_race_yields_single_record() {
    let source = MemorySource::new();
    let coll = collection(&source, CollectionOptions::new("shopping_list"));
    coll.load().await.unwrap();
    coll.subscribe().await.unwrap();

    let stored = coll
        .mutate(Mutation::Insert(json!({ "item": "Eier" })))
        .await
        .unwrap()
        .unwrap();
    // The writer also applies its own result, racing the feed.
    coll.apply_event(ChangeEvent::Inserted(stored.clone()))
        .unwrap();
    source.inject("shopping_list", ChangeEvent::Inserted(stored));

    eventually(|| coll.len() == 1).await;
    settle().await;
    assert_eq!(coll.len(), 1);
}

#[tokio::test]
async fn update_and_delete_arrive_through_feed() {
    let source = MemorySource::new();
    source.seed("chores", vec![json!({ "id": 1, "task": "Müll", "is_done": false })]);
    let coll = collection(&source, CollectionOptions::new("chores"));
    coll.load().await.unwrap();
    coll.subscribe().await.unwrap();

    let id = RecordId::from("1");
    assert!(coll
        .mutate(Mutation::Update(id.clone(), json!({ "is_done": true })))
        .await
        .unwrap()
        .is_none());
    eventually(|| {
        coll.get(&id)
            .is_some_and(|r| r.data["is_done"] == json!(true))
    })
    .await;

    coll.mutate(Mutation::Delete(id.clone())).await.unwrap();
    eventually(|| coll.is_empty()).await;
}

#[tokio::test]
async fn failed_write_reports_and_keeps_snapshot() {
    let source = MemorySource::new();
    source.seed("chores", vec![json!({ "id": 1, "task": "Müll" })]);
    let coll = collection(&source, CollectionOptions::new("chores"));
    coll.load().await.unwrap();
    let before = coll.records();

    source.set_available(false);
    let err = coll
        .mutate(Mutation::Delete(RecordId::from("1")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::MutationFailed {
            op: MutationKind::Delete,
            source: SourceError::RemoteUnavailable(_),
            ..
        }
    ));
    assert_eq!(coll.records(), before);
    assert!(matches!(
        coll.last_condition(),
        Some(SyncCondition::MutationFailed { op: MutationKind::Delete, .. })
    ));
}

#[tokio::test]
async fn missing_row_is_not_found() {
    let source = MemorySource::new();
    let coll = collection(&source, CollectionOptions::new("chores"));
    let err = coll
        .mutate(Mutation::Update(RecordId::from("9"), json!({ "is_done": true })))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
