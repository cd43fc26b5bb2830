//! Change events delivered through the feed.

use serde_json::json;

use household_sync::live::{CollectionOptions, RefreshMode};
use household_sync::query::{Query, SortDirection};
use household_sync::source::{MemorySource, RemoteSource};
use household_sync::types::{ChangeEvent, EventFilter, EventKind, Record, RecordId};

use super::support::{collection, eventually, ids, settle};

fn record(value: serde_json::Value) -> Record {
    Record::from_value(value).unwrap()
}

fn by_start_time(table: &str) -> CollectionOptions {
    CollectionOptions::new(table).query(Query::new().sort_by("start_time", SortDirection::Asc))
}

#[tokio::test]
async fn inserted_record_lands_in_sort_position() {
    let source = MemorySource::new();
    source.seed(
        "events",
        vec![
            json!({ "id": 1, "start_time": "08:00" }),
            json!({ "id": 2, "start_time": "12:00" }),
        ],
    );
    let coll = collection(&source, by_start_time("events"));
    coll.load().await.unwrap();
    coll.subscribe().await.unwrap();

    source
        .insert("events", json!({ "id": 3, "start_time": "10:00" }))
        .await
        .unwrap();
    eventually(|| coll.len() == 3).await;
    assert_eq!(ids(&coll), vec!["1", "3", "2"]);
}

#[tokio::test]
async fn duplicate_insert_delivery_does_not_duplicate() {
    let source = MemorySource::new();
    let coll = collection(&source, CollectionOptions::new("shopping_list"));
    coll.load().await.unwrap();
    coll.subscribe().await.unwrap();

    let milk = record(json!({ "id": 7, "item": "Milch" }));
    source.inject("shopping_list", ChangeEvent::Inserted(milk.clone()));
    source.inject("shopping_list", ChangeEvent::Inserted(milk.clone()));
    source.inject("shopping_list", ChangeEvent::Updated(milk));
    eventually(|| coll.len() == 1).await;
    settle().await;
    assert_eq!(ids(&coll), vec!["7"]);
}

#[tokio::test]
async fn delete_is_absorbing_across_redelivery() {
    let source = MemorySource::new();
    source.seed("chores", vec![json!({ "id": 1 }), json!({ "id": 2 })]);
    let coll = collection(&source, CollectionOptions::new("chores"));
    coll.load().await.unwrap();
    coll.subscribe().await.unwrap();

    source.inject("chores", ChangeEvent::Deleted(RecordId::from("1")));
    source.inject("chores", ChangeEvent::Deleted(RecordId::from("1")));
    source.inject("chores", ChangeEvent::Deleted(RecordId::from("404")));
    eventually(|| coll.len() == 1).await;
    settle().await;
    assert_eq!(ids(&coll), vec!["2"]);
}

#[tokio::test]
async fn update_moving_out_of_scope_evicts() {
    let source = MemorySource::new();
    source.seed(
        "events",
        vec![
            json!({ "id": 1, "date": "2024-05-10", "start_time": "08:00" }),
            json!({ "id": 2, "date": "2024-05-11", "start_time": "09:00" }),
        ],
    );
    let options = CollectionOptions::new("events").query(
        Query::new()
            .filter(json!({ "date": { "$gte": "2024-05-01", "$lte": "2024-05-31" } }))
            .sort_by("start_time", SortDirection::Asc),
    );
    let coll = collection(&source, options);
    coll.load().await.unwrap();
    coll.subscribe().await.unwrap();

    source
        .update("events", &RecordId::from("1"), json!({ "date": "2024-06-01" }))
        .await
        .unwrap();
    eventually(|| coll.len() == 1).await;
    assert_eq!(ids(&coll), vec!["2"]);

    // Moving back into the month brings it back.
    source
        .update("events", &RecordId::from("1"), json!({ "date": "2024-05-20" }))
        .await
        .unwrap();
    eventually(|| coll.len() == 2).await;
    assert_eq!(ids(&coll), vec!["1", "2"]);
}

#[tokio::test]
async fn update_changing_sort_key_reorders() {
    let source = MemorySource::new();
    source.seed(
        "events",
        vec![
            json!({ "id": "a", "start_time": "07:00" }),
            json!({ "id": "b", "start_time": "08:00" }),
            json!({ "id": "c", "start_time": "09:00" }),
        ],
    );
    let coll = collection(&source, by_start_time("events"));
    coll.load().await.unwrap();
    coll.subscribe().await.unwrap();

    source
        .update("events", &RecordId::from("a"), json!({ "start_time": "10:00" }))
        .await
        .unwrap();
    eventually(|| ids(&coll) == vec!["b", "c", "a"]).await;
}

#[tokio::test]
async fn out_of_order_delivery_converges() {
    let source = MemorySource::new();
    let coll = collection(&source, CollectionOptions::new("chores"));
    coll.subscribe().await.unwrap();

    // Delete arrives before the insert it follows; the late insert wins.
    source.inject("chores", ChangeEvent::Deleted(RecordId::from("5")));
    source.inject(
        "chores",
        ChangeEvent::Updated(record(json!({ "id": 5, "is_done": true }))),
    );
    source.inject(
        "chores",
        ChangeEvent::Inserted(record(json!({ "id": 5, "is_done": false }))),
    );
    eventually(|| {
        coll.get(&RecordId::from("5"))
            .is_some_and(|r| r.data["is_done"] == json!(false))
    })
    .await;
    assert_eq!(coll.len(), 1);
}

#[tokio::test]
async fn event_filter_limits_accepted_kinds() {
    let source = MemorySource::new();
    source.seed("chat_messages", vec![json!({ "id": 1, "content": "Hallo" })]);
    let coll = collection(
        &source,
        CollectionOptions::new("chat_messages")
            .event_filter(EventFilter::only(&[EventKind::Insert])),
    );
    coll.load().await.unwrap();
    coll.subscribe().await.unwrap();

    source
        .delete("chat_messages", &RecordId::from("1"))
        .await
        .unwrap();
    source
        .insert("chat_messages", json!({ "content": "Essen ist fertig" }))
        .await
        .unwrap();
    eventually(|| coll.len() == 2).await;
    settle().await;
    assert!(coll.get(&RecordId::from("1")).is_some());
}

#[tokio::test]
async fn reload_mode_refetches_on_events() {
    let source = MemorySource::new();
    let coll = collection(
        &source,
        CollectionOptions::new("chores").refresh(RefreshMode::Reload),
    );
    coll.load().await.unwrap();
    coll.subscribe().await.unwrap();
    assert_eq!(source.query_count(), 1);

    source.insert("chores", json!({ "task": "Müll" })).await.unwrap();
    eventually(|| coll.len() == 1).await;
    assert!(source.query_count() >= 2);

    // A raw event for an unknown row does not appear: the reload reads the
    // table, which does not contain it.
    source.inject(
        "chores",
        ChangeEvent::Inserted(record(json!({ "id": "ghost" }))),
    );
    eventually(|| source.query_count() >= 3).await;
    settle().await;
    assert!(coll.get(&RecordId::from("ghost")).is_none());
}
