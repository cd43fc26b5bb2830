//! Collection configurations for each household view.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::{json, Value};

use crate::{
    error::ActionError,
    live::CollectionOptions,
    query::{Query, SortDirection},
    types::{EventFilter, EventKind, Record, RecordId},
};

pub const EVENTS: &str = "events";
pub const CHORES: &str = "chores";
pub const SHOPPING_LIST: &str = "shopping_list";
pub const CHAT_MESSAGES: &str = "chat_messages";
pub const NEWS: &str = "news";
pub const FOOD_ORDERS: &str = "food_orders";
pub const USERS: &str = "users";
pub const FEEDBACK: &str = "feedback";

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), ActionError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ActionError::InvalidDate(format!("{year}-{month:02}")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| ActionError::InvalidDate(format!("{year}-{month:02}")))?;
    Ok((first, last))
}

/// Calendar entries of one month, by start time.
pub fn calendar_month(year: i32, month: u32) -> Result<CollectionOptions, ActionError> {
    let (first, last) = month_bounds(year, month)?;
    Ok(CollectionOptions::new(EVENTS).query(
        Query::new()
            .filter(json!({
                "date": {
                    "$gte": first.format("%Y-%m-%d").to_string(),
                    "$lte": last.format("%Y-%m-%d").to_string(),
                }
            }))
            .sort_by("start_time", SortDirection::Asc),
    ))
}

pub fn chores() -> CollectionOptions {
    CollectionOptions::new(CHORES).query(Query::new().sort_by("created_at", SortDirection::Asc))
}

pub fn shopping_list() -> CollectionOptions {
    CollectionOptions::new(SHOPPING_LIST)
        .query(Query::new().sort_by("created_at", SortDirection::Asc))
}

/// Chat messages, oldest first. Messages are never edited, so only inserts
/// are followed. Each message gains `user.name` from `directory`.
pub fn chat(directory: UserDirectory) -> CollectionOptions {
    CollectionOptions::new(CHAT_MESSAGES)
        .query(Query::new().sort_by("created_at", SortDirection::Asc))
        .event_filter(EventFilter::only(&[EventKind::Insert]))
        .derive(move |record| directory.join_author(record))
}

/// Posts that have not expired at `now`, newest first.
///
/// The cutoff is fixed when the options are built: a post that expires later
/// stays in the snapshot, and is still admitted from the feed, until the view
/// is rebuilt with a fresh `now`. Long-lived consumers should rebuild the
/// collection on a timer (once per day matches the granularity of
/// `expires_at`).
pub fn news(now: DateTime<Utc>) -> CollectionOptions {
    CollectionOptions::new(NEWS).query(
        Query::new()
            .filter(json!({
                "expires_at": { "$gt": now.to_rfc3339_opts(SecondsFormat::Millis, true) }
            }))
            .sort_by("created_at", SortDirection::Desc),
    )
}

pub fn open_food_orders() -> CollectionOptions {
    CollectionOptions::new(FOOD_ORDERS).query(
        Query::new()
            .filter(json!({ "status": { "$ne": "Erledigt" } }))
            .sort_by("created_at", SortDirection::Asc),
    )
}

/// Submitted feedback, newest first. Only written to by the settings page.
pub fn feedback() -> CollectionOptions {
    CollectionOptions::new(FEEDBACK).query(Query::new().sort_by("created_at", SortDirection::Desc))
}

/// Non-admin users, for assigning chores.
pub fn household_members() -> CollectionOptions {
    CollectionOptions::new(USERS)
        .query(
            Query::new()
                .filter(json!({ "is_admin": false }))
                .sort_by("name", SortDirection::Asc),
        )
        .derive(strip_password)
}

/// Every user, for the admin panel.
pub fn all_users() -> CollectionOptions {
    CollectionOptions::new(USERS)
        .query(Query::new().sort_by("name", SortDirection::Asc))
        .derive(strip_password)
}

fn strip_password(mut record: Record) -> Record {
    if let Some(fields) = record.data.as_object_mut() {
        fields.remove("password");
    }
    record
}

// ============================================================================
// UserDirectory
// ============================================================================

/// User id to display name, shared with the chat derive function.
#[derive(Clone, Default)]
pub struct UserDirectory {
    names: Arc<RwLock<HashMap<RecordId, String>>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the directory from user records.
    pub fn refresh(&self, users: &[Record]) {
        let names = users
            .iter()
            .filter_map(|u| Some((u.id.clone(), u.str_field("name")?.to_string())))
            .collect();
        *self.names.write() = names;
    }

    pub fn name(&self, id: &RecordId) -> Option<String> {
        self.names.read().get(id).cloned()
    }

    /// Add `user: { name }` for the message author unless the row already
    /// carries it.
    fn join_author(&self, mut record: Record) -> Record {
        if record.data.get("user").is_some_and(Value::is_object) {
            return record;
        }
        let name = record
            .data
            .get("user_id")
            .and_then(RecordId::from_value)
            .and_then(|id| self.name(&id));
        if let (Some(name), Some(fields)) = (name, record.data.as_object_mut()) {
            fields.insert("user".to_string(), json!({ "name": name }));
        }
        record
    }
}
