//! Writes issued by the household views.
//!
//! Each action validates its input, forwards one mutation through the view's
//! [`LiveCollection`] and, where the app announces it, sends a notification.
//! None of them touch the snapshot directly.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};

use crate::{
    config::StorageConfig,
    error::{ActionError, Result},
    live::LiveCollection,
    services::{unique_name, BlobStore, Notifier, Photo},
    types::{Mutation, Record, RecordId},
};

use super::session::SessionUser;

/// Order states, in the order an order moves through them.
pub const ORDER_STATUSES: [&str; 4] = ["Bestellt", "In Zubereitung", "Abholbereit", "Erledigt"];

pub type Clock = dyn Fn() -> DateTime<Utc> + Send + Sync;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDraft {
    pub date: Option<NaiveDate>,
    pub title: String,
    /// Comma-separated names.
    pub persons: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoreDraft {
    pub task: String,
    pub assigned_to: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShoppingDraft {
    pub item: String,
    pub quantity: Option<String>,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsDraft {
    pub title: String,
    pub content: String,
    /// Comma-separated tags.
    pub tags: String,
    pub image: Option<Upload>,
}

pub struct Actions {
    notifier: Arc<Notifier>,
    blobs: Arc<dyn BlobStore>,
    storage: StorageConfig,
    clock: Arc<Clock>,
}

impl Actions {
    pub fn new(notifier: Arc<Notifier>, blobs: Arc<dyn BlobStore>, storage: StorageConfig) -> Self {
        Self {
            notifier,
            blobs,
            storage,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used to name uploads.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    // ------------------------------------------------------------------------
    // Calendar
    // ------------------------------------------------------------------------

    pub async fn add_event(&self, events: &LiveCollection, draft: EventDraft) -> Result<Option<Record>> {
        let title = required("title", &draft.title)?;
        let persons = required("persons", &draft.persons)?;
        let date = draft.date.ok_or(ActionError::MissingField("date"))?;

        let stored = events
            .mutate(Mutation::Insert(json!({
                "date": date.format("%Y-%m-%d").to_string(),
                "title": title,
                "persons": split_list(persons),
                "start_time": non_blank(draft.start_time),
                "end_time": non_blank(draft.end_time),
            })))
            .await?;

        self.notifier.send(
            "Neuer Termin",
            format!(
                "Ein neuer Termin wurde für {persons} am {} eingetragen.",
                date.format("%-d.%-m.%Y")
            ),
        );
        Ok(stored)
    }

    // ------------------------------------------------------------------------
    // Chores and shopping
    // ------------------------------------------------------------------------

    pub async fn add_chore(
        &self,
        chores: &LiveCollection,
        user: &SessionUser,
        draft: ChoreDraft,
    ) -> Result<Option<Record>> {
        let task = required("task", &draft.task)?;
        Ok(chores
            .mutate(Mutation::Insert(json!({
                "task": task,
                "assigned_to": non_blank(draft.assigned_to),
                "created_by": user.name,
                "due_date": non_blank(draft.due_date),
            })))
            .await?)
    }

    pub async fn toggle_chore(&self, chores: &LiveCollection, id: &RecordId) -> Result<()> {
        toggle_done(chores, id).await
    }

    pub async fn delete_chore(&self, chores: &LiveCollection, id: &RecordId) -> Result<()> {
        chores.mutate(Mutation::Delete(id.clone())).await?;
        Ok(())
    }

    pub async fn add_shopping_item(
        &self,
        list: &LiveCollection,
        user: &SessionUser,
        draft: ShoppingDraft,
    ) -> Result<Option<Record>> {
        let item = required("item", &draft.item)?;
        Ok(list
            .mutate(Mutation::Insert(json!({
                "item": item,
                "quantity": non_blank(draft.quantity),
                "created_by": user.name,
                "category": draft.category,
            })))
            .await?)
    }

    pub async fn toggle_shopping_item(&self, list: &LiveCollection, id: &RecordId) -> Result<()> {
        toggle_done(list, id).await
    }

    pub async fn delete_shopping_item(&self, list: &LiveCollection, id: &RecordId) -> Result<()> {
        list.mutate(Mutation::Delete(id.clone())).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Chat and news
    // ------------------------------------------------------------------------

    pub async fn send_chat_message(
        &self,
        chat: &LiveCollection,
        user: &SessionUser,
        content: &str,
    ) -> Result<Option<Record>> {
        if content.trim().is_empty() {
            return Err(ActionError::MissingField("content").into());
        }
        Ok(chat
            .mutate(Mutation::Insert(json!({ "content": content, "user_id": user.id })))
            .await?)
    }

    /// Store a feedback note signed with the user's name.
    pub async fn submit_feedback(
        &self,
        feedback: &LiveCollection,
        user: &SessionUser,
        content: &str,
    ) -> Result<Option<Record>> {
        let content = required("content", content)?;
        Ok(feedback
            .mutate(Mutation::Insert(json!({ "content": content, "user_name": user.name })))
            .await?)
    }

    /// Publish a post, uploading its image first. Nothing is inserted when
    /// the upload fails.
    pub async fn publish_news(
        &self,
        news: &LiveCollection,
        user: &SessionUser,
        draft: NewsDraft,
    ) -> Result<Option<Record>> {
        let title = required("title", &draft.title)?.to_string();

        let image_url = match draft.image {
            Some(image) => {
                let bucket = self.storage.news_bucket.as_str();
                let name = unique_name((self.clock)(), &image.file_name);
                self.blobs.upload(bucket, &name, image.bytes).await?;
                Some(self.blobs.public_url(bucket, &name))
            }
            None => None,
        };

        let stored = news
            .mutate(Mutation::Insert(json!({
                "title": title,
                "content": draft.content,
                "tags": split_list(&draft.tags),
                "created_by": user.name,
                "image_url": image_url,
            })))
            .await?;

        self.notifier.send(
            "Neuer News-Beitrag",
            format!("Ein neuer Beitrag \"{title}\" wurde veröffentlicht."),
        );
        Ok(stored)
    }

    // ------------------------------------------------------------------------
    // Food orders
    // ------------------------------------------------------------------------

    pub async fn place_food_order(
        &self,
        orders: &LiveCollection,
        user: &SessionUser,
        details: &str,
    ) -> Result<Option<Record>> {
        let details = required("details", details)?;
        let stored = orders
            .mutate(Mutation::Insert(json!({
                "details": details,
                "ordered_by": user.name,
                "status": ORDER_STATUSES[0],
            })))
            .await?;
        self.notifier.send(
            "Neue Essensbestellung",
            format!("{} hat eine neue Bestellung aufgegeben: {details}", user.name),
        );
        Ok(stored)
    }

    pub async fn update_food_order_status(
        &self,
        orders: &LiveCollection,
        id: &RecordId,
        status: &str,
    ) -> Result<()> {
        if !ORDER_STATUSES.contains(&status) {
            return Err(ActionError::UnknownStatus(status.to_string()).into());
        }
        orders
            .mutate(Mutation::Update(id.clone(), json!({ "status": status })))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Users and photos
    // ------------------------------------------------------------------------

    pub async fn reset_password(
        &self,
        users: &LiveCollection,
        id: &RecordId,
        new_password: &str,
    ) -> Result<()> {
        let password = required("password", new_password)?;
        users
            .mutate(Mutation::Update(id.clone(), json!({ "password": password })))
            .await?;
        Ok(())
    }

    pub async fn upload_photo(&self, user: &SessionUser, upload: Upload) -> Result<Photo> {
        let bucket = self.storage.photos_bucket.as_str();
        let name = unique_name((self.clock)(), &upload.file_name);
        self.blobs.upload(bucket, &name, upload.bytes).await?;
        self.notifier.send(
            "Neues Foto in der Galerie",
            format!("{} hat ein neues Foto hochgeladen.", user.name),
        );
        Ok(Photo {
            public_url: self.blobs.public_url(bucket, &name),
            name,
        })
    }
}

async fn toggle_done(coll: &LiveCollection, id: &RecordId) -> Result<()> {
    let record = coll
        .get(id)
        .ok_or_else(|| ActionError::UnknownRecord(id.clone()))?;
    let done = record.field("is_done").and_then(Value::as_bool).unwrap_or(false);
    coll.mutate(Mutation::Update(id.clone(), json!({ "is_done": !done })))
        .await?;
    Ok(())
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ActionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ActionError::MissingField(field));
    }
    Ok(trimmed)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Split on commas, trimming and dropping empty parts.
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
