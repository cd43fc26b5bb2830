//! Local notifications, gated on the user's permission.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// Not asked yet.
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// The platform's notification facility.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn permission(&self) -> Permission;

    /// Prompt the user; returns their answer.
    async fn request_permission(&self) -> Permission;

    fn show(&self, notification: &Notification);
}

pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    permission: Mutex<Permission>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        let permission = sink.permission();
        Self {
            sink,
            permission: Mutex::new(permission),
        }
    }

    pub fn permission(&self) -> Permission {
        *self.permission.lock()
    }

    /// Ask for permission unless it has already been granted.
    pub async fn request_permission(&self) -> Permission {
        let current = self.permission();
        if current == Permission::Granted {
            return current;
        }
        let answer = self.sink.request_permission().await;
        *self.permission.lock() = answer;
        answer
    }

    /// Show a notification. Returns whether it was shown; nothing happens
    /// without [`Permission::Granted`].
    pub fn send(&self, title: impl Into<String>, body: impl Into<String>) -> bool {
        if self.permission() != Permission::Granted {
            return false;
        }
        let notification = Notification {
            title: title.into(),
            body: body.into(),
        };
        tracing::debug!(title = %notification.title, "notification");
        self.sink.show(&notification);
        true
    }
}

// ============================================================================
// MemorySink
// ============================================================================

/// Sink that answers prompts with a fixed permission and records what it
/// shows.
pub struct MemorySink {
    current: Mutex<Permission>,
    answer: Permission,
    prompts: AtomicUsize,
    shown: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new(current: Permission, answer: Permission) -> Self {
        Self {
            current: Mutex::new(current),
            answer,
            prompts: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn granted() -> Self {
        Self::new(Permission::Granted, Permission::Granted)
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    fn permission(&self) -> Permission {
        *self.current.lock()
    }

    async fn request_permission(&self) -> Permission {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *self.current.lock() = self.answer;
        self.answer
    }

    fn show(&self, notification: &Notification) {
        self.shown.lock().push(notification.clone());
    }
}
