//! The household app's views expressed as live collections.
//!
//! - [`presets`]: one [`CollectionOptions`](crate::live::CollectionOptions)
//!   per view, plus [`UserDirectory`].
//! - [`actions`]: validated writes and their notifications.
//! - [`chat`]: mention and tag extraction.
//! - [`session`]: [`SessionContext`] and its stores.

pub mod actions;
pub mod chat;
pub mod presets;
pub mod session;

pub use actions::{
    split_list, Actions, ChoreDraft, EventDraft, NewsDraft, ShoppingDraft, Upload, ORDER_STATUSES,
};
pub use chat::{hashtags, mentions};
pub use presets::UserDirectory;
pub use session::{
    FileStore, KeyValueStore, MemoryStore, SessionContext, SessionUser, Theme, THEME_KEY, USER_KEY,
};
