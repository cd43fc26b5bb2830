//! File storage for photos and news images.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    pub name: String,
    pub size: usize,
}

/// A stored photo together with the URL it can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub name: String,
    pub public_url: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `name` in `bucket`; returns the stored path.
    /// Names are not overwritten.
    async fn upload(&self, bucket: &str, name: &str, bytes: Vec<u8>)
        -> Result<String, StorageError>;

    /// Publicly reachable URL for an object. Does not check existence.
    fn public_url(&self, bucket: &str, name: &str) -> String;

    async fn list(&self, bucket: &str) -> Result<Vec<BlobEntry>, StorageError>;
}

/// Object name for an upload: `<unix millis>_<file name>`.
pub fn unique_name(now: DateTime<Utc>, file_name: &str) -> String {
    format!("{}_{}", now.timestamp_millis(), file_name)
}

/// Every object in `bucket` paired with its public URL.
pub async fn list_photos(store: &dyn BlobStore, bucket: &str) -> Result<Vec<Photo>, StorageError> {
    let entries = store.list(bucket).await?;
    Ok(entries
        .into_iter()
        .map(|entry| Photo {
            public_url: store.public_url(bucket, &entry.name),
            name: entry.name,
        })
        .collect())
}

// ============================================================================
// MemoryBlobStore
// ============================================================================

#[derive(Default)]
struct BlobState {
    buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    unavailable: bool,
}

/// In-process blob store. Objects are listed in name order.
#[derive(Clone)]
pub struct MemoryBlobStore {
    base_url: String,
    state: Arc<Mutex<BlobState>>,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Arc::new(Mutex::new(BlobState::default())),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().unavailable = !available;
    }

    pub fn get(&self, bucket: &str, name: &str) -> Option<Vec<u8>> {
        self.state.lock().buckets.get(bucket)?.get(name).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let mut state = self.state.lock();
        if state.unavailable {
            return Err(StorageError::Unavailable("storage offline".into()));
        }
        let objects = state.buckets.entry(bucket.to_string()).or_default();
        if objects.contains_key(name) {
            return Err(StorageError::Unavailable(format!(
                "object \"{name}\" already exists in \"{bucket}\""
            )));
        }
        objects.insert(name.to_string(), bytes);
        Ok(format!("{bucket}/{name}"))
    }

    fn public_url(&self, bucket: &str, name: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{name}", self.base_url)
    }

    async fn list(&self, bucket: &str) -> Result<Vec<BlobEntry>, StorageError> {
        let state = self.state.lock();
        if state.unavailable {
            return Err(StorageError::Unavailable("storage offline".into()));
        }
        Ok(state
            .buckets
            .get(bucket)
            .map(|objects| {
                objects
                    .iter()
                    .map(|(name, bytes)| BlobEntry {
                        name: name.clone(),
                        size: bytes.len(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
