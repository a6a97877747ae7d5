use super::CacheBackend;
use crate::domain::TitleId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Why a title is no longer looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreEntry {
    pub path: String,
    #[serde(alias = "lastChecked")]
    pub last_checked: i64,
    pub reason: String,
}

/// Title id → ignore metadata. An entry stays until it is removed explicitly.
pub struct IgnoreList {
    entries: Mutex<HashMap<String, IgnoreEntry>>,
    backend: Arc<dyn CacheBackend<IgnoreEntry>>,
}

impl IgnoreList {
    pub async fn load(backend: Arc<dyn CacheBackend<IgnoreEntry>>) -> Self {
        let entries = backend.load().await;
        debug!(entries = entries.len(), "Loaded ignore list");
        Self {
            entries: Mutex::new(entries),
            backend,
        }
    }

    pub async fn contains(&self, title_id: &TitleId) -> bool {
        self.entries.lock().await.contains_key(title_id.as_str())
    }

    pub async fn get(&self, title_id: &TitleId) -> Option<IgnoreEntry> {
        self.entries.lock().await.get(title_id.as_str()).cloned()
    }

    pub async fn put(&self, title_id: &TitleId, entry: IgnoreEntry) {
        let mut guard = self.entries.lock().await;
        guard.insert(title_id.as_str().to_string(), entry);
        self.backend.save(&guard).await;
    }

    /// Clears one title so it is retried on the next cycle.
    pub async fn remove(&self, title_id: &TitleId) -> bool {
        let mut guard = self.entries.lock().await;
        let removed = guard.remove(title_id.as_str()).is_some();
        if removed {
            self.backend.save(&guard).await;
        }
        removed
    }

    pub async fn flush(&self) {
        let guard = self.entries.lock().await;
        self.backend.save(&guard).await;
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
