use super::CacheBackend;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Asset path → unix second after which the stored link is considered dead.
pub struct ExpirationCache {
    entries: Mutex<HashMap<String, i64>>,
    backend: Arc<dyn CacheBackend<i64>>,
}

impl ExpirationCache {
    pub async fn load(backend: Arc<dyn CacheBackend<i64>>) -> Self {
        let entries = backend.load().await;
        debug!(entries = entries.len(), "Loaded expiration cache");
        Self {
            entries: Mutex::new(entries),
            backend,
        }
    }

    fn key(asset_path: &Path) -> String {
        asset_path.to_string_lossy().into_owned()
    }

    pub async fn get(&self, asset_path: &Path) -> Option<i64> {
        self.entries.lock().await.get(&Self::key(asset_path)).copied()
    }

    /// Records a new expiry and flushes the whole mapping before releasing the lock.
    pub async fn put(&self, asset_path: &Path, expires_at: i64) {
        let mut guard = self.entries.lock().await;
        guard.insert(Self::key(asset_path), expires_at);
        self.backend.save(&guard).await;
    }

    /// Drops the entry for `asset_path`, flushing only when something was removed.
    pub async fn remove(&self, asset_path: &Path) -> bool {
        let mut guard = self.entries.lock().await;
        let removed = guard.remove(&Self::key(asset_path)).is_some();
        if removed {
            self.backend.save(&guard).await;
        }
        removed
    }

    /// Replaces every entry, used when seeding from descriptors already on disk.
    pub async fn replace_all(&self, entries: HashMap<String, i64>) {
        let mut guard = self.entries.lock().await;
        *guard = entries;
        self.backend.save(&guard).await;
    }

    pub async fn flush(&self) {
        let guard = self.entries.lock().await;
        self.backend.save(&guard).await;
    }

    /// Entries whose expiry falls before `now + window`, including already expired ones.
    pub async fn expiring_within(&self, now: i64, window: i64) -> Vec<(PathBuf, i64)> {
        let guard = self.entries.lock().await;
        let mut expiring: Vec<(PathBuf, i64)> = guard
            .iter()
            .filter(|(_, expires_at)| expires_at.saturating_sub(now) < window)
            .map(|(path, expires_at)| (PathBuf::from(path), *expires_at))
            .collect();
        drop(guard);

        expiring.sort_by_key(|(_, expires_at)| *expires_at);
        expiring
    }

    pub async fn snapshot(&self) -> HashMap<String, i64> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
