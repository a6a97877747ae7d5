use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error};

/// Durable storage for one flat key-value cache.
///
/// Both operations fail soft: a backend that cannot read returns an empty map
/// and a backend that cannot write logs and moves on. Callers never see an
/// error from cache persistence.
#[async_trait]
pub trait CacheBackend<V>: Send + Sync
where
    V: Send + Sync + 'static,
{
    async fn load(&self) -> HashMap<String, V>;

    async fn save(&self, entries: &HashMap<String, V>);
}

/// One JSON object per file, keys as written by the cache.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl<V> CacheBackend<V> for JsonFileBackend
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load(&self) -> HashMap<String, V> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Cache file not found, starting empty");
                return HashMap::new();
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Error loading cache file");
                return HashMap::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Error parsing cache file");
                HashMap::new()
            }
        }
    }

    async fn save(&self, entries: &HashMap<String, V>) {
        let bytes = match serde_json::to_vec(entries) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Error serializing cache");
                return;
            }
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            error!(path = %self.path.display(), error = %e, "Error creating cache directory");
            return;
        }

        let temp = self.temp_path();
        if let Err(e) = tokio::fs::write(&temp, &bytes).await {
            error!(path = %temp.display(), error = %e, "Error saving cache file");
            return;
        }

        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            error!(path = %self.path.display(), error = %e, "Error replacing cache file");
            let _ = tokio::fs::remove_file(&temp).await;
        }
    }
}

/// In-process backend, used by tests and dry runs.
#[derive(Debug)]
pub struct MemoryBackend<V> {
    entries: Mutex<HashMap<String, V>>,
    saves: AtomicUsize,
}

impl<V> Default for MemoryBackend<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            saves: AtomicUsize::new(0),
        }
    }
}

impl<V: Clone> MemoryBackend<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entries(entries: HashMap<String, V>) -> Self {
        Self {
            entries: Mutex::new(entries),
            saves: AtomicUsize::new(0),
        }
    }

    /// Last mapping handed to `save` (or the seed mapping).
    #[must_use]
    pub fn saved(&self) -> HashMap<String, V> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<V> CacheBackend<V> for MemoryBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn load(&self) -> HashMap<String, V> {
        self.saved()
    }

    async fn save(&self, entries: &HashMap<String, V>) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.clone_from(entries);
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
    }
}
