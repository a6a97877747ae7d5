use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crate::cache::{CacheBackend, ExpirationCache, IgnoreEntry, IgnoreList, JsonFileBackend};
use crate::clients::{ImdbClient, TmdbClient, TrailerResolver};
use crate::config::Config;
use crate::domain::AssetMode;
use crate::parser::{NfoReader, SidecarReader};
use crate::services::{
    AssetWriter, Clock, FileAssetWriter, RefreshOptions, RefreshWorker, SystemClock,
    TrailerService,
};

/// Build a shared HTTP client for bulk transfers.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("trailerfin/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

/// Everything a refresh cycle needs, built once per process.
#[derive(Clone)]
pub struct RefreshContext {
    pub config: Config,

    /// Validated absolute scan roots.
    pub roots: Vec<PathBuf>,

    pub expirations_backend: Arc<dyn CacheBackend<i64>>,

    pub ignored_backend: Arc<dyn CacheBackend<IgnoreEntry>>,

    pub resolver: Arc<dyn TrailerResolver>,

    pub assets: Arc<dyn AssetWriter>,

    pub sidecar: Arc<dyn SidecarReader>,

    pub clock: Arc<dyn Clock>,
}

impl RefreshContext {
    /// Production wiring: JSON caches, IMDb with optional TMDB, files on disk.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let roots = config.scan_roots()?;

        let imdb = Arc::new(ImdbClient::new(&config.imdb)?);

        let tmdb = if config.refresh.asset_mode == AssetMode::LinkDescriptor {
            TmdbClient::connect(&config.tmdb).await
        } else {
            None
        };
        if tmdb.is_some() {
            info!(language = %config.refresh.language, "TMDB available for localized trailers");
        }

        let download_client = build_shared_http_client(config.downloads.request_timeout_seconds)
            .context("Failed to set up trailer downloads")?;

        Ok(Self {
            roots,
            expirations_backend: Arc::new(JsonFileBackend::new(config.expirations_path())),
            ignored_backend: Arc::new(JsonFileBackend::new(config.ignored_path())),
            resolver: Arc::new(TrailerService::new(tmdb, imdb)),
            assets: Arc::new(FileAssetWriter::new(
                download_client,
                config.library.video_filename.clone(),
            )),
            sidecar: Arc::new(NfoReader::new()),
            clock: Arc::new(SystemClock),
            config,
        })
    }

    #[must_use]
    pub fn options(&self) -> RefreshOptions {
        RefreshOptions {
            asset_mode: self.config.refresh.asset_mode,
            language: self.config.refresh.language.clone(),
            force: self.config.refresh.force,
        }
    }

    /// Both caches, freshly loaded from their backends.
    pub async fn load_caches(&self) -> (Arc<ExpirationCache>, Arc<IgnoreList>) {
        let expirations = ExpirationCache::load(self.expirations_backend.clone()).await;
        let ignored = IgnoreList::load(self.ignored_backend.clone()).await;
        (Arc::new(expirations), Arc::new(ignored))
    }

    #[must_use]
    pub fn worker_with(
        &self,
        expirations: Arc<ExpirationCache>,
        ignored: Arc<IgnoreList>,
    ) -> RefreshWorker {
        RefreshWorker::new(
            expirations,
            ignored,
            self.resolver.clone(),
            self.assets.clone(),
            self.clock.clone(),
            self.options(),
        )
    }

    /// Worker over caches loaded at call time.
    pub async fn worker(&self) -> RefreshWorker {
        let (expirations, ignored) = self.load_caches().await;
        self.worker_with(expirations, ignored)
    }
}
