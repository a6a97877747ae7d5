//! Per-candidate refresh state machine.
//!
//! ```text
//! ignored? ── yes ──► IgnoredSkip
//!    │ no
//! still valid? ── yes ──► ValidCached        (skipped with `force`)
//!    │ no
//! resolve ── found ──► persist ──► Persisted
//!    │          └── persist failed ──► Failed
//!    ├─ not found ──► MarkedIgnored
//!    └─ error ──► Failed
//! ```

use crate::cache::{ExpirationCache, IgnoreEntry, IgnoreList};
use crate::clients::{ResolveError, TrailerResolver};
use crate::constants::IGNORE_REASON_NO_TRAILER;
use crate::domain::{AssetMode, Candidate, RefreshOutcome};
use crate::parser::{format_duration, parse_expiry};
use crate::services::assets::{AssetError, AssetWriter};
use crate::services::clock::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Trailer lookup failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Could not persist trailer: {0}")]
    Asset(#[from] AssetError),

    #[error("Trailer download failed")]
    Download,
}

#[derive(Debug, Clone)]
pub struct RefreshOptions {
    pub asset_mode: AssetMode,
    pub language: String,
    pub force: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            asset_mode: AssetMode::default(),
            language: "en".to_string(),
            force: false,
        }
    }
}

#[derive(Clone)]
pub struct RefreshWorker {
    expirations: Arc<ExpirationCache>,
    ignored: Arc<IgnoreList>,
    resolver: Arc<dyn TrailerResolver>,
    assets: Arc<dyn AssetWriter>,
    clock: Arc<dyn Clock>,
    options: RefreshOptions,
}

impl RefreshWorker {
    #[must_use]
    pub fn new(
        expirations: Arc<ExpirationCache>,
        ignored: Arc<IgnoreList>,
        resolver: Arc<dyn TrailerResolver>,
        assets: Arc<dyn AssetWriter>,
        clock: Arc<dyn Clock>,
        options: RefreshOptions,
    ) -> Self {
        Self {
            expirations,
            ignored,
            resolver,
            assets,
            clock,
            options,
        }
    }

    #[must_use]
    pub fn expirations(&self) -> &Arc<ExpirationCache> {
        &self.expirations
    }

    #[must_use]
    pub fn ignored(&self) -> &Arc<IgnoreList> {
        &self.ignored
    }

    #[must_use]
    pub const fn asset_mode(&self) -> AssetMode {
        self.options.asset_mode
    }

    /// Full state machine for one candidate.
    pub async fn process(&self, candidate: &Candidate) -> RefreshOutcome {
        if self.is_ignored(candidate).await {
            return RefreshOutcome::IgnoredSkip;
        }

        if !self.options.force && self.is_still_valid(candidate).await {
            return RefreshOutcome::ValidCached;
        }

        self.resolve_and_persist(candidate).await
    }

    /// Resolving transition only: the validity check is skipped, the ignore check is not.
    pub async fn refresh(&self, candidate: &Candidate) -> RefreshOutcome {
        if self.is_ignored(candidate).await {
            return RefreshOutcome::IgnoredSkip;
        }

        self.resolve_and_persist(candidate).await
    }

    async fn is_ignored(&self, candidate: &Candidate) -> bool {
        let ignored = self.ignored.contains(&candidate.title_id).await;
        if ignored {
            info!(
                title_id = %candidate.title_id,
                folder = %candidate.folder.display(),
                "Skipping ignored title"
            );
        }
        ignored
    }

    async fn is_still_valid(&self, candidate: &Candidate) -> bool {
        match self.options.asset_mode {
            AssetMode::Download => {
                let asset = self.assets.asset_path(&candidate.folder);
                let exists = tokio::fs::try_exists(&asset).await.unwrap_or(false);
                if exists {
                    info!(
                        title_id = %candidate.title_id,
                        folder = %candidate.folder.display(),
                        "Trailer already downloaded"
                    );
                }
                exists
            }
            AssetMode::LinkDescriptor => {
                let descriptor = self.assets.descriptor_path(&candidate.folder);
                let now = self.clock.now();
                match self.expirations.get(&descriptor).await {
                    Some(expires_at) if now < expires_at => {
                        info!(
                            title_id = %candidate.title_id,
                            folder = %candidate.folder.display(),
                            expires_in = %format_duration(expires_at.saturating_sub(now)),
                            "Trailer link still valid"
                        );
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    async fn resolve_and_persist(&self, candidate: &Candidate) -> RefreshOutcome {
        match self.try_resolve_and_persist(candidate).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    title_id = %candidate.title_id,
                    folder = %candidate.folder.display(),
                    error = %e,
                    "Error processing title"
                );
                RefreshOutcome::Failed
            }
        }
    }

    async fn try_resolve_and_persist(
        &self,
        candidate: &Candidate,
    ) -> Result<RefreshOutcome, RefreshError> {
        let title_id = &candidate.title_id;
        let folder = &candidate.folder;

        let resolved = self.resolver.resolve(title_id, &self.options.language).await?;

        let Some(url) = resolved else {
            let entry = IgnoreEntry {
                path: folder.to_string_lossy().into_owned(),
                last_checked: self.clock.now(),
                reason: IGNORE_REASON_NO_TRAILER.to_string(),
            };
            self.ignored.put(title_id, entry).await;
            warn!(
                title_id = %title_id,
                folder = %folder.display(),
                "No trailer found, added to ignored titles"
            );
            return Ok(RefreshOutcome::MarkedIgnored);
        };

        match self.options.asset_mode {
            AssetMode::Download => {
                if !self.assets.download_asset(folder, &url).await {
                    return Err(RefreshError::Download);
                }
            }
            AssetMode::LinkDescriptor => {
                let descriptor = self.assets.write_link_descriptor(folder, &url).await?;
                if let Some(expires_at) = parse_expiry(&url) {
                    self.expirations.put(&descriptor, expires_at).await;
                } else {
                    // An untracked link counts as expired on the next cycle.
                    self.expirations.remove(&descriptor).await;
                    warn!(
                        title_id = %title_id,
                        path = %descriptor.display(),
                        "Trailer URL has no expiry, not tracking it"
                    );
                }
            }
        }

        info!(title_id = %title_id, folder = %folder.display(), "Trailer refreshed");
        Ok(RefreshOutcome::Persisted)
    }
}
