use crate::domain::{AssetMode, Candidate, RefreshOutcome, TitleId};
use crate::library::{find_link_descriptors, media_folders, title_id_from_path};
use crate::scheduler::{ScanReport, Scheduler, Transition};
use crate::services::RefreshWorker;
use anyhow::Context;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

/// Continuous mode: picks up new media folders and re-resolves links
/// before they expire.
#[derive(Clone)]
pub struct Monitor {
    scheduler: Scheduler,
}

impl Monitor {
    #[must_use]
    pub const fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    /// Runs until `cancel` fires. Caches stay as last flushed.
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        info!("Starting continuous monitor for expiring links");
        let config = &self.scheduler.context().config.scheduler;
        let check_interval = Duration::from_secs(config.monitor_interval_seconds);
        let backoff = Duration::from_secs(config.error_backoff_seconds);

        let startup = async {
            let worker = self.initialize().await?;
            let known = self.media_folders().await?;
            anyhow::Ok((worker, known))
        };
        let (worker, known) = tokio::select! {
            () = cancel.cancelled() => {
                info!("Continuous monitor stopped during startup");
                return Ok(());
            }
            result = startup => result?,
        };
        let mut known: HashSet<PathBuf> = known.into_keys().collect();
        info!(count = known.len(), "Initial scan found media folders");

        loop {
            let cycle_id = Uuid::new_v4();
            let delay = tokio::select! {
                () = cancel.cancelled() => break,
                result = self.check_once(&worker, &mut known).instrument(info_span!("monitor", %cycle_id)) => {
                    match result {
                        Ok(()) => check_interval,
                        Err(e) => {
                            error!(error = %e, "Error in continuous monitor");
                            backoff
                        }
                    }
                }
            };

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!("Continuous monitor stopped");
        Ok(())
    }

    /// Seeds the expiration cache from descriptors on disk, or bootstraps with
    /// a full scan when there are none.
    async fn initialize(&self) -> anyhow::Result<RefreshWorker> {
        let ctx = self.scheduler.context();
        let roots = ctx.roots.clone();
        let descriptor_name = ctx.config.library.video_filename.clone();

        let seeded = tokio::task::spawn_blocking(move || find_link_descriptors(&roots, &descriptor_name))
            .await
            .context("Descriptor discovery task failed")?;

        if seeded.is_empty() {
            info!("No existing link descriptors found, performing full scan");
            self.scheduler.run_scan().await?;
            return Ok(ctx.worker().await);
        }

        info!(count = seeded.len(), "Seeded expiration cache from existing descriptors");
        let (expirations, ignored) = ctx.load_caches().await;
        expirations.replace_all(seeded).await;
        Ok(ctx.worker_with(expirations, ignored))
    }

    async fn media_folders(&self) -> anyhow::Result<HashMap<PathBuf, TitleId>> {
        let ctx = self.scheduler.context();
        let roots = ctx.roots.clone();
        let mode = ctx.config.library.classification;
        let sidecar = ctx.sidecar.clone();

        tokio::task::spawn_blocking(move || media_folders(&roots, mode, sidecar))
            .await
            .context("Media folder discovery task failed")
    }

    /// One monitor iteration: new folders first, then the expiring sweep.
    pub async fn check_once(
        &self,
        worker: &RefreshWorker,
        known: &mut HashSet<PathBuf>,
    ) -> anyhow::Result<()> {
        let current = self.media_folders().await?;

        let mut new_media: Vec<Candidate> = current
            .iter()
            .filter(|(folder, _)| !known.contains(*folder))
            .map(|(folder, title_id)| Candidate::new(folder.clone(), title_id.clone()))
            .collect();
        new_media.sort_by(|a, b| a.folder.cmp(&b.folder));

        let mut retry: HashSet<PathBuf> = HashSet::new();
        if !new_media.is_empty() {
            info!(count = new_media.len(), "Found new media folders");
            for candidate in &new_media {
                info!(folder = %candidate.folder.display(), "Processing new media");
                if worker.refresh(candidate).await == RefreshOutcome::Failed {
                    retry.insert(candidate.folder.clone());
                }
            }
        }
        // Failed folders stay unknown so the next iteration picks them up again.
        *known = current
            .into_keys()
            .filter(|folder| !retry.contains(folder))
            .collect();

        self.refresh_expiring(worker).await;
        Ok(())
    }

    /// Re-resolves every non-ignored link expiring inside the window. No-op in download mode.
    pub async fn refresh_expiring(&self, worker: &RefreshWorker) -> ScanReport {
        if worker.asset_mode() == AssetMode::Download {
            return ScanReport::default();
        }

        let ctx = self.scheduler.context();
        let now = ctx.clock.now();
        let window = ctx.config.scheduler.expiry_window_seconds;

        let mut candidates = Vec::new();
        for (descriptor, _) in worker.expirations().expiring_within(now, window).await {
            let Some(candidate) = self.candidate_for_descriptor(&descriptor) else {
                debug!(path = %descriptor.display(), "No title id for expiring descriptor");
                continue;
            };
            if worker.ignored().contains(&candidate.title_id).await {
                continue;
            }
            candidates.push(candidate);
        }

        if candidates.is_empty() {
            return ScanReport::default();
        }

        info!(count = candidates.len(), "Found links expiring soon");
        self.scheduler
            .run_pool(worker, candidates, Transition::Resolve)
            .await
    }

    /// `<folder>/backdrops/<file>` back to its candidate.
    fn candidate_for_descriptor(&self, descriptor: &Path) -> Option<Candidate> {
        let folder = descriptor.parent()?.parent()?;
        let title_id = title_id_from_path(folder)
            .or_else(|| self.scheduler.context().sidecar.find_title_id(folder))?;
        Some(Candidate::new(folder, title_id))
    }
}
