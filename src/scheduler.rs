use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::domain::{Candidate, RefreshOutcome};
use crate::library::FolderClassifier;
use crate::services::{Monitor, RefreshWorker};
use crate::state::RefreshContext;

/// Terminal-state counts for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub candidates: usize,
    pub ignored_skip: usize,
    pub valid_cached: usize,
    pub persisted: usize,
    pub marked_ignored: usize,
    pub failed: usize,
}

impl ScanReport {
    pub const fn record(&mut self, outcome: RefreshOutcome) {
        match outcome {
            RefreshOutcome::IgnoredSkip => self.ignored_skip += 1,
            RefreshOutcome::ValidCached => self.valid_cached += 1,
            RefreshOutcome::Persisted => self.persisted += 1,
            RefreshOutcome::MarkedIgnored => self.marked_ignored += 1,
            RefreshOutcome::Failed => self.failed += 1,
        }
    }

    #[must_use]
    pub const fn completed(&self) -> usize {
        self.ignored_skip + self.valid_cached + self.persisted + self.marked_ignored + self.failed
    }
}

/// Which part of the worker state machine a pooled run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Ignore check, validity check, resolve.
    Full,
    /// Ignore check, resolve.
    Resolve,
}

#[derive(Clone)]
pub struct Scheduler {
    ctx: Arc<RefreshContext>,
}

impl Scheduler {
    #[must_use]
    pub const fn new(ctx: Arc<RefreshContext>) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub const fn context(&self) -> &Arc<RefreshContext> {
        &self.ctx
    }

    /// Classifies every root up front, on the blocking pool.
    pub async fn collect_candidates(&self) -> Result<Vec<Candidate>> {
        let roots = self.ctx.roots.clone();
        let mode = self.ctx.config.library.classification;
        let sidecar = self.ctx.sidecar.clone();
        let limit = self.ctx.config.refresh.limit;

        tokio::task::spawn_blocking(move || {
            let classifier = FolderClassifier::new(mode, sidecar).with_limit(limit);
            classifier.classify(&roots).collect::<Vec<_>>()
        })
        .await
        .context("Candidate collection task failed")
    }

    /// One-shot scan: every candidate goes through the full state machine.
    pub async fn run_scan(&self) -> Result<ScanReport> {
        let cycle_id = Uuid::new_v4();

        async {
            let started = Instant::now();
            let candidates = self.collect_candidates().await?;
            info!(count = candidates.len(), "Found candidate folders");

            let worker = self.ctx.worker().await;
            let report = self.run_pool(&worker, candidates, Transition::Full).await;

            info!(
                event = "scan_completed",
                candidates = report.candidates,
                persisted = report.persisted,
                valid_cached = report.valid_cached,
                ignored_skip = report.ignored_skip,
                marked_ignored = report.marked_ignored,
                failed = report.failed,
                duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Scan complete"
            );
            Ok(report)
        }
        .instrument(info_span!("scan", %cycle_id))
        .await
    }

    /// Runs `candidates` through `worker` with at most `refresh.workers` in flight.
    pub async fn run_pool(
        &self,
        worker: &RefreshWorker,
        candidates: Vec<Candidate>,
        transition: Transition,
    ) -> ScanReport {
        let workers = self.ctx.config.refresh.workers.max(1);
        let mut report = ScanReport {
            candidates: candidates.len(),
            ..ScanReport::default()
        };

        let outcomes: Vec<RefreshOutcome> = stream::iter(candidates)
            .map(|candidate| async move {
                match transition {
                    Transition::Full => worker.process(&candidate).await,
                    Transition::Resolve => worker.refresh(&candidate).await,
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    /// Scans now, then every `schedule_days` days until cancelled.
    pub async fn run_scheduled(&self, cancel: CancellationToken) -> Result<()> {
        let days = self.ctx.config.scheduler.schedule_days.max(1);
        let period = Duration::from_secs(u64::from(days) * 24 * 60 * 60);
        let poll = Duration::from_secs(self.ctx.config.scheduler.poll_interval_seconds.max(1));

        if !self.scheduled_job(&cancel).await {
            return Ok(());
        }
        let mut next_run = Instant::now() + period;
        info!(days, "Scheduler started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Scheduler stopped");
                    return Ok(());
                }
                () = tokio::time::sleep(poll) => {}
            }

            if Instant::now() >= next_run {
                if !self.scheduled_job(&cancel).await {
                    return Ok(());
                }
                next_run = Instant::now() + period;
            }
        }
    }

    /// `false` once cancelled.
    async fn scheduled_job(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("Scheduler stopped during scan");
                false
            }
            result = self.run_scan() => {
                if let Err(e) = result {
                    error!(error = %e, "Scheduled scan failed");
                }
                true
            }
        }
    }

    pub async fn run_monitor(&self, cancel: CancellationToken) -> Result<()> {
        Monitor::new(self.clone()).run(cancel).await
    }
}
