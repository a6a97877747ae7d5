//! End-to-end refresh cycles over a temporary library with a fake resolver.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trailerfin::cache::{IgnoreEntry, MemoryBackend};
use trailerfin::clients::{ResolveError, TrailerResolver};
use trailerfin::config::Config;
use trailerfin::domain::{AssetMode, ClassificationMode, TitleId};
use trailerfin::parser::NfoReader;
use trailerfin::scheduler::Scheduler;
use trailerfin::services::{Clock, FileAssetWriter, ManualClock, Monitor};
use trailerfin::state::RefreshContext;

const NOW: i64 = 1_700_000_000;

#[derive(Default)]
struct FakeResolver {
    urls: HashMap<String, String>,
    delay: Duration,
    failures: AtomicUsize,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeResolver {
    fn with(urls: &[(&str, String)]) -> Self {
        Self {
            urls: urls
                .iter()
                .map(|(id, url)| ((*id).to_string(), url.clone()))
                .collect(),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrailerResolver for FakeResolver {
    async fn resolve(
        &self,
        title_id: &TitleId,
        _language: &str,
    ) -> Result<Option<String>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ResolveError::Parse("upstream unavailable".to_string()));
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.urls.get(title_id.as_str()).cloned())
    }
}

struct Fixture {
    root: PathBuf,
    clock: Arc<ManualClock>,
    resolver: Arc<FakeResolver>,
    expirations: Arc<MemoryBackend<i64>>,
    ignored: Arc<MemoryBackend<IgnoreEntry>>,
    scheduler: Scheduler,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.root).ok();
    }
}

fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("trailerfin-cycle-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&root).unwrap();
    root
}

fn fixture(resolver: FakeResolver, configure: impl FnOnce(&mut Config)) -> Fixture {
    let root = temp_root();
    let mut config = Config::default();
    config.library.scan_paths = vec![root.to_string_lossy().into_owned()];
    configure(&mut config);

    let clock = Arc::new(ManualClock::new(NOW));
    let resolver = Arc::new(resolver);
    let expirations = Arc::new(MemoryBackend::<i64>::new());
    let ignored = Arc::new(MemoryBackend::<IgnoreEntry>::new());

    let ctx = RefreshContext {
        roots: config.scan_roots().unwrap(),
        expirations_backend: expirations.clone(),
        ignored_backend: ignored.clone(),
        resolver: resolver.clone(),
        assets: Arc::new(FileAssetWriter::new(
            reqwest::Client::new(),
            config.library.video_filename.clone(),
        )),
        sidecar: Arc::new(NfoReader::new()),
        clock: clock.clone(),
        config,
    };

    Fixture {
        root,
        clock,
        resolver,
        expirations,
        ignored,
        scheduler: Scheduler::new(Arc::new(ctx)),
    }
}

fn media_folder(root: &Path, name: &str, videos: &[&str]) -> PathBuf {
    let folder = root.join(name);
    std::fs::create_dir_all(&folder).unwrap();
    for video in videos {
        std::fs::write(folder.join(video), b"").unwrap();
    }
    folder
}

fn expiring_url(expires_at: i64) -> String {
    format!("https://cdn.example/trailer.mp4?Expires={expires_at}&Signature=abc#t=10")
}

fn write_descriptor(folder: &Path, url: &str) -> PathBuf {
    let backdrops = folder.join("backdrops");
    std::fs::create_dir_all(&backdrops).unwrap();
    let descriptor = backdrops.join("video1.strm");
    std::fs::write(&descriptor, url).unwrap();
    descriptor
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !done() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_movie_resolved_then_cached_on_rescan() {
    let url = expiring_url(NOW + 86_400);
    let fx = fixture(FakeResolver::with(&[("tt0000001", url.clone())]), |_| {});
    let folder = media_folder(&fx.root, "Movie A {imdb-tt0000001}", &["movie.mkv"]);

    let report = fx.scheduler.run_scan().await.unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.persisted, 1);

    let descriptor = folder.join("backdrops").join("video1.strm");
    assert_eq!(std::fs::read_to_string(&descriptor).unwrap(), url);

    let saved = fx.expirations.saved();
    assert_eq!(
        saved.get(&*descriptor.to_string_lossy()),
        Some(&(NOW + 86_400))
    );

    fx.clock.advance(3_600);
    let report = fx.scheduler.run_scan().await.unwrap();
    assert_eq!(report.valid_cached, 1);
    assert_eq!(fx.resolver.calls(), 1);
}

#[tokio::test]
async fn test_not_found_is_ignored_on_later_cycles() {
    let fx = fixture(FakeResolver::default(), |_| {});
    let folder = media_folder(&fx.root, "Obscure {imdb-tt0000009}", &["movie.mp4"]);

    let report = fx.scheduler.run_scan().await.unwrap();
    assert_eq!(report.marked_ignored, 1);

    let ignored = fx.ignored.saved();
    let entry = ignored.get("tt0000009").unwrap();
    assert_eq!(entry.reason, "No trailer available");
    assert_eq!(entry.last_checked, NOW);
    assert_eq!(entry.path, folder.to_string_lossy());

    for _ in 0..2 {
        fx.clock.advance(86_400);
        let report = fx.scheduler.run_scan().await.unwrap();
        assert_eq!(report.ignored_skip, 1);
    }
    assert_eq!(fx.resolver.calls(), 1);
    assert!(!folder.join("backdrops").exists());
}

#[tokio::test]
async fn test_multi_video_folders_are_skipped() {
    let fx = fixture(
        FakeResolver::with(&[
            ("tt0000001", expiring_url(NOW + 86_400)),
            ("tt0000002", expiring_url(NOW + 86_400)),
        ]),
        |_| {},
    );
    media_folder(&fx.root, "Movie A {imdb-tt0000001}", &["movie.mkv"]);
    media_folder(&fx.root, "Series {imdb-tt0000002}", &["e01.mkv", "e02.MKV"]);

    let report = fx.scheduler.run_scan().await.unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.persisted, 1);
}

#[tokio::test]
async fn test_season_folders_collapse_onto_show() {
    let fx = fixture(
        FakeResolver::with(&[("tt0000002", expiring_url(NOW + 86_400))]),
        |config| config.library.classification = ClassificationMode::SidecarMetadata,
    );
    let show = media_folder(&fx.root, "Show", &[]);
    std::fs::write(
        show.join("tvshow.nfo"),
        r#"<tvshow><uniqueid type="imdb">tt0000002</uniqueid></tvshow>"#,
    )
    .unwrap();
    media_folder(&show, "Season 01", &["e01.mkv", "e02.mkv"]);
    media_folder(&show, "Season 02", &["e01.mkv"]);

    let candidates = fx.scheduler.collect_candidates().await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].folder, show);
    assert_eq!(candidates[0].title_id, TitleId::new("tt0000002"));

    let report = fx.scheduler.run_scan().await.unwrap();
    assert_eq!(report.persisted, 1);
    assert!(show.join("backdrops").join("video1.strm").is_file());
}

#[tokio::test]
async fn test_limit_truncates_candidates() {
    let fx = fixture(FakeResolver::default(), |config| config.refresh.limit = Some(2));
    for i in 0..5 {
        media_folder(&fx.root, &format!("Movie {i} {{imdb-tt100000{i}}}"), &["m.mkv"]);
    }

    let candidates = fx.scheduler.collect_candidates().await.unwrap();
    assert_eq!(candidates.len(), 2);
}

#[tokio::test]
async fn test_zero_limit_means_unlimited() {
    let fx = fixture(FakeResolver::default(), |config| config.refresh.limit = Some(0));
    for i in 0..3 {
        media_folder(&fx.root, &format!("Movie {i} {{imdb-tt100000{i}}}"), &["m.mkv"]);
    }

    let candidates = fx.scheduler.collect_candidates().await.unwrap();
    assert_eq!(candidates.len(), 3);
}

#[tokio::test]
async fn test_worker_pool_is_bounded() {
    let urls: Vec<(String, String)> = (0..10)
        .map(|i| (format!("tt200000{i}"), expiring_url(NOW + 86_400)))
        .collect();
    let mut resolver = FakeResolver::with(
        &urls
            .iter()
            .map(|(id, url)| (id.as_str(), url.clone()))
            .collect::<Vec<_>>(),
    );
    resolver.delay = Duration::from_millis(30);

    let fx = fixture(resolver, |config| config.refresh.workers = 3);
    for (id, _) in &urls {
        media_folder(&fx.root, &format!("Title {{imdb-{id}}}"), &["m.mkv"]);
    }

    let report = fx.scheduler.run_scan().await.unwrap();
    assert_eq!(report.persisted, 10);

    let max = fx.resolver.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "max in flight was {max}");
    assert!(max >= 2, "pool never overlapped work");
}

#[tokio::test]
async fn test_download_mode_keeps_existing_asset() {
    let fx = fixture(
        FakeResolver::with(&[("tt0000001", expiring_url(NOW + 86_400))]),
        |config| config.refresh.asset_mode = AssetMode::Download,
    );
    let folder = media_folder(&fx.root, "Movie A {imdb-tt0000001}", &["movie.iso"]);
    std::fs::write(folder.join("trailer.mp4"), b"existing").unwrap();

    let report = fx.scheduler.run_scan().await.unwrap();
    assert_eq!(report.valid_cached, 1);
    assert_eq!(fx.resolver.calls(), 0);
}

#[tokio::test]
async fn test_downloaded_trailer_counts_as_video() {
    let fx = fixture(
        FakeResolver::with(&[("tt0000001", expiring_url(NOW + 86_400))]),
        |config| config.refresh.asset_mode = AssetMode::Download,
    );
    let folder = media_folder(&fx.root, "Movie A {imdb-tt0000001}", &["movie.mkv"]);
    std::fs::write(folder.join("trailer.mp4"), b"existing").unwrap();

    let report = fx.scheduler.run_scan().await.unwrap();
    assert_eq!(report.candidates, 0);
    assert_eq!(fx.resolver.calls(), 0);
    assert_eq!(std::fs::read(folder.join("trailer.mp4")).unwrap(), b"existing");
}

#[tokio::test]
async fn test_monitor_refreshes_expiring_links() {
    let fx = fixture(
        FakeResolver::with(&[
            ("tt0000001", expiring_url(NOW + 1_800)),
            ("tt0000002", expiring_url(NOW + 86_400)),
        ]),
        |_| {},
    );
    media_folder(&fx.root, "Soon {imdb-tt0000001}", &["a.mkv"]);
    media_folder(&fx.root, "Later {imdb-tt0000002}", &["b.mkv"]);

    fx.scheduler.run_scan().await.unwrap();
    assert_eq!(fx.resolver.calls(), 2);

    let worker = fx.scheduler.context().worker().await;
    let monitor = Monitor::new(fx.scheduler.clone());
    let report = monitor.refresh_expiring(&worker).await;

    assert_eq!(report.candidates, 1);
    assert_eq!(report.persisted, 1);
    assert_eq!(fx.resolver.calls(), 3);
}

#[tokio::test]
async fn test_monitor_sweep_skips_ignored_titles() {
    let fx = fixture(
        FakeResolver::with(&[("tt0000001", expiring_url(NOW + 600))]),
        |_| {},
    );
    media_folder(&fx.root, "Soon {imdb-tt0000001}", &["a.mkv"]);
    fx.scheduler.run_scan().await.unwrap();

    let worker = fx.scheduler.context().worker().await;
    worker
        .ignored()
        .put(
            &TitleId::new("tt0000001"),
            IgnoreEntry {
                path: String::new(),
                last_checked: fx.clock.now(),
                reason: "manual".to_string(),
            },
        )
        .await;

    let report = Monitor::new(fx.scheduler.clone())
        .refresh_expiring(&worker)
        .await;
    assert_eq!(report.candidates, 0);
    assert_eq!(fx.resolver.calls(), 1);
}

#[tokio::test]
async fn test_monitor_sweep_disabled_in_download_mode() {
    let fx = fixture(FakeResolver::default(), |config| {
        config.refresh.asset_mode = AssetMode::Download;
    });
    let worker = fx.scheduler.context().worker().await;

    let mut seed: HashMap<String, i64> = HashMap::new();
    seed.insert(
        fx.root
            .join("X {imdb-tt0000001}/backdrops/video1.strm")
            .to_string_lossy()
            .into_owned(),
        NOW,
    );
    worker.expirations().replace_all(seed).await;

    let report = Monitor::new(fx.scheduler.clone())
        .refresh_expiring(&worker)
        .await;
    assert_eq!(report.candidates, 0);
    assert_eq!(fx.resolver.calls(), 0);
}

#[tokio::test]
async fn test_monitor_processes_only_new_media() {
    let fx = fixture(
        FakeResolver::with(&[
            ("tt0000001", expiring_url(NOW + 86_400)),
            ("tt0000002", expiring_url(NOW + 86_400)),
        ]),
        |_| {},
    );
    let existing = media_folder(&fx.root, "Old {imdb-tt0000001}", &["a.mkv"]);

    let monitor = Monitor::new(fx.scheduler.clone());
    let worker = fx.scheduler.context().worker().await;
    let mut known: HashSet<PathBuf> = HashSet::from([existing]);

    let added = media_folder(&fx.root, "New {imdb-tt0000002}", &["b.mkv"]);
    monitor.check_once(&worker, &mut known).await.unwrap();

    assert_eq!(fx.resolver.calls(), 1);
    assert!(added.join("backdrops").join("video1.strm").is_file());
    assert!(known.contains(&added));

    monitor.check_once(&worker, &mut known).await.unwrap();
    assert_eq!(fx.resolver.calls(), 1);
}

#[tokio::test]
async fn test_monitor_retries_new_media_after_failure() {
    let resolver = FakeResolver::with(&[("tt0000002", expiring_url(NOW + 86_400))]);
    resolver.failures.store(1, Ordering::SeqCst);
    let fx = fixture(resolver, |_| {});

    let monitor = Monitor::new(fx.scheduler.clone());
    let worker = fx.scheduler.context().worker().await;
    let mut known: HashSet<PathBuf> = HashSet::new();

    let added = media_folder(&fx.root, "New {imdb-tt0000002}", &["b.mkv"]);
    let descriptor = added.join("backdrops").join("video1.strm");

    monitor.check_once(&worker, &mut known).await.unwrap();
    assert_eq!(fx.resolver.calls(), 1);
    assert!(!descriptor.is_file());
    assert!(!known.contains(&added));

    monitor.check_once(&worker, &mut known).await.unwrap();
    assert_eq!(fx.resolver.calls(), 2);
    assert!(descriptor.is_file());
    assert!(known.contains(&added));

    monitor.check_once(&worker, &mut known).await.unwrap();
    assert_eq!(fx.resolver.calls(), 2);
}

#[tokio::test]
async fn test_monitor_seeds_cache_from_existing_descriptors() {
    let fx = fixture(FakeResolver::default(), |_| {});
    let a = media_folder(&fx.root, "Movie A {imdb-tt0000001}", &["a.mkv"]);
    let b = media_folder(&fx.root, "Movie B {imdb-tt0000002}", &["b.mkv"]);
    let c = media_folder(&fx.root, "Movie C {imdb-tt0000003}", &["c.mkv"]);
    let a_descriptor = write_descriptor(&a, &expiring_url(NOW + 86_400));
    let b_descriptor = write_descriptor(&b, &expiring_url(NOW + 172_800));
    write_descriptor(&c, "https://www.youtube.com/watch?v=abc");

    let cancel = CancellationToken::new();
    let scheduler = fx.scheduler.clone();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run_monitor(cancel).await }
    });

    wait_until(|| !fx.expirations.saved().is_empty()).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("monitor did not stop")
        .unwrap()
        .unwrap();

    let expected: HashMap<String, i64> = HashMap::from([
        (a_descriptor.to_string_lossy().into_owned(), NOW + 86_400),
        (b_descriptor.to_string_lossy().into_owned(), NOW + 172_800),
    ]);
    assert_eq!(fx.expirations.saved(), expected);
    assert_eq!(fx.resolver.calls(), 0);
}

#[tokio::test]
async fn test_monitor_bootstraps_with_full_scan() {
    let fx = fixture(
        FakeResolver::with(&[("tt0000001", expiring_url(NOW + 86_400))]),
        |_| {},
    );
    let folder = media_folder(&fx.root, "Movie A {imdb-tt0000001}", &["a.mkv"]);
    let descriptor = folder.join("backdrops").join("video1.strm");

    let cancel = CancellationToken::new();
    let scheduler = fx.scheduler.clone();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run_monitor(cancel).await }
    });

    wait_until(|| !fx.expirations.saved().is_empty()).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("monitor did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(fx.resolver.calls(), 1);
    assert!(descriptor.is_file());
    assert_eq!(
        fx.expirations.saved().get(&*descriptor.to_string_lossy()),
        Some(&(NOW + 86_400))
    );
}

#[tokio::test]
async fn test_cancelled_monitor_returns() {
    let fx = fixture(FakeResolver::default(), |_| {});
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        fx.scheduler.run_monitor(cancel),
    )
    .await
    .expect("monitor did not stop");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_scheduled_mode_runs_immediately_and_stops() {
    let fx = fixture(
        FakeResolver::with(&[("tt0000001", expiring_url(NOW + 86_400))]),
        |_| {},
    );
    media_folder(&fx.root, "Movie A {imdb-tt0000001}", &["movie.mkv"]);

    let cancel = CancellationToken::new();
    let scheduler = fx.scheduler.clone();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run_scheduled(cancel).await }
    });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while fx.resolver.calls() == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(fx.resolver.calls(), 1);

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert!(result.is_ok());
}
