use crate::constants::{cache, intervals, limits, timeouts};
use crate::domain::{AssetMode, ClassificationMode};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub library: LibraryConfig,

    pub refresh: RefreshConfig,

    pub scheduler: SchedulerConfig,

    pub imdb: ImdbConfig,

    pub tmdb: TmdbConfig,

    pub downloads: DownloadConfig,

    pub cache: CacheConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Library roots to scan. Relative paths resolve against the working directory.
    pub scan_paths: Vec<String>,

    /// File name of the link-descriptor written under `<folder>/backdrops/`.
    pub video_filename: String,

    pub classification: ClassificationMode,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            scan_paths: Vec::new(),
            video_filename: "video1.strm".to_string(),
            classification: ClassificationMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Maximum concurrent refresh workers.
    pub workers: usize,

    /// Preferred trailer language (ISO 639-1).
    pub language: String,

    pub asset_mode: AssetMode,

    /// Re-resolve even when the cached link is still valid.
    pub force: bool,

    /// Stop collecting candidates after this many.
    pub limit: Option<usize>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            workers: limits::DEFAULT_WORKERS,
            language: "en".to_string(),
            asset_mode: AssetMode::default(),
            force: false,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Days between scheduled scans (default: 1)
    pub schedule_days: u32,

    pub poll_interval_seconds: u64,

    pub monitor_interval_seconds: u64,

    pub error_backoff_seconds: u64,

    /// Links expiring within this many seconds are refreshed by the monitor.
    pub expiry_window_seconds: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            schedule_days: 1,
            poll_interval_seconds: intervals::SCHEDULE_POLL.as_secs(),
            monitor_interval_seconds: intervals::MONITOR_CHECK.as_secs(),
            error_backoff_seconds: intervals::MONITOR_ERROR_BACKOFF.as_secs(),
            expiry_window_seconds: cache::EXPIRY_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImdbConfig {
    pub base_url: String,

    pub request_timeout_seconds: u64,

    /// Playback start offset appended to resolved URLs as `#t=<secs>`.
    pub video_start_time: u32,

    pub user_agent: String,
}

impl Default for ImdbConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.imdb.com".to_string(),
            request_timeout_seconds: timeouts::IMDB_REQUEST.as_secs(),
            video_start_time: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    pub api_key: Option<String>,

    pub base_url: String,

    pub request_timeout_seconds: u64,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.themoviedb.org/3".to_string(),
            request_timeout_seconds: timeouts::TMDB_REQUEST.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub request_timeout_seconds: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: timeouts::DOWNLOAD.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub expirations_path: String,

    pub ignored_path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expirations_path: cache::EXPIRATIONS_FILE.to_string(),
            ignored_path: cache::IGNORED_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = HashMap::new();
        labels.insert("app".to_string(), "trailerfin".to_string());

        Self {
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    /// Loads the first config file found, then applies `.env` and legacy
    /// environment overrides.
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            warn!(error = %e, "Failed to read .env file");
        }

        let mut config = Self::load_file()?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("trailerfin").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".trailerfin").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Legacy variables: `SCAN_PATH`, `VIDEO_FILENAME`, `SCHEDULE_DAYS`,
    /// `VIDEO_START_TIME`, `TMDB_API_KEY`, `WORKERS`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = var("SCAN_PATH") {
            self.library.scan_paths = vec![path];
        }
        if let Some(name) = var("VIDEO_FILENAME") {
            self.library.video_filename = name;
        }
        if let Some(days) = var("SCHEDULE_DAYS") {
            self.scheduler.schedule_days = days
                .trim()
                .parse()
                .with_context(|| format!("SCHEDULE_DAYS is not a number: {days}"))?;
        }
        if let Some(start) = var("VIDEO_START_TIME") {
            self.imdb.video_start_time = start
                .trim()
                .parse()
                .with_context(|| format!("VIDEO_START_TIME is not a number: {start}"))?;
        }
        if let Some(key) = var("TMDB_API_KEY") {
            self.tmdb.api_key = Some(key);
        }
        if let Some(workers) = var("WORKERS") {
            match workers.trim().parse() {
                Ok(n) => self.refresh.workers = n,
                Err(_) => warn!(value = %workers, "Invalid WORKERS value, keeping configured worker count"),
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.library.video_filename.trim().is_empty() {
            anyhow::bail!("Link-descriptor filename (library.video_filename) cannot be empty");
        }

        if self.refresh.workers == 0 {
            anyhow::bail!("Worker count must be > 0");
        }

        if self.scheduler.schedule_days == 0 {
            anyhow::bail!("Schedule interval must be at least one day");
        }

        if self.observability.loki_enabled && self.observability.loki_url.is_empty() {
            anyhow::bail!("Loki URL cannot be empty when enabled");
        }

        self.scan_roots()?;
        Ok(())
    }

    /// Absolute, existing scan roots. Fails when none are configured or one is missing.
    pub fn scan_roots(&self) -> Result<Vec<PathBuf>> {
        if self.library.scan_paths.is_empty() {
            anyhow::bail!(
                "No scan path configured. Set library.scan_paths, SCAN_PATH, or pass --dir"
            );
        }

        self.library
            .scan_paths
            .iter()
            .map(|raw| {
                let path = std::path::absolute(raw)
                    .with_context(|| format!("Invalid scan path: {raw}"))?;
                if !path.is_dir() {
                    anyhow::bail!("Scan path does not exist: {}", path.display());
                }
                Ok(path)
            })
            .collect()
    }

    #[must_use]
    pub fn expirations_path(&self) -> PathBuf {
        PathBuf::from(&self.cache.expirations_path)
    }

    #[must_use]
    pub fn ignored_path(&self) -> PathBuf {
        PathBuf::from(&self.cache.ignored_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("trailerfin_config_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.refresh.workers, 4);
        assert_eq!(config.scheduler.schedule_days, 1);
        assert_eq!(config.imdb.video_start_time, 10);
        assert_eq!(config.cache.expirations_path, "trailer_expirations.json");
        assert_eq!(config.cache.ignored_path, "ignored_titles.json");
        assert_eq!(config.library.classification, ClassificationMode::DirectoryPattern);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[library]"));
        assert!(toml_str.contains("[scheduler]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [library]
            scan_paths = ["/media/movies"]
            classification = "sidecar_metadata"

            [refresh]
            workers = 8
            asset_mode = "download"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.library.scan_paths, vec!["/media/movies".to_string()]);
        assert_eq!(config.library.classification, ClassificationMode::SidecarMetadata);
        assert_eq!(config.refresh.workers, 8);
        assert_eq!(config.refresh.asset_mode, AssetMode::Download);

        assert_eq!(config.refresh.language, "en");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        let env: HashMap<&str, &str> = [
            ("SCAN_PATH", "/data/media"),
            ("VIDEO_FILENAME", "video1.strm"),
            ("SCHEDULE_DAYS", "3"),
            ("TMDB_API_KEY", "abc"),
            ("WORKERS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        config
            .apply_env_overrides(|key| env.get(key).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.library.scan_paths, vec!["/data/media".to_string()]);
        assert_eq!(config.scheduler.schedule_days, 3);
        assert_eq!(config.tmdb.api_key.as_deref(), Some("abc"));
        assert_eq!(config.refresh.workers, 4);
    }

    #[test]
    fn test_bad_schedule_days_is_fatal() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(|key| {
            (key == "SCHEDULE_DAYS").then(|| "weekly".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_requires_roots() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.library.scan_paths = vec!["/definitely/not/here/trailerfin".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers_and_empty_filename() {
        let root = temp_dir();
        let mut config = Config::default();
        config.library.scan_paths = vec![root.to_string_lossy().into_owned()];
        assert!(config.validate().is_ok());

        config.refresh.workers = 0;
        assert!(config.validate().is_err());

        config.refresh.workers = 2;
        config.library.video_filename = "  ".to_string();
        assert!(config.validate().is_err());

        std::fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_scan_roots_are_absolute() {
        let root = temp_dir();
        let mut config = Config::default();
        config.library.scan_paths = vec![root.to_string_lossy().into_owned()];

        let roots = config.scan_roots().unwrap();
        assert_eq!(roots.len(), 1);
        assert!(roots[0].is_absolute());

        std::fs::remove_dir_all(root).ok();
    }
}
