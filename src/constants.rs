pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "m4v", "flv", "webm"];

/// Sub-folder of a title folder that holds the link-descriptor.
pub const BACKDROPS_DIR: &str = "backdrops";

pub const DOWNLOAD_FILENAME: &str = "trailer.mp4";

pub const IGNORE_REASON_NO_TRAILER: &str = "No trailer available";

pub mod cache {

    pub const EXPIRATIONS_FILE: &str = "trailer_expirations.json";

    pub const IGNORED_FILE: &str = "ignored_titles.json";

    /// Links expiring within this window are refreshed by the monitor.
    pub const EXPIRY_WINDOW_SECS: i64 = 3600;
}

pub mod intervals {
    use std::time::Duration;

    pub const MONITOR_CHECK: Duration = Duration::from_secs(300);

    pub const MONITOR_ERROR_BACKOFF: Duration = Duration::from_secs(60);

    pub const SCHEDULE_POLL: Duration = Duration::from_secs(60);
}

pub mod timeouts {
    use std::time::Duration;

    pub const TMDB_REQUEST: Duration = Duration::from_secs(10);

    pub const IMDB_REQUEST: Duration = Duration::from_secs(20);

    pub const DOWNLOAD: Duration = Duration::from_secs(60);
}

pub mod limits {

    pub const DEFAULT_WORKERS: usize = 4;

    /// Fallback gallery videos must be longer than this to count as a trailer.
    pub const MIN_FALLBACK_VIDEO_SECS: u32 = 30;
}
