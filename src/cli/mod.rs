//! CLI module - Command-line interface for trailerfin
//!
//! Modes are subcommands; refresh flags are global so they work with any of them.

mod commands;

use crate::config::Config;
use crate::domain::{AssetMode, ClassificationMode};
use clap::{Args, Parser, Subcommand};

/// trailerfin - trailer links for Jellyfin and Plex libraries
#[derive(Parser)]
#[command(name = "trailerfin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub refresh: RefreshArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan once and refresh every trailer that needs it (default)
    Scan,

    /// Scan now, then again every `schedule_days` days
    #[command(long_flag = "schedule")]
    Schedule,

    /// Watch for new media and refresh links before they expire
    #[command(long_flag = "monitor")]
    Monitor,

    /// Create default config file
    #[command(long_flag = "init")]
    Init,

    /// Remove a title from the ignore list so it is looked up again
    Unignore {
        /// Title id, e.g. tt1234567
        title_id: String,
    },
}

/// Flags that override the config file and environment.
#[derive(Args, Debug, Clone, Default)]
pub struct RefreshArgs {
    /// Directory to scan (can be given multiple times)
    #[arg(long = "dir", global = true)]
    pub dirs: Vec<String>,

    /// Number of concurrent workers
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Read IMDb ids from .nfo files instead of folder names
    #[arg(long, global = true)]
    pub use_nfo: bool,

    /// Stop after this many candidates (0 means no limit)
    #[arg(long, global = true)]
    pub limit: Option<usize>,

    /// Download trailer.mp4 instead of writing a link descriptor
    #[arg(long, global = true)]
    pub download: bool,

    /// Preferred trailer language (ISO 639-1)
    #[arg(long, global = true)]
    pub language: Option<String>,

    /// Refresh even when the current trailer is still valid
    #[arg(long, global = true)]
    pub force: bool,
}

impl RefreshArgs {
    pub fn apply_to(&self, config: &mut Config) {
        if !self.dirs.is_empty() {
            config.library.scan_paths.clone_from(&self.dirs);
        }
        if let Some(workers) = self.workers {
            config.refresh.workers = workers;
        }
        if self.use_nfo {
            config.library.classification = ClassificationMode::SidecarMetadata;
        }
        if self.limit.is_some() {
            config.refresh.limit = self.limit;
        }
        if self.download {
            config.refresh.asset_mode = AssetMode::Download;
        }
        if let Some(language) = &self.language {
            config.refresh.language.clone_from(language);
        }
        if self.force {
            config.refresh.force = true;
        }
    }
}

pub use commands::*;
