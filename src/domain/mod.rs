//! Domain types for trailer refresh with strong typing.
//!
//! Newtypes and small enums shared by the classifier, the refresh worker and
//! the scheduler.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// External identifier of a movie or show, e.g. `tt1234567`.
///
/// # Examples
///
/// ```rust
/// use trailerfin::domain::TitleId;
///
/// let id = TitleId::new("tt0000001");
/// assert_eq!(id.as_str(), "tt0000001");
/// assert_eq!(id.to_string(), "tt0000001");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleId(String);

impl TitleId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TitleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TitleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A folder eligible for trailer resolution in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub folder: PathBuf,
    pub title_id: TitleId,
}

impl Candidate {
    #[must_use]
    pub fn new(folder: impl Into<PathBuf>, title_id: impl Into<TitleId>) -> Self {
        Self {
            folder: folder.into(),
            title_id: title_id.into(),
        }
    }
}

/// How title ids are discovered while walking the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMode {
    /// `{imdb-tt…}` marker in the folder name.
    #[default]
    DirectoryPattern,
    /// `.nfo` sidecar files, with season folders collapsed onto their show.
    SidecarMetadata,
}

/// What gets persisted for a resolved trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetMode {
    /// A `.strm`-style file under `backdrops/` holding the playable URL.
    #[default]
    LinkDescriptor,
    /// The trailer itself, downloaded next to the media.
    Download,
}

/// Terminal state of one refresh worker run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
    IgnoredSkip,
    ValidCached,
    Persisted,
    MarkedIgnored,
    Failed,
}

impl RefreshOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IgnoredSkip => "ignored_skip",
            Self::ValidCached => "valid_cached",
            Self::Persisted => "persisted",
            Self::MarkedIgnored => "marked_ignored",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
