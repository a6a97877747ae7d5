use crate::constants::VIDEO_EXTENSIONS;
use crate::domain::{Candidate, ClassificationMode, TitleId};
use crate::parser::SidecarReader;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// How many recognized video files a candidate folder may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoRule {
    /// Scan rule: more than one video means episodes, whose trailer lives higher up.
    #[default]
    AtMostOne,
    /// Monitor rule: only folders that already hold their single media file.
    ExactlyOne,
}

impl VideoRule {
    const fn accepts(self, count: usize) -> bool {
        match self {
            Self::AtMostOne => count <= 1,
            Self::ExactlyOne => count == 1,
        }
    }
}

/// Walks library roots and yields the folders that should carry a trailer.
pub struct FolderClassifier {
    mode: ClassificationMode,
    sidecar: Arc<dyn SidecarReader>,
    limit: Option<usize>,
    rule: VideoRule,
}

impl FolderClassifier {
    #[must_use]
    pub fn new(mode: ClassificationMode, sidecar: Arc<dyn SidecarReader>) -> Self {
        Self {
            mode,
            sidecar,
            limit: None,
            rule: VideoRule::default(),
        }
    }

    /// `Some(0)` means no limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = match limit {
            Some(0) => None,
            other => other,
        };
        self
    }

    #[must_use]
    pub const fn with_video_rule(mut self, rule: VideoRule) -> Self {
        self.rule = rule;
        self
    }

    /// Lazily classifies every directory under `roots`, in walk order.
    ///
    /// Blocking: drive it from `spawn_blocking` inside the runtime.
    #[must_use]
    pub fn classify<'a>(&'a self, roots: &'a [PathBuf]) -> Classify<'a> {
        Classify {
            classifier: self,
            roots: roots.iter(),
            walker: None,
            emitted_folders: HashSet::new(),
            emitted: 0,
        }
    }
}

/// Iterator returned by [`FolderClassifier::classify`].
pub struct Classify<'a> {
    classifier: &'a FolderClassifier,
    roots: std::slice::Iter<'a, PathBuf>,
    walker: Option<walkdir::IntoIter>,
    emitted_folders: HashSet<PathBuf>,
    emitted: usize,
}

impl Iterator for Classify<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if let Some(limit) = self.classifier.limit
            && self.emitted >= limit
        {
            return None;
        }

        loop {
            if self.walker.is_none() {
                let root = self.roots.next()?;
                info!(root = %root.display(), "Scanning directory");
                self.walker = Some(walkdir::WalkDir::new(root).follow_links(true).into_iter());
            }

            match self.walker.as_mut().and_then(Iterator::next) {
                None => self.walker = None,
                Some(Err(e)) => {
                    warn!(
                        path = ?e.path(),
                        error = %e,
                        "Error walking directory, skipping subtree"
                    );
                }
                Some(Ok(entry)) => {
                    if !entry.file_type().is_dir() {
                        continue;
                    }
                    if let Some(candidate) = self.candidate_for(entry.path()) {
                        self.emitted += 1;
                        if self.classifier.limit == Some(self.emitted) {
                            info!(limit = self.emitted, "Reached candidate limit, stopping collection");
                        }
                        return Some(candidate);
                    }
                }
            }
        }
    }
}

impl Classify<'_> {
    fn candidate_for(&mut self, dir: &Path) -> Option<Candidate> {
        let (folder, title_id) = match self.classifier.mode {
            ClassificationMode::DirectoryPattern => (dir.to_path_buf(), title_id_from_path(dir)?),
            ClassificationMode::SidecarMetadata if is_season_folder(dir) => {
                let parent = dir.parent()?;
                if self.emitted_folders.contains(parent) {
                    debug!(folder = %dir.display(), "Skipping season folder, series already processed");
                    return None;
                }
                debug!(
                    folder = %dir.display(),
                    parent = %parent.display(),
                    "Detected season folder, checking parent"
                );
                (parent.to_path_buf(), self.classifier.sidecar.find_title_id(parent)?)
            }
            ClassificationMode::SidecarMetadata => {
                if self.emitted_folders.contains(dir) {
                    return None;
                }
                (dir.to_path_buf(), self.classifier.sidecar.find_title_id(dir)?)
            }
        };

        let video_count = count_videos(&folder);
        if !self.classifier.rule.accepts(video_count) {
            debug!(
                folder = %folder.display(),
                video_count,
                "Skipping folder, video count rules it out"
            );
            return None;
        }

        self.emitted_folders.insert(folder.clone());
        Some(Candidate { folder, title_id })
    }
}

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

/// Title id from a `{imdb-tt…}` marker, accepted only when the last path
/// segment ends with that exact marker.
#[must_use]
pub fn title_id_from_path(path: &Path) -> Option<TitleId> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"\{imdb-(tt\d+)\}");

    let full = path.to_string_lossy();
    let id = re.captures(&full)?.get(1)?.as_str();

    let marker = format!("{{imdb-{id}}}");
    let last = path.file_name()?.to_string_lossy();
    last.ends_with(&marker).then(|| TitleId::new(id))
}

/// `Season 01`, `saison 2`, `S03` and similar.
#[must_use]
pub fn is_season_folder(path: &Path) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"(?i)^(season|saison|s)\s*\d+");

    path.file_name()
        .map(|name| re.is_match(&name.to_string_lossy()))
        .unwrap_or(false)
}

#[must_use]
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// Recognized video files directly inside `folder`. Unreadable folders count as empty.
#[must_use]
pub fn count_videos(folder: &Path) -> usize {
    match std::fs::read_dir(folder) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| !t.is_dir()))
            .filter(|entry| is_video_file(&entry.path()))
            .count(),
        Err(e) => {
            warn!(folder = %folder.display(), error = %e, "Could not list files");
            0
        }
    }
}
