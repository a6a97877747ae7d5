pub mod classifier;

use crate::domain::{ClassificationMode, TitleId};
use crate::parser::{SidecarReader, parse_expiry};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub use classifier::{
    Classify, FolderClassifier, VideoRule, count_videos, is_season_folder, is_video_file,
    title_id_from_path,
};

/// Folders that currently hold exactly one media file, keyed by folder.
///
/// This is the set the monitor diffs between iterations to spot new media.
#[must_use]
pub fn media_folders(
    roots: &[PathBuf],
    mode: ClassificationMode,
    sidecar: Arc<dyn SidecarReader>,
) -> HashMap<PathBuf, TitleId> {
    let classifier = FolderClassifier::new(mode, sidecar).with_video_rule(VideoRule::ExactlyOne);

    let folders: HashMap<PathBuf, TitleId> = classifier
        .classify(roots)
        .map(|candidate| {
            debug!(folder = %candidate.folder.display(), "Found media folder");
            (candidate.folder, candidate.title_id)
        })
        .collect();

    folders
}

/// Expiries embedded in link-descriptor files already on disk, keyed by descriptor path.
///
/// Descriptors whose URL has no usable `Expires` parameter are left out.
#[must_use]
pub fn find_link_descriptors(roots: &[PathBuf], descriptor_name: &str) -> HashMap<String, i64> {
    let mut expirations = HashMap::new();

    for root in roots {
        info!(root = %root.display(), "Looking for existing link descriptors");

        let walker = walkdir::WalkDir::new(root).follow_links(true).into_iter();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = ?e.path(), error = %e, "Error walking directory, skipping subtree");
                    continue;
                }
            };

            if !entry.file_type().is_file() || entry.file_name() != descriptor_name {
                continue;
            }

            let path = entry.path();
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    if let Some(expires_at) = parse_expiry(&content) {
                        info!(path = %path.display(), expires_at, "Found existing link descriptor");
                        expirations.insert(path.to_string_lossy().into_owned(), expires_at);
                    }
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Error reading link descriptor");
                }
            }
        }
    }

    expirations
}
