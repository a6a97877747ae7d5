//! Title id lookup from Kodi/Jellyfin style `.nfo` sidecar files.

use crate::domain::TitleId;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, error, warn};

const PREFERRED_NFO_NAMES: &[&str] = &["movie.nfo", "tvshow.nfo"];

/// Tags checked, in order, after `<uniqueid type="imdb">`.
const ID_TAGS: &[&str] = &["imdb", "imdbid", "id"];

/// Finds the title id for a directory from whatever metadata sits next to it.
pub trait SidecarReader: Send + Sync {
    fn find_title_id(&self, directory: &Path) -> Option<TitleId>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NfoReader;

impl NfoReader {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SidecarReader for NfoReader {
    fn find_title_id(&self, directory: &Path) -> Option<TitleId> {
        let nfo_path = find_nfo_file(directory)?;
        let content = match std::fs::read_to_string(&nfo_path) {
            Ok(content) => content,
            Err(e) => {
                error!(path = %nfo_path.display(), error = %e, "Error reading NFO file");
                return None;
            }
        };

        let id = parse_nfo(&content);
        if id.is_none() {
            warn!(path = %nfo_path.display(), "No IMDb ID found in NFO file");
        }
        id
    }
}

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

/// `movie.nfo`, then `tvshow.nfo`, then the first `*.nfo` by name.
#[must_use]
pub fn find_nfo_file(directory: &Path) -> Option<PathBuf> {
    for name in PREFERRED_NFO_NAMES {
        let candidate = directory.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            error!(directory = %directory.display(), error = %e, "Error listing NFO candidates");
            return None;
        }
    };

    let mut nfo_files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("nfo"))
        })
        .collect();
    nfo_files.sort();

    let found = nfo_files.into_iter().next();
    if found.is_none() {
        debug!(directory = %directory.display(), "No NFO file found");
    }
    found
}

/// Extracts an IMDb id from NFO content, XML first and plain text second.
#[must_use]
pub fn parse_nfo(content: &str) -> Option<TitleId> {
    if let Some(id) = parse_nfo_xml(content) {
        return Some(id);
    }

    static URL_RE: OnceLock<Regex> = OnceLock::new();
    let url_re = get_regex(&URL_RE, r"(?i)imdb\.com/title/(tt\d+)");
    if let Some(caps) = url_re.captures(content) {
        return Some(TitleId::new(&caps[1]));
    }

    static ID_RE: OnceLock<Regex> = OnceLock::new();
    let id_re = get_regex(&ID_RE, r"\b(tt\d{7,})\b");
    id_re
        .captures(content)
        .map(|caps| TitleId::new(&caps[1]))
}

fn parse_nfo_xml(content: &str) -> Option<TitleId> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    // Open elements, flagged when they are `<uniqueid type="imdb">`.
    let mut stack: Vec<(String, bool)> = Vec::new();
    let mut unique_id: Option<String> = None;
    let mut tag_values: [Option<String>; 3] = [None, None, None];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let is_imdb_uniqueid = name == "uniqueid"
                    && e.attributes().flatten().any(|attr| {
                        attr.key.as_ref() == b"type" && attr.value.as_ref() == b"imdb"
                    });
                stack.push((name, is_imdb_uniqueid));
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(text)) => {
                let Some((name, is_imdb_uniqueid)) = stack.last() else {
                    continue;
                };
                let value = String::from_utf8_lossy(&text).trim().to_string();
                if value.is_empty() {
                    continue;
                }

                if *is_imdb_uniqueid {
                    if unique_id.is_none() && value.starts_with("tt") {
                        unique_id = Some(value);
                    }
                } else if let Some(idx) = ID_TAGS.iter().position(|tag| tag == name)
                    && tag_values[idx].is_none()
                {
                    tag_values[idx] = Some(value);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, "NFO is not valid XML, falling back to text search");
                return None;
            }
            Ok(_) => {}
        }
    }

    if let Some(id) = unique_id {
        debug!(title_id = %id, "Found IMDb ID in XML uniqueid");
        return Some(TitleId::new(id));
    }

    tag_values
        .into_iter()
        .flatten()
        .find(|value| value.starts_with("tt"))
        .map(TitleId::new)
}
