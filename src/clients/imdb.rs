//! IMDb video gallery scraping.
//!
//! Resolution is two requests: the title's video gallery yields a video page,
//! and the video page's embedded `__NEXT_DATA__` JSON yields the signed MP4 URL.

use super::{ResolveError, TrailerResolver};
use crate::config::ImdbConfig;
use crate::constants::limits::MIN_FALLBACK_VIDEO_SECS;
use crate::domain::TitleId;
use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

const OVERLAY_SELECTOR: &str =
    "span.ipc-lockup-overlay__text.ipc-lockup-overlay__text--clamp-none";
const VIDEO_LINK_SELECTOR: &str = r#"a[href*="/video/vi"]"#;
const NEXT_DATA_SELECTOR: &str = r#"script#__NEXT_DATA__[type="application/json"]"#;
const PLAYBACK_URLS_POINTER: &str = "/props/pageProps/videoPlaybackData/video/playbackURLs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GalleryOrder {
    Ascending,
    Descending,
}

impl GalleryOrder {
    const fn as_query(self) -> &'static str {
        match self {
            Self::Ascending => "date,asc",
            Self::Descending => "date,desc",
        }
    }
}

#[derive(Clone)]
pub struct ImdbClient {
    client: Client,
    base_url: String,
    video_start_time: u32,
}

impl ImdbClient {
    pub fn new(config: &ImdbConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(header::DNT, HeaderValue::from_static("1"));
        headers.insert(
            header::UPGRADE_INSECURE_REQUESTS,
            HeaderValue::from_static("1"),
        );
        let referer = format!("{}/", config.base_url.trim_end_matches('/'));
        headers.insert(
            header::REFERER,
            HeaderValue::from_str(&referer).context("Invalid IMDb base URL")?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to build IMDb HTTP client")?;

        Ok(Self::with_client(client, config))
    }

    #[must_use]
    pub fn with_client(client: Client, config: &ImdbConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            video_start_time: config.video_start_time,
        }
    }

    /// Video page of the best trailer-like video for a title, if any.
    ///
    /// The oldest-first gallery is tried first so series resolve to their
    /// launch trailer rather than a late-season one.
    pub async fn trailer_page_url(&self, title_id: &TitleId) -> Result<Option<String>, ResolveError> {
        if let Some(html) = self.fetch_gallery(title_id, GalleryOrder::Ascending).await?
            && let Some(href) = find_trailer_link(&html)
        {
            return Ok(Some(self.absolute(&href)));
        }

        if let Some(html) = self.fetch_gallery(title_id, GalleryOrder::Descending).await? {
            if let Some(href) = find_trailer_link(&html) {
                return Ok(Some(self.absolute(&href)));
            }
            if let Some(href) = find_long_video_link(&html) {
                return Ok(Some(self.absolute(&href)));
            }
        }

        warn!(title_id = %title_id, "No suitable video found");
        Ok(None)
    }

    /// Direct playable URL from a video page, with the start offset fragment appended.
    pub async fn resolve_direct_url(&self, video_page_url: &str) -> Result<Option<String>, ResolveError> {
        let response = self.client.get(video_page_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status {
                service: "IMDb",
                status,
                url: video_page_url.to_string(),
            });
        }

        let html = response.text().await?;
        let url = extract_playback_url(&html)?;
        if url.is_none() {
            warn!(url = %video_page_url, "No playback URLs found in page data");
        }

        Ok(url.map(|u| format!("{u}#t={}", self.video_start_time)))
    }

    async fn fetch_gallery(
        &self,
        title_id: &TitleId,
        order: GalleryOrder,
    ) -> Result<Option<String>, ResolveError> {
        let url = format!(
            "{}/title/{}/videogallery/?sort={}",
            self.base_url,
            title_id,
            order.as_query()
        );
        debug!(url = %url, "Fetching video gallery");

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(title_id = %title_id, "Video gallery not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ResolveError::Status {
                service: "IMDb",
                status,
                url,
            });
        }

        Ok(Some(response.text().await?))
    }

    fn absolute(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}{href}", self.base_url)
        }
    }
}

#[async_trait]
impl TrailerResolver for ImdbClient {
    async fn resolve(
        &self,
        title_id: &TitleId,
        _language: &str,
    ) -> Result<Option<String>, ResolveError> {
        let Some(page_url) = self.trailer_page_url(title_id).await? else {
            return Ok(None);
        };

        self.resolve_direct_url(&page_url)
            .await?
            .map(Some)
            .ok_or(ResolveError::NoPlaybackUrl(page_url))
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Invalid CSS selector defined in code")
}

fn video_link_ancestor(element: ElementRef<'_>) -> Option<String> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| {
            el.value().name() == "a"
                && el
                    .value()
                    .attr("href")
                    .is_some_and(|href| href.contains("/video/vi"))
        })
        .and_then(|a| a.value().attr("href").map(str::to_string))
}

/// First overlay labelled "Trailer", else the first labelled "Clip".
#[must_use]
pub fn find_trailer_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let overlay = selector(OVERLAY_SELECTOR);
    let spans: Vec<ElementRef<'_>> = document.select(&overlay).collect();
    debug!(count = spans.len(), "Found overlay spans");

    for label in ["Trailer", "Clip"] {
        let found = spans
            .iter()
            .filter(|span| span.text().collect::<String>().contains(label))
            .find_map(|span| video_link_ancestor(*span));
        if found.is_some() {
            return found;
        }
    }

    None
}

/// First gallery video longer than the fallback threshold.
#[must_use]
pub fn find_long_video_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let links = selector(VIDEO_LINK_SELECTOR);
    let duration = selector("span.video-duration");

    document.select(&links).find_map(|link| {
        let item = link
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "div" && el.value().classes().any(|c| c == "video-item"))?;
        let text = item.select(&duration).next()?.text().collect::<String>();

        (parse_duration_secs(&text) > MIN_FALLBACK_VIDEO_SECS)
            .then(|| link.value().attr("href").map(str::to_string))
            .flatten()
    })
}

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

/// Seconds in a gallery duration label such as `"1 min 45 sec"`.
#[must_use]
pub fn parse_duration_secs(text: &str) -> u32 {
    static MIN_RE: OnceLock<Regex> = OnceLock::new();
    static SEC_RE: OnceLock<Regex> = OnceLock::new();
    let min_re = get_regex(&MIN_RE, r"(\d+)\s*min");
    let sec_re = get_regex(&SEC_RE, r"(\d+)\s*sec");

    let grab = |re: &Regex| -> u32 {
        re.captures(text)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or(0)
    };

    grab(min_re).saturating_mul(60).saturating_add(grab(sec_re))
}

fn quality_rank(item: &Value) -> u8 {
    let definition = item
        .get("videoDefinition")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if definition.contains("1080") {
        3
    } else if definition.contains("720") {
        2
    } else if definition.contains("480") {
        1
    } else {
        0
    }
}

/// Best playback URL from a video page: highest-definition MP4, else the first entry.
pub fn extract_playback_url(html: &str) -> Result<Option<String>, ResolveError> {
    let document = Html::parse_document(html);
    let script = document
        .select(&selector(NEXT_DATA_SELECTOR))
        .next()
        .ok_or_else(|| ResolveError::Parse("no __NEXT_DATA__ script tag".to_string()))?;
    let raw = script.text().collect::<String>();

    let data: Value = serde_json::from_str(&raw)
        .map_err(|e| ResolveError::Parse(format!("invalid __NEXT_DATA__ JSON: {e}")))?;
    let playback = data
        .pointer(PLAYBACK_URLS_POINTER)
        .and_then(Value::as_array)
        .ok_or_else(|| ResolveError::Parse("missing playbackURLs".to_string()))?;

    let mut mp4: Vec<&Value> = playback
        .iter()
        .filter(|item| item.get("videoMimeType").and_then(Value::as_str) == Some("MP4"))
        .collect();
    mp4.sort_by_key(|item| std::cmp::Reverse(quality_rank(item)));

    let best = mp4.first().copied().or_else(|| playback.first());
    Ok(best
        .and_then(|item| item.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string))
}
