use super::{ResolveError, TrailerResolver};
use crate::config::TmdbConfig;
use crate::domain::TitleId;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const FALLBACK_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    #[must_use]
    pub const fn as_path(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
        }
    }
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    movie_results: Vec<FindResult>,
    #[serde(default)]
    tv_results: Vec<FindResult>,
}

#[derive(Debug, Deserialize)]
struct FindResult {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    results: Vec<TmdbVideo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbVideo {
    pub key: String,
    #[serde(default)]
    pub site: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub official: bool,
}

/// Localized trailer lookup. Only constructed once the API key has been
/// accepted by the configuration endpoint.
#[derive(Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    /// Validates the key and returns a client, or `None` when TMDB is unusable.
    pub async fn connect(config: &TmdbConfig) -> Option<Self> {
        let Some(api_key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            debug!("No TMDB API key configured");
            return None;
        };

        let client = match Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Failed to build TMDB HTTP client");
                return None;
            }
        };

        let tmdb = Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        };

        match tmdb.validate().await {
            Ok(true) => {
                info!("TMDB API key validated");
                Some(tmdb)
            }
            Ok(false) => {
                warn!("TMDB API key rejected, localized trailers disabled");
                None
            }
            Err(e) => {
                warn!(error = %e, "TMDB unreachable, localized trailers disabled");
                None
            }
        }
    }

    async fn validate(&self) -> Result<bool, ResolveError> {
        let url = format!("{}/configuration?api_key={}", self.base_url, self.key());
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    fn key(&self) -> String {
        urlencoding::encode(&self.api_key).into_owned()
    }

    /// TMDB id and media type for an IMDb title id. Movies win over series.
    pub async fn find_by_imdb(
        &self,
        title_id: &TitleId,
    ) -> Result<Option<(u64, MediaType)>, ResolveError> {
        let url = format!(
            "{}/find/{}?api_key={}&external_source=imdb_id",
            self.base_url,
            urlencoding::encode(title_id.as_str()),
            self.key()
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ResolveError::Status {
                service: "TMDB",
                status,
                url: format!("{}/find/{title_id}", self.base_url),
            });
        }

        let found: FindResponse = response.json().await?;
        Ok(found
            .movie_results
            .first()
            .map(|r| (r.id, MediaType::Movie))
            .or_else(|| found.tv_results.first().map(|r| (r.id, MediaType::Tv))))
    }

    async fn videos(
        &self,
        id: u64,
        media_type: MediaType,
        language: &str,
    ) -> Result<Vec<TmdbVideo>, ResolveError> {
        let url = format!(
            "{}/{}/{id}/videos?api_key={}&language={}",
            self.base_url,
            media_type.as_path(),
            self.key(),
            urlencoding::encode(language)
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status {
                service: "TMDB",
                status,
                url: format!("{}/{}/{id}/videos", self.base_url, media_type.as_path()),
            });
        }

        let videos: VideosResponse = response.json().await?;
        Ok(videos.results)
    }

    /// Trailer watch URL in `language`, retrying in English when nothing is listed.
    pub async fn trailer_url(
        &self,
        id: u64,
        media_type: MediaType,
        language: &str,
    ) -> Result<Option<String>, ResolveError> {
        let mut videos = self.videos(id, media_type, language).await?;
        if videos.is_empty() && language != FALLBACK_LANGUAGE {
            debug!(tmdb_id = id, language, "No localized videos, falling back to English");
            videos = self.videos(id, media_type, FALLBACK_LANGUAGE).await?;
        }

        Ok(pick_video(&videos).map(|v| format!("https://www.youtube.com/watch?v={}", v.key)))
    }
}

#[async_trait]
impl TrailerResolver for TmdbClient {
    async fn resolve(
        &self,
        title_id: &TitleId,
        language: &str,
    ) -> Result<Option<String>, ResolveError> {
        let Some((id, media_type)) = self.find_by_imdb(title_id).await? else {
            debug!(title_id = %title_id, "No TMDB match");
            return Ok(None);
        };
        self.trailer_url(id, media_type, language).await
    }
}

/// Official YouTube trailer, any YouTube trailer, then a YouTube clip.
#[must_use]
pub fn pick_video(videos: &[TmdbVideo]) -> Option<&TmdbVideo> {
    let youtube = |v: &&TmdbVideo| v.site.eq_ignore_ascii_case("YouTube");

    let trailers: Vec<&TmdbVideo> = videos
        .iter()
        .filter(youtube)
        .filter(|v| v.kind == "Trailer")
        .collect();

    trailers
        .iter()
        .find(|v| v.official)
        .or_else(|| trailers.first())
        .copied()
        .or_else(|| videos.iter().filter(youtube).find(|v| v.kind == "Clip"))
}
