pub mod imdb;
pub mod tmdb;

use crate::domain::TitleId;
use async_trait::async_trait;
use thiserror::Error;

pub use imdb::ImdbClient;
pub use tmdb::TmdbClient;

/// Transient failures while resolving a trailer. A definitive "no trailer" is
/// `Ok(None)`, never an error.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status} for {url}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("No playable URL on video page: {0}")]
    NoPlaybackUrl(String),

    #[error("Malformed page data: {0}")]
    Parse(String),
}

/// Title id → playable trailer URL.
#[async_trait]
pub trait TrailerResolver: Send + Sync {
    async fn resolve(
        &self,
        title_id: &TitleId,
        language: &str,
    ) -> Result<Option<String>, ResolveError>;
}
