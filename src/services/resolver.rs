use crate::clients::{ResolveError, TmdbClient, TrailerResolver};
use crate::domain::TitleId;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Localized lookup through TMDB when available, IMDb otherwise.
pub struct TrailerService {
    tmdb: Option<TmdbClient>,
    imdb: Arc<dyn TrailerResolver>,
}

impl TrailerService {
    /// `tmdb` is only passed when localized links are usable, i.e. link-descriptor mode
    /// with a validated key.
    #[must_use]
    pub fn new(tmdb: Option<TmdbClient>, imdb: Arc<dyn TrailerResolver>) -> Self {
        Self { tmdb, imdb }
    }

    fn wants_tmdb(language: &str) -> bool {
        !language.is_empty() && !language.eq_ignore_ascii_case("en")
    }
}

#[async_trait]
impl TrailerResolver for TrailerService {
    async fn resolve(
        &self,
        title_id: &TitleId,
        language: &str,
    ) -> Result<Option<String>, ResolveError> {
        if let Some(tmdb) = &self.tmdb
            && Self::wants_tmdb(language)
        {
            match tmdb.resolve(title_id, language).await {
                Ok(Some(url)) => {
                    info!(title_id = %title_id, language, "Found trailer on TMDB");
                    return Ok(Some(url));
                }
                Ok(None) => {
                    debug!(title_id = %title_id, language, "No TMDB trailer, trying IMDb");
                }
                Err(e) => {
                    warn!(title_id = %title_id, error = %e, "TMDB lookup failed, trying IMDb");
                }
            }
        }

        self.imdb.resolve(title_id, language).await
    }
}
