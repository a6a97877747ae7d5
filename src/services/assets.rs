use crate::constants::{BACKDROPS_DIR, DOWNLOAD_FILENAME};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download returned status {0}")]
    Status(reqwest::StatusCode),
}

impl AssetError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Persists a resolved trailer next to the media it belongs to.
#[async_trait]
pub trait AssetWriter: Send + Sync {
    /// `<folder>/backdrops/<video_filename>`
    fn descriptor_path(&self, folder: &Path) -> PathBuf;

    /// `<folder>/trailer.mp4`
    fn asset_path(&self, folder: &Path) -> PathBuf;

    /// Writes `url` as the sole content of the descriptor, creating `backdrops/` as needed.
    async fn write_link_descriptor(&self, folder: &Path, url: &str) -> Result<PathBuf, AssetError>;

    /// Streams `url` into the asset path. `false` on any failure. The asset path only
    /// ever holds a complete download.
    async fn download_asset(&self, folder: &Path, url: &str) -> bool;
}

pub struct FileAssetWriter {
    client: Client,
    video_filename: String,
}

impl FileAssetWriter {
    /// `client` should carry the download timeout.
    #[must_use]
    pub fn new(client: Client, video_filename: impl Into<String>) -> Self {
        Self {
            client,
            video_filename: video_filename.into(),
        }
    }

    async fn stream_to(&self, url: &str, path: &Path) -> Result<u64, AssetError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status(status));
        }

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| AssetError::io(path, e))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| AssetError::io(path, e))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| AssetError::io(path, e))?;

        Ok(written)
    }

    /// Streams into a sibling `.part` file, renamed onto `path` once complete.
    async fn download_to(&self, url: &str, path: &Path) -> Result<u64, AssetError> {
        let partial = partial_path(path);
        let written = self.stream_to(url, &partial).await?;
        tokio::fs::rename(&partial, path)
            .await
            .map_err(|e| AssetError::io(path, e))?;
        Ok(written)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

#[async_trait]
impl AssetWriter for FileAssetWriter {
    fn descriptor_path(&self, folder: &Path) -> PathBuf {
        folder.join(BACKDROPS_DIR).join(&self.video_filename)
    }

    fn asset_path(&self, folder: &Path) -> PathBuf {
        folder.join(DOWNLOAD_FILENAME)
    }

    async fn write_link_descriptor(&self, folder: &Path, url: &str) -> Result<PathBuf, AssetError> {
        let backdrops = folder.join(BACKDROPS_DIR);
        tokio::fs::create_dir_all(&backdrops)
            .await
            .map_err(|e| AssetError::io(&backdrops, e))?;

        let path = self.descriptor_path(folder);
        tokio::fs::write(&path, url)
            .await
            .map_err(|e| AssetError::io(&path, e))?;

        info!(path = %path.display(), "Updated link descriptor");
        Ok(path)
    }

    async fn download_asset(&self, folder: &Path, url: &str) -> bool {
        let path = self.asset_path(folder);
        info!(path = %path.display(), "Downloading trailer");

        match self.download_to(url, &path).await {
            Ok(bytes) => {
                info!(path = %path.display(), bytes, "Downloaded trailer");
                true
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Error downloading trailer");
                let partial = partial_path(&path);
                if let Err(e) = tokio::fs::remove_file(&partial).await
                    && e.kind() != std::io::ErrorKind::NotFound
                {
                    debug!(path = %partial.display(), error = %e, "Could not remove partial download");
                }
                false
            }
        }
    }
}
