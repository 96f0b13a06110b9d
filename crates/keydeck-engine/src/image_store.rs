//! Download cache for key images given by URL.
//!
//! Files are stored under the user cache directory, named by the SHA-256 of
//! the URL, and never refreshed once present.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, trace};

use crate::{Error, Result};

/// Directory created under the user cache dir.
pub const CACHE_DIR_NAME: &str = "keydeck";

/// Cache file name for `url`.
pub fn cache_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

/// URL image fetcher with an on-disk cache.
#[derive(Debug, Clone)]
pub struct ImageStore {
    /// HTTP client.
    client: reqwest::Client,
    /// Cache directory; `None` when the platform has no cache dir.
    cache_dir: Option<PathBuf>,
}

impl ImageStore {
    /// A store caching into `cache_dir`.
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir,
        }
    }

    /// A store caching into the user cache directory.
    pub fn user_cache() -> Self {
        Self::new(dirs::cache_dir().map(|d| d.join(CACHE_DIR_NAME)))
    }

    /// Where `url` is cached.
    pub fn cache_path(&self, url: &str) -> Result<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|d| d.join(cache_key(url)))
            .ok_or_else(|| Error::Fetch("no user cache directory available".to_string()))
    }

    /// Local path for `url`, downloading it on first use.
    pub async fn fetch(&self, url: &str) -> Result<PathBuf> {
        let path = self.cache_path(url)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            trace!(url, path = %path.display(), "image_cache_hit");
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        debug!(url, "image_fetch");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Fetch(format!("unable to request {}: {}", url, e)))?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("unable to download {}: {}", url, e)))?;

        let partial = path.with_extension("part");
        fs::write(&partial, &body).await?;
        fs::rename(&partial, &path).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_sha256_hex() {
        assert_eq!(
            cache_key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        let k = cache_key("https://example.com/a.png");
        assert_eq!(k.len(), 64);
        assert_ne!(k, cache_key("https://example.com/b.png"));
    }

    #[test]
    fn missing_cache_dir_is_a_fetch_error() {
        let store = ImageStore::new(None);
        assert!(matches!(store.cache_path("x"), Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn cached_files_skip_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(Some(dir.path().to_path_buf()));
        let url = "http://invalid.invalid/icon.png";
        let expected = dir.path().join(cache_key(url));
        std::fs::write(&expected, b"png bytes").unwrap();
        assert_eq!(store.fetch(url).await.unwrap(), expected);
    }
}
