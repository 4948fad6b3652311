//! HTTP loader for model resources served over the network.

use async_trait::async_trait;
use tracing::debug;

use super::ResourceLoader;
use crate::error::{MurmurError, Result};

/// Fetches resources with `reqwest`. Paths are appended to `base_url`
/// unless they are already absolute URLs.
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLoader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        }
    }
}

#[async_trait]
impl ResourceLoader for HttpLoader {
    async fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url(path);
        debug!(%url, "fetching resource");
        let fail = |e: reqwest::Error| MurmurError::Resource {
            path: url.clone(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fail)?;
        let body = response.bytes().await.map_err(fail)?;
        Ok(body.to_vec())
    }
}
