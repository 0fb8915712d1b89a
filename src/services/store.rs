//! Content-store collaborator: existence checks and multi-file upload.
//!
//! Modeled on an Internet-Archive-style S3 endpoint: an item exists when
//! its metadata record reports a non-zero size, and an upload is one PUT
//! per file under the same identifier, with the metadata map carried as
//! `x-archive-meta-*` headers on the first file.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::utils::http;

/// One file of a multi-file submission.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Remote file name under the item identifier
    pub name: String,
    /// Local path to read the payload from
    pub path: PathBuf,
}

/// The content store as seen by the pipeline.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Whether a non-empty object already exists under this identifier.
    async fn exists(&self, identifier: &str) -> Result<bool>;

    /// Submit all files under one identifier with the given metadata map.
    async fn upload(
        &self,
        identifier: &str,
        files: &[UploadFile],
        metadata: &BTreeMap<String, String>,
    ) -> Result<()>;
}

/// HTTP implementation against the configured store endpoints.
pub struct HttpRemoteStore {
    config: Arc<Config>,
    client: reqwest::Client,
}

impl HttpRemoteStore {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = http::create_async_client(&config.crawler)?;
        Ok(Self { config, client })
    }

    /// A metadata record with a positive `item_size` marks a live item.
    fn item_nonempty(body: &serde_json::Value) -> bool {
        body.get("item_size")
            .and_then(serde_json::Value::as_u64)
            .is_some_and(|size| size > 0)
    }

    fn metadata_headers(metadata: &BTreeMap<String, String>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-archive-auto-make-bucket"),
            HeaderValue::from_static("1"),
        );
        for (key, value) in metadata {
            let name = HeaderName::from_bytes(format!("x-archive-meta-{}", key).as_bytes())
                .map_err(|e| AppError::config(format!("bad metadata key '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| AppError::config(format!("bad metadata value for '{}': {}", key, e)))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn exists(&self, identifier: &str) -> Result<bool> {
        let url = format!("{}/{}", self.config.upload.metadata_endpoint, identifier);
        let response = http::get_with_retry(
            &self.client,
            &url,
            self.config.crawler.retry_attempts,
            std::time::Duration::from_millis(self.config.crawler.retry_backoff_ms),
        )
        .await?;

        if !response.status().is_success() {
            return Ok(false);
        }
        let body: serde_json::Value = serde_json::from_str(&response.text().await?)?;
        Ok(Self::item_nonempty(&body))
    }

    async fn upload(
        &self,
        identifier: &str,
        files: &[UploadFile],
        metadata: &BTreeMap<String, String>,
    ) -> Result<()> {
        for (position, file) in files.iter().enumerate() {
            let url = format!("{}/{}/{}", self.config.upload.endpoint, identifier, file.name);
            let bytes = tokio::fs::read(&file.path).await?;

            let mut request = self.client.put(&url).body(bytes);
            if position == 0 {
                request = request.headers(Self::metadata_headers(metadata)?);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(AppError::upload(
                    identifier,
                    format!("PUT {} returned {}", file.name, response.status()),
                ));
            }
        }
        Ok(())
    }
}
