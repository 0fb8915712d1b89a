//! Per-day working session: token acquisition and page fetching.
//!
//! Every page request needs an anti-abuse token scraped from the landing
//! page. Tokens are pinned to one cookie-bearing session and are not
//! valid across days, so a fresh session is opened per day and dropped
//! with it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Config, IssueIdentifier, PageDescriptor, PageList};
use crate::utils::http;

/// Fixed content-profile suffix used by the archive's download endpoint.
const DOWNLOAD_PROFILE: &str = "19344595";

/// Result of one page-image fetch.
#[derive(Debug, Clone)]
pub enum ImageFetch {
    /// Validated `image/*` payload
    Image(Vec<u8>),
    /// The archive answered with something that is not an image; the
    /// page counts as missing and the day continues
    ContentTypeMismatch(String),
}

/// One day's pinned-token session over the archive's page endpoints.
#[async_trait]
pub trait DaySession: Send + Sync {
    /// List the pages composing an issue, in reading order.
    async fn list_pages(&self, identifier: &IssueIdentifier) -> Result<PageList>;

    /// Download one page's image, validating the content type.
    async fn fetch_image(&self, page_id: &str) -> Result<ImageFetch>;

    /// Download one page's textual metadata blob.
    async fn fetch_page_metadata(&self, page_id: &str) -> Result<Vec<u8>>;
}

/// Upstream page-list response: `{"pageList":[{"thumbnailId":"..."}]}`
#[derive(Debug, Deserialize)]
struct PagesResponse {
    #[serde(rename = "pageList")]
    page_list: Vec<PageEntry>,
}

#[derive(Debug, Deserialize)]
struct PageEntry {
    #[serde(rename = "thumbnailId")]
    thumbnail_id: String,
}

/// HTTP session against the live archive.
pub struct HttpDaySession {
    config: Arc<Config>,
    client: reqwest::Client,
    token: String,
}

impl HttpDaySession {
    /// Open a session: fresh cookie jar, then pin the hidden-input token
    /// from the landing page. Failure here is fatal for the whole day.
    pub async fn open(config: Arc<Config>) -> Result<Self> {
        let client = http::create_session_client(&config.crawler)?;
        let url = format!("{}/", config.archive.base_url);
        let response = http::get_with_retry(
            &client,
            &url,
            config.crawler.retry_attempts,
            Duration::from_millis(config.crawler.retry_backoff_ms),
        )
        .await?;

        if !response.status().is_success() {
            return Err(AppError::token(format!(
                "landing page returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let token = Self::extract_token(&body)
            .ok_or_else(|| AppError::token("no hidden token input on landing page"))?;

        let session = Self {
            config,
            client,
            token,
        };
        session.pause().await;
        Ok(session)
    }

    /// Pull the value of `<input type="hidden" name="t" value="...">`.
    fn extract_token(html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let selector = Selector::parse(r#"input[name="t"]"#).ok()?;
        document
            .select(&selector)
            .filter_map(|input| input.value().attr("value"))
            .map(str::to_string)
            .find(|value| !value.is_empty())
    }

    /// Fixed inter-request delay; the archive's informal rate limit.
    async fn pause(&self) {
        let delay = Duration::from_millis(self.config.crawler.request_delay_ms);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.pause().await;
        http::get_with_retry(
            &self.client,
            url,
            self.config.crawler.retry_attempts,
            Duration::from_millis(self.config.crawler.retry_backoff_ms),
        )
        .await
    }
}

#[async_trait]
impl DaySession for HttpDaySession {
    async fn list_pages(&self, identifier: &IssueIdentifier) -> Result<PageList> {
        let url = format!(
            "{}/load.php?url=/item/getPagesInfo.do?id={}&s={}",
            self.config.archive.base_url, identifier, self.token,
        );

        let response = self.get(&url).await?;
        if !response.status().is_success() {
            return Err(AppError::source(
                format!("page list for {}", identifier),
                response.status(),
            ));
        }

        let raw_body = response.text().await?;
        let parsed: PagesResponse = serde_json::from_str(&raw_body).map_err(|e| {
            AppError::source(format!("page list for {}", identifier), e)
        })?;

        let pages = parsed
            .page_list
            .into_iter()
            .enumerate()
            .map(|(position, entry)| PageDescriptor {
                page_id: entry.thumbnail_id,
                position,
            })
            .collect();

        self.pause().await;
        Ok(PageList { raw_body, pages })
    }

    async fn fetch_image(&self, page_id: &str) -> Result<ImageFetch> {
        let url = format!(
            "{}/load.php?url=/downloadContent.do?id={}_{}&s={}",
            self.config.archive.base_url, page_id, DOWNLOAD_PROFILE, self.token,
        );

        let response = self.get(&url).await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let fetch = if !status.is_success() {
            ImageFetch::ContentTypeMismatch(format!("status {}", status))
        } else if content_type.starts_with("image/") {
            ImageFetch::Image(response.bytes().await?.to_vec())
        } else {
            ImageFetch::ContentTypeMismatch(content_type)
        };

        tokio::time::sleep(Duration::from_millis(self.config.crawler.image_delay_ms)).await;
        Ok(fetch)
    }

    async fn fetch_page_metadata(&self, page_id: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/load.php?url=/search/select/?wt=json&q=pageID:{}&s={}&s={}",
            self.config.archive.base_url, page_id, self.token, self.token,
        );

        // The metadata blob is persisted verbatim whatever its status;
        // the audit phase judges the day, not this fetch.
        let response = self.get(&url).await?;
        let bytes = response.bytes().await?.to_vec();
        self.pause().await;
        Ok(bytes)
    }
}
