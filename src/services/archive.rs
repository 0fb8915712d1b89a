//! Archive source: day resolution and issue metadata.
//!
//! The archive has no direct lookup by date. The only way to find a
//! day's issue is to ask for the *next* day's neighbor index and take
//! its `previousIssueId`, so enumeration is a linked backward walk of
//! independent one-hop lookups.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Config, IssueIdentifier, IssueMetadata};
use crate::services::session::{DaySession, HttpDaySession};
use crate::utils::http;

/// Upstream neighbor-index response.
///
/// `{"previousIssueId":"1319_02_1989_0242_0001","nextIssueId":"..."}`
#[derive(Debug, Deserialize)]
struct NeighborsResponse {
    #[serde(rename = "previousIssueId")]
    previous_issue_id: Option<String>,
}

/// Upstream issue-info response.
///
/// `{"id_testata":"02","uscita":"243","data_uscita":"1989-09-13 00:00:00","nome_testata":"Europa"}`
#[derive(Debug, Deserialize)]
struct IssueInfoResponse {
    id_testata: Option<String>,
    uscita: Option<String>,
    data_uscita: Option<String>,
    nome_testata: Option<String>,
}

/// Parse an issue-info body, or degrade to a synthesized record.
///
/// An unusable body never aborts the day: the pipeline keeps making
/// forward progress with a record fabricated from the request alone,
/// flagged `synthesized` so later phases can see the degradation.
fn metadata_from_body(
    body: &str,
    day: NaiveDate,
    edition: &str,
    identifier: &IssueIdentifier,
) -> IssueMetadata {
    match serde_json::from_str::<IssueInfoResponse>(body) {
        Ok(IssueInfoResponse {
            id_testata,
            uscita,
            data_uscita: Some(canonical_date),
            nome_testata,
        }) => IssueMetadata {
            identifier: identifier.clone(),
            canonical_date,
            edition_code: id_testata.unwrap_or_else(|| edition.to_string()),
            issue_number: uscita,
            title_hint: nome_testata,
            synthesized: false,
        },
        _ => {
            log::warn!(
                "Unusable metadata body for {}; synthesizing a record for {}",
                identifier,
                day
            );
            IssueMetadata::synthesized(identifier.clone(), day, edition)
        }
    }
}

/// The archive collaborator as seen by the pipeline.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Resolve a calendar day to its issue identifier via the next
    /// day's neighbor index. `None` when the upstream cannot name one.
    async fn resolve_day(
        &self,
        day: NaiveDate,
        edition: &str,
    ) -> Result<Option<IssueIdentifier>>;

    /// Fetch issue metadata. An unusable body degrades to a synthesized
    /// record carrying only the requested day, never an abort.
    async fn fetch_metadata(
        &self,
        day: NaiveDate,
        edition: &str,
        identifier: &IssueIdentifier,
    ) -> Result<IssueMetadata>;

    /// Open a fresh working session for one day's page requests.
    async fn open_session(&self) -> Result<Box<dyn DaySession>>;
}

/// HTTP implementation against the live archive.
pub struct HttpArchiveSource {
    config: Arc<Config>,
    client: reqwest::Client,
}

impl HttpArchiveSource {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = http::create_async_client(&config.crawler)?;
        Ok(Self { config, client })
    }

    fn backoff(&self) -> Duration {
        Duration::from_millis(self.config.crawler.retry_backoff_ms)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        http::get_with_retry(
            &self.client,
            url,
            self.config.crawler.retry_attempts,
            self.backoff(),
        )
        .await
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn resolve_day(
        &self,
        day: NaiveDate,
        edition: &str,
    ) -> Result<Option<IssueIdentifier>> {
        let next_day = day
            .succ_opt()
            .ok_or_else(|| AppError::config(format!("no day after {}", day)))?;
        let url = format!(
            "{}/index2.php?option=com_lastampa&task=issue&no_html=1&type=neighbors&headboard={}&date={}%2000:00:00",
            self.config.archive.base_url,
            edition,
            next_day.format("%Y-%m-%d"),
        );

        let response = self.get(&url).await?;
        if !response.status().is_success() {
            log::warn!(
                "Neighbor lookup for {} returned {}",
                day,
                response.status()
            );
            return Ok(None);
        }

        let body = response.text().await?;
        match serde_json::from_str::<NeighborsResponse>(&body) {
            Ok(neighbors) => Ok(neighbors
                .previous_issue_id
                .filter(|id| !id.is_empty())
                .map(IssueIdentifier::new)),
            Err(error) => {
                log::warn!("Malformed neighbor index for {}: {}", day, error);
                Ok(None)
            }
        }
    }

    async fn fetch_metadata(
        &self,
        day: NaiveDate,
        edition: &str,
        identifier: &IssueIdentifier,
    ) -> Result<IssueMetadata> {
        let url = format!(
            "{}/index2.php?option=com_lastampa&task=issue&no_html=1&type=info&issueid={}",
            self.config.archive.base_url, identifier,
        );

        let response = self.get(&url).await?;
        if !response.status().is_success() {
            return Err(AppError::source(
                format!("metadata for {}", identifier),
                response.status(),
            ));
        }

        let body = response.text().await?;
        Ok(metadata_from_body(&body, day, edition, identifier))
    }

    async fn open_session(&self) -> Result<Box<dyn DaySession>> {
        let session = HttpDaySession::open(Arc::clone(&self.config)).await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_response_parses_expected_shape() {
        let body = r#"{"previousIssueId":"1319_02_1989_0242_0001","nextIssueId":"1319_02_1989_0244_0001"}"#;
        let neighbors: NeighborsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            neighbors.previous_issue_id.as_deref(),
            Some("1319_02_1989_0242_0001")
        );
    }

    #[test]
    fn neighbors_response_tolerates_missing_previous() {
        let body = r#"{"nextIssueId":"x"}"#;
        let neighbors: NeighborsResponse = serde_json::from_str(body).unwrap();
        assert!(neighbors.previous_issue_id.is_none());
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn metadata_from_well_formed_body_is_typed() {
        let body = r#"{"id_testata":"02","uscita":"243","data_uscita":"1989-09-13 00:00:00","nome_testata":"Europa"}"#;
        let id = IssueIdentifier::new("1319_02_1989_0242_0001");
        let metadata = metadata_from_body(body, day("1989-09-13"), "01", &id);
        assert!(!metadata.synthesized);
        assert_eq!(metadata.canonical_date, "1989-09-13 00:00:00");
        assert_eq!(metadata.edition_code, "02");
        assert_eq!(metadata.issue_number.as_deref(), Some("243"));
        assert_eq!(metadata.title_hint.as_deref(), Some("Europa"));
        assert!(metadata.matches_day(day("1989-09-13")));
    }

    #[test]
    fn malformed_body_degrades_to_synthesized_record() {
        let id = IssueIdentifier::new("1319_01_1990_0001_0001");
        let metadata = metadata_from_body("<html>maintenance</html>", day("1990-01-02"), "01", &id);
        assert!(metadata.synthesized);
        assert_eq!(metadata.identifier, id);
        assert_eq!(metadata.edition_code, "01");
        // The requested day is carried through, so the day-match gate
        // still lets the crawl proceed.
        assert!(metadata.matches_day(day("1990-01-02")));
    }

    #[test]
    fn body_without_canonical_date_degrades_to_synthesized_record() {
        let id = IssueIdentifier::new("x");
        let metadata = metadata_from_body(r#"{"id_testata":"02"}"#, day("1990-01-02"), "01", &id);
        assert!(metadata.synthesized);
        assert!(metadata.matches_day(day("1990-01-02")));
    }

    #[test]
    fn issue_info_parses_expected_shape() {
        let body = r#"{"id_testata":"02","uscita":"243","data_uscita":"1989-09-13 00:00:00","nome_testata":"Europa"}"#;
        let info: IssueInfoResponse = serde_json::from_str(body).unwrap();
        assert_eq!(info.data_uscita.as_deref(), Some("1989-09-13 00:00:00"));
        assert_eq!(info.nome_testata.as_deref(), Some("Europa"));
        assert_eq!(info.id_testata.as_deref(), Some("02"));
        assert_eq!(info.uscita.as_deref(), Some("243"));
    }
}
