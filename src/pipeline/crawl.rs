// src/pipeline/crawl.rs

//! Day-by-day crawl: the per-day state machine and the range loop.
//!
//! One day is one resumable unit of work:
//!
//! ```text
//! START → identifier resolved → metadata fetched
//!       → (absent, terminal)
//!       | token acquired → pages listed → pages fetched (partial|complete)
//!       → DONE
//! ```
//!
//! Failures are isolated per day; one day's error never stops the range.

use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlStats, DayOutcome, WorkspaceState, WorkspaceStatus};
use crate::services::{ArchiveSource, ImageFetch};
use crate::storage::{BeginDay, RetryLedger, WorkspaceRoot};
use crate::utils::CancelFlag;

async fn sleep_ms(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Run the state machine for a single day.
///
/// Returns the day's terminal outcome; any `Err` is mapped to
/// `DayOutcome::Failed` by the range loop.
pub async fn crawl_day(
    source: &dyn ArchiveSource,
    root: &WorkspaceRoot,
    config: &Config,
    day: NaiveDate,
    cancel: &CancelFlag,
) -> Result<DayOutcome> {
    let edition = &config.archive.edition;

    let identifier = source
        .resolve_day(day, edition)
        .await?
        .ok_or_else(|| AppError::source(format!("resolve {}", day), "no issue identifier"))?;
    log::info!("Found {} for {}", identifier.describe(), day);

    let metadata = source.fetch_metadata(day, edition, &identifier).await?;
    sleep_ms(config.crawler.request_delay_ms).await;

    if !metadata.matches_day(day) {
        // The backward walk landed on a different day; probably a gap
        // for festivities. Not an error, and no workspace is created.
        log::info!(
            "No issue for {}: neighbor index points at {}",
            day,
            metadata.canonical_date
        );
        return Ok(DayOutcome::Absent);
    }

    let workspace = match root.begin(day, &identifier).await? {
        BeginDay::Created(w) => w,
        BeginDay::Resumed(w) => {
            log::info!("Re-attempting pending day {}", day);
            w
        }
        BeginDay::AlreadyDone(state) => {
            log::info!("Day {} was already done ({:?})", day, state);
            return Ok(DayOutcome::Skipped);
        }
    };
    workspace.write_metadata(&metadata).await?;

    // Token acquisition is fatal for the day: every page request below
    // needs it and there is no fallback.
    let session = source.open_session().await?;

    let page_list = session.list_pages(&identifier).await?;
    workspace
        .write_page_snapshot(&identifier, &page_list.raw_body)
        .await?;

    let mut status = WorkspaceStatus::pending(identifier.clone());
    status.expected_pages = Some(page_list.pages.len());
    workspace.write_status(&status).await?;

    let mut missing = 0usize;
    let mut cancelled = false;
    for page in &page_list.pages {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        match session.fetch_image(&page.page_id).await? {
            ImageFetch::Image(bytes) => {
                workspace.write_image(&page.page_id, &bytes).await?;
            }
            ImageFetch::ContentTypeMismatch(got) => {
                log::warn!(
                    "Could not download an image for {} (got {:?})",
                    page.page_id,
                    got
                );
                missing += 1;
                sleep_ms(config.crawler.mismatch_cooldown_ms).await;
                continue;
            }
        }

        let page_metadata = session.fetch_page_metadata(&page.page_id).await?;
        workspace
            .write_page_metadata(&page.page_id, &page_metadata)
            .await?;

        status.fetched_pages += 1;
        workspace.write_status(&status).await?;
    }

    if cancelled {
        // Leave the workspace pending; the next run re-attempts it.
        workspace.write_status(&status).await?;
        return Ok(DayOutcome::Cancelled);
    }

    status.state = if missing == 0 {
        WorkspaceState::Complete
    } else {
        WorkspaceState::Incomplete
    };
    workspace.write_status(&status).await?;

    Ok(match status.state {
        WorkspaceState::Complete => DayOutcome::Complete,
        _ => DayOutcome::Incomplete,
    })
}

/// Walk a date range in increasing order, one day at a time.
///
/// Days already recorded as done are skipped without touching the
/// network. Incomplete and failed days go on the retry ledger and are
/// followed by a longer cooldown; the range itself never aborts.
pub async fn run_crawl(
    source: &dyn ArchiveSource,
    root: &WorkspaceRoot,
    ledger: &RetryLedger,
    config: &Config,
    days: &[NaiveDate],
    cancel: &CancelFlag,
) -> Result<CrawlStats> {
    let mut stats = CrawlStats::default();
    log::info!("Crawling {} days", days.len());

    for &day in days {
        if cancel.is_cancelled() {
            log::warn!("Cancelled before {}", day);
            break;
        }

        // Resume gate: only a pending (crashed mid-day) workspace is
        // re-attempted; anything else recorded on disk is done. An
        // unreadable status record counts as done too, so one corrupt
        // file cannot take the rest of the range down with it; the
        // audit pass is where that day gets judged.
        if root.exists(day).await {
            let status = match root.status(day).await {
                Ok(status) => status,
                Err(error) => {
                    log::warn!("Unreadable status record for {}: {}", day, error);
                    None
                }
            };
            let pending = matches!(
                status,
                Some(WorkspaceStatus {
                    state: WorkspaceState::Pending,
                    ..
                })
            );
            if !pending {
                log::debug!("Skipping {}: workspace already done", day);
                stats.record(DayOutcome::Skipped);
                continue;
            }
        }

        let outcome = match crawl_day(source, root, config, day, cancel).await {
            Ok(outcome) => outcome,
            Err(error) => {
                log::error!("Day {} failed: {}", day, error);
                DayOutcome::Failed
            }
        };

        if outcome == DayOutcome::Cancelled {
            log::warn!("Cancelled during {}; day left pending", day);
            break;
        }

        log::info!("Day {}: {}", day, outcome);
        stats.record(outcome);

        if outcome.needs_retry() {
            ledger.append(day).await?;
            sleep_ms(config.crawler.failure_cooldown_ms).await;
        }
        sleep_ms(config.crawler.day_delay_ms).await;
    }

    log::info!(
        "Crawl finished: {} complete, {} incomplete, {} failed, {} absent, {} skipped",
        stats.complete,
        stats.incomplete,
        stats.failed,
        stats.absent,
        stats.skipped
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    use crate::models::{IssueIdentifier, IssueMetadata, PageDescriptor, PageList};
    use crate::services::DaySession;

    /// Canned behavior for one page id.
    #[derive(Clone)]
    enum PageBehavior {
        Jpeg(Vec<u8>),
        WrongContentType(String),
    }

    /// Scripted archive for pipeline tests. Counts every simulated
    /// network call so idempotence can be asserted.
    struct FakeArchive {
        issue: Option<IssueIdentifier>,
        canonical_date: String,
        pages: Vec<(String, PageBehavior)>,
        calls: AtomicUsize,
    }

    impl FakeArchive {
        fn new(issue: &str, canonical_date: &str, pages: Vec<(String, PageBehavior)>) -> Self {
            Self {
                issue: Some(IssueIdentifier::new(issue)),
                canonical_date: canonical_date.to_string(),
                pages,
                calls: AtomicUsize::new(0),
            }
        }

        fn network_calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn tick(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeSession {
        pages: Vec<(String, PageBehavior)>,
        behavior: Mutex<HashMap<String, PageBehavior>>,
    }

    #[async_trait]
    impl ArchiveSource for FakeArchive {
        async fn resolve_day(
            &self,
            _day: NaiveDate,
            _edition: &str,
        ) -> Result<Option<IssueIdentifier>> {
            self.tick();
            Ok(self.issue.clone())
        }

        async fn fetch_metadata(
            &self,
            _day: NaiveDate,
            edition: &str,
            identifier: &IssueIdentifier,
        ) -> Result<IssueMetadata> {
            self.tick();
            Ok(IssueMetadata {
                identifier: identifier.clone(),
                canonical_date: self.canonical_date.clone(),
                edition_code: edition.to_string(),
                issue_number: Some("1".to_string()),
                title_hint: Some("La Stampa".to_string()),
                synthesized: false,
            })
        }

        async fn open_session(&self) -> Result<Box<dyn DaySession>> {
            self.tick();
            Ok(Box::new(FakeSession {
                pages: self.pages.clone(),
                behavior: Mutex::new(self.pages.iter().cloned().collect()),
            }))
        }
    }

    #[async_trait]
    impl DaySession for FakeSession {
        async fn list_pages(&self, _identifier: &IssueIdentifier) -> Result<PageList> {
            let pages = self
                .pages
                .iter()
                .enumerate()
                .map(|(position, (page_id, _))| PageDescriptor {
                    page_id: page_id.clone(),
                    position,
                })
                .collect();
            Ok(PageList {
                raw_body: format!(
                    r#"{{"pageList":[{}]}}"#,
                    self.pages
                        .iter()
                        .map(|(id, _)| format!(r#"{{"thumbnailId":"{}"}}"#, id))
                        .collect::<Vec<_>>()
                        .join(",")
                ),
                pages,
            })
        }

        async fn fetch_image(&self, page_id: &str) -> Result<ImageFetch> {
            let behavior = self.behavior.lock().unwrap();
            match behavior.get(page_id) {
                Some(PageBehavior::Jpeg(bytes)) => Ok(ImageFetch::Image(bytes.clone())),
                Some(PageBehavior::WrongContentType(ct)) => {
                    Ok(ImageFetch::ContentTypeMismatch(ct.clone()))
                }
                None => Ok(ImageFetch::ContentTypeMismatch("missing".to_string())),
            }
        }

        async fn fetch_page_metadata(&self, page_id: &str) -> Result<Vec<u8>> {
            Ok(format!(r#"{{"pageID":"{}"}}"#, page_id).into_bytes())
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.crawler.request_delay_ms = 0;
        config.crawler.image_delay_ms = 0;
        config.crawler.mismatch_cooldown_ms = 0;
        config.crawler.day_delay_ms = 0;
        config.crawler.failure_cooldown_ms = 0;
        config
    }

    fn two_good_pages() -> Vec<(String, PageBehavior)> {
        vec![
            ("p1".to_string(), PageBehavior::Jpeg(b"jpeg-1".to_vec())),
            ("p2".to_string(), PageBehavior::Jpeg(b"jpeg-2".to_vec())),
        ]
    }

    #[tokio::test]
    async fn complete_day_persists_everything() {
        // The concrete scenario: 1990-01-02, edition 01, two jpeg pages.
        let tmp = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        let config = quiet_config();
        let archive = FakeArchive::new("X", "1990-01-02 00:00:00", two_good_pages());

        let outcome = crawl_day(
            &archive,
            &root,
            &config,
            day("1990-01-02"),
            &CancelFlag::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, DayOutcome::Complete);

        let workspace = root.open_day(day("1990-01-02"));
        let status = workspace.read_status().await.unwrap().unwrap();
        assert_eq!(status.state, WorkspaceState::Complete);
        assert_eq!(status.expected_pages, Some(2));
        assert_eq!(status.fetched_pages, 2);
        assert_eq!(workspace.image_count().await.unwrap(), 2);
        assert!(workspace.read_metadata().await.unwrap().is_some());
        assert!(workspace.read_page_snapshot().await.unwrap().is_some());
        assert!(workspace.dir().join("p1_pagedata.json").exists());
        assert!(workspace.dir().join("p2_pagedata.json").exists());
    }

    #[tokio::test]
    async fn gap_day_is_absent_with_no_workspace() {
        // Neighbor lookup resolved an issue whose canonical date is the
        // previous day: classified absent, nothing written.
        let tmp = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        let config = quiet_config();
        let archive = FakeArchive::new("X", "1990-01-01 00:00:00", two_good_pages());
        let ledger = RetryLedger::new(tmp.path().join("retry.log"));

        let stats = run_crawl(
            &archive,
            &root,
            &ledger,
            &config,
            &[day("1990-01-02")],
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        assert_eq!(stats.absent, 1);
        assert!(!root.exists(day("1990-01-02")).await);
        assert!(!ledger.path().exists());
    }

    #[tokio::test]
    async fn content_type_mismatch_yields_incomplete_and_one_ledger_entry() {
        let tmp = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        let config = quiet_config();
        let pages = vec![
            ("p1".to_string(), PageBehavior::Jpeg(b"jpeg-1".to_vec())),
            (
                "p2".to_string(),
                PageBehavior::WrongContentType("text/html".to_string()),
            ),
            ("p3".to_string(), PageBehavior::Jpeg(b"jpeg-3".to_vec())),
        ];
        let archive = FakeArchive::new("X", "1990-01-02 00:00:00", pages);
        let ledger = RetryLedger::new(tmp.path().join("retry.log"));

        let stats = run_crawl(
            &archive,
            &root,
            &ledger,
            &config,
            &[day("1990-01-02")],
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        assert_eq!(stats.incomplete, 1);

        // All other pages still persisted.
        let workspace = root.open_day(day("1990-01-02"));
        assert_eq!(workspace.image_count().await.unwrap(), 2);
        let status = workspace.read_status().await.unwrap().unwrap();
        assert_eq!(status.state, WorkspaceState::Incomplete);
        assert_eq!(status.expected_pages, Some(3));
        assert_eq!(status.fetched_pages, 2);

        // Exactly one ledger entry for the day.
        let log = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(log, "1990-01-02\n");
    }

    #[tokio::test]
    async fn second_run_performs_zero_network_requests() {
        let tmp = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        let config = quiet_config();
        let archive = FakeArchive::new("X", "1990-01-02 00:00:00", two_good_pages());
        let ledger = RetryLedger::new(tmp.path().join("retry.log"));
        let days = [day("1990-01-02")];

        run_crawl(&archive, &root, &ledger, &config, &days, &CancelFlag::new())
            .await
            .unwrap();
        let calls_after_first = archive.network_calls();
        assert!(calls_after_first > 0);

        let stats = run_crawl(&archive, &root, &ledger, &config, &days, &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(archive.network_calls(), calls_after_first);
    }

    #[tokio::test]
    async fn garbage_status_record_does_not_abort_the_range() {
        let tmp = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        let config = quiet_config();
        let archive = FakeArchive::new("X", "1990-01-03 00:00:00", two_good_pages());
        let ledger = RetryLedger::new(tmp.path().join("retry.log"));

        // A crash left the first day's status record corrupt.
        let broken = root.open_day(day("1990-01-02"));
        std::fs::create_dir_all(broken.dir()).unwrap();
        std::fs::write(broken.dir().join("status.json"), b"{not json").unwrap();

        let stats = run_crawl(
            &archive,
            &root,
            &ledger,
            &config,
            &[day("1990-01-02"), day("1990-01-03")],
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        // The corrupt day is treated as done and the rest of the range
        // still runs; the audit pass flags the bad day later.
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.complete, 1);
    }

    #[tokio::test]
    async fn failed_resolution_goes_on_the_ledger_and_range_continues() {
        let tmp = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        let config = quiet_config();
        let mut archive = FakeArchive::new("X", "1990-01-03 00:00:00", two_good_pages());
        archive.issue = None; // resolver finds nothing usable
        let ledger = RetryLedger::new(tmp.path().join("retry.log"));

        let stats = run_crawl(
            &archive,
            &root,
            &ledger,
            &config,
            &[day("1990-01-02"), day("1990-01-03")],
            &CancelFlag::new(),
        )
        .await
        .unwrap();

        // Both days failed, both were attempted, range never aborted.
        assert_eq!(stats.failed, 2);
        let log = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(log, "1990-01-02\n1990-01-03\n");
    }

    #[tokio::test]
    async fn cancellation_between_pages_leaves_day_pending() {
        let tmp = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        let config = quiet_config();
        let archive = FakeArchive::new("X", "1990-01-02 00:00:00", two_good_pages());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let outcome = crawl_day(&archive, &root, &config, day("1990-01-02"), &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, DayOutcome::Cancelled);

        let status = root.status(day("1990-01-02")).await.unwrap().unwrap();
        assert_eq!(status.state, WorkspaceState::Pending);
    }

    #[tokio::test]
    async fn pending_day_is_reattempted_on_resume() {
        let tmp = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        let config = quiet_config();
        let archive = FakeArchive::new("X", "1990-01-02 00:00:00", two_good_pages());
        let ledger = RetryLedger::new(tmp.path().join("retry.log"));
        let days = [day("1990-01-02")];

        // First run cancelled immediately: workspace left pending.
        let cancelled = CancelFlag::new();
        cancelled.cancel();
        crawl_day(&archive, &root, &config, days[0], &cancelled)
            .await
            .unwrap();

        // Second, uncancelled run finishes the day.
        let stats = run_crawl(&archive, &root, &ledger, &config, &days, &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(stats.complete, 1);
        let status = root.status(days[0]).await.unwrap().unwrap();
        assert_eq!(status.state, WorkspaceState::Complete);
    }
}
