// src/pipeline/audit.rs

//! Offline completeness audit.
//!
//! A pure read pass over persisted day workspaces: recount page images
//! against the expected page count, never touching the network, so it
//! is cheap to re-run as a health check. The audit report, not the
//! crawl phase's own outcomes, is the authoritative completeness signal
//! for operators.

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::IssueIdentifier;
use crate::storage::{DayWorkspace, WorkspaceRoot};

/// Audit row for one day workspace.
#[derive(Debug, Clone)]
pub struct DayAudit {
    pub day: NaiveDate,
    pub identifier: Option<IssueIdentifier>,
    pub image_count: usize,
    pub expected_pages: usize,
    pub consistent: bool,
}

/// Aggregate audit result over all workspaces.
#[derive(Debug, Default)]
pub struct AuditReport {
    pub days: Vec<DayAudit>,
}

impl AuditReport {
    pub fn inconsistent(&self) -> impl Iterator<Item = &DayAudit> {
        self.days.iter().filter(|d| !d.consistent)
    }

    pub fn inconsistent_count(&self) -> usize {
        self.inconsistent().count()
    }

    pub fn is_consistent(&self) -> bool {
        self.inconsistent_count() == 0
    }
}

/// Expected page count: the status record when the day got far enough
/// to write one, else the persisted page-list snapshot, else zero.
async fn expected_pages(workspace: &DayWorkspace) -> Result<(usize, Option<IssueIdentifier>)> {
    if let Some(status) = workspace.read_status().await? {
        if let Some(expected) = status.expected_pages {
            return Ok((expected, Some(status.identifier)));
        }
    }

    let identifier = workspace
        .read_metadata()
        .await?
        .map(|metadata| metadata.identifier);

    let expected = match workspace.read_page_snapshot().await? {
        Some(bytes) => serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|body| {
                body.get("pageList")
                    .and_then(serde_json::Value::as_array)
                    .map(Vec::len)
            })
            .unwrap_or(0),
        None => 0,
    };
    Ok((expected, identifier))
}

/// Audit every day workspace under the root.
pub async fn run_audit(root: &WorkspaceRoot) -> Result<AuditReport> {
    let mut report = AuditReport::default();

    for day in root.list_existing().await? {
        let workspace = root.open_day(day);
        let image_count = workspace.image_count().await?;
        let (expected, identifier) = expected_pages(&workspace).await?;

        // Zero against zero is a legitimately empty workspace, not a
        // truncation; everything else must match exactly.
        let consistent = image_count == expected;
        if !consistent {
            log::warn!(
                "Day {} inconsistent: {} images on disk, {} pages expected ({})",
                day,
                image_count,
                expected,
                identifier
                    .as_ref()
                    .map(IssueIdentifier::describe)
                    .unwrap_or_else(|| "unknown issue".to_string())
            );
        }

        report.days.push(DayAudit {
            day,
            identifier,
            image_count,
            expected_pages: expected,
            consistent,
        });
    }

    log::info!(
        "Audit finished: {} days, {} inconsistent",
        report.days.len(),
        report.inconsistent_count()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::models::{WorkspaceState, WorkspaceStatus};
    use crate::storage::BeginDay;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn make_day(
        root: &WorkspaceRoot,
        d: NaiveDate,
        images: usize,
        expected: usize,
        state: WorkspaceState,
    ) {
        let id = IssueIdentifier::new("1319_01_1990_0001_0001");
        let workspace = match root.begin(d, &id).await.unwrap() {
            BeginDay::Created(w) => w,
            other => panic!("expected Created, got {:?}", other),
        };
        for i in 0..images {
            workspace
                .write_image(&format!("p{}", i), b"jpeg")
                .await
                .unwrap();
        }
        let mut status = WorkspaceStatus::pending(id);
        status.state = state;
        status.expected_pages = Some(expected);
        status.fetched_pages = images;
        workspace.write_status(&status).await.unwrap();
    }

    #[tokio::test]
    async fn consistent_day_is_not_flagged() {
        let tmp = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        make_day(&root, day("1990-01-02"), 2, 2, WorkspaceState::Complete).await;

        let report = run_audit(&root).await.unwrap();
        assert_eq!(report.days.len(), 1);
        assert!(report.days[0].consistent);
        assert_eq!(report.days[0].image_count, 2);
        assert_eq!(report.days[0].expected_pages, 2);
        assert!(report.is_consistent());
    }

    #[tokio::test]
    async fn truncated_day_is_flagged() {
        let tmp = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        make_day(&root, day("1990-01-02"), 1, 3, WorkspaceState::Incomplete).await;

        let report = run_audit(&root).await.unwrap();
        assert_eq!(report.inconsistent_count(), 1);
        let bad = report.inconsistent().next().unwrap();
        assert_eq!(bad.day, day("1990-01-02"));
        assert_eq!(bad.image_count, 1);
        assert_eq!(bad.expected_pages, 3);
    }

    #[tokio::test]
    async fn zero_zero_is_consistent() {
        let tmp = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        make_day(&root, day("1990-01-02"), 0, 0, WorkspaceState::Complete).await;

        let report = run_audit(&root).await.unwrap();
        assert!(report.is_consistent());
    }

    #[tokio::test]
    async fn falls_back_to_page_snapshot_when_status_predates_counts() {
        // A workspace from before the final status write: pending, no
        // expected_pages recorded, but the snapshot is on disk.
        let tmp = TempDir::new().unwrap();
        let root = WorkspaceRoot::new(tmp.path());
        let id = IssueIdentifier::new("1319_01_1990_0001_0001");
        let workspace = match root.begin(day("1990-01-02"), &id).await.unwrap() {
            BeginDay::Created(w) => w,
            other => panic!("expected Created, got {:?}", other),
        };
        workspace
            .write_page_snapshot(&id, r#"{"pageList":[{"thumbnailId":"p1"},{"thumbnailId":"p2"}]}"#)
            .await
            .unwrap();
        workspace.write_image("p1", b"jpeg").await.unwrap();

        let report = run_audit(&root).await.unwrap();
        assert_eq!(report.days[0].expected_pages, 2);
        assert_eq!(report.days[0].image_count, 1);
        assert!(!report.days[0].consistent);
    }
}
