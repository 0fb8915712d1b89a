//! Per-day workspace status and crawl outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::IssueIdentifier;

/// Persisted state of a day workspace.
///
/// Written atomically after each step, so resume logic reads an explicit
/// record instead of inferring completion from which files happen to
/// exist. A `Pending` workspace means the process died mid-day and the
/// day must be re-attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceState {
    Pending,
    Complete,
    Incomplete,
}

/// The workspace status record (`status.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceStatus {
    pub state: WorkspaceState,

    /// Issue identifier resolved for this day
    pub identifier: IssueIdentifier,

    /// Page count reported by the archive's page listing
    #[serde(default)]
    pub expected_pages: Option<usize>,

    /// Pages whose image was actually persisted
    #[serde(default)]
    pub fetched_pages: usize,
}

impl WorkspaceStatus {
    pub fn pending(identifier: IssueIdentifier) -> Self {
        Self {
            state: WorkspaceState::Pending,
            identifier,
            expected_pages: None,
            fetched_pages: 0,
        }
    }
}

/// Terminal outcome of one day's crawl, reported to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOutcome {
    /// Workspace already recorded as done; nothing touched the network
    Skipped,
    /// No issue exists for this day (publication gap); not an error
    Absent,
    /// Every page persisted
    Complete,
    /// Some pages persisted; day goes on the retry ledger
    Incomplete,
    /// Unhandled error anywhere in the chain; day goes on the ledger
    Failed,
    /// Cooperative cancellation between pages; workspace stays pending
    /// and the next run re-attempts the day
    Cancelled,
}

impl DayOutcome {
    /// Whether the day belongs on the retry ledger.
    pub fn needs_retry(self) -> bool {
        matches!(self, Self::Incomplete | Self::Failed)
    }
}

impl fmt::Display for DayOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Skipped => "skipped",
            Self::Absent => "absent",
            Self::Complete => "complete",
            Self::Incomplete => "incomplete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Aggregate counters for a range crawl.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlStats {
    pub days_total: usize,
    pub skipped: usize,
    pub absent: usize,
    pub complete: usize,
    pub incomplete: usize,
    pub failed: usize,
}

impl CrawlStats {
    pub fn record(&mut self, outcome: DayOutcome) {
        match outcome {
            DayOutcome::Skipped => self.skipped += 1,
            DayOutcome::Absent => self.absent += 1,
            DayOutcome::Complete => self.complete += 1,
            DayOutcome::Incomplete => self.incomplete += 1,
            DayOutcome::Failed => self.failed += 1,
            // A cancelled day was not processed; the next run picks it up.
            DayOutcome::Cancelled => return,
        }
        self.days_total += 1;
    }
}
