//! Append-only retry ledger.
//!
//! Days whose crawl ended incomplete or failed are appended here, one
//! ISO day per line. The pipeline never reads it back; it is an
//! operator-facing worklist, and duplicate entries across runs are
//! acceptable.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// The `retry.log` file next to the day workspaces.
#[derive(Debug, Clone)]
pub struct RetryLedger {
    path: PathBuf,
}

impl RetryLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one day. Creates the file on first use.
    pub async fn append(&self, day: NaiveDate) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", day.format("%Y-%m-%d")).as_bytes())
            .await?;
        file.flush().await?;
        Ok(())
    }
}
