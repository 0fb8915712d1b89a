//! Day workspaces: the unit of idempotency.
//!
//! One directory per calendar day, named `YYYY-MM-DD`. Directory
//! creation is atomic and fails if the day already exists, which is the
//! sole mutual-exclusion discipline should workers ever run in
//! parallel. Completion is never inferred from which files happen to
//! exist: `status.json` is the explicit record, written atomically
//! after creation and again after the page loop, so a crash mid-day
//! leaves a `pending` workspace that resume re-attempts instead of
//! silently skipping.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{IssueIdentifier, IssueMetadata, WorkspaceState, WorkspaceStatus};

const STATUS_FILE: &str = "status.json";
const METADATA_FILE: &str = "issue_metadata.json";

/// Root directory holding one workspace per day.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

/// Result of trying to begin a day's crawl.
#[derive(Debug)]
pub enum BeginDay {
    /// Fresh workspace, status `pending` already persisted
    Created(DayWorkspace),
    /// A crash left this day `pending`; re-attempt in place
    Resumed(DayWorkspace),
    /// The day is already recorded as done (or predates status records)
    AlreadyDone(Option<WorkspaceState>),
}

impl WorkspaceRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the base directory. Failure here is the one error that
    /// aborts the whole run.
    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::config(format!("cannot create {}: {}", self.root.display(), e)))
    }

    fn day_dir(&self, day: NaiveDate) -> PathBuf {
        self.root.join(day.format("%Y-%m-%d").to_string())
    }

    /// Read a day's status record without creating anything.
    pub async fn status(&self, day: NaiveDate) -> Result<Option<WorkspaceStatus>> {
        DayWorkspace::open(self.day_dir(day), day).read_status().await
    }

    /// Whether a workspace directory exists for this day at all.
    pub async fn exists(&self, day: NaiveDate) -> bool {
        tokio::fs::metadata(self.day_dir(day)).await.is_ok()
    }

    /// Begin a day's crawl. Directory creation is the idempotency gate:
    /// two workers can never both get `Created` for the same day.
    pub async fn begin(&self, day: NaiveDate, identifier: &IssueIdentifier) -> Result<BeginDay> {
        let dir = self.day_dir(day);
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {
                let workspace = DayWorkspace::open(dir, day);
                workspace
                    .write_status(&WorkspaceStatus::pending(identifier.clone()))
                    .await?;
                Ok(BeginDay::Created(workspace))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let workspace = DayWorkspace::open(dir, day);
                match workspace.read_status().await? {
                    Some(status) if status.state == WorkspaceState::Pending => {
                        Ok(BeginDay::Resumed(workspace))
                    }
                    Some(status) => Ok(BeginDay::AlreadyDone(Some(status.state))),
                    // Directory from before status records existed;
                    // treated as done, the audit pass judges it.
                    None => Ok(BeginDay::AlreadyDone(None)),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Scan workspace directory names for resume, audit, and upload.
    pub async fn list_existing(&self) -> Result<Vec<NaiveDate>> {
        let mut days = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(name) = name.to_str() {
                if let Ok(day) = NaiveDate::parse_from_str(name, "%Y-%m-%d") {
                    days.push(day);
                }
            }
        }
        days.sort_unstable();
        Ok(days)
    }

    /// Open an existing day's workspace for read-side passes.
    pub fn open_day(&self, day: NaiveDate) -> DayWorkspace {
        DayWorkspace::open(self.day_dir(day), day)
    }
}

/// One day's persisted state.
#[derive(Debug, Clone)]
pub struct DayWorkspace {
    dir: PathBuf,
    day: NaiveDate,
}

impl DayWorkspace {
    fn open(dir: PathBuf, day: NaiveDate) -> Self {
        Self { dir, day }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// Write bytes atomically (write to temp, then rename), so a crash
    /// never leaves a truncated file that the audit pass would count.
    async fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.dir.join(name);
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    pub async fn write_metadata(&self, metadata: &IssueMetadata) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(metadata)?;
        self.write_bytes(METADATA_FILE, &bytes).await
    }

    pub async fn read_metadata(&self) -> Result<Option<IssueMetadata>> {
        match self.read_bytes(METADATA_FILE).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist the raw page-list response verbatim.
    pub async fn write_page_snapshot(
        &self,
        identifier: &IssueIdentifier,
        raw_body: &str,
    ) -> Result<()> {
        let name = format!("{}_pages.json", identifier);
        self.write_bytes(&name, raw_body.as_bytes()).await
    }

    /// Read the page-list snapshot, whatever identifier it was written
    /// under.
    pub async fn read_page_snapshot(&self) -> Result<Option<Vec<u8>>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with("_pages.json") && !name.ends_with("_pagedata.json") {
                    return self.read_bytes(name).await;
                }
            }
        }
        Ok(None)
    }

    pub async fn write_image(&self, page_id: &str, bytes: &[u8]) -> Result<()> {
        self.write_bytes(&format!("{}.jpg", page_id), bytes).await
    }

    pub async fn write_page_metadata(&self, page_id: &str, bytes: &[u8]) -> Result<()> {
        self.write_bytes(&format!("{}_pagedata.json", page_id), bytes)
            .await
    }

    pub async fn write_status(&self, status: &WorkspaceStatus) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(status)?;
        self.write_bytes(STATUS_FILE, &bytes).await
    }

    pub async fn read_status(&self) -> Result<Option<WorkspaceStatus>> {
        match self.read_bytes(STATUS_FILE).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Count persisted page images.
    pub async fn image_count(&self) -> Result<usize> {
        let mut count = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".jpg") {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// All regular files of the workspace, sorted by name, for upload.
    /// Leftover `.tmp` files from an interrupted atomic write are not
    /// part of the workspace contents.
    pub async fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "tmp") {
                continue;
            }
            if entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort_unstable();
        Ok(files)
    }
}
