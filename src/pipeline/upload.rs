// src/pipeline/upload.rs

//! Idempotent upload of day workspaces to the content store.
//!
//! The remote identifier is deterministic (prefix, edition, day), and a
//! non-empty remote object short-circuits the upload, so re-running
//! after any failure is safe: idempotency comes from the remote
//! existence check, never from local bookkeeping.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::{RemoteStore, UploadFile};
use crate::storage::WorkspaceRoot;

/// Terminal outcome of one day's upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    AlreadyPresent,
    Failed,
}

/// Aggregate counters for an upload pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct UploadStats {
    pub uploaded: usize,
    pub already_present: usize,
    pub failed: usize,
}

impl UploadStats {
    pub fn record(&mut self, outcome: UploadOutcome) {
        match outcome {
            UploadOutcome::Uploaded => self.uploaded += 1,
            UploadOutcome::AlreadyPresent => self.already_present += 1,
            UploadOutcome::Failed => self.failed += 1,
        }
    }
}

/// Deterministic remote identifier for a day.
pub fn remote_identifier(config: &Config, day: NaiveDate, edition: &str) -> String {
    format!(
        "{}_{}_{}",
        config.upload.identifier_prefix,
        edition,
        day.format("%Y-%m-%d")
    )
}

/// Derived metadata record: day-specific fields merged onto the fixed
/// template from config, with the residual `extra` map layered last.
fn build_metadata(
    config: &Config,
    day: NaiveDate,
    title: &str,
    issue_identifier: Option<&str>,
    page_count: usize,
) -> BTreeMap<String, String> {
    let day_iso = day.format("%Y-%m-%d").to_string();
    let description = config
        .upload
        .description
        .replace("{title}", title)
        .replace("{date}", &day_iso);

    let mut metadata = BTreeMap::new();
    metadata.insert("title".to_string(), format!("{} ({})", title, day_iso));
    metadata.insert("date".to_string(), day_iso);
    metadata.insert("imagecount".to_string(), page_count.to_string());
    metadata.insert("collection".to_string(), config.upload.collection.clone());
    metadata.insert("licenseurl".to_string(), config.upload.license_url.clone());
    metadata.insert("mediatype".to_string(), config.upload.mediatype.clone());
    metadata.insert("description".to_string(), description);
    if let Some(issue_id) = issue_identifier {
        metadata.insert(
            "external-identifier".to_string(),
            format!("urn:{}:{}", config.upload.identifier_prefix, issue_id),
        );
    }
    for (key, value) in &config.upload.extra {
        metadata.insert(key.clone(), value.clone());
    }
    metadata
}

/// Upload one day's workspace as a single multi-file submission.
pub async fn upload_day(
    store: &dyn RemoteStore,
    root: &WorkspaceRoot,
    config: &Config,
    day: NaiveDate,
) -> Result<UploadOutcome> {
    let workspace = root.open_day(day);
    let metadata = workspace.read_metadata().await?;

    let edition = metadata
        .as_ref()
        .map(|m| m.edition_code.clone())
        .unwrap_or_else(|| config.archive.edition.clone());
    let identifier = remote_identifier(config, day, &edition);

    if store.exists(&identifier).await? {
        log::info!("Skipping {}: {} already exists", day, identifier);
        return Ok(UploadOutcome::AlreadyPresent);
    }

    let files: Vec<UploadFile> = workspace
        .files()
        .await?
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            Some(UploadFile { name, path })
        })
        .collect();
    if files.is_empty() {
        return Err(AppError::upload(&identifier, "workspace has no files"));
    }

    let title = metadata
        .as_ref()
        .and_then(|m| m.title_hint.clone())
        .unwrap_or_else(|| config.upload.identifier_prefix.clone());
    let issue_id = metadata.as_ref().map(|m| m.identifier.as_str().to_string());
    let page_count = workspace.image_count().await?;
    let record = build_metadata(config, day, &title, issue_id.as_deref(), page_count);

    store.upload(&identifier, &files, &record).await?;
    log::info!("Uploaded {} files for {} as {}", files.len(), day, identifier);
    Ok(UploadOutcome::Uploaded)
}

/// Upload every local day workspace. Failures are isolated per day and
/// reported; nothing is cleaned up on error, the existence check makes
/// the retry safe.
pub async fn run_upload(
    store: &dyn RemoteStore,
    root: &WorkspaceRoot,
    config: &Config,
) -> Result<UploadStats> {
    let mut stats = UploadStats::default();

    for day in root.list_existing().await? {
        let outcome = match upload_day(store, root, config, day).await {
            Ok(outcome) => outcome,
            Err(error) => {
                log::error!("Upload of {} failed: {}", day, error);
                UploadOutcome::Failed
            }
        };
        stats.record(outcome);
    }

    log::info!(
        "Upload finished: {} uploaded, {} already present, {} failed",
        stats.uploaded,
        stats.already_present,
        stats.failed
    );
    Ok(stats)
}
