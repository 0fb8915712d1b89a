// src/models/mod.rs

//! Domain models for the archive crawler.

mod config;
mod issue;
mod status;

pub use config::{ArchiveConfig, Config, CrawlerConfig, UploadConfig};
pub use issue::{IdentifierParts, IssueIdentifier, IssueMetadata, PageDescriptor, PageList};
pub use status::{CrawlStats, DayOutcome, WorkspaceState, WorkspaceStatus};
