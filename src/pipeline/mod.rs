//! Pipeline entry points.
//!
//! - `run_crawl`: walk a date range, one resumable unit of work per day
//! - `run_audit`: offline completeness recount over all day workspaces
//! - `run_upload`: idempotent push of day workspaces to the content store

pub mod audit;
pub mod crawl;
pub mod upload;

pub use audit::{AuditReport, DayAudit, run_audit};
pub use crawl::{crawl_day, run_crawl};
pub use upload::{UploadOutcome, UploadStats, run_upload, upload_day};
