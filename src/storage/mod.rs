//! Persisted per-day state.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml                     # Crawler configuration
//! ├── retry.log                       # Append-only retry ledger
//! └── 1990-01-02/                     # One workspace per day
//!     ├── status.json                 # Explicit workspace status
//!     ├── issue_metadata.json         # Issue-level metadata
//!     ├── {issue_id}_pages.json       # Page-list snapshot (verbatim)
//!     ├── {page_id}.jpg               # Per-page image
//!     └── {page_id}_pagedata.json     # Per-page metadata blob
//! ```

pub mod ledger;
pub mod workspace;

pub use ledger::RetryLedger;
pub use workspace::{BeginDay, DayWorkspace, WorkspaceRoot};
