//! Issue-level domain types.
//!
//! The archive addresses issues by opaque identifiers discovered through
//! neighbor lookups; the pipeline never computes one.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque issue identifier as returned by the archive.
///
/// Looks like `1319_02_1989_0242_0001`, but nothing in the pipeline
/// depends on that structure; `parts()` exists only for log display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueIdentifier(pub String);

/// Display-only decomposition of an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierParts {
    pub edition: String,
    pub year: String,
    pub sequence: String,
}

impl IssueIdentifier {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Best-effort decomposition for display; never relied on elsewhere.
    pub fn parts(&self) -> Option<IdentifierParts> {
        let re = Regex::new(r"^\d+_(\d+)_(\d{4})_(\d+)_\d+$").ok()?;
        let caps = re.captures(&self.0)?;
        Some(IdentifierParts {
            edition: caps[1].to_string(),
            year: caps[2].to_string(),
            sequence: caps[3].to_string(),
        })
    }

    /// Human-oriented label for logs and audit rows: the raw identifier,
    /// annotated with edition/year/issue when the shape is recognized.
    pub fn describe(&self) -> String {
        match self.parts() {
            Some(parts) => format!(
                "{} (edition {}, year {}, issue {})",
                self.0, parts.edition, parts.year, parts.sequence
            ),
            None => self.0.clone(),
        }
    }
}

impl fmt::Display for IssueIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issue-level metadata as persisted in each day workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueMetadata {
    pub identifier: IssueIdentifier,

    /// Canonical date string as reported by the archive, e.g.
    /// `1989-09-13 00:00:00`. Compared by substring against the
    /// requested day.
    pub canonical_date: String,

    /// Edition/headboard code
    pub edition_code: String,

    /// Sequential issue number within the year, when reported
    #[serde(default)]
    pub issue_number: Option<String>,

    /// Publication title, when reported
    #[serde(default)]
    pub title_hint: Option<String>,

    /// True when the upstream body was unusable and this record was
    /// fabricated from the request alone
    #[serde(default)]
    pub synthesized: bool,
}

impl IssueMetadata {
    /// Fallback metadata for an unusable upstream body. Carries only
    /// what the request already knew, flagged so later phases can see
    /// the degradation.
    pub fn synthesized(identifier: IssueIdentifier, day: NaiveDate, edition: &str) -> Self {
        Self {
            identifier,
            canonical_date: day.format("%Y-%m-%d").to_string(),
            edition_code: edition.to_string(),
            issue_number: None,
            title_hint: None,
            synthesized: true,
        }
    }

    /// Whether this metadata belongs to the requested day.
    ///
    /// A miss means the neighbor lookup walked past a publication gap
    /// and resolved a different day; the requested day is absent.
    pub fn matches_day(&self, day: NaiveDate) -> bool {
        self.canonical_date
            .contains(&day.format("%Y-%m-%d").to_string())
    }
}

/// One page of an issue, in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescriptor {
    pub page_id: String,
    pub position: usize,
}

/// Result of listing an issue's pages: the raw response body (persisted
/// verbatim as the workspace snapshot) plus the parsed descriptors.
#[derive(Debug, Clone)]
pub struct PageList {
    pub raw_body: String,
    pub pages: Vec<PageDescriptor>,
}
