//! Utility functions and helpers.

pub mod http;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;

use crate::error::{AppError, Result};

/// Cooperative cancellation flag, checked between days and between
/// pages (never mid-asset-write, so files are never left truncated).
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Parse an ISO `YYYY-MM-DD` day.
pub fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| AppError::config(format!("invalid date '{}': {}", s, e)))
}

/// All days from `start` to `end`, inclusive, in increasing order.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        days.push(day);
        day = day.succ_opt().expect("date overflow");
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_is_inclusive() {
        let start = parse_day("1990-01-01").unwrap();
        let end = parse_day("1990-01-03").unwrap();
        let days = date_range(start, end);
        assert_eq!(days.len(), 3);
        assert_eq!(days[0], start);
        assert_eq!(days[2], end);
    }

    #[test]
    fn date_range_single_day() {
        let day = parse_day("1990-01-02").unwrap();
        assert_eq!(date_range(day, day), vec![day]);
    }

    #[test]
    fn date_range_empty_when_reversed() {
        let start = parse_day("1990-01-03").unwrap();
        let end = parse_day("1990-01-01").unwrap();
        assert!(date_range(start, end).is_empty());
    }

    #[test]
    fn parse_day_rejects_garbage() {
        assert!(parse_day("02/01/1990").is_err());
    }

    #[test]
    fn cancel_flag_is_shared_across_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
