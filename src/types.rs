use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WarmError {
    #[error("invalid_input: {0} is not a valid URL")]
    InvalidInput(String),
    #[error("download: unable to download {url}: {reason}")]
    Download { url: String, reason: String },
    #[error("parse: failed to parse the sitemap file: {0}")]
    Parse(String),
    #[error("division_by_zero: no URLs were timed")]
    DivisionByZero,
    #[error("not_loaded: the sitemap must be loaded before testing or warming")]
    NotLoaded,
    #[error("report: {0}")]
    Report(#[from] std::io::Error),
    #[error("transport: {0}")]
    Transport(String),
    #[error("early_termination")]
    EarlyTermination,
}

/// Error returned by a [`crate::fetcher::Fetcher`] for a single request.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct FetchError(pub String);

impl FetchError {
    pub fn into_download(self, url: &str) -> WarmError {
        WarmError::Download {
            url: url.into(),
            reason: self.0,
        }
    }
}

/// Aggregate timings of one pass over a list of URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchStats {
    pub total_duration_secs: f64,
    pub average_duration_millis: f64,
    pub url_count: usize,
    pub failed_count: usize,
}

impl FetchStats {
    /// Builds the stats from the durations of the fetches that succeeded.
    pub fn from_durations(durations: &[Duration], failed_count: usize) -> Result<Self, WarmError> {
        if durations.is_empty() {
            return Err(WarmError::DivisionByZero);
        }
        let total_duration_secs: f64 = durations.iter().map(Duration::as_secs_f64).sum();
        let url_count = durations.len();

        Ok(FetchStats {
            total_duration_secs,
            average_duration_millis: total_duration_secs * 1000.0 / url_count as f64,
            url_count,
            failed_count,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Faster,
    Slower,
    Unchanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmReport {
    pub sitemap_url: String,
    pub url_count: usize,
    pub before: FetchStats,
    pub warm: FetchStats,
    pub after: FetchStats,
    pub percent_change: f64,
    pub direction: Direction,
    pub finished_at: DateTime<Utc>,
}
