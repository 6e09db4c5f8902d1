use rand::{seq::SliceRandom, RngCore};
use reqwest::Url;

use crate::types::{Direction, WarmError};

// some webservers return a 503 error when no user agent is set
pub const USER_AGENT: &str = "WFPC Cache Warmer";
pub const MAX_TEST_URLS: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
// timings closer than this are considered unchanged
pub const CHANGE_FLOOR: f64 = 0.01;

/// Checks that the sitemap location is an absolute http(s) URL.
pub fn validate_url(url: &str) -> Result<Url, WarmError> {
    let parsed = Url::parse(url).map_err(|_| WarmError::InvalidInput(url.into()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(parsed),
        _ => Err(WarmError::InvalidInput(url.into())),
    }
}

/// Randomly picks at most `max_count` distinct urls. Lists that are already
/// small enough are returned untouched.
pub fn sample_urls(urls: &[String], max_count: usize, rng: &mut dyn RngCore) -> Vec<String> {
    if urls.len() <= max_count {
        return urls.to_vec();
    }
    let mut shuffled = urls.to_vec();
    shuffled.shuffle(rng);
    shuffled.truncate(max_count);
    shuffled
}

/// Relative difference between a starting and ending time, as a fraction of
/// the starting time. The result carries no sign.
pub fn calc_change(start: f64, end: f64) -> f64 {
    let delta = (end - start).abs();
    if delta < CHANGE_FLOOR {
        return 0.0;
    }
    delta / start
}

pub fn direction_of(start: f64, end: f64) -> Direction {
    if (end - start).abs() < CHANGE_FLOOR {
        Direction::Unchanged
    } else if end < start {
        Direction::Faster
    } else {
        Direction::Slower
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Formats milliseconds as `H:M:S.mmm`. The minutes field holds the total
/// number of minutes, not the minutes left over after the hours.
pub fn format_millis(ms: f64) -> String {
    let ms = ms as u64;
    format!(
        "{}:{}:{}.{:03}",
        ms / 3_600_000,
        ms / 60_000,
        (ms % 60_000) / 1000,
        ms % 1000
    )
}
