//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! To change the default workflow service, only edit this file.

/// Default workflow service URL
///
/// This is the fallback URL when no environment variable is set.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default request timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Fixed reviewer identity sent with human review actions
pub const DEFAULT_REVIEWER_ID: &str = "admin";

/// Number of records requested per history load
pub const HISTORY_LIMIT: u32 = 100;

/// Default history window (days)
pub const DEFAULT_HISTORY_DAYS: u32 = 7;

/// Day windows offered by the history filter
pub const HISTORY_DAY_OPTIONS: [u32; 4] = [1, 7, 14, 30];

/// Signal weight bounds (inclusive)
pub const WEIGHT_MIN: f64 = 0.0;
pub const WEIGHT_MAX: f64 = 100.0;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Payout Risk Console";

/// Trim a configured base URL and drop one trailing slash; blank means default.
pub fn normalize_base_url(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(url) if !url.is_empty() => url.strip_suffix('/').unwrap_or(url).to_string(),
        _ => DEFAULT_API_BASE_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url(None), DEFAULT_API_BASE_URL);
        assert_eq!(normalize_base_url(Some("   ")), DEFAULT_API_BASE_URL);
        assert_eq!(normalize_base_url(Some(" http://risk:9000/ ")), "http://risk:9000");
        assert_eq!(normalize_base_url(Some("http://risk:9000")), "http://risk:9000");
    }
}
