//! USD/KRW FX rate feed (spec.md §6, "FX rate file").
//!
//! Reads `/tmp/usdkrw_rate.json`, written by an external FX poller process.
//! Records older than 30s are rejected in favor of an HTTP fallback source;
//! a cached rate stays usable for up to 300s beyond that before the premium
//! calculator sees it as invalid.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::model::FxRate;

const MAX_FILE_AGE_SECS: f64 = 30.0;
const CACHE_USABLE_SECS: f64 = 300.0;

#[derive(Debug, Deserialize)]
struct RawFxRecord {
    rate: f64,
    #[allow(dead_code)]
    source: String,
    #[allow(dead_code)]
    timestamp: String,
    timestamp_unix: f64,
}

pub struct FxFeed {
    file_path: PathBuf,
    http_fallback_url: String,
    http: reqwest::Client,
    cached: Mutex<Option<FxRate>>,
}

impl FxFeed {
    pub fn new(file_path: impl Into<PathBuf>, http_fallback_url: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            http_fallback_url: http_fallback_url.into(),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    pub fn default_path() -> &'static str {
        "/tmp/usdkrw_rate.json"
    }

    /// Reads and validates the on-disk FX snapshot. Named to match the
    /// external poller's own data source label.
    pub fn fetch_from_investing(&self) -> CoreResult<FxRate> {
        read_fx_file(&self.file_path)
    }

    async fn fetch_http_fallback(&self) -> CoreResult<FxRate> {
        let resp = self
            .http
            .get(&self.http_fallback_url)
            .send()
            .await
            .map_err(CoreError::from)?;
        let record: RawFxRecord = resp.json().await.map_err(CoreError::from)?;
        validate_freshness(record)
    }

    /// Resolves the best available rate: fresh file, then HTTP fallback,
    /// then the last cached value if it's still within the usable window.
    pub async fn get_rate(&self) -> FxRate {
        if let Ok(rate) = self.fetch_from_investing() {
            *self.cached.lock().unwrap() = Some(rate);
            return rate;
        }

        if let Ok(rate) = self.fetch_http_fallback().await {
            *self.cached.lock().unwrap() = Some(rate);
            return rate;
        }

        let cached = self.cached.lock().unwrap();
        match *cached {
            Some(rate) if now_unix() - rate.timestamp_unix <= CACHE_USABLE_SECS => FxRate {
                is_fresh: false,
                ..rate
            },
            _ => FxRate {
                rate: 0.0,
                timestamp_unix: 0.0,
                is_fresh: false,
            },
        }
    }
}

fn read_fx_file(path: &Path) -> CoreResult<FxRate> {
    let text = std::fs::read_to_string(path).map_err(|e| CoreError::api_error(e.to_string()))?;
    let record: RawFxRecord = serde_json::from_str(&text).map_err(|e| CoreError::parse_error(e.to_string()))?;
    validate_freshness(record)
}

fn validate_freshness(record: RawFxRecord) -> CoreResult<FxRate> {
    let age = now_unix() - record.timestamp_unix;
    if age > MAX_FILE_AGE_SECS {
        return Err(CoreError::api_error("FX rate data is too old"));
    }
    Ok(FxRate {
        rate: record.rate,
        timestamp_unix: record.timestamp_unix,
        is_fresh: true,
    })
}

fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fx_file(age_secs: f64) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let ts = now_unix() - age_secs;
        write!(
            file,
            r#"{{"rate": 1475.5, "source": "test", "timestamp": "2024-01-01T00:00:00Z", "timestamp_unix": {ts}}}"#
        )
        .unwrap();
        file
    }

    #[test]
    fn fresh_file_is_accepted() {
        let file = write_fx_file(5.0);
        let feed = FxFeed::new(file.path(), "http://unused.invalid");
        let rate = feed.fetch_from_investing().unwrap();
        assert!(rate.is_fresh);
        assert_eq!(rate.rate, 1475.5);
    }

    #[test]
    fn stale_file_is_an_api_error() {
        let file = write_fx_file(60.0);
        let feed = FxFeed::new(file.path(), "http://unused.invalid");
        let err = feed.fetch_from_investing().unwrap_err();
        assert!(err.to_string().contains("too old"));
    }

    #[test]
    fn missing_file_is_an_error_not_a_panic() {
        let feed = FxFeed::new("/nonexistent/path/usdkrw_rate.json", "http://unused.invalid");
        assert!(feed.fetch_from_investing().is_err());
    }
}
