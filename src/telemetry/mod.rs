//! Telemetry Aggregation
//!
//! Fetches raw time-series samples from the IoT data API and folds them
//! into chart-ready series: samples are bucketed by a label derived
//! from the truncated timestamp, deduplicated by label, and averaged.
//! The poller in [`poller`] keeps the series fresh in the background.

mod poller;

pub use poller::{PollStatus, PollerConfig, SeriesPoller, VariablePoll};

use async_trait::async_trait;
use chrono::{Datelike, TimeZone, Timelike, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::TelemetryConfig;
use crate::gateway::{map_transport_error, GatewayError};

/// A single raw measurement from the IoT API
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct TimeSeriesSample {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub value: f64,
}

/// Time range for series queries
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
    pub label: String,
}

impl TimeRange {
    /// Create a time range for the last N days
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now().timestamp_millis();
        let start = end - (days * 24 * 60 * 60 * 1000);
        Self {
            start,
            end,
            label: if days == 1 {
                "Today".to_string()
            } else {
                format!("Last {} days", days)
            },
        }
    }

    /// Create a time range for the last N hours
    pub fn last_hours(hours: i64) -> Self {
        let end = Utc::now().timestamp_millis();
        let start = end - (hours * 60 * 60 * 1000);
        Self {
            start,
            end,
            label: format!("Last {} hours", hours),
        }
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }

    /// Duration in days
    pub fn duration_days(&self) -> i64 {
        self.duration_ms() / (24 * 60 * 60 * 1000)
    }
}

/// Bucket width for chart aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketInterval {
    Hour,
    Day,
    /// Starts on Monday
    Week,
    Month,
}

impl BucketInterval {
    /// Truncate a millisecond timestamp to the start of this interval
    pub fn truncate(&self, timestamp: i64) -> i64 {
        let dt = match Utc.timestamp_millis_opt(timestamp) {
            chrono::LocalResult::Single(dt) => dt,
            _ => return timestamp,
        };

        let truncated = match self {
            Self::Hour => dt
                .with_minute(0)
                .and_then(|d| d.with_second(0))
                .and_then(|d| d.with_nanosecond(0))
                .unwrap_or(dt),
            Self::Day => dt
                .with_hour(0)
                .and_then(|d| d.with_minute(0))
                .and_then(|d| d.with_second(0))
                .and_then(|d| d.with_nanosecond(0))
                .unwrap_or(dt),
            Self::Week => {
                let days_since_monday = dt.weekday().num_days_from_monday() as i64;
                let monday = dt - chrono::Duration::days(days_since_monday);
                monday
                    .with_hour(0)
                    .and_then(|d| d.with_minute(0))
                    .and_then(|d| d.with_second(0))
                    .and_then(|d| d.with_nanosecond(0))
                    .unwrap_or(monday)
            }
            Self::Month => dt
                .with_day(1)
                .and_then(|d| d.with_hour(0))
                .and_then(|d| d.with_minute(0))
                .and_then(|d| d.with_second(0))
                .and_then(|d| d.with_nanosecond(0))
                .unwrap_or(dt),
        };

        truncated.timestamp_millis()
    }

    /// Chart axis label for a bucket start
    pub fn label(&self, bucket_start: i64) -> String {
        let dt = match Utc.timestamp_millis_opt(bucket_start) {
            chrono::LocalResult::Single(dt) => dt,
            _ => return bucket_start.to_string(),
        };

        match self {
            Self::Hour => dt.format("%H:%M").to_string(),
            Self::Day => dt.format("%d %b").to_string(),
            Self::Week => format!("Wk {}", dt.format("%d %b")),
            Self::Month => dt.format("%b %Y").to_string(),
        }
    }

    /// Pick a bucket width appropriate for a query range
    pub fn for_range(range: &TimeRange) -> Self {
        let days = range.duration_days();
        if days > 90 {
            Self::Week
        } else if days > 7 {
            Self::Day
        } else if days > 1 {
            Self::Day
        } else {
            Self::Hour
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hour" | "h" => Some(Self::Hour),
            "day" | "d" => Some(Self::Day),
            "week" | "w" => Some(Self::Week),
            "month" | "m" => Some(Self::Month),
            _ => None,
        }
    }
}

impl std::fmt::Display for BucketInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hour => write!(f, "hour"),
            Self::Day => write!(f, "day"),
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
        }
    }
}

/// Arithmetic mean, `None` on empty input
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// One aggregated point on a chart
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesBucket {
    pub label: String,
    /// Bucket start, Unix milliseconds
    pub timestamp: i64,
    pub mean: f64,
    /// Samples folded into this bucket
    pub count: usize,
}

/// Chart-ready projection of a sample buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSeries {
    pub buckets: Vec<SeriesBucket>,
}

impl ChartSeries {
    /// Bucket, deduplicate, and average raw samples
    ///
    /// Samples sharing a truncated timestamp are averaged together.
    /// When two buckets map to the same axis label, the first (oldest)
    /// wins and later ones are dropped. An empty input yields an empty
    /// series.
    pub fn build(samples: &[TimeSeriesSample], interval: BucketInterval) -> Self {
        let mut groups: HashMap<i64, Vec<f64>> = HashMap::new();
        for sample in samples {
            let bucket = interval.truncate(sample.timestamp);
            groups.entry(bucket).or_default().push(sample.value);
        }

        let mut starts: Vec<i64> = groups.keys().copied().collect();
        starts.sort_unstable();

        let mut seen = std::collections::HashSet::new();
        let mut buckets = Vec::with_capacity(starts.len());

        for start in starts {
            let label = interval.label(start);
            if !seen.insert(label.clone()) {
                tracing::debug!(%label, "Dropping duplicate-labeled bucket");
                continue;
            }

            // groups never holds an empty vec, but the guard keeps NaN
            // out of the chart regardless
            let values = &groups[&start];
            if let Some(mean) = mean(values) {
                buckets.push(SeriesBucket {
                    label,
                    timestamp: start,
                    mean,
                    count: values.len(),
                });
            }
        }

        Self { buckets }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Axis labels in display order
    pub fn labels(&self) -> Vec<&str> {
        self.buckets.iter().map(|b| b.label.as_str()).collect()
    }

    /// Averaged values in display order
    pub fn values(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.mean).collect()
    }

    /// Mean across all buckets, `None` for an empty series
    pub fn overall_mean(&self) -> Option<f64> {
        mean(&self.values())
    }
}

/// Source of raw time-series samples
///
/// `TelemetryClient` is the HTTP implementation against the IoT API;
/// tests substitute an in-memory fake.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    async fn fetch_series(
        &self,
        variable_id: &str,
        range: &TimeRange,
        limit: usize,
    ) -> Result<Vec<TimeSeriesSample>, GatewayError>;
}

/// Response envelope of the IoT values endpoint
#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    results: Vec<TimeSeriesSample>,
}

/// HTTP client for the IoT data API
///
/// Separate from the CRM gateway: different host, and the device-data
/// token travels in an `X-Auth-Token` header rather than a bearer
/// credential.
pub struct TelemetryClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelemetryClient {
    pub fn new(config: &TelemetryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }
}

#[async_trait]
impl SeriesSource for TelemetryClient {
    async fn fetch_series(
        &self,
        variable_id: &str,
        range: &TimeRange,
        limit: usize,
    ) -> Result<Vec<TimeSeriesSample>, GatewayError> {
        let url = format!(
            "{}/variables/{}/values",
            self.base_url,
            urlencoding::encode(variable_id)
        );

        let response = self
            .client
            .get(&url)
            .header("X-Auth-Token", &self.token)
            .query(&[
                ("start", range.start.to_string()),
                ("end", range.end.to_string()),
                ("page_size", limit.to_string()),
            ])
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(match status {
                reqwest::StatusCode::NOT_FOUND => GatewayError::NotFound(message),
                _ => GatewayError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let body: ValuesResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        Ok(body.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 3600 * 1000;

    fn sample(timestamp: i64, value: f64) -> TimeSeriesSample {
        TimeSeriesSample { timestamp, value }
    }

    #[test]
    fn test_mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0, 5.0]), Some(3.0));
    }

    #[test]
    fn test_truncate_hour() {
        // 2024-01-15 14:35:42.123 UTC -> 2024-01-15 14:00:00.000 UTC
        assert_eq!(
            BucketInterval::Hour.truncate(1705329342123),
            1705327200000
        );
    }

    #[test]
    fn test_truncate_day() {
        // 2024-01-15 14:35:42.123 UTC -> 2024-01-15 00:00:00.000 UTC
        assert_eq!(BucketInterval::Day.truncate(1705329342123), 1705276800000);
    }

    #[test]
    fn test_truncate_week_lands_on_monday() {
        // 2024-01-17 (Wednesday) -> 2024-01-15 (Monday) 00:00 UTC
        assert_eq!(
            BucketInterval::Week.truncate(1705502142123),
            1705276800000
        );
    }

    #[test]
    fn test_truncate_month() {
        // 2024-01-15 -> 2024-01-01 00:00 UTC
        assert_eq!(
            BucketInterval::Month.truncate(1705329342123),
            1704067200000
        );
    }

    #[test]
    fn test_build_empty_series() {
        let series = ChartSeries::build(&[], BucketInterval::Day);
        assert!(series.is_empty());
        assert_eq!(series.overall_mean(), None);
    }

    #[test]
    fn test_build_averages_per_bucket() {
        // 2024-01-15 14:xx: 5, 6, 7 -> 6.0; 15:xx: 8, 9 -> 8.5
        let base = 1705327200000; // 14:00 UTC
        let samples = vec![
            sample(base + 60_000, 5.0),
            sample(base + 120_000, 6.0),
            sample(base + 180_000, 7.0),
            sample(base + HOUR_MS + 60_000, 8.0),
            sample(base + HOUR_MS + 120_000, 9.0),
        ];

        let series = ChartSeries::build(&samples, BucketInterval::Hour);

        assert_eq!(series.len(), 2);
        assert_eq!(series.buckets[0].mean, 6.0);
        assert_eq!(series.buckets[0].count, 3);
        assert_eq!(series.buckets[1].mean, 8.5);
        assert_eq!(series.labels(), vec!["14:00", "15:00"]);
    }

    #[test]
    fn test_build_orders_by_time() {
        let base = 1705276800000; // 2024-01-15 00:00 UTC
        let day = 24 * HOUR_MS;
        // Out-of-order input
        let samples = vec![
            sample(base + 2 * day, 3.0),
            sample(base, 1.0),
            sample(base + day, 2.0),
        ];

        let series = ChartSeries::build(&samples, BucketInterval::Day);
        assert_eq!(series.values(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_build_dedupes_by_label() {
        // Hour labels repeat across days; the oldest bucket keeps the label
        let day1_14h = 1705327200000; // 2024-01-15 14:00 UTC
        let day2_14h = day1_14h + 24 * HOUR_MS;
        let samples = vec![sample(day1_14h, 10.0), sample(day2_14h, 20.0)];

        let series = ChartSeries::build(&samples, BucketInterval::Hour);

        assert_eq!(series.len(), 1);
        assert_eq!(series.buckets[0].mean, 10.0);
        assert_eq!(series.buckets[0].label, "14:00");
    }

    #[test]
    fn test_interval_for_range() {
        assert_eq!(
            BucketInterval::for_range(&TimeRange::last_days(365)),
            BucketInterval::Week
        );
        assert_eq!(
            BucketInterval::for_range(&TimeRange::last_days(30)),
            BucketInterval::Day
        );
        assert_eq!(
            BucketInterval::for_range(&TimeRange::last_hours(12)),
            BucketInterval::Hour
        );
    }

    #[test]
    fn test_interval_parse() {
        assert_eq!(BucketInterval::parse("day"), Some(BucketInterval::Day));
        assert_eq!(BucketInterval::parse("W"), Some(BucketInterval::Week));
        assert_eq!(BucketInterval::parse("fortnight"), None);
    }

    #[test]
    fn test_time_range_last_days() {
        let range = TimeRange::last_days(30);
        assert_eq!(range.duration_days(), 30);
        assert_eq!(range.label, "Last 30 days");
    }

    #[test]
    fn test_values_response_missing_results() {
        let body: ValuesResponse = serde_json::from_str("{}").unwrap();
        assert!(body.results.is_empty());
    }
}
