//! Series Poller
//!
//! Keeps chart series fresh by re-fetching every registered variable on
//! a fixed interval. Results live behind a lock for readers; a failed
//! poll records the error but keeps the previous series visible. Ticks
//! run the variables sequentially, so one slow poll cannot land behind
//! a newer one.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{BucketInterval, ChartSeries, SeriesSource, TimeRange};
use crate::config::TelemetryConfig;

/// Poller tuning
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Seconds between refresh ticks
    pub interval_secs: u64,
    /// How far back each fetch reaches
    pub window_days: i64,
    /// Maximum samples requested per variable
    pub sample_limit: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            window_days: 7,
            sample_limit: 500,
        }
    }
}

impl From<&TelemetryConfig> for PollerConfig {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            interval_secs: config.poll_interval_secs,
            window_days: 7,
            sample_limit: config.sample_limit,
        }
    }
}

/// Fetch lifecycle of one variable
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    /// Registered, never fetched
    Idle,
    /// Fetch in flight
    Loading,
    Success {
        samples: usize,
    },
    Failed {
        error: String,
    },
}

/// Poll state and derived series for one variable
#[derive(Debug, Clone)]
pub struct VariablePoll {
    pub status: PollStatus,
    pub series: ChartSeries,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl VariablePoll {
    fn idle() -> Self {
        Self {
            status: PollStatus::Idle,
            series: ChartSeries::default(),
            last_refresh: None,
        }
    }
}

/// Background refresher for registered variables
pub struct SeriesPoller {
    source: Arc<dyn SeriesSource>,
    config: PollerConfig,
    variables: RwLock<HashMap<String, VariablePoll>>,
    running: RwLock<bool>,
}

impl SeriesPoller {
    pub fn new(source: Arc<dyn SeriesSource>, config: PollerConfig) -> Self {
        Self {
            source,
            config,
            variables: RwLock::new(HashMap::new()),
            running: RwLock::new(false),
        }
    }

    /// Register a variable for periodic refresh
    pub async fn register(&self, variable_id: impl Into<String>) {
        self.variables
            .write()
            .await
            .entry(variable_id.into())
            .or_insert_with(VariablePoll::idle);
    }

    /// Current poll state for a variable
    pub async fn get(&self, variable_id: &str) -> Option<VariablePoll> {
        self.variables.read().await.get(variable_id).cloned()
    }

    /// Chart series for a variable, if one has been fetched
    pub async fn series(&self, variable_id: &str) -> Option<ChartSeries> {
        self.variables
            .read()
            .await
            .get(variable_id)
            .map(|v| v.series.clone())
    }

    /// Fetch one variable now and fold the result into its series
    pub async fn poll(&self, variable_id: &str) {
        {
            let mut variables = self.variables.write().await;
            let entry = variables
                .entry(variable_id.to_string())
                .or_insert_with(VariablePoll::idle);
            entry.status = PollStatus::Loading;
        }

        let range = TimeRange::last_days(self.config.window_days);
        let interval = BucketInterval::for_range(&range);

        let result = self
            .source
            .fetch_series(variable_id, &range, self.config.sample_limit)
            .await;

        let mut variables = self.variables.write().await;
        let entry = variables
            .entry(variable_id.to_string())
            .or_insert_with(VariablePoll::idle);

        match result {
            Ok(samples) => {
                // No samples is a valid answer: an empty chart, not an error
                entry.series = ChartSeries::build(&samples, interval);
                entry.status = PollStatus::Success {
                    samples: samples.len(),
                };
                entry.last_refresh = Some(Utc::now());
            }
            Err(e) => {
                tracing::warn!(variable_id, error = %e, "Series poll failed");
                // Previous series stays visible
                entry.status = PollStatus::Failed {
                    error: e.to_string(),
                };
            }
        }
    }

    /// Fetch every registered variable once
    pub async fn refresh_all(&self) {
        let ids: Vec<String> = self.variables.read().await.keys().cloned().collect();

        for id in ids {
            self.poll(&id).await;
        }
    }

    /// Start the background refresh task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let poller = self.clone();

        tokio::spawn(async move {
            *poller.running.write().await = true;

            // interval() panics on a zero period
            let secs = poller.config.interval_secs.max(1);
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(secs));

            loop {
                interval.tick().await;

                if !*poller.running.read().await {
                    break;
                }

                poller.refresh_all().await;
            }
        })
    }

    /// Stop the background task at its next tick
    pub async fn stop(&self) {
        *self.running.write().await = false;
    }
}
