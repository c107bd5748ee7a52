//! In-memory providers for exercising the pipeline without AWS.

use async_trait::async_trait;
use chrono::DateTime;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::{Error, Result};
use crate::provider::{Datapoint, FunctionLister, FunctionPage, MetricName, MetricStatistics, RegionSource, Statistic};
use crate::types::{FunctionDescriptor, StatisticsWindow};

pub fn descriptor(name: &str, memory_size_mb: u32, region: &str) -> FunctionDescriptor {
    FunctionDescriptor {
        name: name.to_string(),
        memory_size_mb,
        region: region.to_string(),
    }
}

/// Serves a fixed list of pages. Page `i` is requested with the token `page-{i}`.
#[derive(Debug, Default)]
pub struct StaticLister {
    pages: Vec<Vec<FunctionDescriptor>>,
    fail_on_page: Option<usize>,
    calls: AtomicUsize,
}

impl StaticLister {
    pub fn new(pages: Vec<Vec<FunctionDescriptor>>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn single_page(items: Vec<FunctionDescriptor>) -> Self {
        Self::new(vec![items])
    }

    /// Fails when page `page` (0-based) is requested
    pub fn failing_on_page(mut self, page: usize) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FunctionLister for StaticLister {
    async fn list_page(&self, next_token: Option<String>) -> Result<FunctionPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let index = match next_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|i| i.parse::<usize>().ok())
                .ok_or_else(|| Error::Enumeration {
                    region: "test".to_string(),
                    message: format!("unknown marker {token}"),
                })?,
        };

        if self.fail_on_page == Some(index) {
            return Err(Error::Enumeration {
                region: "test".to_string(),
                message: "AccessDeniedException: not authorized to perform lambda:ListFunctions".to_string(),
            });
        }

        let items = self.pages.get(index).cloned().unwrap_or_default();
        let next_token = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));
        Ok(FunctionPage { items, next_token })
    }
}

/// Returns canned datapoints per function, the `i`th value stamped `i` hours after the epoch.
/// Functions without an entry have no data.
#[derive(Debug, Default)]
pub struct StaticMetrics {
    datapoints: HashMap<(String, MetricName), Vec<f64>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl StaticMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `Invocations`/`Sum` and one `Duration`/`Average` datapoint for `function`
    pub fn with_usage(self, function: &str, invocations: f64, average_duration_ms: f64) -> Self {
        self.with_datapoints(function, MetricName::Invocations, vec![invocations])
            .with_datapoints(function, MetricName::Duration, vec![average_duration_ms])
    }

    pub fn with_datapoints(mut self, function: &str, metric: MetricName, values: Vec<f64>) -> Self {
        self.datapoints.insert((function.to_string(), metric), values);
        self
    }

    pub fn failing_for(mut self, function: &str) -> Self {
        self.failing.insert(function.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricStatistics for StaticMetrics {
    async fn get_statistics(
        &self,
        function_name: &str,
        metric: MetricName,
        _window: StatisticsWindow,
        _statistic: Statistic,
    ) -> Result<Vec<Datapoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(function_name) {
            return Err(Error::MetricsFetch {
                function: function_name.to_string(),
                metric: metric.to_string(),
                message: "ThrottlingException: Rate exceeded".to_string(),
            });
        }

        // Yield so concurrent fetches actually interleave
        tokio::task::yield_now().await;

        Ok(self
            .datapoints
            .get(&(function_name.to_string(), metric))
            .map(|values| {
                // One period per value, an hour apart
                values
                    .iter()
                    .enumerate()
                    .map(|(period, &value)| Datapoint {
                        timestamp: DateTime::from_timestamp(period as i64 * 3600, 0),
                        value,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn region_source(region: &str, lister: StaticLister, metrics: StaticMetrics) -> RegionSource {
    RegionSource::new(region, Arc::new(lister), Arc::new(metrics))
}
