//! Narrow interfaces to the cloud provider's listing and metrics APIs.
//!
//! The pipeline only talks to the provider through [`FunctionLister`] and [`MetricStatistics`].
//! Implementations validate provider responses on ingress and hand back typed records, so nothing
//! past this module sees SDK types. See [`aws`] for the Lambda/CloudWatch implementations.

pub mod aws;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::errors::Result;
use crate::types::{FunctionDescriptor, StatisticsWindow};

/// One page of a function listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionPage {
    pub items: Vec<FunctionDescriptor>,
    /// Continuation token; `None` on the last page
    pub next_token: Option<String>,
}

/// Metrics queried for every function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    Invocations,
    Duration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Invocations => "Invocations",
            MetricName::Duration => "Duration",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    Sum,
    Average,
}

/// A single statistic value reported for one period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datapoint {
    pub timestamp: Option<DateTime<Utc>>,
    pub value: f64,
}

/// Paginated listing of the functions deployed in one region.
#[async_trait]
pub trait FunctionLister: Send + Sync {
    /// Fetch the page identified by `next_token`, or the first page when `None`.
    ///
    /// Fails with [`crate::errors::Error::Enumeration`].
    async fn list_page(&self, next_token: Option<String>) -> Result<FunctionPage>;
}

/// Time-series statistics for functions in one region.
#[async_trait]
pub trait MetricStatistics: Send + Sync {
    /// Datapoints for `metric` of `function_name` over `window`. An empty vector means the metric
    /// has no data in the window.
    ///
    /// Fails with [`crate::errors::Error::MetricsFetch`].
    async fn get_statistics(
        &self,
        function_name: &str,
        metric: MetricName,
        window: StatisticsWindow,
        statistic: Statistic,
    ) -> Result<Vec<Datapoint>>;
}

/// Listing and metrics clients bound to the same region.
#[derive(Clone)]
pub struct RegionSource {
    pub region: String,
    pub lister: Arc<dyn FunctionLister>,
    pub metrics: Arc<dyn MetricStatistics>,
}

impl RegionSource {
    pub fn new(region: impl Into<String>, lister: Arc<dyn FunctionLister>, metrics: Arc<dyn MetricStatistics>) -> Self {
        Self {
            region: region.into(),
            lister,
            metrics,
        }
    }
}

impl fmt::Debug for RegionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionSource").field("region", &self.region).finish_non_exhaustive()
    }
}
