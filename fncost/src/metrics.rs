//! Per-function usage samples.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::errors::{Error, Result};
use crate::provider::{Datapoint, MetricName, MetricStatistics, Statistic};
use crate::types::{FunctionDescriptor, MetricSample, StatisticsWindow};

/// Fetches the invocation count and average duration of a function over a window.
#[derive(Clone)]
pub struct MetricsFetcher {
    source: Arc<dyn MetricStatistics>,
}

impl MetricsFetcher {
    pub fn new(source: Arc<dyn MetricStatistics>) -> Self {
        Self { source }
    }

    /// Query `Invocations`/`Sum` and `Duration`/`Average` for `descriptor`.
    ///
    /// A function with no datapoints in the window yields [`MetricSample::IDLE`]. Negative or
    /// non-finite values from the provider are rejected as [`Error::MetricsFetch`].
    #[instrument(skip_all, fields(function = %descriptor.name, region = %descriptor.region))]
    pub async fn fetch_metrics(&self, descriptor: &FunctionDescriptor, window: StatisticsWindow) -> Result<MetricSample> {
        let name = descriptor.name.as_str();
        let (invocations, durations) = futures::try_join!(
            self.source.get_statistics(name, MetricName::Invocations, window, Statistic::Sum),
            self.source.get_statistics(name, MetricName::Duration, window, Statistic::Average),
        )?;

        check_datapoints(name, MetricName::Invocations, &invocations)?;
        check_datapoints(name, MetricName::Duration, &durations)?;

        let invocation_total = invocations.iter().fold(0.0, |total, p| total + p.value);
        if invocation_total == 0.0 {
            debug!("No invocations in window");
            return Ok(MetricSample::IDLE);
        }

        let average_duration_ms = weighted_average_duration(&invocations, &durations);

        let sample = MetricSample {
            invocation_count: invocation_total.round() as u64,
            average_duration_ms,
        };
        debug!(invocations = sample.invocation_count, average_duration_ms, "Fetched usage sample");
        Ok(sample)
    }
}

fn check_datapoints(function: &str, metric: MetricName, datapoints: &[Datapoint]) -> Result<()> {
    match datapoints.iter().find(|p| !p.value.is_finite() || p.value < 0.0) {
        Some(bad) => Err(Error::MetricsFetch {
            function: function.to_string(),
            metric: metric.to_string(),
            message: format!("provider returned invalid value {}", bad.value),
        }),
        None => Ok(()),
    }
}

/// Mean duration per invocation across the window.
///
/// Each period's average is weighted by the invocations reported for the same period. Without any
/// matching invocation periods the plain mean of the averages is used.
fn weighted_average_duration(invocations: &[Datapoint], durations: &[Datapoint]) -> f64 {
    let (weighted_sum, weight) = durations.iter().fold((0.0_f64, 0.0_f64), |(weighted_sum, weight), point| {
        let count = invocations
            .iter()
            .filter(|i| i.timestamp == point.timestamp)
            .fold(0.0, |total, i| total + i.value);
        (weighted_sum + point.value * count, weight + count)
    });

    if weight > 0.0 {
        weighted_sum / weight
    } else if durations.is_empty() {
        0.0
    } else {
        durations.iter().fold(0.0, |total, p| total + p.value) / durations.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{StaticMetrics, descriptor};

    async fn fetch(metrics: StaticMetrics, name: &str) -> Result<MetricSample> {
        MetricsFetcher::new(Arc::new(metrics))
            .fetch_metrics(&descriptor(name, 128, "us-east-1"), StatisticsWindow::default())
            .await
    }

    #[tokio::test]
    async fn test_reads_sum_and_average() {
        let sample = fetch(StaticMetrics::new().with_usage("orders", 1500.0, 42.5), "orders").await.unwrap();
        assert_eq!(
            sample,
            MetricSample {
                invocation_count: 1500,
                average_duration_ms: 42.5,
            }
        );
    }

    #[tokio::test]
    async fn test_no_datapoints_is_idle_sample() {
        let sample = fetch(StaticMetrics::new(), "never-called").await.unwrap();
        assert_eq!(sample, MetricSample::IDLE);
    }

    #[tokio::test]
    async fn test_combines_multiple_datapoints() {
        let metrics = StaticMetrics::new()
            .with_datapoints("batch", MetricName::Invocations, vec![100.0, 300.0])
            .with_datapoints("batch", MetricName::Duration, vec![10.0, 30.0]);

        let sample = fetch(metrics, "batch").await.unwrap();
        assert_eq!(sample.invocation_count, 400);
        assert_eq!(sample.average_duration_ms, 25.0);
    }

    #[tokio::test]
    async fn test_average_duration_weighted_by_period_invocations() {
        let metrics = StaticMetrics::new()
            .with_datapoints("bursty", MetricName::Invocations, vec![1000.0, 1.0])
            .with_datapoints("bursty", MetricName::Duration, vec![10.0, 1000.0]);

        let sample = fetch(metrics, "bursty").await.unwrap();
        assert_eq!(sample.invocation_count, 1001);
        assert!((sample.average_duration_ms - 11_000.0 / 1001.0).abs() < 1e-9, "average was {}", sample.average_duration_ms);
    }

    #[test]
    fn test_unmatched_periods_fall_back_to_plain_mean() {
        let at = |hour: i64, value: f64| Datapoint {
            timestamp: chrono::DateTime::from_timestamp(hour * 3600, 0),
            value,
        };

        let average = weighted_average_duration(&[at(0, 5.0)], &[at(1, 10.0), at(2, 30.0)]);
        assert_eq!(average, 20.0);
        assert_eq!(weighted_average_duration(&[at(0, 5.0)], &[]), 0.0);
    }

    #[tokio::test]
    async fn test_rejects_invalid_provider_values() {
        let negative = StaticMetrics::new().with_datapoints("f", MetricName::Invocations, vec![-5.0]);
        assert!(matches!(fetch(negative, "f").await, Err(Error::MetricsFetch { .. })));

        let nan = StaticMetrics::new()
            .with_datapoints("f", MetricName::Invocations, vec![10.0])
            .with_datapoints("f", MetricName::Duration, vec![f64::NAN]);
        assert!(matches!(fetch(nan, "f").await, Err(Error::MetricsFetch { .. })));
    }

    #[tokio::test]
    async fn test_transport_failure_is_metrics_error() {
        let metrics = StaticMetrics::new().with_usage("flaky", 10.0, 5.0).failing_for("flaky");
        match fetch(metrics, "flaky").await {
            Err(Error::MetricsFetch { function, .. }) => assert_eq!(function, "flaky"),
            other => panic!("Expected metrics error, got {other:?}"),
        }
    }
}
