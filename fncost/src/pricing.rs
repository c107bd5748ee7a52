//! Lambda cost projection.
//!
//! Usage observed over a [`StatisticsWindow`] is scaled linearly to a month, the monthly free tier
//! is subtracted, and the remainder is billed per request and per GB-second:
//!
//! ```text
//! monthly_invocations = invocations * days_in_month / window_days
//! billed_ms           = ceil(avg_duration_ms / granularity) * granularity
//! gb_seconds          = monthly_invocations * billed_ms / 1000 * memory_mb / 1024
//! cost                = max(0, monthly_invocations - free_requests) * price_per_request
//!                     + max(0, gb_seconds - free_gb_seconds) * price_per_gb_second
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::types::{MetricSample, StatisticsWindow};

/// Published on-demand Lambda rates and free tier.
///
/// Rates are static configuration; they can be overridden from the config file but are never
/// looked up at runtime.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateTable {
    /// USD per request
    pub price_per_request: f64,
    /// USD per GB-second of billed compute
    pub price_per_gb_second: f64,
    /// Requests per month excluded from billing
    pub free_tier_requests: f64,
    /// GB-seconds per month excluded from billing
    pub free_tier_gb_seconds: f64,
    /// Durations are rounded up to a multiple of this many milliseconds
    pub billing_granularity_ms: f64,
    /// Days the observed usage is projected over
    pub days_in_month: f64,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            price_per_request: 0.000_000_2,
            price_per_gb_second: 0.000_016_666_7,
            free_tier_requests: 1_000_000.0,
            free_tier_gb_seconds: 400_000.0,
            billing_granularity_ms: 100.0,
            days_in_month: 30.0,
        }
    }
}

impl RateTable {
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("price_per_request", self.price_per_request),
            ("price_per_gb_second", self.price_per_gb_second),
            ("free_tier_requests", self.free_tier_requests),
            ("free_tier_gb_seconds", self.free_tier_gb_seconds),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config {
                    message: format!("pricing.{field} must be a non-negative number, got {value}"),
                });
            }
        }

        for (field, value) in [
            ("billing_granularity_ms", self.billing_granularity_ms),
            ("days_in_month", self.days_in_month),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::Config {
                    message: format!("pricing.{field} must be greater than zero, got {value}"),
                });
            }
        }

        Ok(())
    }
}

/// Prices samples collected over one statistics window.
#[derive(Debug, Clone)]
pub struct PricingModel {
    rates: RateTable,
    window: StatisticsWindow,
}

impl PricingModel {
    pub fn new(rates: RateTable, window: StatisticsWindow) -> Self {
        Self { rates, window }
    }

    /// Projected monthly cost of a function with the given usage and memory size.
    ///
    /// Returns [`Error::InvalidInput`] for a negative or NaN duration. Samples are validated when
    /// they are fetched, so this only fires on a programming error.
    pub fn estimate_cost(&self, sample: &MetricSample, memory_size_mb: u32) -> Result<f64> {
        check_sample(sample)?;

        let monthly_invocations = sample.invocation_count as f64 * self.rates.days_in_month / self.window.days();
        let monthly_gb_seconds = monthly_invocations * self.gb_seconds_per_invocation(sample.average_duration_ms, memory_size_mb);

        let billable_requests = (monthly_invocations - self.rates.free_tier_requests).max(0.0);
        let billable_gb_seconds = (monthly_gb_seconds - self.rates.free_tier_gb_seconds).max(0.0);

        Ok(billable_requests * self.rates.price_per_request + billable_gb_seconds * self.rates.price_per_gb_second)
    }

    /// Gross cost of the usage actually observed in the window, with no free tier applied.
    pub fn window_cost(&self, sample: &MetricSample, memory_size_mb: u32) -> Result<f64> {
        check_sample(sample)?;

        let invocations = sample.invocation_count as f64;
        let gb_seconds = invocations * self.gb_seconds_per_invocation(sample.average_duration_ms, memory_size_mb);
        Ok(invocations * self.rates.price_per_request + gb_seconds * self.rates.price_per_gb_second)
    }

    fn gb_seconds_per_invocation(&self, average_duration_ms: f64, memory_size_mb: u32) -> f64 {
        let granularity = self.rates.billing_granularity_ms;
        let billed_ms = (average_duration_ms / granularity).ceil() * granularity;
        (billed_ms / 1000.0) * (f64::from(memory_size_mb) / 1024.0)
    }
}

fn check_sample(sample: &MetricSample) -> Result<()> {
    if sample.average_duration_ms.is_nan() || sample.average_duration_ms < 0.0 || sample.average_duration_ms.is_infinite() {
        return Err(Error::InvalidInput {
            message: format!("average duration must be a non-negative number, got {}", sample.average_duration_ms),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn model() -> PricingModel {
        PricingModel::new(RateTable::default(), StatisticsWindow::default())
    }

    fn sample(invocation_count: u64, average_duration_ms: f64) -> MetricSample {
        MetricSample {
            invocation_count,
            average_duration_ms,
        }
    }

    #[test]
    fn test_zero_usage_costs_nothing() {
        for memory in [128, 1024, 3008, 10240] {
            assert_eq!(model().estimate_cost(&MetricSample::IDLE, memory).unwrap(), 0.0);
            assert_eq!(model().window_cost(&MetricSample::IDLE, memory).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_million_daily_invocations_at_128mb() {
        // 30M requests a month, 29M billable at $0.20 per million.
        // 30M * 100ms * 0.125GB = 375,000 GB-s, inside the 400,000 GB-s free tier.
        let cost = model().estimate_cost(&sample(1_000_000, 50.0), 128).unwrap();
        assert!((cost - 5.8).abs() < 1e-9, "cost was {cost}");
    }

    #[test]
    fn test_compute_beyond_free_tier_is_billed() {
        // 30M requests, 200ms at 1024MB: 30M * 0.2s * 1GB = 6,000,000 GB-s, 5,600,000 billable
        let cost = model().estimate_cost(&sample(1_000_000, 150.0), 1024).unwrap();
        let expected = 29_000_000.0 * 0.000_000_2 + 5_600_000.0 * 0.000_016_666_7;
        assert!((cost - expected).abs() < 1e-6, "cost was {cost}, expected {expected}");
    }

    #[test]
    fn test_duration_rounds_up_to_billing_granularity() {
        let model = model();
        let at_1ms = model.window_cost(&sample(1000, 1.0), 1024).unwrap();
        let at_100ms = model.window_cost(&sample(1000, 100.0), 1024).unwrap();
        let at_101ms = model.window_cost(&sample(1000, 101.0), 1024).unwrap();

        assert_eq!(at_1ms, at_100ms);
        assert!(at_101ms > at_100ms);
    }

    #[test]
    fn test_shorter_window_projects_more_usage() {
        let daily = model().estimate_cost(&sample(500_000, 120.0), 512).unwrap();
        let hourly_window = PricingModel::new(RateTable::default(), StatisticsWindow::new(Duration::from_secs(3600)).unwrap());
        let hourly = hourly_window.estimate_cost(&sample(500_000, 120.0), 512).unwrap();

        assert!(hourly > daily);
    }

    #[test]
    fn test_window_cost_ignores_free_tier() {
        let cost = model().window_cost(&sample(10, 50.0), 128).unwrap();
        let expected = 10.0 * 0.000_000_2 + 10.0 * 0.0125 * 0.000_016_666_7;
        assert!((cost - expected).abs() < 1e-15);
        assert_eq!(model().estimate_cost(&sample(10, 50.0), 128).unwrap(), 0.0);
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let result = model().estimate_cost(&sample(1, bad), 128);
            assert!(matches!(result, Err(Error::InvalidInput { .. })), "accepted {bad}");
        }
    }

    #[test]
    fn test_rate_table_validation() {
        assert!(RateTable::default().validate().is_ok());

        let negative = RateTable {
            price_per_request: -0.1,
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let zero_granularity = RateTable {
            billing_granularity_ms: 0.0,
            ..Default::default()
        };
        assert!(zero_granularity.validate().is_err());
    }

    proptest! {
        #[test]
        fn cost_is_non_negative(
            count in 0u64..10_000_000_000,
            duration in 0.0f64..900_000.0,
            memory in 128u32..10_240
        ) {
            let cost = model().estimate_cost(&sample(count, duration), memory).unwrap();
            prop_assert!(cost >= 0.0);
        }

        #[test]
        fn cost_non_decreasing_in_invocations(
            count in 0u64..1_000_000_000,
            extra in 0u64..1_000_000_000,
            duration in 0.0f64..900_000.0,
            memory in 128u32..10_240
        ) {
            let model = model();
            let lower = model.estimate_cost(&sample(count, duration), memory).unwrap();
            let higher = model.estimate_cost(&sample(count + extra, duration), memory).unwrap();
            prop_assert!(higher >= lower);
        }

        #[test]
        fn cost_non_decreasing_in_duration(
            count in 0u64..1_000_000_000,
            duration in 0.0f64..900_000.0,
            extra in 0.0f64..900_000.0,
            memory in 128u32..10_240
        ) {
            let model = model();
            let lower = model.estimate_cost(&sample(count, duration), memory).unwrap();
            let higher = model.estimate_cost(&sample(count, duration + extra), memory).unwrap();
            prop_assert!(higher >= lower);
        }
    }
}
