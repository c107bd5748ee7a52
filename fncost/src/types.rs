//! Records flowing through the reporting pipeline.
//!
//! - [`FunctionDescriptor`]: identity and memory size of one deployed function
//! - [`MetricSample`]: usage observed for a function over a [`StatisticsWindow`]
//! - [`CostRecord`]: a priced sample
//! - [`Run`]: every record of one invocation of the tool, plus totals

use serde::Serialize;
use std::time::Duration;

use crate::errors::{Error, Result};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A deployed function, unique by name within its region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub memory_size_mb: u32,
    pub region: String,
}

/// Usage of one function over one statistics window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MetricSample {
    pub invocation_count: u64,
    pub average_duration_ms: f64,
}

impl MetricSample {
    /// Sample for a function that was not invoked during the window
    pub const IDLE: MetricSample = MetricSample {
        invocation_count: 0,
        average_duration_ms: 0.0,
    };

    pub fn is_idle(&self) -> bool {
        self.invocation_count == 0
    }
}

/// Trailing time range over which metrics are sampled before monthly projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsWindow {
    duration: Duration,
}

impl StatisticsWindow {
    /// CloudWatch periods are whole minutes
    const GRANULARITY_SECS: u64 = 60;

    pub fn new(duration: Duration) -> Result<Self> {
        let secs = duration.as_secs();
        if secs < Self::GRANULARITY_SECS || secs % Self::GRANULARITY_SECS != 0 || duration.subsec_nanos() != 0 {
            return Err(Error::Config {
                message: format!(
                    "statistics window must be a positive whole number of minutes, got {}",
                    humantime::format_duration(duration)
                ),
            });
        }
        if i32::try_from(secs).is_err() {
            return Err(Error::Config {
                message: format!("statistics window {} is too long", humantime::format_duration(duration)),
            });
        }
        Ok(Self { duration })
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Window length in days, used to scale observed usage to a month
    pub fn days(&self) -> f64 {
        self.duration.as_secs_f64() / SECONDS_PER_DAY
    }

    /// Statistics period covering the whole window in one datapoint
    pub fn period_secs(&self) -> i32 {
        // Range checked in `new`
        self.duration.as_secs() as i32
    }
}

impl Default for StatisticsWindow {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(SECONDS_PER_DAY as u64),
        }
    }
}

impl std::fmt::Display for StatisticsWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", humantime::format_duration(self.duration))
    }
}

/// A function's sample priced against the rate table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostRecord {
    pub descriptor: FunctionDescriptor,
    pub sample: MetricSample,
    /// Gross cost of the usage observed in the window, before free tier
    pub window_cost: f64,
    pub estimated_monthly_cost: f64,
}

/// A function left out of the report because its metrics could not be fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFunction {
    pub descriptor: FunctionDescriptor,
    pub reason: String,
}

/// All records of one invocation of the tool.
///
/// Records and skipped entries are kept ordered by region then name, so two runs over the same
/// provider responses compare equal no matter how metric fetches interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub window: StatisticsWindow,
    pub records: Vec<CostRecord>,
    pub skipped: Vec<SkippedFunction>,
    pub total_cost: f64,
}

impl Run {
    pub fn new(window: StatisticsWindow, mut records: Vec<CostRecord>, mut skipped: Vec<SkippedFunction>) -> Self {
        records.sort_by(|a, b| descriptor_order(&a.descriptor, &b.descriptor));
        skipped.sort_by(|a, b| descriptor_order(&a.descriptor, &b.descriptor));
        let total_cost = records.iter().fold(0.0, |total, r| total + r.estimated_monthly_cost);
        Self {
            window,
            records,
            skipped,
            total_cost,
        }
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn total_invocations(&self) -> u64 {
        self.records.iter().map(|r| r.sample.invocation_count).sum()
    }

    pub fn total_window_cost(&self) -> f64 {
        self.records.iter().fold(0.0, |total, r| total + r.window_cost)
    }

    /// Records ordered by estimated monthly cost, most expensive first
    pub fn by_cost_descending(&self) -> Vec<&CostRecord> {
        let mut sorted: Vec<&CostRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| {
            b.estimated_monthly_cost
                .total_cmp(&a.estimated_monthly_cost)
                .then_with(|| descriptor_order(&a.descriptor, &b.descriptor))
        });
        sorted
    }
}

fn descriptor_order(a: &FunctionDescriptor, b: &FunctionDescriptor) -> std::cmp::Ordering {
    a.region.cmp(&b.region).then_with(|| a.name.cmp(&b.name))
}
