//! Pricing every enumerated function into a [`Run`].
//!
//! ```text
//! for each region source:
//!   ResourceEnumerator::list_functions()  // lazy, page by page
//!     └─ up to `max_concurrent_fetches` at once:
//!          ├─ MetricsFetcher::fetch_metrics()  // failure → skipped entry, run continues
//!          └─ PricingModel::estimate_cost()
//! Run::new()  // ordered by region, name; totals
//! ```
//!
//! Listing errors abort the run. Records are only appended by the single task driving the
//! stream, and the final ordering does not depend on completion order.
//!
//! Progress is reported on a [`ProgressBar`]: the message names the region being listed and the
//! position counts assessed functions.

use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::enumerator::ResourceEnumerator;
use crate::errors::Result;
use crate::metrics::MetricsFetcher;
use crate::pricing::{PricingModel, RateTable};
use crate::provider::RegionSource;
use crate::types::{CostRecord, FunctionDescriptor, Run, SkippedFunction, StatisticsWindow};

enum Assessment {
    Priced(CostRecord),
    Skipped(SkippedFunction),
}

/// Spinner on stderr for interactive scans; hidden when stderr is not a terminal.
pub fn scan_progress() -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} Scanning {msg} [{elapsed}] {pos} functions assessed") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

pub struct CostAggregator {
    sources: Vec<RegionSource>,
    rates: RateTable,
    max_concurrent_fetches: usize,
    progress: ProgressBar,
}

impl CostAggregator {
    pub fn new(sources: Vec<RegionSource>, rates: RateTable, max_concurrent_fetches: usize) -> Self {
        Self {
            sources,
            rates,
            max_concurrent_fetches: max_concurrent_fetches.max(1),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Price every function over `window`.
    ///
    /// `limit` caps how many functions are assessed; listing stops requesting pages once it is
    /// reached.
    pub async fn run(&self, window: StatisticsWindow, limit: Option<usize>) -> Result<Run> {
        let pricing = PricingModel::new(self.rates.clone(), window);
        let pricing = &pricing;
        let progress = &self.progress;

        let functions = stream::iter(self.sources.clone())
            .map(|source| {
                progress.set_message(source.region.clone());
                let fetcher = Arc::new(MetricsFetcher::new(source.metrics.clone()));
                ResourceEnumerator::new(source.lister.clone())
                    .list_functions()
                    .map_ok(move |descriptor| (descriptor, fetcher.clone()))
            })
            .flatten();

        let functions = match limit {
            Some(limit) => functions.take(limit).left_stream(),
            None => functions.right_stream(),
        };

        let assessments: Result<Vec<Assessment>> = functions
            .map_ok(|(descriptor, fetcher)| async move {
                let assessment = assess(&fetcher, pricing, descriptor, window).await;
                progress.inc(1);
                assessment
            })
            .try_buffer_unordered(self.max_concurrent_fetches)
            .try_collect()
            .await;
        progress.finish_and_clear();
        let assessments = assessments?;

        let mut records = Vec::with_capacity(assessments.len());
        let mut skipped = Vec::new();
        for assessment in assessments {
            match assessment {
                Assessment::Priced(record) => records.push(record),
                Assessment::Skipped(entry) => skipped.push(entry),
            }
        }

        let run = Run::new(window, records, skipped);
        info!(
            functions = run.records.len(),
            skipped = run.skipped_count(),
            total_cost = run.total_cost,
            "Cost run complete"
        );
        if !run.skipped.is_empty() {
            warn!(skipped = run.skipped_count(), "Some functions were excluded because their metrics could not be fetched");
        }
        Ok(run)
    }
}

async fn assess(
    fetcher: &MetricsFetcher,
    pricing: &PricingModel,
    descriptor: FunctionDescriptor,
    window: StatisticsWindow,
) -> Result<Assessment> {
    let sample = match fetcher.fetch_metrics(&descriptor, window).await {
        Ok(sample) => sample,
        Err(e) if e.is_recoverable() => {
            warn!(function = %descriptor.name, region = %descriptor.region, error = %e, "Skipping function");
            return Ok(Assessment::Skipped(SkippedFunction {
                descriptor,
                reason: e.to_string(),
            }));
        }
        Err(e) => return Err(e),
    };

    let estimated_monthly_cost = pricing.estimate_cost(&sample, descriptor.memory_size_mb)?;
    let window_cost = pricing.window_cost(&sample, descriptor.memory_size_mb)?;

    Ok(Assessment::Priced(CostRecord {
        descriptor,
        sample,
        window_cost,
        estimated_monthly_cost,
    }))
}
