//! # fncost: Lambda cost forecasting
//!
//! `fncost` lists the Lambda functions in an AWS account, reads their invocation count and
//! average duration from CloudWatch over a recent window (the last day by default), and projects
//! a monthly bill per function and for the whole account.
//!
//! ## Pipeline
//!
//! 1. [`enumerator`] pages through `ListFunctions` for every configured region.
//! 2. [`metrics`] reads `Invocations`/`Sum` and `Duration`/`Average` for each function. A function
//!    whose metrics cannot be fetched is skipped and counted, it never fails the run.
//! 3. [`pricing`] scales the sample to a month and applies the free tier and published rates.
//! 4. [`aggregator`] drives the above with a bounded number of concurrent fetches and collects a
//!    [`Run`].
//! 5. [`report`] prints the most expensive functions as a table, or writes every record to CSV.
//!
//! The cloud APIs sit behind the traits in [`provider`], with AWS SDK implementations in
//! [`provider::aws`]. Credentials are resolved once and injected into the clients.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use fncost::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = fncost::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     fncost::telemetry::init_telemetry()?;
//!
//!     let run = Application::new(config).await?.run().await?;
//!     println!("{} functions priced", run.records.len());
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod enumerator;
pub mod errors;
pub mod metrics;
pub mod pricing;
pub mod provider;
pub mod report;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use errors::{Error, Result};
pub use types::{CostRecord, FunctionDescriptor, MetricSample, Run};

use indicatif::ProgressBar;
use tracing::debug;

use crate::aggregator::CostAggregator;
use crate::provider::RegionSource;

/// One invocation of the tool: price every function, then render the report.
pub struct Application {
    config: Config,
    sources: Vec<RegionSource>,
    progress: ProgressBar,
}

impl Application {
    /// Resolve credentials and build AWS clients for every configured region. Scan progress is
    /// shown on stderr when it is a terminal.
    pub async fn new(config: Config) -> Result<Self> {
        debug!("Starting cost report with configuration: {:#?}", config);
        let sources = provider::aws::region_sources(&config).await?;
        Ok(Self {
            progress: aggregator::scan_progress(),
            ..Self::with_sources(config, sources)
        })
    }

    /// Use pre-built provider clients instead of AWS ones, without a progress display
    pub fn with_sources(config: Config, sources: Vec<RegionSource>) -> Self {
        Self {
            config,
            sources,
            progress: ProgressBar::hidden(),
        }
    }

    /// Compute the run and write it to the configured destination.
    ///
    /// Nothing is written if enumeration fails.
    pub async fn run(&self) -> Result<Run> {
        let window = self.config.statistics_window()?;
        let aggregator = CostAggregator::new(self.sources.clone(), self.config.pricing.clone(), self.config.max_concurrent_fetches)
            .with_progress(self.progress.clone());

        let run = aggregator.run(window, self.config.max_functions).await?;
        report::render(&run, &self.config.destination())?;
        Ok(run)
    }
}
