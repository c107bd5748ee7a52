//! Configuration loading.
//!
//! Settings come from, in increasing priority:
//!
//! 1. **YAML config file** - optional, `fncost.yaml` unless `-f`/`FNCOST_CONFIG` says otherwise
//! 2. **Environment variables** - prefixed with `FNCOST_`, nested keys separated by `__`
//! 3. **Command line flags** - `--csv`, `--region`, `--window`, credentials and so on
//!
//! ```yaml
//! regions: [us-east-1, eu-west-1]
//! window: 1day
//! console_top: 20
//! max_concurrent_fetches: 8
//! pricing:
//!   price_per_gb_second: 0.0000133334  # arm64
//! ```
//!
//! ```bash
//! FNCOST_ALL_REGIONS=true
//! FNCOST_PRICING__FREE_TIER_REQUESTS=0
//! FNCOST_CREDENTIALS__PROFILE=billing
//! ```
//!
//! Credentials are optional. Without them the AWS default chain is used (environment, shared
//! config file, instance role).

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::Error;
use crate::pricing::RateTable;
use crate::report::Destination;
use crate::types::StatisticsWindow;

/// Forecast monthly AWS Lambda costs from recent usage.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "FNCOST_CONFIG", default_value = "fncost.yaml")]
    pub config: String,

    /// Write the full report to this CSV file instead of printing a table
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// AWS access key id. Must be given together with --token-secret
    #[arg(long, value_name = "ID", requires = "token_secret")]
    pub token_key_id: Option<String>,

    /// AWS secret access key. Must be given together with --token-key-id
    #[arg(long, value_name = "SECRET", requires = "token_key_id")]
    pub token_secret: Option<String>,

    /// Named profile from the shared AWS config files
    #[arg(long)]
    pub profile: Option<String>,

    /// Region to scan; repeat for several regions
    #[arg(long = "region", value_name = "REGION")]
    pub regions: Vec<String>,

    /// Scan every region enabled by default on AWS accounts
    #[arg(long, conflicts_with = "regions")]
    pub all_regions: bool,

    /// Trailing window to sample metrics over, e.g. "1day" or "6h"
    #[arg(long, value_parser = humantime::parse_duration)]
    pub window: Option<Duration>,

    /// Number of most expensive functions shown in the console table
    #[arg(long)]
    pub top: Option<usize>,

    /// Stop after assessing this many functions
    #[arg(long)]
    pub max_functions: Option<usize>,
}

/// Main configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Regions to scan. Empty means the region from the AWS default chain.
    pub regions: Vec<String>,
    /// Scan every default-enabled region instead of `regions`
    pub all_regions: bool,
    pub credentials: CredentialsConfig,
    /// Trailing window metrics are sampled over before monthly projection
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// Rows shown in the console table
    pub console_top: usize,
    /// Cap on the number of functions assessed
    pub max_functions: Option<usize>,
    /// Metric fetches in flight at once
    pub max_concurrent_fetches: usize,
    /// When set, the full report is written here instead of the console
    pub csv_path: Option<PathBuf>,
    pub pricing: RateTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            all_regions: false,
            credentials: CredentialsConfig::default(),
            window: StatisticsWindow::default().duration(),
            console_top: 10,
            max_functions: None,
            max_concurrent_fetches: 8,
            csv_path: None,
            pricing: RateTable::default(),
        }
    }
}

#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsConfig {
    pub access_key_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret_access_key: Option<String>,
    pub profile: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<redacted>"))
            .field("profile", &self.profile)
            .finish()
    }
}

impl Config {
    /// Load configuration from file, environment and command line, then validate it.
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;
        config.apply_args(args);
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // FNCOST_CONFIG names the file itself
            .merge(Env::prefixed("FNCOST_").ignore(&["config"]).split("__"))
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(path) = &args.csv {
            self.csv_path = Some(path.clone());
        }
        if args.token_key_id.is_some() || args.token_secret.is_some() {
            self.credentials.access_key_id = args.token_key_id.clone();
            self.credentials.secret_access_key = args.token_secret.clone();
        }
        if let Some(profile) = &args.profile {
            self.credentials.profile = Some(profile.clone());
        }
        if !args.regions.is_empty() {
            self.regions = args.regions.clone();
            self.all_regions = false;
        }
        if args.all_regions {
            self.regions.clear();
            self.all_regions = true;
        }
        if let Some(window) = args.window {
            self.window = window;
        }
        if let Some(top) = args.top {
            self.console_top = top;
        }
        if let Some(max_functions) = args.max_functions {
            self.max_functions = Some(max_functions);
        }
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), Error> {
        if self.credentials.access_key_id.is_some() != self.credentials.secret_access_key.is_some() {
            return Err(Error::Config {
                message: "access key id and secret access key must be provided together".to_string(),
            });
        }

        if self.all_regions && !self.regions.is_empty() {
            return Err(Error::Config {
                message: "all_regions cannot be combined with an explicit region list".to_string(),
            });
        }

        if let Some(region) = self.regions.iter().find(|r| r.trim().is_empty()) {
            return Err(Error::Config {
                message: format!("invalid region name {region:?}"),
            });
        }

        if self.max_concurrent_fetches == 0 {
            return Err(Error::Config {
                message: "max_concurrent_fetches must be at least 1".to_string(),
            });
        }

        if self.console_top == 0 {
            return Err(Error::Config {
                message: "console_top must be at least 1".to_string(),
            });
        }

        if self.max_functions == Some(0) {
            return Err(Error::Config {
                message: "max_functions must be at least 1".to_string(),
            });
        }

        self.statistics_window()?;
        self.pricing.validate()
    }

    pub fn statistics_window(&self) -> Result<StatisticsWindow, Error> {
        StatisticsWindow::new(self.window)
    }

    pub fn destination(&self) -> Destination {
        match &self.csv_path {
            Some(path) => Destination::Csv { path: path.clone() },
            None => Destination::Console { top: self.console_top },
        }
    }
}
