//! Lambda `ListFunctions` and CloudWatch `GetMetricStatistics` behind the provider traits.
//!
//! Credentials are resolved once into an [`SdkConfig`] and every client is built from it, so no
//! session state lives outside the clients handed to the pipeline.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_cloudwatch::error::BuildError;
use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudwatch::types::{Datapoint as CloudWatchDatapoint, Dimension, Statistic as CloudWatchStatistic};
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::types::FunctionConfiguration;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, instrument};

use super::{Datapoint, FunctionLister, FunctionPage, MetricName, MetricStatistics, RegionSource, Statistic};
use crate::config::{Config, CredentialsConfig};
use crate::errors::{Error, Result};
use crate::types::{FunctionDescriptor, StatisticsWindow};

/// Regions scanned by `--all-regions`: the commercial regions enabled on every account.
/// Opt-in regions must be requested explicitly with `--region`.
pub const LAMBDA_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "ap-south-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ca-central-1",
    "eu-central-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-north-1",
    "sa-east-1",
];

const LAMBDA_NAMESPACE: &str = "AWS/Lambda";
const FUNCTION_NAME_DIMENSION: &str = "FunctionName";
const CREDENTIALS_PROVIDER_NAME: &str = "fncost-cli";

/// Resolve credentials and shared settings.
///
/// Explicit keys win, then a named profile, then the default chain (environment, shared config
/// file, instance role).
pub async fn load_sdk_config(credentials: &CredentialsConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(profile) = &credentials.profile {
        loader = loader.profile_name(profile);
    }

    if let (Some(access_key_id), Some(secret_access_key)) = (&credentials.access_key_id, &credentials.secret_access_key) {
        loader = loader.credentials_provider(Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        ));
    }

    loader.load().await
}

/// Build listing and metrics clients for every region the config asks for.
pub async fn region_sources(config: &Config) -> Result<Vec<RegionSource>> {
    let base = load_sdk_config(&config.credentials).await;

    let regions = if config.all_regions {
        LAMBDA_REGIONS.iter().map(|r| r.to_string()).collect()
    } else if !config.regions.is_empty() {
        dedup_preserving_order(&config.regions)
    } else {
        let region = base.region().ok_or_else(|| Error::Config {
            message: "no AWS region configured; pass --region, --all-regions or set AWS_REGION".to_string(),
        })?;
        vec![region.to_string()]
    };

    debug!(?regions, "Resolved regions to scan");

    Ok(regions
        .into_iter()
        .map(|region| {
            let sdk_config = base.to_builder().region(Region::new(region.clone())).build();
            let lister = LambdaFunctionLister::new(aws_sdk_lambda::Client::new(&sdk_config), region.clone());
            let metrics = CloudWatchMetrics::new(aws_sdk_cloudwatch::Client::new(&sdk_config));
            RegionSource::new(region, Arc::new(lister), Arc::new(metrics))
        })
        .collect())
}

fn dedup_preserving_order(regions: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    regions.iter().filter(|r| seen.insert(r.as_str())).cloned().collect()
}

/// Lists functions with Lambda `ListFunctions`.
#[derive(Debug, Clone)]
pub struct LambdaFunctionLister {
    client: aws_sdk_lambda::Client,
    region: String,
}

impl LambdaFunctionLister {
    pub fn new(client: aws_sdk_lambda::Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }
}

#[async_trait]
impl FunctionLister for LambdaFunctionLister {
    #[instrument(skip(self), fields(region = %self.region))]
    async fn list_page(&self, next_token: Option<String>) -> Result<FunctionPage> {
        let output = self
            .client
            .list_functions()
            .set_marker(next_token)
            .send()
            .await
            .map_err(|e| Error::Enumeration {
                region: self.region.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let items = output
            .functions()
            .iter()
            .map(|function| descriptor_from_configuration(function, &self.region))
            .collect::<Result<Vec<_>>>()?;
        let next_token = output.next_marker().filter(|marker| !marker.is_empty()).map(str::to_string);

        debug!(count = items.len(), has_more = next_token.is_some(), "Listed function page");
        Ok(FunctionPage { items, next_token })
    }
}

fn descriptor_from_configuration(function: &FunctionConfiguration, region: &str) -> Result<FunctionDescriptor> {
    let malformed = |message: String| Error::Enumeration {
        region: region.to_string(),
        message,
    };

    let name = function
        .function_name()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| malformed("listed function has no name".to_string()))?;
    let memory = function
        .memory_size()
        .ok_or_else(|| malformed(format!("function {name} has no memory size")))?;
    let memory_size_mb = u32::try_from(memory)
        .ok()
        .filter(|mb| *mb > 0)
        .ok_or_else(|| malformed(format!("function {name} has invalid memory size {memory}")))?;

    Ok(FunctionDescriptor {
        name: name.to_string(),
        memory_size_mb,
        region: region.to_string(),
    })
}

/// Reads Lambda statistics with CloudWatch `GetMetricStatistics`.
#[derive(Debug, Clone)]
pub struct CloudWatchMetrics {
    client: aws_sdk_cloudwatch::Client,
}

impl CloudWatchMetrics {
    pub fn new(client: aws_sdk_cloudwatch::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetricStatistics for CloudWatchMetrics {
    #[instrument(skip(self, window), fields(window = %window))]
    async fn get_statistics(
        &self,
        function_name: &str,
        metric: MetricName,
        window: StatisticsWindow,
        statistic: Statistic,
    ) -> Result<Vec<Datapoint>> {
        let fetch_error = |message: String| Error::MetricsFetch {
            function: function_name.to_string(),
            metric: metric.to_string(),
            message,
        };

        let end = SystemTime::now();
        let start = end.checked_sub(window.duration()).unwrap_or(SystemTime::UNIX_EPOCH);

        let dimension = function_dimension(function_name).map_err(|e| fetch_error(e.to_string()))?;

        let output = self
            .client
            .get_metric_statistics()
            .namespace(LAMBDA_NAMESPACE)
            .metric_name(metric.as_str())
            .dimensions(dimension)
            .start_time(AwsDateTime::from(start))
            .end_time(AwsDateTime::from(end))
            .period(window.period_secs())
            .statistics(cloudwatch_statistic(statistic))
            .send()
            .await
            .map_err(|e| fetch_error(DisplayErrorContext(&e).to_string()))?;

        output
            .datapoints()
            .iter()
            .map(|point| {
                datapoint_value(point, statistic)
                    .ok_or_else(|| fetch_error(format!("datapoint is missing its {statistic:?} value")))
            })
            .collect()
    }
}

fn function_dimension(function_name: &str) -> std::result::Result<Dimension, BuildError> {
    Ok(Dimension::builder().name(FUNCTION_NAME_DIMENSION).value(function_name).build())
}

fn cloudwatch_statistic(statistic: Statistic) -> CloudWatchStatistic {
    match statistic {
        Statistic::Sum => CloudWatchStatistic::Sum,
        Statistic::Average => CloudWatchStatistic::Average,
    }
}

fn datapoint_value(point: &CloudWatchDatapoint, statistic: Statistic) -> Option<Datapoint> {
    let value = match statistic {
        Statistic::Sum => point.sum(),
        Statistic::Average => point.average(),
    }?;
    let timestamp = point
        .timestamp()
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos()));
    Some(Datapoint { timestamp, value })
}
