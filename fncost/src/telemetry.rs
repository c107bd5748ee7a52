//! Logging setup.
//!
//! Log output goes to stderr so the report on stdout stays clean when piped. The level is
//! controlled with `RUST_LOG` and defaults to `warn`, which still shows skipped functions:
//!
//! ```bash
//! RUST_LOG=fncost=debug fncost --region us-east-1
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "warn";

/// Install the global tracing subscriber.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;

    tracing::debug!("Telemetry initialized");
    Ok(())
}
