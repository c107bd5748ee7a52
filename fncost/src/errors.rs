use thiserror::Error as ThisError;

/// Result type for cost reporting operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Listing functions failed. The run cannot produce a complete report.
    #[error("Failed to enumerate functions in {region}: {message}")]
    Enumeration { region: String, message: String },

    /// Statistics for a single function could not be fetched or were malformed
    #[error("Failed to fetch {metric} for {function}: {message}")]
    MetricsFetch { function: String, metric: String, message: String },

    /// A pricing input was negative or not a number
    #[error("Invalid pricing input: {message}")]
    InvalidInput { message: String },

    /// The report destination could not be written
    #[error("Failed to write report to {destination} (computed results were not saved): {source}")]
    Render {
        destination: String,
        #[source]
        source: std::io::Error,
    },

    /// Inconsistent or missing configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl Error {
    /// Process exit code for an error that ends the run.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Enumeration { .. } | Error::Render { .. } | Error::Config { .. } | Error::InvalidInput { .. } => 1,
            // Never surfaced by a run; the aggregator converts these into skipped entries
            Error::MetricsFetch { .. } => 1,
        }
    }

    /// Whether the run can continue past this error by excluding the affected function.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::MetricsFetch { .. })
    }
}
