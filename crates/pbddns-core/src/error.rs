use pbddns_provider::ProviderError;
use thiserror::Error;

/// Validation errors in configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("validation failed: {0}")]
    Validate(#[from] validator::ValidationErrors),

    #[error("{0}")]
    Missing(&'static str),

    #[error("fast interval ({fast}s) must not exceed slow interval ({slow}s)")]
    Intervals { fast: u64, slow: u64 },
}

/// Errors raised while detecting the address or reconciling the record
#[derive(Error, Debug)]
pub enum CoreError {
    /// Transport or API contract broken: fatal at start-up, abandons the
    /// current tick afterwards.
    #[error("critical error: {0:#}")]
    Critical(#[from] anyhow::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected by provider: {0}")]
    Rejected(String),
}

impl CoreError {
    pub fn is_critical(&self) -> bool {
        matches!(self, CoreError::Critical(_))
    }
}

impl From<ProviderError> for CoreError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Api(msg) => CoreError::Rejected(msg),
            other => CoreError::Critical(other.into()),
        }
    }
}
