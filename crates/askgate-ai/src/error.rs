use std::time::Duration;
use thiserror::Error;

/// Failure of a single provider call, split by whether retrying can help.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network blips, 408/429, 5xx.
    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    /// Bad credentials, malformed request, unparseable body.
    #[error("fatal provider error: {0}")]
    Fatal(String),
}

impl ProviderError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
