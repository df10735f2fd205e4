//! Error types for the resource pool

use thiserror::Error;

use crate::resource::FactoryError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    Configuration(String),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Timed out after {0:?} waiting for a resource")]
    Timeout(std::time::Duration),

    #[error("Resource is not on loan from this pool")]
    InvalidObject,

    #[error("Resource factory failed: {0}")]
    Factory(#[from] FactoryError),

    #[error("Operation was cancelled")]
    Cancelled,
}

impl PoolError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether retrying the same call later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Factory(_))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
