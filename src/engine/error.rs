use thiserror::Error;

use crate::bulk::BulkValidationError;
use crate::quota::QuotaError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any write.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Store(StoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => EngineError::NotFound(err.to_string()),
            StoreError::AlreadyExists { .. } | StoreError::Conflict { .. } => {
                EngineError::Conflict(err.to_string())
            }
            other => EngineError::Store(other),
        }
    }
}

impl From<QuotaError> for EngineError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::VendorNotFound(_) => EngineError::NotFound(err.to_string()),
            QuotaError::Contended { .. } | QuotaError::CapacityExceeded { .. } => {
                EngineError::Conflict(err.to_string())
            }
            QuotaError::Store(store) => store.into(),
            other if other.is_validation() => EngineError::Validation(other.to_string()),
            other => EngineError::Conflict(other.to_string()),
        }
    }
}

impl From<BulkValidationError> for EngineError {
    fn from(err: BulkValidationError) -> Self {
        EngineError::Validation(err.to_string())
    }
}
