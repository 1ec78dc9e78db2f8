use thiserror::Error;

use crate::domain::VendorId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("version conflict on vendor {vendor_id}: expected {expected}, found {actual}")]
    Conflict {
        vendor_id: VendorId,
        expected: u64,
        actual: u64,
    },

    #[error("quota invariant violated for vendor {vendor_id}: {detail}")]
    Invariant { vendor_id: VendorId, detail: String },

    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn lead_not_found(id: impl ToString) -> Self {
        StoreError::NotFound {
            kind: "lead",
            id: id.to_string(),
        }
    }

    pub fn vendor_not_found(id: impl ToString) -> Self {
        StoreError::NotFound {
            kind: "vendor",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
