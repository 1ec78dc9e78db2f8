use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use super::error::{Result, StoreError};

const DEFAULT_STRIPES: usize = 64;

/// Striped per-document write locks.
///
/// The stores hold a guard for one read-modify-write of one document. The
/// quota ledger keeps its own set and may hold a vendor's guard across a lead
/// write, but never takes a second ledger guard while holding one. Unrelated
/// documents only contend when they hash to the same stripe.
pub(crate) struct StripedLocks {
    stripes: Vec<Mutex<()>>,
}

impl StripedLocks {
    pub(crate) fn new() -> Self {
        Self::with_stripes(DEFAULT_STRIPES)
    }

    pub(crate) fn with_stripes(count: usize) -> Self {
        let count = count.max(1);
        Self {
            stripes: (0..count).map(|_| Mutex::new(())).collect(),
        }
    }

    pub(crate) fn lock(&self, key: &str) -> Result<MutexGuard<'_, ()>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.stripes.len() as u64) as usize;
        self.stripes[index]
            .lock()
            .map_err(|_| StoreError::LockPoisoned)
    }
}
