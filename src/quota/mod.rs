//! Quota ledger.
//!
//! Owns `0 <= used <= quota` for every vendor. Each operation reads the latest
//! vendor document, builds one history entry against that snapshot and writes
//! it back with a version check. Writes to one vendor are serialized behind a
//! striped lock; the version check still catches writers outside this ledger.
//! Reservations and adjustments give up after `max_retries` lost races, while
//! releases keep retrying until they land.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audit::{self, AuditContext};
use crate::domain::{FailureReason, HistoryKind, LeadId, Vendor, VendorHistoryEntry, VendorId};
use crate::observability::Metrics;
use crate::store::{StoreError, StripedLocks, VendorStore};

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("vendor not found: {0}")]
    VendorNotFound(VendorId),

    #[error("vendor {vendor_id} at capacity (used {used} of {quota})")]
    CapacityExceeded {
        vendor_id: VendorId,
        used: u32,
        quota: u32,
    },

    #[error("vendor {vendor_id} quota update lost {attempts} races")]
    Contended { vendor_id: VendorId, attempts: u32 },

    #[error("quota adjustment count must be greater than zero")]
    InvalidCount,

    #[error("cannot remove more than current quota (requested {requested}, quota {quota})")]
    RemoveExceedsQuota { requested: u32, quota: u32 },

    #[error("cannot remove {requested}: {used} of {quota} units are already used")]
    RemoveBelowUsed { requested: u32, used: u32, quota: u32 },

    #[error("cannot add {requested}: quota {quota} would overflow")]
    AddOverflows { requested: u32, quota: u32 },

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl QuotaError {
    /// How a failed reservation is reported for its lead/vendor pair.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            QuotaError::VendorNotFound(_) => FailureReason::NotFound,
            QuotaError::CapacityExceeded { .. } | QuotaError::Contended { .. } => {
                FailureReason::CapacityExceeded
            }
            _ => FailureReason::Storage,
        }
    }

    /// Rejected before touching the vendor because the request itself is invalid.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            QuotaError::InvalidCount
                | QuotaError::RemoveExceedsQuota { .. }
                | QuotaError::RemoveBelowUsed { .. }
                | QuotaError::AddOverflows { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, QuotaError>;

/// Manual quota change requested by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "count", rename_all = "snake_case")]
pub enum QuotaAdjustment {
    Add(u32),
    Remove(u32),
}

impl QuotaAdjustment {
    pub fn count(self) -> u32 {
        match self {
            QuotaAdjustment::Add(count) | QuotaAdjustment::Remove(count) => count,
        }
    }
}

/// Why a write made under a held reservation did not go through.
#[derive(Debug)]
pub enum ReservedWriteError<E> {
    /// The reservation was refused; nothing changed.
    Quota(QuotaError),
    /// The write failed and the unit was handed back.
    Write(E),
    /// The write failed and the unit could not be handed back.
    Stranded { write: E, release: QuotaError },
}

/// A planned mutation: deltas plus the history entry describing them.
struct Mutation {
    delta_used: i64,
    delta_quota: i64,
    entry: VendorHistoryEntry,
}

#[derive(Debug, Clone, Copy)]
enum Retry {
    Bounded(u32),
    UntilApplied,
}

#[derive(Clone)]
pub struct QuotaLedger {
    vendors: Arc<dyn VendorStore>,
    locks: Arc<StripedLocks>,
    max_retries: u32,
    metrics: Arc<Metrics>,
}

impl QuotaLedger {
    pub fn new(vendors: Arc<dyn VendorStore>, max_retries: u32, metrics: Arc<Metrics>) -> Self {
        Self {
            vendors,
            locks: Arc::new(StripedLocks::new()),
            max_retries,
            metrics,
        }
    }

    /// Consume one unit of the vendor's capacity on behalf of `lead_id`.
    pub fn reserve(&self, vendor_id: &VendorId, lead_id: &LeadId, ctx: &AuditContext) -> Result<Vendor> {
        let _guard = self.locks.lock(vendor_id.as_str())?;
        self.reserve_locked(vendor_id, lead_id, ctx)
    }

    /// Reserve one unit, then run `write` while the vendor stays locked.
    ///
    /// No other ledger call on this vendor runs until `write` returns. If it
    /// fails, the unit is released under the same lock, using `rollback` for
    /// the history entry.
    pub fn reserve_then<T, E>(
        &self,
        vendor_id: &VendorId,
        lead_id: &LeadId,
        ctx: &AuditContext,
        rollback: &AuditContext,
        write: impl FnOnce(&Vendor) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, ReservedWriteError<E>> {
        let _guard = self
            .locks
            .lock(vendor_id.as_str())
            .map_err(|err| ReservedWriteError::Quota(err.into()))?;
        let vendor = self
            .reserve_locked(vendor_id, lead_id, ctx)
            .map_err(ReservedWriteError::Quota)?;

        match write(&vendor) {
            Ok(value) => Ok(value),
            Err(write) => match self.release_locked(vendor_id, lead_id, rollback) {
                Ok(_) => Err(ReservedWriteError::Write(write)),
                Err(release) => Err(ReservedWriteError::Stranded { write, release }),
            },
        }
    }

    fn reserve_locked(&self, vendor_id: &VendorId, lead_id: &LeadId, ctx: &AuditContext) -> Result<Vendor> {
        let retry = Retry::Bounded(self.max_retries);
        let vendor = self.compare_and_swap(vendor_id, retry, |vendor| {
            if !vendor.has_capacity() {
                return Err(QuotaError::CapacityExceeded {
                    vendor_id: vendor.id.clone(),
                    used: vendor.used,
                    quota: vendor.quota,
                });
            }
            Ok(Mutation {
                delta_used: 1,
                delta_quota: 0,
                entry: audit::assignment_entry(vendor, lead_id, ctx),
            })
        })?;

        debug!(
            vendor_id = %vendor_id,
            lead_id = %lead_id,
            used = vendor.used,
            quota = vendor.quota,
            "Reserved quota unit"
        );
        Ok(vendor)
    }

    /// Return one unit previously consumed by `lead_id`.
    ///
    /// Returns `None` when the vendor has nothing left to release. Lost races
    /// are retried until the release lands; only a missing vendor or a storage
    /// failure is returned as an error.
    pub fn release(
        &self,
        vendor_id: &VendorId,
        lead_id: &LeadId,
        ctx: &AuditContext,
    ) -> Result<Option<Vendor>> {
        let _guard = self.locks.lock(vendor_id.as_str())?;
        self.release_locked(vendor_id, lead_id, ctx)
    }

    fn release_locked(
        &self,
        vendor_id: &VendorId,
        lead_id: &LeadId,
        ctx: &AuditContext,
    ) -> Result<Option<Vendor>> {
        let result = self.compare_and_swap(vendor_id, Retry::UntilApplied, |vendor| {
            if vendor.used == 0 {
                return Err(QuotaError::CapacityExceeded {
                    vendor_id: vendor.id.clone(),
                    used: 0,
                    quota: vendor.quota,
                });
            }
            Ok(Mutation {
                delta_used: -1,
                delta_quota: 0,
                entry: audit::release_entry(vendor, lead_id, ctx),
            })
        });

        match result {
            Ok(vendor) => {
                debug!(
                    vendor_id = %vendor_id,
                    lead_id = %lead_id,
                    used = vendor.used,
                    "Released quota unit"
                );
                Ok(Some(vendor))
            }
            Err(QuotaError::CapacityExceeded { .. }) => {
                warn!(vendor_id = %vendor_id, lead_id = %lead_id, "Nothing to release, used is already zero");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Add quota units.
    pub fn top_up(&self, vendor_id: &VendorId, count: u32, ctx: &AuditContext) -> Result<Vendor> {
        self.adjust(vendor_id, QuotaAdjustment::Add(count), ctx)
    }

    /// Remove quota units. Never clamps: removing more than the vendor holds is an error.
    pub fn draw_down(&self, vendor_id: &VendorId, count: u32, ctx: &AuditContext) -> Result<Vendor> {
        self.adjust(vendor_id, QuotaAdjustment::Remove(count), ctx)
    }

    pub fn adjust(
        &self,
        vendor_id: &VendorId,
        adjustment: QuotaAdjustment,
        ctx: &AuditContext,
    ) -> Result<Vendor> {
        let count = adjustment.count();
        if count == 0 {
            return Err(QuotaError::InvalidCount);
        }

        let _guard = self.locks.lock(vendor_id.as_str())?;
        let retry = Retry::Bounded(self.max_retries);
        let vendor = self.compare_and_swap(vendor_id, retry, |vendor| match adjustment {
            QuotaAdjustment::Add(count) => {
                if vendor.quota.checked_add(count).is_none() {
                    return Err(QuotaError::AddOverflows {
                        requested: count,
                        quota: vendor.quota,
                    });
                }
                Ok(Mutation {
                    delta_used: 0,
                    delta_quota: i64::from(count),
                    entry: audit::quota_entry(vendor, HistoryKind::Add, count, ctx),
                })
            }
            QuotaAdjustment::Remove(count) => {
                if count > vendor.quota {
                    return Err(QuotaError::RemoveExceedsQuota {
                        requested: count,
                        quota: vendor.quota,
                    });
                }
                if vendor.quota - count < vendor.used {
                    return Err(QuotaError::RemoveBelowUsed {
                        requested: count,
                        used: vendor.used,
                        quota: vendor.quota,
                    });
                }
                Ok(Mutation {
                    delta_used: 0,
                    delta_quota: -i64::from(count),
                    entry: audit::quota_entry(vendor, HistoryKind::Remove, count, ctx),
                })
            }
        })?;

        info!(
            vendor_id = %vendor_id,
            ?adjustment,
            quota = vendor.quota,
            used = vendor.used,
            performed_by = %ctx.performed_by,
            "Adjusted vendor quota"
        );
        Ok(vendor)
    }

    fn compare_and_swap<F>(&self, vendor_id: &VendorId, retry: Retry, mut plan: F) -> Result<Vendor>
    where
        F: FnMut(&Vendor) -> Result<Mutation>,
    {
        let limit = match retry {
            Retry::Bounded(attempts) => Some(attempts.max(1)),
            Retry::UntilApplied => None,
        };
        let mut attempt = 0;

        loop {
            attempt += 1;
            let vendor = self
                .vendors
                .get_vendor(vendor_id)?
                .ok_or_else(|| QuotaError::VendorNotFound(vendor_id.clone()))?;

            let mutation = plan(&vendor)?;
            match self.vendors.adjust_quota(
                vendor_id,
                vendor.version,
                mutation.delta_used,
                mutation.delta_quota,
                mutation.entry,
            ) {
                Ok(updated) => return Ok(updated),
                Err(StoreError::Conflict { .. }) => {
                    self.metrics.quota_conflict();
                    if limit.is_some_and(|limit| attempt >= limit) {
                        warn!(vendor_id = %vendor_id, attempts = attempt, "Giving up on contended quota update");
                        return Err(QuotaError::Contended {
                            vendor_id: vendor_id.clone(),
                            attempts: attempt,
                        });
                    }
                    debug!(vendor_id = %vendor_id, attempt, "Quota version conflict, retrying");
                }
                Err(err) if err.is_not_found() => {
                    return Err(QuotaError::VendorNotFound(vendor_id.clone()));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
