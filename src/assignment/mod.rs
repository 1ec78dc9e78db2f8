//! Assignment transaction: commits a plan pair by pair.
//!
//! Each pair is its own unit of work. The vendor stays locked from the quota
//! reservation through the lead write; if the write fails the unit is released
//! before the lock is dropped, so no other request acts on it in between.
//! A failed pair never stops the batch.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::audit::AuditContext;
use crate::distribution::{Pair, Plan};
use crate::domain::{AssignmentResult, FailureReason, LeadPatch, LeadStatus};
use crate::observability::Metrics;
use crate::quota::{QuotaLedger, ReservedWriteError};
use crate::store::{LeadStore, StoreError};

#[derive(Debug, Clone)]
pub struct CommitOptions {
    pub reason: String,
    pub performed_by: String,
    /// Attach the vendor but leave the lead `available` instead of `assigned`.
    pub keep_unassigned: bool,
}

impl CommitOptions {
    pub fn new(reason: impl Into<String>, performed_by: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            performed_by: performed_by.into(),
            keep_unassigned: false,
        }
    }

    fn target_status(&self) -> LeadStatus {
        if self.keep_unassigned {
            LeadStatus::Available
        } else {
            LeadStatus::Assigned
        }
    }
}

#[derive(Clone)]
pub struct AssignmentTransaction {
    leads: Arc<dyn LeadStore>,
    ledger: QuotaLedger,
    metrics: Arc<Metrics>,
}

impl AssignmentTransaction {
    pub fn new(leads: Arc<dyn LeadStore>, ledger: QuotaLedger, metrics: Arc<Metrics>) -> Self {
        Self {
            leads,
            ledger,
            metrics,
        }
    }

    pub fn commit(&self, plan: &Plan, options: &CommitOptions) -> AssignmentResult {
        let mut result = AssignmentResult::default();
        let mut assigned = BTreeSet::new();

        for lead_id in &plan.missing {
            result.record_failure(
                lead_id,
                None,
                FailureReason::NotFound,
                format!("lead not found: {lead_id}"),
            );
        }
        result.unassignable = plan.unassignable.clone();

        for pair in &plan.pairs {
            let ctx = AuditContext::new(options.reason.clone(), options.performed_by.clone());
            match self.commit_pair(pair, options, &ctx) {
                Ok(business_name) => {
                    result.record_success(&pair.vendor_id, &business_name);
                    assigned.insert(pair.lead_id.clone());
                    self.metrics.lead_assigned();
                }
                Err((reason, message)) => {
                    warn!(
                        lead_id = %pair.lead_id,
                        vendor_id = %pair.vendor_id,
                        %reason,
                        %message,
                        "Assignment pair failed"
                    );
                    result.record_failure(&pair.lead_id, Some(&pair.vendor_id), reason, message);
                    self.metrics.assignment_failed();
                }
            }
        }

        result.finalize(&plan.submitted(), &assigned);
        info!(
            assigned = result.assigned_count,
            unassigned = result.unassigned_count,
            failures = result.failures.len(),
            performed_by = %options.performed_by,
            "Committed assignment plan"
        );
        result
    }

    /// Reserve and write the lead under the vendor's lock.
    fn commit_pair(
        &self,
        pair: &Pair,
        options: &CommitOptions,
        ctx: &AuditContext,
    ) -> Result<String, (FailureReason, String)> {
        match self.leads.get_lead(&pair.lead_id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err((
                    FailureReason::NotFound,
                    format!("lead not found: {}", pair.lead_id),
                ));
            }
            Err(err) => return Err((FailureReason::Storage, err.to_string())),
        }

        let patch = LeadPatch::assignment(
            pair.vendor_id.clone(),
            options.target_status(),
            &options.performed_by,
            Utc::now(),
        );
        let rollback = ctx.with_reason(format!("rollback: {}", options.reason));

        let written = self
            .ledger
            .reserve_then(&pair.vendor_id, &pair.lead_id, ctx, &rollback, |vendor| {
                self.leads
                    .update_lead(&pair.lead_id, patch)
                    .map(|_| vendor.business_name.clone())
            });

        match written {
            Ok(business_name) => Ok(business_name),
            Err(ReservedWriteError::Quota(err)) => Err((err.failure_reason(), err.to_string())),
            Err(ReservedWriteError::Write(err)) => Err((write_failure(&err), err.to_string())),
            Err(ReservedWriteError::Stranded { write, release }) => {
                error!(
                    lead_id = %pair.lead_id,
                    vendor_id = %pair.vendor_id,
                    error = %release,
                    "Failed to release quota after lead update failure"
                );
                Err((
                    FailureReason::Storage,
                    format!("{write}; quota unit not released: {release}"),
                ))
            }
        }
    }
}

fn write_failure(err: &StoreError) -> FailureReason {
    if err.is_not_found() {
        FailureReason::NotFound
    } else {
        FailureReason::Storage
    }
}
