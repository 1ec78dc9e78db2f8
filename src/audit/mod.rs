//! Audit trail: construction and verification of history entries.
//!
//! Vendor history entries are built here from the vendor snapshot they apply
//! to, so the before/after fields always describe exactly one mutation. The
//! store rejects an entry whose snapshot no longer matches.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{HistoryKind, Lead, LeadId, Vendor, VendorHistoryEntry, VendorId};

/// Who and why, shared by every entry written for one operation.
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub reason: String,
    pub performed_by: String,
    pub at: DateTime<Utc>,
}

impl AuditContext {
    pub fn new(reason: impl Into<String>, performed_by: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            performed_by: performed_by.into(),
            at: Utc::now(),
        }
    }

    pub fn with_reason(&self, reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            ..self.clone()
        }
    }
}

/// One unit of `used` consumed by `lead_id`.
pub fn assignment_entry(vendor: &Vendor, lead_id: &LeadId, ctx: &AuditContext) -> VendorHistoryEntry {
    entry(
        vendor,
        HistoryKind::Assign,
        1,
        vendor.used.saturating_add(1),
        vendor.quota,
        Some(lead_id),
        ctx,
    )
}

/// One unit of `used` returned, either by a lead delete or an assignment rollback.
pub fn release_entry(vendor: &Vendor, lead_id: &LeadId, ctx: &AuditContext) -> VendorHistoryEntry {
    entry(
        vendor,
        HistoryKind::Release,
        1,
        vendor.used.saturating_sub(1),
        vendor.quota,
        Some(lead_id),
        ctx,
    )
}

/// Quota top-up (`Add`) or draw-down (`Remove`) of `count` units.
pub fn quota_entry(
    vendor: &Vendor,
    kind: HistoryKind,
    count: u32,
    ctx: &AuditContext,
) -> VendorHistoryEntry {
    let after_quota = match kind {
        HistoryKind::Remove => vendor.quota.saturating_sub(count),
        _ => vendor.quota.saturating_add(count),
    };
    entry(vendor, kind, count, vendor.used, after_quota, None, ctx)
}

fn entry(
    vendor: &Vendor,
    kind: HistoryKind,
    count: u32,
    after_used: u32,
    after_quota: u32,
    lead_id: Option<&LeadId>,
    ctx: &AuditContext,
) -> VendorHistoryEntry {
    VendorHistoryEntry {
        kind,
        count,
        before_used: vendor.used,
        after_used,
        before_quota: vendor.quota,
        after_quota,
        reason: ctx.reason.clone(),
        lead_id: lead_id.cloned(),
        timestamp: ctx.at,
        performed_by: ctx.performed_by.clone(),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuditViolation {
    #[error("vendor {vendor_id} entry {index}: starts at used={used} quota={quota}, previous state differs")]
    Gap {
        vendor_id: VendorId,
        index: usize,
        used: u32,
        quota: u32,
    },

    #[error("vendor {vendor_id} entry {index}: {kind:?} x{count} does not match its before/after fields")]
    Mismatch {
        vendor_id: VendorId,
        index: usize,
        kind: HistoryKind,
        count: u32,
    },

    #[error("vendor {vendor_id} entry {index}: used exceeds quota")]
    Overdrawn { vendor_id: VendorId, index: usize },

    #[error("vendor {vendor_id}: history ends at used={used} quota={quota}, document has used={actual_used} quota={actual_quota}")]
    Drift {
        vendor_id: VendorId,
        used: u32,
        quota: u32,
        actual_used: u32,
        actual_quota: u32,
    },

    #[error("lead {lead_id} progress entry {index} does not continue from the previous status")]
    BrokenProgress { lead_id: LeadId, index: usize },
}

/// Replay a vendor's history from zero and check every entry describes a
/// single valid mutation ending at the document's current counters.
pub fn verify_vendor_history(vendor: &Vendor) -> Result<(), AuditViolation> {
    let (mut used, mut quota) = (0u32, 0u32);

    for (index, entry) in vendor.history.iter().enumerate() {
        if entry.before_used != used || entry.before_quota != quota {
            return Err(AuditViolation::Gap {
                vendor_id: vendor.id.clone(),
                index,
                used: entry.before_used,
                quota: entry.before_quota,
            });
        }

        let count = i64::from(entry.count);
        let expected = match entry.kind {
            HistoryKind::Add => (0, count),
            HistoryKind::Remove => (0, -count),
            HistoryKind::Assign => (count, 0),
            HistoryKind::Release => (-count, 0),
        };
        if (entry.delta_used(), entry.delta_quota()) != expected {
            return Err(AuditViolation::Mismatch {
                vendor_id: vendor.id.clone(),
                index,
                kind: entry.kind,
                count: entry.count,
            });
        }

        if entry.after_used > entry.after_quota {
            return Err(AuditViolation::Overdrawn {
                vendor_id: vendor.id.clone(),
                index,
            });
        }

        used = entry.after_used;
        quota = entry.after_quota;
    }

    if used != vendor.used || quota != vendor.quota {
        return Err(AuditViolation::Drift {
            vendor_id: vendor.id.clone(),
            used,
            quota,
            actual_used: vendor.used,
            actual_quota: vendor.quota,
        });
    }

    Ok(())
}

/// Progress entries must chain: each `from_status` equals the previous
/// `to_status`, and the last one equals the lead's current status.
pub fn verify_lead_progress(lead: &Lead) -> Result<(), AuditViolation> {
    let mut previous = None;
    for (index, entry) in lead.progress_history.iter().enumerate() {
        if previous.is_some_and(|status| status != entry.from_status) {
            return Err(AuditViolation::BrokenProgress {
                lead_id: lead.id.clone(),
                index,
            });
        }
        previous = Some(entry.to_status);
    }

    match previous {
        Some(status) if status != lead.status => Err(AuditViolation::BrokenProgress {
            lead_id: lead.id.clone(),
            index: lead.progress_history.len(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Customer, LeadPatch, LeadStatus, NewLead, NewVendor, VendorUser};

    fn vendor() -> Vendor {
        Vendor::new(
            NewVendor {
                user: VendorUser {
                    name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                    phone: None,
                    push_token: None,
                },
                business_name: "Ada Electric".to_string(),
                services: vec!["Electrical".to_string()],
                address: "4 Volt Rd, Tulsa, OK".to_string(),
                rating: 4.5,
                quota: 0,
            },
            Utc::now(),
        )
    }

    fn push(vendor: &mut Vendor, entry: VendorHistoryEntry) {
        vendor.used = entry.after_used;
        vendor.quota = entry.after_quota;
        vendor.history.push(entry);
    }

    #[test]
    fn quota_entry_snapshots_before_and_after() {
        let mut v = vendor();
        v.quota = 50;
        let ctx = AuditContext::new("top-up", "admin");
        let entry = quota_entry(&v, HistoryKind::Add, 20, &ctx);
        assert_eq!(entry.before_quota, 50);
        assert_eq!(entry.after_quota, 70);
        assert_eq!(entry.count, 20);
        assert_eq!(entry.kind, HistoryKind::Add);
        assert!(entry.lead_id.is_none());
    }

    #[test]
    fn consistent_history_verifies() {
        let mut v = vendor();
        let ctx = AuditContext::new("test", "admin");
        let lead = LeadId::from("l1");

        let e = quota_entry(&v, HistoryKind::Add, 3, &ctx);
        push(&mut v, e);
        let e = assignment_entry(&v, &lead, &ctx);
        push(&mut v, e);
        let e = release_entry(&v, &lead, &ctx);
        push(&mut v, e);
        let e = quota_entry(&v, HistoryKind::Remove, 1, &ctx);
        push(&mut v, e);

        assert_eq!((v.used, v.quota), (0, 2));
        assert_eq!(verify_vendor_history(&v), Ok(()));
    }

    #[test]
    fn detects_drift_and_gaps() {
        let mut v = vendor();
        let ctx = AuditContext::new("test", "admin");
        let e = quota_entry(&v, HistoryKind::Add, 5, &ctx);
        push(&mut v, e);

        v.used = 2;
        assert!(matches!(
            verify_vendor_history(&v),
            Err(AuditViolation::Drift { .. })
        ));

        let e = quota_entry(&v, HistoryKind::Add, 1, &ctx);
        v.history.push(e);
        assert!(matches!(
            verify_vendor_history(&v),
            Err(AuditViolation::Gap { index: 1, .. })
        ));
    }

    #[test]
    fn detects_mismatched_kind() {
        let mut v = vendor();
        let ctx = AuditContext::new("test", "admin");
        let mut e = quota_entry(&v, HistoryKind::Add, 5, &ctx);
        e.kind = HistoryKind::Assign;
        push(&mut v, e);
        assert!(matches!(
            verify_vendor_history(&v),
            Err(AuditViolation::Mismatch { index: 0, .. })
        ));
    }

    #[test]
    fn lead_progress_chains() {
        let mut lead = Lead::new(
            NewLead {
                customer: Customer {
                    name: "Rae".to_string(),
                    phone: "555-0142".to_string(),
                    email: None,
                },
                address: "8 Bay St, Tampa, FL".to_string(),
                service: "Electrical".to_string(),
                sub_service: None,
                description: None,
                status: None,
                priority: None,
            },
            Utc::now(),
        );
        lead.apply(LeadPatch::status(LeadStatus::Assigned, "admin", Utc::now()));
        lead.apply(LeadPatch::status(LeadStatus::Contacted, "admin", Utc::now()));
        assert_eq!(verify_lead_progress(&lead), Ok(()));

        lead.status = LeadStatus::Completed;
        assert!(verify_lead_progress(&lead).is_err());
    }
}
