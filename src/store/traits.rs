use crate::domain::{Lead, LeadId, LeadPatch, Vendor, VendorHistoryEntry, VendorId};

use super::error::{Result, StoreError};
use super::query::{LeadFilter, LeadQuery, LeadSummary, Page, VendorFilter};

/// Document store for leads. Every write is atomic for a single lead.
pub trait LeadStore: Send + Sync {
    fn insert_lead(&self, lead: Lead) -> Result<Lead>;
    fn get_lead(&self, id: &LeadId) -> Result<Option<Lead>>;
    fn find_leads(&self, query: &LeadQuery) -> Result<Page<Lead>>;
    /// Apply a patch to the latest stored version. Fails with `NotFound` if the
    /// lead does not exist.
    fn update_lead(&self, id: &LeadId, patch: LeadPatch) -> Result<Lead>;
    /// Remove a lead, returning the document as it was. Fails with `NotFound`
    /// if it is already gone.
    fn delete_lead(&self, id: &LeadId) -> Result<Lead>;
    fn lead_summary(&self, filter: &LeadFilter) -> Result<LeadSummary>;
}

/// Document store for vendors.
pub trait VendorStore: Send + Sync {
    fn insert_vendor(&self, vendor: Vendor) -> Result<Vendor>;
    fn get_vendor(&self, id: &VendorId) -> Result<Option<Vendor>>;
    fn find_vendors(&self, filter: &VendorFilter) -> Result<Vec<Vendor>>;
    /// Compare-and-swap quota write: applies the deltas and appends `entry` only
    /// if the stored version still equals `expected_version`. Otherwise returns
    /// `StoreError::Conflict` and leaves the document untouched.
    fn adjust_quota(
        &self,
        id: &VendorId,
        expected_version: u64,
        delta_used: i64,
        delta_quota: i64,
        entry: VendorHistoryEntry,
    ) -> Result<Vendor>;
    fn clear_push_token(&self, id: &VendorId) -> Result<()>;
}

/// Shared CAS body for vendor quota writes. Caller holds the document's write lock.
pub(crate) fn apply_adjustment(
    vendor: &mut Vendor,
    expected_version: u64,
    delta_used: i64,
    delta_quota: i64,
    entry: VendorHistoryEntry,
) -> Result<()> {
    if vendor.version != expected_version {
        return Err(StoreError::Conflict {
            vendor_id: vendor.id.clone(),
            expected: expected_version,
            actual: vendor.version,
        });
    }

    let invariant = |detail: String| StoreError::Invariant {
        vendor_id: vendor.id.clone(),
        detail,
    };

    let used = u32::try_from(i64::from(vendor.used) + delta_used)
        .map_err(|_| invariant(format!("used {} + {} out of range", vendor.used, delta_used)))?;
    let quota = u32::try_from(i64::from(vendor.quota) + delta_quota).map_err(|_| {
        invariant(format!("quota {} + {} out of range", vendor.quota, delta_quota))
    })?;

    if used > quota {
        return Err(invariant(format!("used {used} would exceed quota {quota}")));
    }

    if entry.before_used != vendor.used
        || entry.before_quota != vendor.quota
        || entry.after_used != used
        || entry.after_quota != quota
    {
        return Err(invariant(
            "history entry snapshot does not match the mutation".to_string(),
        ));
    }

    vendor.used = used;
    vendor.quota = quota;
    vendor.updated_at = entry.timestamp;
    vendor.history.push(entry);
    vendor.version += 1;
    Ok(())
}
