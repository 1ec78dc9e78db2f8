use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;

use crate::domain::{Lead, LeadId, LeadPatch, Vendor, VendorHistoryEntry, VendorId};

use super::error::{Result, StoreError};
use super::query::{self, LeadFilter, LeadQuery, LeadSummary, Page, VendorFilter};
use super::traits::{LeadStore, VendorStore, apply_adjustment};

/// In-process store for tests, demos, and single-node development.
#[derive(Default)]
pub struct MemoryStore {
    leads: RwLock<BTreeMap<LeadId, Lead>>,
    vendors: RwLock<BTreeMap<VendorId, Vendor>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeadStore for MemoryStore {
    fn insert_lead(&self, lead: Lead) -> Result<Lead> {
        let mut leads = self.leads.write().map_err(|_| StoreError::LockPoisoned)?;
        if leads.contains_key(&lead.id) {
            return Err(StoreError::AlreadyExists {
                kind: "lead",
                id: lead.id.to_string(),
            });
        }
        leads.insert(lead.id.clone(), lead.clone());
        debug!(lead_id = %lead.id, "Inserted lead");
        Ok(lead)
    }

    fn get_lead(&self, id: &LeadId) -> Result<Option<Lead>> {
        let leads = self.leads.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(leads.get(id).cloned())
    }

    fn find_leads(&self, query: &LeadQuery) -> Result<Page<Lead>> {
        let leads = self.leads.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(query::run_query(leads.values().cloned(), query))
    }

    fn update_lead(&self, id: &LeadId, patch: LeadPatch) -> Result<Lead> {
        let mut leads = self.leads.write().map_err(|_| StoreError::LockPoisoned)?;
        let lead = leads
            .get_mut(id)
            .ok_or_else(|| StoreError::lead_not_found(id))?;
        lead.apply(patch);
        Ok(lead.clone())
    }

    fn delete_lead(&self, id: &LeadId) -> Result<Lead> {
        let mut leads = self.leads.write().map_err(|_| StoreError::LockPoisoned)?;
        leads.remove(id).ok_or_else(|| StoreError::lead_not_found(id))
    }

    fn lead_summary(&self, filter: &LeadFilter) -> Result<LeadSummary> {
        let leads = self.leads.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(query::summarize(leads.values(), filter))
    }
}

impl VendorStore for MemoryStore {
    fn insert_vendor(&self, vendor: Vendor) -> Result<Vendor> {
        let mut vendors = self.vendors.write().map_err(|_| StoreError::LockPoisoned)?;
        if vendors.contains_key(&vendor.id) {
            return Err(StoreError::AlreadyExists {
                kind: "vendor",
                id: vendor.id.to_string(),
            });
        }
        vendors.insert(vendor.id.clone(), vendor.clone());
        debug!(vendor_id = %vendor.id, "Inserted vendor");
        Ok(vendor)
    }

    fn get_vendor(&self, id: &VendorId) -> Result<Option<Vendor>> {
        let vendors = self.vendors.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(vendors.get(id).cloned())
    }

    fn find_vendors(&self, filter: &VendorFilter) -> Result<Vec<Vendor>> {
        let vendors = self.vendors.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(vendors
            .values()
            .filter(|vendor| filter.matches(vendor))
            .cloned()
            .collect())
    }

    fn adjust_quota(
        &self,
        id: &VendorId,
        expected_version: u64,
        delta_used: i64,
        delta_quota: i64,
        entry: VendorHistoryEntry,
    ) -> Result<Vendor> {
        let mut vendors = self.vendors.write().map_err(|_| StoreError::LockPoisoned)?;
        let vendor = vendors
            .get_mut(id)
            .ok_or_else(|| StoreError::vendor_not_found(id))?;

        // Work on a copy so a rejected adjustment leaves the stored document untouched.
        let mut updated = vendor.clone();
        apply_adjustment(&mut updated, expected_version, delta_used, delta_quota, entry)?;
        *vendor = updated.clone();
        Ok(updated)
    }

    fn clear_push_token(&self, id: &VendorId) -> Result<()> {
        let mut vendors = self.vendors.write().map_err(|_| StoreError::LockPoisoned)?;
        let vendor = vendors
            .get_mut(id)
            .ok_or_else(|| StoreError::vendor_not_found(id))?;
        vendor.user.push_token = None;
        vendor.version += 1;
        Ok(())
    }
}
