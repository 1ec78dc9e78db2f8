use std::path::Path;
use std::sync::Arc;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::domain::{Lead, LeadId, LeadPatch, Vendor, VendorHistoryEntry, VendorId};

use super::error::{Result, StoreError};
use super::keys::{decode_lead_key, decode_vendor_key, encode_lead_key, encode_vendor_key};
use super::locks::StripedLocks;
use super::query::{self, LeadFilter, LeadQuery, LeadSummary, Page, VendorFilter};
use super::traits::{LeadStore, VendorStore, apply_adjustment};

/// Fjall-backed persistent storage for leads and vendors
#[derive(Clone)]
pub struct FjallStore {
    keyspace: Keyspace,
    leads: PartitionHandle,
    vendors: PartitionHandle,
    lead_locks: Arc<StripedLocks>,
    vendor_locks: Arc<StripedLocks>,
}

impl FjallStore {
    /// Open or create a Fjall store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening Fjall store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let leads = keyspace.open_partition("leads", PartitionCreateOptions::default())?;
        let vendors = keyspace.open_partition("vendors", PartitionCreateOptions::default())?;

        info!("Fjall store opened successfully");
        Ok(Self {
            keyspace,
            leads,
            vendors,
            lead_locks: Arc::new(StripedLocks::new()),
            vendor_locks: Arc::new(StripedLocks::new()),
        })
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(partition: &PartitionHandle, key: Vec<u8>) -> Result<Option<T>> {
        match partition.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(partition: &PartitionHandle, key: Vec<u8>, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        partition.insert(key, bytes)?;
        Ok(())
    }

    fn scan_leads(&self) -> Result<Vec<Lead>> {
        let mut leads = Vec::new();
        for item in self.leads.iter() {
            let (key, value) = item?;
            if decode_lead_key(&key).is_none() {
                warn!("Skipping malformed lead key");
                continue;
            }
            leads.push(serde_json::from_slice(&value)?);
        }
        Ok(leads)
    }

    fn scan_vendors(&self) -> Result<Vec<Vendor>> {
        let mut vendors = Vec::new();
        for item in self.vendors.iter() {
            let (key, value) = item?;
            if decode_vendor_key(&key).is_none() {
                warn!("Skipping malformed vendor key");
                continue;
            }
            vendors.push(serde_json::from_slice(&value)?);
        }
        Ok(vendors)
    }
}

impl LeadStore for FjallStore {
    fn insert_lead(&self, lead: Lead) -> Result<Lead> {
        let _guard = self.lead_locks.lock(lead.id.as_str())?;
        let key = encode_lead_key(lead.id.as_str());
        if self.leads.get(key.clone())?.is_some() {
            return Err(StoreError::AlreadyExists {
                kind: "lead",
                id: lead.id.to_string(),
            });
        }
        Self::write(&self.leads, key, &lead)?;
        debug!(lead_id = %lead.id, "Inserted lead");
        Ok(lead)
    }

    fn get_lead(&self, id: &LeadId) -> Result<Option<Lead>> {
        Self::read(&self.leads, encode_lead_key(id.as_str()))
    }

    fn find_leads(&self, query: &LeadQuery) -> Result<Page<Lead>> {
        Ok(query::run_query(self.scan_leads()?, query))
    }

    fn update_lead(&self, id: &LeadId, patch: LeadPatch) -> Result<Lead> {
        let _guard = self.lead_locks.lock(id.as_str())?;
        let key = encode_lead_key(id.as_str());
        let mut lead: Lead =
            Self::read(&self.leads, key.clone())?.ok_or_else(|| StoreError::lead_not_found(id))?;
        lead.apply(patch);
        Self::write(&self.leads, key, &lead)?;
        debug!(lead_id = %id, status = %lead.status, "Updated lead");
        Ok(lead)
    }

    fn delete_lead(&self, id: &LeadId) -> Result<Lead> {
        let _guard = self.lead_locks.lock(id.as_str())?;
        let key = encode_lead_key(id.as_str());
        let lead: Lead =
            Self::read(&self.leads, key.clone())?.ok_or_else(|| StoreError::lead_not_found(id))?;
        self.leads.remove(key)?;
        debug!(lead_id = %id, "Deleted lead");
        Ok(lead)
    }

    fn lead_summary(&self, filter: &LeadFilter) -> Result<LeadSummary> {
        let leads = self.scan_leads()?;
        Ok(query::summarize(&leads, filter))
    }
}

impl VendorStore for FjallStore {
    fn insert_vendor(&self, vendor: Vendor) -> Result<Vendor> {
        let _guard = self.vendor_locks.lock(vendor.id.as_str())?;
        let key = encode_vendor_key(vendor.id.as_str());
        if self.vendors.get(key.clone())?.is_some() {
            return Err(StoreError::AlreadyExists {
                kind: "vendor",
                id: vendor.id.to_string(),
            });
        }
        Self::write(&self.vendors, key, &vendor)?;
        debug!(vendor_id = %vendor.id, "Inserted vendor");
        Ok(vendor)
    }

    fn get_vendor(&self, id: &VendorId) -> Result<Option<Vendor>> {
        Self::read(&self.vendors, encode_vendor_key(id.as_str()))
    }

    fn find_vendors(&self, filter: &VendorFilter) -> Result<Vec<Vendor>> {
        Ok(self
            .scan_vendors()?
            .into_iter()
            .filter(|vendor| filter.matches(vendor))
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
        let _guard = self.vendor_locks.lock(id.as_str())?;
        let key = encode_vendor_key(id.as_str());
        let mut vendor: Vendor = Self::read(&self.vendors, key.clone())?
            .ok_or_else(|| StoreError::vendor_not_found(id))?;

        apply_adjustment(&mut vendor, expected_version, delta_used, delta_quota, entry)?;
        Self::write(&self.vendors, key, &vendor)?;
        debug!(
            vendor_id = %id,
            used = vendor.used,
            quota = vendor.quota,
            version = vendor.version,
            "Adjusted vendor quota"
        );
        Ok(vendor)
    }

    fn clear_push_token(&self, id: &VendorId) -> Result<()> {
        let _guard = self.vendor_locks.lock(id.as_str())?;
        let key = encode_vendor_key(id.as_str());
        let mut vendor: Vendor = Self::read(&self.vendors, key.clone())?
            .ok_or_else(|| StoreError::vendor_not_found(id))?;
        vendor.user.push_token = None;
        vendor.version += 1;
        Self::write(&self.vendors, key, &vendor)?;
        info!(vendor_id = %id, "Cleared invalid push token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Customer, HistoryKind, LeadStatus, NewLead, NewVendor, VendorUser};
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_store() -> (FjallStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStore::open(temp_dir.path().join("test_store")).unwrap();
        (store, temp_dir)
    }

    fn create_test_lead(service: &str) -> Lead {
        Lead::new(
            NewLead {
                customer: Customer {
                    name: "Pat".to_string(),
                    phone: "555-0199".to_string(),
                    email: Some("pat@example.com".to_string()),
                },
                address: "77 Pine St, Denver, CO 80202".to_string(),
                service: service.to_string(),
                sub_service: None,
                description: Some("Leaking sink".to_string()),
                status: None,
                priority: None,
            },
            Utc::now(),
        )
    }

    fn create_test_vendor() -> Vendor {
        Vendor::new(
            NewVendor {
                user: VendorUser {
                    name: "Mo".to_string(),
                    email: "mo@example.com".to_string(),
                    phone: None,
                    push_token: Some("push-abc".to_string()),
                },
                business_name: "Mo's Pipes".to_string(),
                services: vec!["Plumbing".to_string()],
                address: "3 Valve Ct, Denver, CO".to_string(),
                rating: 4.2,
                quota: 0,
            },
            Utc::now(),
        )
    }

    fn grant_entry(vendor: &Vendor, count: u32) -> VendorHistoryEntry {
        VendorHistoryEntry {
            kind: HistoryKind::Add,
            count,
            before_used: vendor.used,
            after_used: vendor.used,
            before_quota: vendor.quota,
            after_quota: vendor.quota + count,
            reason: "initial".to_string(),
            lead_id: None,
            timestamp: Utc::now(),
            performed_by: "tester".to_string(),
        }
    }

    #[test]
    fn test_insert_and_get_lead() {
        let (store, _temp) = create_test_store();
        let lead = store.insert_lead(create_test_lead("Plumbing")).unwrap();

        let retrieved = store.get_lead(&lead.id).unwrap().unwrap();
        assert_eq!(retrieved.id, lead.id);
        assert_eq!(retrieved.city.as_deref(), Some("Denver"));
        assert!(store.insert_lead(lead).is_err());
    }

    #[test]
    fn test_get_nonexistent_lead() {
        let (store, _temp) = create_test_store();
        assert!(store.get_lead(&LeadId::from("missing")).unwrap().is_none());
    }

    #[test]
    fn test_update_and_delete_lead() {
        let (store, _temp) = create_test_store();
        let lead = store.insert_lead(create_test_lead("Plumbing")).unwrap();

        let updated = store
            .update_lead(
                &lead.id,
                LeadPatch::assignment(VendorId::from("v1"), LeadStatus::Assigned, "admin", Utc::now()),
            )
            .unwrap();
        assert!(updated.is_assigned);

        let removed = store.delete_lead(&lead.id).unwrap();
        assert_eq!(removed.assigned_vendors, vec![VendorId::from("v1")]);
        assert!(store.delete_lead(&lead.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_find_and_summary() {
        let (store, _temp) = create_test_store();
        store.insert_lead(create_test_lead("Plumbing")).unwrap();
        store.insert_lead(create_test_lead("Plumbing")).unwrap();
        store.insert_lead(create_test_lead("Painting")).unwrap();

        let page = store
            .find_leads(&LeadQuery {
                filter: LeadFilter {
                    service: Some("plumbing".to_string()),
                    ..LeadFilter::default()
                },
                ..LeadQuery::default()
            })
            .unwrap();
        assert_eq!(page.total, 2);

        let summary = store.lead_summary(&LeadFilter::default()).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.unassigned, 3);
    }

    #[test]
    fn test_adjust_quota_cas() {
        let (store, _temp) = create_test_store();
        let vendor = store.insert_vendor(create_test_vendor()).unwrap();

        let updated = store
            .adjust_quota(&vendor.id, 0, 0, 10, grant_entry(&vendor, 10))
            .unwrap();
        assert_eq!(updated.quota, 10);
        assert_eq!(updated.version, 1);

        // Stale version is rejected and nothing is written.
        let err = store
            .adjust_quota(&vendor.id, 0, 0, 10, grant_entry(&updated, 10))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        let stored = store.get_vendor(&vendor.id).unwrap().unwrap();
        assert_eq!(stored.quota, 10);
        assert_eq!(stored.history.len(), 1);
    }

    #[test]
    fn test_find_vendors_and_clear_token() {
        let (store, _temp) = create_test_store();
        let vendor = store.insert_vendor(create_test_vendor()).unwrap();

        let eligible = store.find_vendors(&VendorFilter::eligible(Some("Plumbing"))).unwrap();
        assert!(eligible.is_empty(), "zero quota vendors are not eligible");

        store
            .adjust_quota(&vendor.id, 0, 0, 1, grant_entry(&vendor, 1))
            .unwrap();
        let eligible = store.find_vendors(&VendorFilter::eligible(Some("plumbing"))).unwrap();
        assert_eq!(eligible.len(), 1);

        store.clear_push_token(&vendor.id).unwrap();
        let stored = store.get_vendor(&vendor.id).unwrap().unwrap();
        assert!(stored.user.push_token.is_none());
    }

    #[test]
    fn test_persist_keeps_documents_readable() {
        let (store, _temp) = create_test_store();
        let lead = store.insert_lead(create_test_lead("Plumbing")).unwrap();
        store.insert_vendor(create_test_vendor()).unwrap();
        store.persist().unwrap();

        assert_eq!(store.get_lead(&lead.id).unwrap(), Some(lead));
        assert_eq!(store.find_vendors(&VendorFilter::default()).unwrap().len(), 1);
    }
}
