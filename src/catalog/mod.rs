//! Read-only view of vendors eligible to receive leads.
//!
//! Order follows the store's iteration order and is not promised to be stable
//! between calls. Strategies that index into the list take one snapshot per
//! distribution call.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::domain::{Lead, Vendor, VendorId};
use crate::store::{Result, VendorFilter, VendorStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogMode {
    /// Every active vendor with remaining capacity.
    AnyActive,
    /// Active vendors with capacity offering one service.
    ByService(String),
    /// Active vendors with capacity offering at least one of the leads' services.
    MatchingLeads,
}

#[derive(Clone)]
pub struct VendorCatalog {
    vendors: Arc<dyn VendorStore>,
}

impl VendorCatalog {
    pub fn new(vendors: Arc<dyn VendorStore>) -> Self {
        Self { vendors }
    }

    pub fn eligible_vendors(&self, leads: &[Lead], mode: &CatalogMode) -> Result<Vec<Vendor>> {
        let snapshot = match mode {
            CatalogMode::AnyActive => self.vendors.find_vendors(&VendorFilter::eligible(None))?,
            CatalogMode::ByService(service) => self
                .vendors
                .find_vendors(&VendorFilter::eligible(Some(service)))?,
            CatalogMode::MatchingLeads => {
                let services: BTreeSet<String> = leads
                    .iter()
                    .map(|lead| lead.service.to_lowercase())
                    .collect();
                self.vendors
                    .find_vendors(&VendorFilter::eligible(None))?
                    .into_iter()
                    .filter(|vendor| services.iter().any(|service| vendor.offers(service)))
                    .collect()
            }
        };

        debug!(?mode, count = snapshot.len(), "Vendor catalog snapshot");
        Ok(snapshot)
    }

    pub fn get(&self, id: &VendorId) -> Result<Option<Vendor>> {
        self.vendors.get_vendor(id)
    }

    /// Listing for admin views; unlike `eligible_vendors` it can include
    /// inactive and exhausted vendors.
    pub fn list(&self, filter: &VendorFilter) -> Result<Vec<Vendor>> {
        self.vendors.find_vendors(filter)
    }
}
