//! Admin-facing operations.
//!
//! `LeadEngine` is stateless between calls: every operation re-reads what it
//! needs from the stores. It owns the wiring between catalog, planning,
//! commit, bulk actions and post-commit notifications.

mod error;

pub use error::{EngineError, Result};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use crate::assignment::{AssignmentTransaction, CommitOptions};
use crate::audit::AuditContext;
use crate::bulk::{BulkAction, BulkExecutor, BulkOutcome, BulkPayload};
use crate::catalog::VendorCatalog;
use crate::distribution::{self, Strategy};
use crate::domain::{
    AssignmentResult, Lead, LeadId, LeadPatch, LeadStatus, NewLead, NewVendor, Vendor, VendorId,
};
use crate::export::{ExportStorage, Exporter};
use crate::notify::{NotificationDispatcher, NotificationEvent, QueuedNotification};
use crate::observability::{Metrics, MetricsSnapshot};
use crate::quota::{QuotaAdjustment, QuotaLedger};
use crate::store::{
    LeadFilter, LeadQuery, LeadStore, LeadSummary, MemoryStore, Page, VendorFilter, VendorStore,
};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_batch_size: usize,
    pub max_conflict_retries: u32,
    pub default_reason: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 500,
            max_conflict_retries: 3,
            default_reason: "lead distribution".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRequest {
    pub lead_ids: Vec<LeadId>,
    pub strategy: Strategy,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub keep_unassigned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignOutcome {
    #[serde(flatten)]
    pub result: AssignmentResult,
    pub summary: String,
    pub notifications: Vec<QueuedNotification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub leads: usize,
    pub vendors: usize,
    pub metrics: MetricsSnapshot,
}

#[derive(Clone)]
pub struct LeadEngine {
    leads: Arc<dyn LeadStore>,
    vendors: Arc<dyn VendorStore>,
    catalog: VendorCatalog,
    ledger: QuotaLedger,
    transaction: AssignmentTransaction,
    bulk: BulkExecutor,
    dispatcher: NotificationDispatcher,
    metrics: Arc<Metrics>,
    settings: EngineSettings,
}

impl LeadEngine {
    pub fn new(
        leads: Arc<dyn LeadStore>,
        vendors: Arc<dyn VendorStore>,
        exporter: Exporter,
        dispatcher: NotificationDispatcher,
        metrics: Arc<Metrics>,
        settings: EngineSettings,
    ) -> Self {
        let ledger = QuotaLedger::new(
            vendors.clone(),
            settings.max_conflict_retries,
            metrics.clone(),
        );
        let transaction = AssignmentTransaction::new(leads.clone(), ledger.clone(), metrics.clone());
        let bulk = BulkExecutor::new(leads.clone(), ledger.clone(), exporter);

        Self {
            leads,
            catalog: VendorCatalog::new(vendors.clone()),
            vendors,
            ledger,
            transaction,
            bulk,
            dispatcher,
            metrics,
            settings,
        }
    }

    /// Memory-backed engine with notifications off, for tests and demos.
    pub fn in_memory(settings: EngineSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(
            store.clone(),
            store,
            Exporter::new(ExportStorage::in_memory(
                "leadflow-exports".to_string(),
                "exports/".to_string(),
            )),
            NotificationDispatcher::disabled(),
            Arc::new(Metrics::new()),
            settings,
        )
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn health(&self) -> Result<HealthReport> {
        Ok(HealthReport {
            leads: self.leads.lead_summary(&LeadFilter::default())?.total,
            vendors: self.vendors.find_vendors(&VendorFilter::default())?.len(),
            metrics: self.metrics.snapshot(),
        })
    }

    pub fn create_lead(&self, draft: NewLead) -> Result<Lead> {
        require("customer.name", &draft.customer.name)?;
        require("customer.phone", &draft.customer.phone)?;
        require("address", &draft.address)?;
        require("service", &draft.service)?;
        if let Some(status) = draft.status {
            if !matches!(status, LeadStatus::Pending | LeadStatus::Available) {
                return Err(EngineError::Validation(format!(
                    "new leads start as pending or available, not {status}"
                )));
            }
        }

        let lead = self.leads.insert_lead(Lead::new(draft, Utc::now()))?;
        info!(lead_id = %lead.id, service = %lead.service, city = ?lead.city, "Created lead");
        Ok(lead)
    }

    pub fn get_lead(&self, id: &LeadId) -> Result<Lead> {
        self.leads
            .get_lead(id)?
            .ok_or_else(|| EngineError::NotFound(format!("lead not found: {id}")))
    }

    pub fn find_leads(&self, query: &LeadQuery) -> Result<Page<Lead>> {
        Ok(self.leads.find_leads(query)?)
    }

    pub fn lead_summary(&self, filter: &LeadFilter) -> Result<LeadSummary> {
        Ok(self.leads.lead_summary(filter)?)
    }

    /// Manual status edit on one lead.
    pub fn update_lead_status(&self, id: &LeadId, status: LeadStatus, performed_by: &str) -> Result<Lead> {
        let lead = self
            .leads
            .update_lead(id, LeadPatch::status(status, performed_by, Utc::now()))?;
        info!(lead_id = %id, %status, performed_by, "Updated lead status");
        Ok(lead)
    }

    /// Register a vendor. A non-zero starting quota is granted through the
    /// ledger so it shows up as the first history entry.
    pub fn register_vendor(&self, draft: NewVendor, performed_by: &str) -> Result<Vendor> {
        require("business_name", &draft.business_name)?;
        require("user.name", &draft.user.name)?;
        require("user.email", &draft.user.email)?;
        if draft.services.iter().all(|service| service.trim().is_empty()) {
            return Err(EngineError::Validation("services must not be empty".to_string()));
        }
        if !(0.0..=5.0).contains(&draft.rating) {
            return Err(EngineError::Validation(format!(
                "rating must be between 0 and 5, got {}",
                draft.rating
            )));
        }

        let initial_quota = draft.quota;
        let vendor = self.vendors.insert_vendor(Vendor::new(draft, Utc::now()))?;
        info!(vendor_id = %vendor.id, business_name = %vendor.business_name, "Registered vendor");

        if initial_quota == 0 {
            return Ok(vendor);
        }
        let ctx = AuditContext::new("initial quota", performed_by);
        Ok(self.ledger.top_up(&vendor.id, initial_quota, &ctx)?)
    }

    pub fn get_vendor(&self, id: &VendorId) -> Result<Vendor> {
        self.catalog
            .get(id)?
            .ok_or_else(|| EngineError::NotFound(format!("vendor not found: {id}")))
    }

    pub fn list_vendors(&self, filter: &VendorFilter) -> Result<Vec<Vendor>> {
        Ok(self.catalog.list(filter)?)
    }

    /// Plan against one catalog snapshot, commit pair by pair, then queue one
    /// notification per vendor that received leads.
    pub fn assign_leads(&self, request: AssignRequest, performed_by: &str) -> Result<AssignOutcome> {
        self.check_batch(&request.lead_ids)?;
        match &request.strategy {
            Strategy::Single { vendor_id } if vendor_id.as_str().trim().is_empty() => {
                return Err(EngineError::Validation("strategy.vendor_id is required".to_string()));
            }
            Strategy::SpecificList { vendor_ids } if vendor_ids.is_empty() => {
                return Err(EngineError::Validation(
                    "strategy.vendor_ids must not be empty".to_string(),
                ));
            }
            _ => {}
        }

        let mut seen = BTreeSet::new();
        let mut leads = Vec::with_capacity(request.lead_ids.len());
        let mut missing = Vec::new();
        for lead_id in request.lead_ids.iter().filter(|id| seen.insert(*id)) {
            match self.leads.get_lead(lead_id)? {
                Some(lead) => leads.push(lead),
                None => missing.push(lead_id.clone()),
            }
        }

        let snapshot = match request.strategy.catalog_mode() {
            Some(mode) => self.catalog.eligible_vendors(&leads, &mode)?,
            None => Vec::new(),
        };
        let plan = distribution::plan(&request.strategy, &leads, &snapshot).with_missing(missing);

        info!(
            strategy = request.strategy.label(),
            leads = leads.len(),
            vendors = snapshot.len(),
            pairs = plan.pairs.len(),
            unassignable = plan.unassignable.len(),
            performed_by,
            "Planned lead distribution"
        );

        let options = CommitOptions {
            reason: request
                .reason
                .filter(|reason| !reason.trim().is_empty())
                .unwrap_or_else(|| self.settings.default_reason.clone()),
            performed_by: performed_by.to_string(),
            keep_unassigned: request.keep_unassigned,
        };
        let result = self.transaction.commit(&plan, &options);

        let notifications = result
            .affected_vendors()
            .map(|tally| {
                self.dispatcher.dispatch(NotificationEvent::LeadsAssigned {
                    vendor_id: tally.vendor_id.clone(),
                    count: tally.count,
                })
            })
            .collect();

        Ok(AssignOutcome {
            summary: result.summary_line(),
            result,
            notifications,
        })
    }

    pub fn adjust_vendor_quota(
        &self,
        vendor_id: &VendorId,
        adjustment: QuotaAdjustment,
        reason: Option<String>,
        performed_by: &str,
    ) -> Result<Vendor> {
        let reason = reason
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or_else(|| match adjustment {
                QuotaAdjustment::Add(_) => "quota top-up".to_string(),
                QuotaAdjustment::Remove(_) => "quota draw-down".to_string(),
            });
        let ctx = AuditContext::new(reason, performed_by);
        let vendor = self.ledger.adjust(vendor_id, adjustment, &ctx)?;

        self.dispatcher.dispatch(NotificationEvent::QuotaAdjusted {
            vendor_id: vendor.id.clone(),
            quota: vendor.quota,
            used: vendor.used,
        });
        Ok(vendor)
    }

    /// Validate the action's payload first; a missing field aborts before any
    /// lead is touched.
    pub async fn bulk_lead_action(
        &self,
        lead_ids: &[LeadId],
        action: BulkAction,
        payload: &BulkPayload,
        performed_by: &str,
    ) -> Result<BulkOutcome> {
        self.check_batch(lead_ids)?;
        let validated = action.validate(payload)?;

        let mut seen = BTreeSet::new();
        let unique: Vec<LeadId> = lead_ids
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();

        info!(action = action.label(), leads = unique.len(), performed_by, "Running bulk lead action");
        Ok(self.bulk.apply(&unique, &validated, performed_by).await)
    }

    fn check_batch(&self, lead_ids: &[LeadId]) -> Result<()> {
        if lead_ids.is_empty() {
            return Err(EngineError::Validation("lead_ids must not be empty".to_string()));
        }
        if lead_ids.len() > self.settings.max_batch_size {
            return Err(EngineError::Validation(format!(
                "at most {} leads per call, got {}",
                self.settings.max_batch_size,
                lead_ids.len()
            )));
        }
        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EngineError::Validation(format!("{field} is required")));
    }
    Ok(())
}
