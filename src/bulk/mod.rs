//! Bulk lifecycle operations over a batch of leads.
//!
//! The action's required payload field is validated before any lead is
//! touched. Once validation passes, each lead succeeds or fails on its own.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::audit::AuditContext;
use crate::domain::{
    FailureReason, Lead, LeadId, LeadPatch, LeadStatus, ParseEnumError, Priority,
};
use crate::export::{ExportFormat, ExportReceipt, Exporter};
use crate::quota::QuotaLedger;
use crate::store::LeadStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    UpdateStatus,
    AddNote,
    SetPriority,
    Export,
    Delete,
}

/// Loosely typed payload as it arrives from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BulkValidationError {
    #[error("{action} requires payload.{field}")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

/// A bulk action whose payload has been checked and parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedAction {
    UpdateStatus(LeadStatus),
    AddNote(String),
    SetPriority(Priority),
    Export(ExportFormat),
    Delete,
}

impl BulkAction {
    pub const fn label(self) -> &'static str {
        match self {
            BulkAction::UpdateStatus => "update_status",
            BulkAction::AddNote => "add_note",
            BulkAction::SetPriority => "set_priority",
            BulkAction::Export => "export",
            BulkAction::Delete => "delete",
        }
    }

    pub fn validate(self, payload: &BulkPayload) -> Result<ValidatedAction, BulkValidationError> {
        let required = |field: &'static str, value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or(BulkValidationError::MissingField {
                    action: self.label(),
                    field,
                })
        };

        match self {
            BulkAction::UpdateStatus => {
                let status = required("status", &payload.status)?;
                status
                    .parse()
                    .map(ValidatedAction::UpdateStatus)
                    .map_err(|e: ParseEnumError| BulkValidationError::InvalidField {
                        field: "status",
                        message: e.to_string(),
                    })
            }
            BulkAction::AddNote => required("note", &payload.note).map(ValidatedAction::AddNote),
            BulkAction::SetPriority => {
                let priority = required("priority", &payload.priority)?;
                priority
                    .parse()
                    .map(ValidatedAction::SetPriority)
                    .map_err(|e: ParseEnumError| BulkValidationError::InvalidField {
                        field: "priority",
                        message: e.to_string(),
                    })
            }
            BulkAction::Export => {
                let format = required("format", &payload.format)?;
                format
                    .parse()
                    .map(ValidatedAction::Export)
                    .map_err(|e: ParseEnumError| BulkValidationError::InvalidField {
                        field: "format",
                        message: e.to_string(),
                    })
            }
            BulkAction::Delete => Ok(ValidatedAction::Delete),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub lead_id: LeadId,
    pub reason: FailureReason,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub succeeded: Vec<LeadId>,
    pub failed: Vec<BulkFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportReceipt>,
}

impl BulkOutcome {
    fn fail(&mut self, lead_id: &LeadId, reason: FailureReason, message: impl Into<String>) {
        self.failed.push(BulkFailure {
            lead_id: lead_id.clone(),
            reason,
            message: message.into(),
        });
    }
}

#[derive(Clone)]
pub struct BulkExecutor {
    leads: Arc<dyn LeadStore>,
    ledger: QuotaLedger,
    exporter: Exporter,
}

impl BulkExecutor {
    pub fn new(leads: Arc<dyn LeadStore>, ledger: QuotaLedger, exporter: Exporter) -> Self {
        Self {
            leads,
            ledger,
            exporter,
        }
    }

    /// Store writes and quota releases run on the blocking pool.
    pub async fn apply(
        &self,
        lead_ids: &[LeadId],
        action: &ValidatedAction,
        performed_by: &str,
    ) -> BulkOutcome {
        let outcome = match action {
            ValidatedAction::Export(format) => self.export(lead_ids, *format).await,
            other => {
                let executor = self.clone();
                let ids = lead_ids.to_vec();
                let action = other.clone();
                let actor = performed_by.to_string();
                let task = tokio::task::spawn_blocking(move || match action {
                    ValidatedAction::Delete => executor.delete(&ids, &actor),
                    action => executor.patch_each(&ids, &action, &actor),
                });
                match task.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(error = %e, "Bulk lead task did not complete");
                        let mut outcome = BulkOutcome::default();
                        for lead_id in lead_ids {
                            outcome.fail(lead_id, FailureReason::Storage, e.to_string());
                        }
                        outcome
                    }
                }
            }
        };

        info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            performed_by,
            "Applied bulk lead action"
        );
        outcome
    }

    fn patch_each(&self, lead_ids: &[LeadId], action: &ValidatedAction, performed_by: &str) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for lead_id in lead_ids {
            let at = Utc::now();
            let patch = match action {
                ValidatedAction::UpdateStatus(status) => LeadPatch::status(*status, performed_by, at),
                ValidatedAction::AddNote(text) => LeadPatch::note(text, performed_by, at),
                ValidatedAction::SetPriority(priority) => LeadPatch::priority(*priority, at),
                ValidatedAction::Export(_) | ValidatedAction::Delete => LeadPatch::empty(at),
            };

            match self.leads.update_lead(lead_id, patch) {
                Ok(_) => outcome.succeeded.push(lead_id.clone()),
                Err(e) if e.is_not_found() => outcome.fail(lead_id, FailureReason::NotFound, e.to_string()),
                Err(e) => outcome.fail(lead_id, FailureReason::Storage, e.to_string()),
            }
        }
        outcome
    }

    /// Remove each lead and hand back one quota unit per vendor assignment it held.
    ///
    /// A lead whose units could not all be handed back is reported as failed
    /// even though the document itself is gone.
    fn delete(&self, lead_ids: &[LeadId], performed_by: &str) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for lead_id in lead_ids {
            let lead = match self.leads.delete_lead(lead_id) {
                Ok(lead) => lead,
                Err(e) if e.is_not_found() => {
                    outcome.fail(lead_id, FailureReason::NotFound, e.to_string());
                    continue;
                }
                Err(e) => {
                    outcome.fail(lead_id, FailureReason::Storage, e.to_string());
                    continue;
                }
            };

            let ctx = AuditContext::new("lead deleted", performed_by);
            let mut stranded = Vec::new();
            for vendor_id in &lead.assigned_vendors {
                if let Err(e) = self.ledger.release(vendor_id, lead_id, &ctx) {
                    error!(lead_id = %lead_id, vendor_id = %vendor_id, error = %e, "Failed to release quota for deleted lead");
                    stranded.push(format!("{vendor_id}: {e}"));
                }
            }
            if !stranded.is_empty() {
                outcome.fail(
                    lead_id,
                    FailureReason::Storage,
                    format!("lead deleted but quota not released for {}", stranded.join(", ")),
                );
                continue;
            }

            info!(
                lead_id = %lead_id,
                vendors = lead.assigned_vendors.len(),
                performed_by,
                "Deleted lead"
            );
            outcome.succeeded.push(lead_id.clone());
        }
        outcome
    }

    async fn export(&self, lead_ids: &[LeadId], format: ExportFormat) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        let mut leads: Vec<Lead> = Vec::with_capacity(lead_ids.len());

        for lead_id in lead_ids {
            match self.leads.get_lead(lead_id) {
                Ok(Some(lead)) => leads.push(lead),
                Ok(None) => outcome.fail(lead_id, FailureReason::NotFound, format!("lead not found: {lead_id}")),
                Err(e) => outcome.fail(lead_id, FailureReason::Storage, e.to_string()),
            }
        }

        if leads.is_empty() {
            return outcome;
        }

        match self.exporter.export(&leads, format).await {
            Ok(receipt) => {
                outcome.succeeded = leads.into_iter().map(|lead| lead.id).collect();
                outcome.export = Some(receipt);
            }
            Err(e) => {
                warn!(error = %e, "Lead export failed");
                for lead in &leads {
                    outcome.fail(&lead.id, FailureReason::Storage, e.to_string());
                }
            }
        }
        outcome
    }
}
