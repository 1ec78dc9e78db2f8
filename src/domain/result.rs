use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::ids::{LeadId, VendorId};

/// Why a single lead/vendor pair was not committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    CapacityExceeded,
    NoEligibleVendor,
    NotFound,
    Storage,
}

impl FailureReason {
    pub const fn code(self) -> &'static str {
        match self {
            FailureReason::CapacityExceeded => "CAPACITY_EXCEEDED",
            FailureReason::NoEligibleVendor => "NO_ELIGIBLE_VENDOR",
            FailureReason::NotFound => "NOT_FOUND",
            FailureReason::Storage => "STORAGE_ERROR",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentFailure {
    pub lead_id: LeadId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<VendorId>,
    pub reason: FailureReason,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorTally {
    pub vendor_id: VendorId,
    pub business_name: String,
    pub count: u32,
}

/// Outcome of one distribution call. Transient; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentResult {
    /// Leads that received at least one vendor.
    pub assigned_count: usize,
    /// Leads that received no vendor at all.
    pub unassigned_count: usize,
    pub per_vendor_counts: BTreeMap<VendorId, u32>,
    /// Per-vendor tallies in first-assignment order, with display names.
    pub distribution: Vec<VendorTally>,
    /// Leads no eligible vendor existed for at planning time.
    pub unassignable: Vec<LeadId>,
    pub failures: Vec<AssignmentFailure>,
}

impl AssignmentResult {
    pub fn record_success(&mut self, vendor_id: &VendorId, business_name: &str) {
        *self.per_vendor_counts.entry(vendor_id.clone()).or_insert(0) += 1;
        match self
            .distribution
            .iter_mut()
            .find(|tally| &tally.vendor_id == vendor_id)
        {
            Some(tally) => tally.count += 1,
            None => self.distribution.push(VendorTally {
                vendor_id: vendor_id.clone(),
                business_name: business_name.to_string(),
                count: 1,
            }),
        }
    }

    pub fn record_failure(
        &mut self,
        lead_id: &LeadId,
        vendor_id: Option<&VendorId>,
        reason: FailureReason,
        message: impl Into<String>,
    ) {
        self.failures.push(AssignmentFailure {
            lead_id: lead_id.clone(),
            vendor_id: vendor_id.cloned(),
            reason,
            message: message.into(),
        });
    }

    /// Compute lead-level counts once every pair has been processed.
    pub fn finalize(&mut self, submitted: &[LeadId], assigned: &BTreeSet<LeadId>) {
        let distinct: BTreeSet<&LeadId> = submitted.iter().collect();
        self.assigned_count = distinct.iter().filter(|id| assigned.contains(**id)).count();
        self.unassigned_count = distinct.len() - self.assigned_count;
    }

    pub fn affected_vendors(&self) -> impl Iterator<Item = &VendorTally> {
        self.distribution.iter()
    }

    /// Human-readable summary, e.g.
    /// `Acme: 7 leads, Bolt: 3 leads; 2 leads unassigned (no matching vendor capacity)`.
    pub fn summary_line(&self) -> String {
        let mut parts: Vec<String> = self
            .distribution
            .iter()
            .map(|tally| format!("{}: {}", tally.business_name, plural(tally.count as usize)))
            .collect();

        if parts.is_empty() {
            parts.push("no leads assigned".to_string());
        }

        let mut line = parts.join(", ");
        if self.unassigned_count > 0 {
            line.push_str(&format!(
                "; {} unassigned (no matching vendor capacity)",
                plural(self.unassigned_count)
            ));
        }
        line
    }
}

fn plural(count: usize) -> String {
    if count == 1 {
        "1 lead".to_string()
    } else {
        format!("{count} leads")
    }
}
