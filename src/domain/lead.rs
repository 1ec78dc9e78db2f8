use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::ids::{LeadId, VendorId};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Lifecycle status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Pending,
    Available,
    Assigned,
    Taken,
    Contacted,
    Completed,
    Cancelled,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 7] = [
        LeadStatus::Pending,
        LeadStatus::Available,
        LeadStatus::Assigned,
        LeadStatus::Taken,
        LeadStatus::Contacted,
        LeadStatus::Completed,
        LeadStatus::Cancelled,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            LeadStatus::Pending => "pending",
            LeadStatus::Available => "available",
            LeadStatus::Assigned => "assigned",
            LeadStatus::Taken => "taken",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Completed => "completed",
            LeadStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LeadStatus {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        LeadStatus::ALL
            .into_iter()
            .find(|status| status.label() == normalized)
            .ok_or_else(|| ParseEnumError {
                kind: "lead status",
                value: value.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const fn label(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ParseEnumError {
                kind: "priority",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// One step in a lead's progress history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub from_status: LeadStatus,
    pub to_status: LeadStatus,
    pub timestamp: DateTime<Utc>,
    pub performed_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadNote {
    pub text: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

/// Customer service request awaiting vendor fulfillment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub customer: Customer,
    pub address: String,
    /// Derived from `address` on creation.
    pub city: Option<String>,
    pub service: String,
    #[serde(default)]
    pub sub_service: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub status: LeadStatus,
    #[serde(default)]
    pub assigned_vendors: Vec<VendorId>,
    #[serde(default)]
    pub is_assigned: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub notes: Vec<LeadNote>,
    #[serde(default)]
    pub progress_history: Vec<ProgressEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a lead is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLead {
    pub customer: Customer,
    pub address: String,
    pub service: String,
    #[serde(default)]
    pub sub_service: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `pending` (default) or `available`.
    #[serde(default)]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// Status change requested as part of a patch. The `from` side is taken from the
/// stored document at apply time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub to: LeadStatus,
    pub performed_by: String,
}

/// Field-level change applied atomically to a single stored lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadPatch {
    pub transition: Option<Transition>,
    pub attach_vendor: Option<VendorId>,
    pub note: Option<LeadNote>,
    pub priority: Option<Priority>,
    pub at: DateTime<Utc>,
}

impl LeadPatch {
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            transition: None,
            attach_vendor: None,
            note: None,
            priority: None,
            at,
        }
    }

    pub fn assignment(
        vendor_id: VendorId,
        to: LeadStatus,
        performed_by: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            transition: Some(Transition {
                to,
                performed_by: performed_by.to_string(),
            }),
            attach_vendor: Some(vendor_id),
            ..Self::empty(at)
        }
    }

    pub fn status(to: LeadStatus, performed_by: &str, at: DateTime<Utc>) -> Self {
        Self {
            transition: Some(Transition {
                to,
                performed_by: performed_by.to_string(),
            }),
            ..Self::empty(at)
        }
    }

    pub fn note(text: &str, author: &str, at: DateTime<Utc>) -> Self {
        Self {
            note: Some(LeadNote {
                text: text.to_string(),
                author: author.to_string(),
                created_at: at,
            }),
            ..Self::empty(at)
        }
    }

    pub fn priority(priority: Priority, at: DateTime<Utc>) -> Self {
        Self {
            priority: Some(priority),
            ..Self::empty(at)
        }
    }
}

impl Lead {
    pub fn new(draft: NewLead, now: DateTime<Utc>) -> Self {
        let city = parse_city(&draft.address);
        Self {
            id: LeadId::generate(),
            customer: draft.customer,
            address: draft.address,
            city,
            service: draft.service.trim().to_string(),
            sub_service: draft.sub_service,
            description: draft.description,
            status: draft.status.unwrap_or(LeadStatus::Pending),
            assigned_vendors: Vec::new(),
            is_assigned: false,
            priority: draft.priority.unwrap_or_default(),
            notes: Vec::new(),
            progress_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a patch in place. Every transition appends exactly one progress entry.
    pub fn apply(&mut self, patch: LeadPatch) {
        if let Some(vendor_id) = patch.attach_vendor {
            self.assigned_vendors.push(vendor_id);
        }

        if let Some(transition) = patch.transition {
            self.progress_history.push(ProgressEntry {
                from_status: self.status,
                to_status: transition.to,
                timestamp: patch.at,
                performed_by: transition.performed_by,
            });
            self.status = transition.to;
        }

        if let Some(note) = patch.note {
            self.notes.push(note);
        }

        if let Some(priority) = patch.priority {
            self.priority = priority;
        }

        self.is_assigned = !self.assigned_vendors.is_empty();
        self.updated_at = patch.at;
    }

    pub fn is_assigned_to(&self, vendor_id: &VendorId) -> bool {
        self.assigned_vendors.iter().any(|id| id == vendor_id)
    }
}

/// Derive a city from a free-text address.
///
/// `"12 Main St, Springfield, IL 62701"` yields `Springfield`; with only two
/// segments the last one is used after dropping postcode tokens.
pub fn parse_city(address: &str) -> Option<String> {
    let parts: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    let candidate = match parts.len() {
        0 | 1 => return None,
        2 => parts[1],
        n => parts[n - 2],
    };

    let city = candidate
        .split_whitespace()
        .filter(|token| !token.chars().any(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ");

    if city.is_empty() { None } else { Some(city) }
}
