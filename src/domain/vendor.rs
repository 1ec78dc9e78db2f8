use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{LeadId, VendorId};

/// User identity owned by a vendor. Read-only for the engine apart from
/// clearing a push token the notification channel reported as invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub push_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// Quota top-up.
    Add,
    /// Quota draw-down.
    Remove,
    /// One unit consumed by a lead assignment.
    Assign,
    /// One unit returned (lead deleted, or an assignment rolled back).
    Release,
}

/// Immutable record of one change to a vendor's `used`/`quota` counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorHistoryEntry {
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    pub count: u32,
    pub before_used: u32,
    pub after_used: u32,
    pub before_quota: u32,
    pub after_quota: u32,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<LeadId>,
    pub timestamp: DateTime<Utc>,
    pub performed_by: String,
}

impl VendorHistoryEntry {
    pub fn delta_used(&self) -> i64 {
        i64::from(self.after_used) - i64::from(self.before_used)
    }

    pub fn delta_quota(&self) -> i64 {
        i64::from(self.after_quota) - i64::from(self.before_quota)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub user: VendorUser,
    pub business_name: String,
    pub services: Vec<String>,
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub rating: f32,
    #[serde(default = "default_active")]
    pub active: bool,
    pub quota: u32,
    pub used: u32,
    /// Bumped on every stored mutation; quota writes compare-and-swap on it.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub history: Vec<VendorHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVendor {
    pub user: VendorUser,
    pub business_name: String,
    pub services: Vec<String>,
    pub address: String,
    #[serde(default)]
    pub rating: f32,
    /// Starting capacity, recorded as an `add` history entry.
    #[serde(default)]
    pub quota: u32,
}

impl Vendor {
    /// Build a vendor with zero capacity. The initial quota grant is applied
    /// afterwards through the quota ledger so it lands in history.
    pub fn new(draft: NewVendor, now: DateTime<Utc>) -> Self {
        let city = super::lead::parse_city(&draft.address);
        let services = draft
            .services
            .into_iter()
            .map(|service| service.trim().to_string())
            .filter(|service| !service.is_empty())
            .collect();

        Self {
            id: VendorId::generate(),
            user: draft.user,
            business_name: draft.business_name,
            services,
            address: draft.address,
            city,
            rating: draft.rating,
            active: true,
            quota: 0,
            used: 0,
            version: 0,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.quota.saturating_sub(self.used)
    }

    pub fn has_capacity(&self) -> bool {
        self.remaining() > 0
    }

    pub fn offers(&self, service: &str) -> bool {
        let service = service.trim();
        self.services
            .iter()
            .any(|offered| offered.eq_ignore_ascii_case(service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vendor(quota: u32, used: u32) -> Vendor {
        let mut vendor = Vendor::new(
            NewVendor {
                user: VendorUser {
                    name: "Sam".to_string(),
                    email: "sam@example.com".to_string(),
                    phone: None,
                    push_token: None,
                },
                business_name: "Acme Plumbing".to_string(),
                services: vec!["Plumbing ".to_string(), "".to_string()],
                address: "1 Pipe Rd, Springfield, IL".to_string(),
                rating: 4.5,
                quota: 0,
            },
            Utc::now(),
        );
        vendor.quota = quota;
        vendor.used = used;
        vendor
    }

    #[test]
    fn remaining_never_underflows() {
        assert_eq!(vendor(5, 2).remaining(), 3);
        assert_eq!(vendor(5, 5).remaining(), 0);
        assert!(!vendor(5, 5).has_capacity());
    }

    #[test]
    fn service_match_ignores_case_and_padding() {
        let vendor = vendor(1, 0);
        assert_eq!(vendor.services, vec!["Plumbing".to_string()]);
        assert!(vendor.offers("plumbing"));
        assert!(vendor.offers(" PLUMBING"));
        assert!(!vendor.offers("Electrical"));
    }

    #[test]
    fn history_kind_serializes_under_type_key() {
        let entry = VendorHistoryEntry {
            kind: HistoryKind::Add,
            count: 20,
            before_used: 0,
            after_used: 0,
            before_quota: 50,
            after_quota: 70,
            reason: "top-up".to_string(),
            lead_id: None,
            timestamp: Utc::now(),
            performed_by: "admin".to_string(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "add");
        assert_eq!(entry.delta_quota(), 20);
        assert_eq!(entry.delta_used(), 0);
    }
}
