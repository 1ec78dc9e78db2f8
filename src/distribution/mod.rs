//! Distribution strategies.
//!
//! Planning is pure: a strategy maps leads onto a vendor snapshot and never
//! touches storage. Capacity races are settled later when the plan is
//! committed, so a plan may contain pairs that fail at write time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::CatalogMode;
use crate::domain::{Lead, LeadId, Vendor, VendorId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    /// Every lead goes to one vendor.
    Single { vendor_id: VendorId },
    /// Round-robin over every eligible vendor.
    AllAvailable,
    /// Each lead goes to the matching vendor with the most remaining capacity.
    ByService,
    /// Every lead goes to every listed vendor.
    SpecificList { vendor_ids: Vec<VendorId> },
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Single { .. } => "single",
            Strategy::AllAvailable => "all_available",
            Strategy::ByService => "by_service",
            Strategy::SpecificList { .. } => "specific_list",
        }
    }

    /// Which catalog snapshot the strategy plans against, if any.
    pub fn catalog_mode(&self) -> Option<CatalogMode> {
        match self {
            Strategy::AllAvailable => Some(CatalogMode::AnyActive),
            Strategy::ByService => Some(CatalogMode::MatchingLeads),
            Strategy::Single { .. } | Strategy::SpecificList { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    pub lead_id: LeadId,
    pub vendor_id: VendorId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Pairs in submission order.
    pub pairs: Vec<Pair>,
    /// Leads no eligible vendor existed for.
    pub unassignable: Vec<LeadId>,
    /// Submitted ids that did not resolve to a lead.
    pub missing: Vec<LeadId>,
}

impl Plan {
    pub fn with_missing(mut self, missing: Vec<LeadId>) -> Self {
        self.missing = missing;
        self
    }

    /// Every lead id the plan accounts for, first occurrence order.
    pub fn submitted(&self) -> Vec<LeadId> {
        let mut seen = BTreeSet::new();
        self.pairs
            .iter()
            .map(|pair| &pair.lead_id)
            .chain(&self.unassignable)
            .chain(&self.missing)
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect()
    }

    fn push(&mut self, lead_id: &LeadId, vendor_id: &VendorId) {
        self.pairs.push(Pair {
            lead_id: lead_id.clone(),
            vendor_id: vendor_id.clone(),
        });
    }
}

pub fn plan(strategy: &Strategy, leads: &[Lead], vendors: &[Vendor]) -> Plan {
    match strategy {
        Strategy::Single { vendor_id } => single(leads, vendor_id),
        Strategy::AllAvailable => round_robin(leads, vendors),
        Strategy::ByService => by_service(leads, vendors),
        Strategy::SpecificList { vendor_ids } => specific_list(leads, vendor_ids),
    }
}

fn single(leads: &[Lead], vendor_id: &VendorId) -> Plan {
    let mut plan = Plan::default();
    for lead in leads {
        plan.push(&lead.id, vendor_id);
    }
    plan
}

fn round_robin(leads: &[Lead], vendors: &[Vendor]) -> Plan {
    let snapshot: Vec<&Vendor> = vendors
        .iter()
        .filter(|vendor| vendor.active && vendor.has_capacity())
        .collect();

    let mut plan = Plan::default();
    if snapshot.is_empty() {
        plan.unassignable = leads.iter().map(|lead| lead.id.clone()).collect();
        return plan;
    }

    for (index, lead) in leads.iter().enumerate() {
        plan.push(&lead.id, &snapshot[index % snapshot.len()].id);
    }
    plan
}

fn by_service(leads: &[Lead], vendors: &[Vendor]) -> Plan {
    // Planning-local capacity so one batch does not pile onto a vendor past
    // what it can hold.
    let mut remaining: Vec<u32> = vendors
        .iter()
        .map(|vendor| if vendor.active { vendor.remaining() } else { 0 })
        .collect();

    let mut plan = Plan::default();
    for lead in leads {
        let mut best: Option<usize> = None;
        for (index, vendor) in vendors.iter().enumerate() {
            if remaining[index] == 0 || !vendor.offers(&lead.service) {
                continue;
            }
            // Strictly greater keeps the earliest vendor on ties.
            if best.is_none_or(|current| remaining[index] > remaining[current]) {
                best = Some(index);
            }
        }

        match best {
            Some(index) => {
                remaining[index] -= 1;
                plan.push(&lead.id, &vendors[index].id);
            }
            None => plan.unassignable.push(lead.id.clone()),
        }
    }
    plan
}

fn specific_list(leads: &[Lead], vendor_ids: &[VendorId]) -> Plan {
    let mut seen = BTreeSet::new();
    let targets: Vec<&VendorId> = vendor_ids.iter().filter(|id| seen.insert(*id)).collect();

    let mut plan = Plan::default();
    if targets.is_empty() {
        plan.unassignable = leads.iter().map(|lead| lead.id.clone()).collect();
        return plan;
    }

    for lead in leads {
        for vendor_id in &targets {
            plan.push(&lead.id, vendor_id);
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Customer, NewLead, NewVendor, VendorUser};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn lead(service: &str) -> Lead {
        Lead::new(
            NewLead {
                customer: Customer {
                    name: "Eve".to_string(),
                    phone: "555-0177".to_string(),
                    email: None,
                },
                address: "6 Lake Dr, Madison, WI".to_string(),
                service: service.to_string(),
                sub_service: None,
                description: None,
                status: None,
                priority: None,
            },
            Utc::now(),
        )
    }

    fn vendor(name: &str, services: &[&str], remaining: u32) -> Vendor {
        let mut vendor = Vendor::new(
            NewVendor {
                user: VendorUser {
                    name: name.to_string(),
                    email: format!("{name}@example.com"),
                    phone: None,
                    push_token: None,
                },
                business_name: name.to_string(),
                services: services.iter().map(|s| s.to_string()).collect(),
                address: "1 Main St, Madison, WI".to_string(),
                rating: 4.0,
                quota: 0,
            },
            Utc::now(),
        );
        vendor.quota = remaining;
        vendor
    }

    fn counts(plan: &Plan) -> BTreeMap<VendorId, usize> {
        let mut counts = BTreeMap::new();
        for pair in &plan.pairs {
            *counts.entry(pair.vendor_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn round_robin_spreads_ten_leads_over_three_vendors() {
        let leads: Vec<Lead> = (0..10).map(|_| lead("Plumbing")).collect();
        let vendors = vec![
            vendor("a", &["Plumbing"], 10),
            vendor("b", &["Roofing"], 10),
            vendor("c", &["Painting"], 10),
        ];

        let plan = plan(&Strategy::AllAvailable, &leads, &vendors);
        let mut tallies: Vec<usize> = counts(&plan).into_values().collect();
        tallies.sort_unstable();
        assert_eq!(tallies, vec![3, 3, 4]);
        assert_eq!(plan.pairs[0].vendor_id, vendors[0].id);
        assert_eq!(plan.pairs[3].vendor_id, vendors[0].id);
        assert!(plan.unassignable.is_empty());
    }

    #[test]
    fn round_robin_without_vendors_leaves_everything_unassignable() {
        let leads = vec![lead("Plumbing"), lead("Plumbing")];
        let plan = plan(&Strategy::AllAvailable, &leads, &[vendor("empty", &["Plumbing"], 0)]);
        assert!(plan.pairs.is_empty());
        assert_eq!(plan.unassignable.len(), 2);
    }

    #[test]
    fn by_service_prefers_largest_remaining() {
        let leads: Vec<Lead> = (0..3).map(|_| lead("Plumbing")).collect();
        let a = vendor("a", &["Plumbing"], 2);
        let b = vendor("b", &["plumbing"], 5);

        let plan = plan(&Strategy::ByService, &leads, &[a.clone(), b.clone()]);
        let counts = counts(&plan);
        assert_eq!(counts.get(&b.id), Some(&3));
        assert_eq!(counts.get(&a.id), None);
    }

    #[test]
    fn by_service_ties_go_to_catalog_order_and_respect_capacity() {
        let leads: Vec<Lead> = (0..4).map(|_| lead("Plumbing")).collect();
        let a = vendor("a", &["Plumbing"], 1);
        let b = vendor("b", &["Plumbing"], 1);

        let plan = plan(&Strategy::ByService, &leads, &[a.clone(), b.clone()]);
        assert_eq!(plan.pairs[0].vendor_id, a.id);
        assert_eq!(plan.pairs[1].vendor_id, b.id);
        assert_eq!(plan.unassignable.len(), 2);
    }

    #[test]
    fn by_service_unmatched_service_is_unassignable() {
        let leads = vec![lead("Roofing"), lead("Plumbing")];
        let plumber = vendor("p", &["Plumbing"], 3);
        let plan = plan(&Strategy::ByService, &leads, &[plumber.clone()]);
        assert_eq!(plan.unassignable, vec![leads[0].id.clone()]);
        assert_eq!(plan.pairs.len(), 1);
        assert_eq!(plan.pairs[0].vendor_id, plumber.id);
    }

    #[test]
    fn single_and_specific_list_skip_capacity() {
        let leads = vec![lead("Plumbing"), lead("Roofing")];
        let target = VendorId::from("v-full");

        let single = plan(&Strategy::Single { vendor_id: target.clone() }, &leads, &[]);
        assert_eq!(single.pairs.len(), 2);
        assert!(single.pairs.iter().all(|pair| pair.vendor_id == target));

        let list = plan(
            &Strategy::SpecificList {
                vendor_ids: vec![VendorId::from("x"), VendorId::from("y"), VendorId::from("x")],
            },
            &leads,
            &[],
        );
        assert_eq!(list.pairs.len(), 4);
        assert_eq!(list.pairs[0].lead_id, leads[0].id);
        assert_eq!(list.pairs[1].vendor_id, VendorId::from("y"));
    }

    #[test]
    fn submitted_covers_pairs_unassignable_and_missing() {
        let leads = vec![lead("Plumbing"), lead("Roofing")];
        let plan = plan(
            &Strategy::SpecificList {
                vendor_ids: vec![VendorId::from("x"), VendorId::from("y")],
            },
            &leads,
            &[],
        )
        .with_missing(vec![LeadId::from("gone")]);
        assert_eq!(
            plan.submitted(),
            vec![leads[0].id.clone(), leads[1].id.clone(), LeadId::from("gone")]
        );
    }

    #[test]
    fn strategy_json_is_tagged() {
        let strategy: Strategy =
            serde_json::from_str(r#"{"type":"single","vendor_id":"v1"}"#).unwrap();
        assert_eq!(strategy, Strategy::Single { vendor_id: VendorId::from("v1") });
        let strategy: Strategy = serde_json::from_str(r#"{"type":"by_service"}"#).unwrap();
        assert_eq!(strategy.catalog_mode(), Some(CatalogMode::MatchingLeads));
    }
}
