//! Filtering, sorting, paging, and aggregation shared by every store backend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{Lead, LeadStatus, Vendor, VendorId};

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadFilter {
    #[serde(default)]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub assigned: Option<bool>,
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    /// Free-text match over customer name, phone, and email.
    #[serde(default)]
    pub search: Option<String>,
}

impl LeadFilter {
    pub fn matches(&self, lead: &Lead) -> bool {
        if let Some(status) = self.status {
            if lead.status != status {
                return false;
            }
        }

        if let Some(service) = &self.service {
            if !lead.service.eq_ignore_ascii_case(service.trim()) {
                return false;
            }
        }

        if let Some(city) = &self.city {
            match &lead.city {
                Some(lead_city) if lead_city.eq_ignore_ascii_case(city.trim()) => {}
                _ => return false,
            }
        }

        if let Some(assigned) = self.assigned {
            if lead.is_assigned != assigned {
                return false;
            }
        }

        if let Some(vendor_id) = &self.vendor_id {
            if !lead.is_assigned_to(vendor_id) {
                return false;
            }
        }

        if let Some(search) = &self.search {
            let needle = search.trim().to_lowercase();
            if !needle.is_empty() {
                let customer = &lead.customer;
                let hit = customer.name.to_lowercase().contains(&needle)
                    || customer.phone.contains(&needle)
                    || customer
                        .email
                        .as_deref()
                        .is_some_and(|email| email.to_lowercase().contains(&needle));
                if !hit {
                    return false;
                }
            }
        }

        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Priority,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSort {
    #[serde(default)]
    pub field: SortField,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadQuery {
    pub filter: LeadFilter,
    pub sort: LeadSort,
    /// 1-based.
    pub page: usize,
    pub limit: usize,
}

impl Default for LeadQuery {
    fn default() -> Self {
        Self {
            filter: LeadFilter::default(),
            sort: LeadSort::default(),
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSummary {
    pub total: usize,
    pub assigned: usize,
    pub unassigned: usize,
    pub status_breakdown: BTreeMap<LeadStatus, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorFilter {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub active_only: bool,
    #[serde(default)]
    pub with_capacity: bool,
}

impl VendorFilter {
    /// Active vendors with remaining capacity, optionally narrowed to one service.
    pub fn eligible(service: Option<&str>) -> Self {
        Self {
            service: service.map(str::to_string),
            active_only: true,
            with_capacity: true,
        }
    }

    pub fn matches(&self, vendor: &Vendor) -> bool {
        if self.active_only && !vendor.active {
            return false;
        }
        if self.with_capacity && !vendor.has_capacity() {
            return false;
        }
        match &self.service {
            Some(service) => vendor.offers(service),
            None => true,
        }
    }
}

/// Filter, sort, and page an unordered set of leads.
pub fn run_query(leads: impl IntoIterator<Item = Lead>, query: &LeadQuery) -> Page<Lead> {
    let mut matched: Vec<Lead> = leads
        .into_iter()
        .filter(|lead| query.filter.matches(lead))
        .collect();

    matched.sort_by(|a, b| {
        let ordering = match query.sort.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::Priority => a
                .priority
                .cmp(&b.priority)
                .then_with(|| a.created_at.cmp(&b.created_at)),
        };
        match query.sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    let total = matched.len();
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, MAX_PAGE_LIMIT);
    let items = matched
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();

    Page {
        items,
        total,
        page,
        limit,
    }
}

pub fn summarize<'a>(leads: impl IntoIterator<Item = &'a Lead>, filter: &LeadFilter) -> LeadSummary {
    let mut summary = LeadSummary::default();
    for lead in leads.into_iter().filter(|lead| filter.matches(lead)) {
        summary.total += 1;
        if lead.is_assigned {
            summary.assigned += 1;
        } else {
            summary.unassigned += 1;
        }
        *summary.status_breakdown.entry(lead.status).or_insert(0) += 1;
    }
    summary
}
