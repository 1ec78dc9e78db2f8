//! Request and response shapes for the admin HTTP API.
//!
//! Every successful response is wrapped as `{"success": true, "data": ...}`;
//! failures use `{"success": false, "error": {"code", "message"}}`.
//!
//! ```json
//! POST /leads/assign
//! {
//!   "lead_ids": ["0192...", "0193..."],
//!   "strategy": { "type": "by_service" },
//!   "reason": "weekend overflow"
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::bulk::{BulkAction, BulkPayload};
use crate::domain::{LeadId, LeadStatus, VendorId};
use crate::quota::QuotaAdjustment;
use crate::store::{
    DEFAULT_PAGE_LIMIT, LeadFilter, LeadQuery, LeadSort, SortField, SortOrder, VendorFilter,
};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Query string for `GET /leads` and `GET /leads/summary`.
#[derive(Debug, Default, Deserialize)]
pub struct LeadListParams {
    pub status: Option<LeadStatus>,
    pub service: Option<String>,
    pub city: Option<String>,
    pub assigned: Option<bool>,
    pub vendor_id: Option<VendorId>,
    pub q: Option<String>,
    pub sort: Option<SortField>,
    pub order: Option<SortOrder>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl LeadListParams {
    pub fn filter(&self) -> LeadFilter {
        LeadFilter {
            status: self.status,
            service: self.service.clone(),
            city: self.city.clone(),
            assigned: self.assigned,
            vendor_id: self.vendor_id.clone(),
            search: self.q.clone(),
        }
    }

    pub fn query(&self) -> LeadQuery {
        LeadQuery {
            filter: self.filter(),
            sort: LeadSort {
                field: self.sort.unwrap_or_default(),
                order: self.order.unwrap_or_default(),
            },
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VendorListParams {
    pub service: Option<String>,
    #[serde(default)]
    pub available_only: bool,
}

impl VendorListParams {
    pub fn filter(&self) -> VendorFilter {
        VendorFilter {
            service: self.service.clone(),
            active_only: self.available_only,
            with_capacity: self.available_only,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: LeadStatus,
}

#[derive(Debug, Deserialize)]
pub struct QuotaRequest {
    #[serde(flatten)]
    pub adjustment: QuotaAdjustment,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub lead_ids: Vec<LeadId>,
    pub action: BulkAction,
    #[serde(default)]
    pub payload: BulkPayload,
}
