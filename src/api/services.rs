use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::debug;

use super::{
    error::ApiError,
    models::{
        ApiResponse, BulkRequest, LeadListParams, QuotaRequest, StatusUpdateRequest,
        VendorListParams,
    },
    state::AppState,
    utils::actor_from_headers,
};
use crate::domain::{LeadId, NewLead, NewVendor, VendorId};
use crate::engine::AssignRequest;

type Response = Result<axum::response::Response, ApiError>;

fn ok<T: serde::Serialize>(status: StatusCode, data: T) -> Response {
    Ok((status, Json(ApiResponse::ok(data))).into_response())
}

/// Health check endpoint (GET /health)
///
/// Reports document counts and the in-process counters.
pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.engine.health()?;
    ok(StatusCode::OK, report)
}

/// POST /leads
pub async fn create_lead(
    State(state): State<AppState>,
    payload: Result<Json<NewLead>, JsonRejection>,
) -> Response {
    let Json(draft) = payload?;
    let lead = state.engine.create_lead(draft)?;
    ok(StatusCode::CREATED, lead)
}

/// GET /leads
pub async fn list_leads(
    State(state): State<AppState>,
    params: Result<Query<LeadListParams>, QueryRejection>,
) -> Response {
    let Query(params) = params?;
    let page = state.engine.find_leads(&params.query())?;
    debug!(total = page.total, returned = page.items.len(), "Listed leads");
    ok(StatusCode::OK, page)
}

/// GET /leads/summary
pub async fn lead_summary(
    State(state): State<AppState>,
    params: Result<Query<LeadListParams>, QueryRejection>,
) -> Response {
    let Query(params) = params?;
    let summary = state.engine.lead_summary(&params.filter())?;
    ok(StatusCode::OK, summary)
}

/// GET /leads/{lead_id}
pub async fn get_lead(State(state): State<AppState>, Path(lead_id): Path<String>) -> Response {
    let lead = state.engine.get_lead(&LeadId::from(lead_id))?;
    ok(StatusCode::OK, lead)
}

/// PATCH /leads/{lead_id}/status
pub async fn update_lead_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(lead_id): Path<String>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = payload?;
    let actor = actor_from_headers(&headers);
    let lead = state
        .engine
        .update_lead_status(&LeadId::from(lead_id), request.status, &actor)?;
    ok(StatusCode::OK, lead)
}

/// POST /leads/assign
///
/// Partial success is still a 200: per-lead failures are listed in the body.
/// Quota writes hold per-vendor locks, so the commit runs on the blocking pool.
pub async fn assign_leads(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> Response {
    let Json(request) = payload?;
    let actor = actor_from_headers(&headers);
    let engine = state.engine.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.assign_leads(request, &actor)).await??;
    ok(StatusCode::OK, outcome)
}

/// POST /leads/bulk
pub async fn bulk_lead_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<BulkRequest>, JsonRejection>,
) -> Response {
    let Json(request) = payload?;
    let actor = actor_from_headers(&headers);
    let outcome = state
        .engine
        .bulk_lead_action(&request.lead_ids, request.action, &request.payload, &actor)
        .await?;
    ok(StatusCode::OK, outcome)
}

/// POST /vendors
pub async fn register_vendor(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewVendor>, JsonRejection>,
) -> Response {
    let Json(draft) = payload?;
    let actor = actor_from_headers(&headers);
    let engine = state.engine.clone();
    let vendor = tokio::task::spawn_blocking(move || engine.register_vendor(draft, &actor)).await??;
    ok(StatusCode::CREATED, vendor)
}

/// GET /vendors
pub async fn list_vendors(
    State(state): State<AppState>,
    params: Result<Query<VendorListParams>, QueryRejection>,
) -> Response {
    let Query(params) = params?;
    let vendors = state.engine.list_vendors(&params.filter())?;
    ok(StatusCode::OK, vendors)
}

/// GET /vendors/{vendor_id}
pub async fn get_vendor(State(state): State<AppState>, Path(vendor_id): Path<String>) -> Response {
    let vendor = state.engine.get_vendor(&VendorId::from(vendor_id))?;
    ok(StatusCode::OK, vendor)
}

/// POST /vendors/{vendor_id}/quota
pub async fn adjust_vendor_quota(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(vendor_id): Path<String>,
    payload: Result<Json<QuotaRequest>, JsonRejection>,
) -> Response {
    let Json(request) = payload?;
    let actor = actor_from_headers(&headers);
    let engine = state.engine.clone();
    let vendor = tokio::task::spawn_blocking(move || {
        engine.adjust_vendor_quota(
            &VendorId::from(vendor_id),
            request.adjustment,
            request.reason,
            &actor,
        )
    })
    .await??;
    ok(StatusCode::OK, vendor)
}
