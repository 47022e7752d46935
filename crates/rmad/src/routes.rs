//! API routes for rmad
//!
//! Case mutations mirror the workflow operations one-to-one; every mutating
//! request carries the caller's last-known case version and stale writes
//! come back as 409 with the current version in the message.

use crate::server::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rma_common::{
    AssignRequest, CaseFilter, CaseIntake, CaseSummary, CommentRequest, CompletionRequest,
    DecisionRequest, ErrorBody, HealthResponse, ListCasesResponse, ReceiptRequest,
    ReturnConfirmationRequest, ReturnRequest, RmaCase, ShipmentRequest, SubmissionRequest,
    WorkflowError, WorkflowRules,
};
use std::sync::Arc;
use tracing::{error, info};

type AppStateArc = Arc<AppState>;

type ApiError = (StatusCode, Json<ErrorBody>);

/// Map engine failures onto the HTTP surface. Validation is caller-correctable,
/// invalid transitions mean the case moved on, conflicts mean re-read and
/// retry. Store failures are the only 5xx.
fn api_error(e: WorkflowError) -> ApiError {
    let status = match &e {
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::Conflict { .. } => StatusCode::CONFLICT,
        WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
        WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Store failure: {}", e);
    }
    (status, Json(ErrorBody::new(e.kind(), &e.to_string())))
}

// ============================================================================
// Case Routes
// ============================================================================

pub fn case_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/cases", post(open_case).get(list_cases))
        .route("/v1/cases/:id", get(get_case))
        .route("/v1/cases/:id/cds-submission", post(cds_submission))
        .route("/v1/cases/:id/cds-approval", post(cds_approval))
        .route("/v1/cases/:id/shipment", post(shipment))
        .route("/v1/cases/:id/replacement-receipt", post(replacement_receipt))
        .route("/v1/cases/:id/return", post(start_return))
        .route("/v1/cases/:id/return-confirmation", post(return_confirmation))
        .route("/v1/cases/:id/complete", post(complete))
        .route("/v1/cases/:id/assign", post(assign))
        .route("/v1/cases/:id/comments", post(add_comment))
}

async fn open_case(
    State(state): State<AppStateArc>,
    Json(intake): Json<CaseIntake>,
) -> Result<(StatusCode, Json<RmaCase>), ApiError> {
    info!("Intake: {} at {} ({})", intake.product, intake.site, intake.region);
    let case = state.service.open_case(&intake).map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(case)))
}

async fn list_cases(
    State(state): State<AppStateArc>,
    Query(filter): Query<CaseFilter>,
) -> Result<Json<ListCasesResponse>, ApiError> {
    let now = Utc::now();
    let cases = state.service.list_cases(&filter).map_err(api_error)?;
    let summaries: Vec<CaseSummary> = cases
        .iter()
        .map(|case| CaseSummary::from_case(case, now))
        .collect();
    Ok(Json(ListCasesResponse {
        total: summaries.len(),
        cases: summaries,
    }))
}

async fn get_case(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
) -> Result<Json<RmaCase>, ApiError> {
    let case = state.service.get_case(&id).map_err(api_error)?;
    Ok(Json(case))
}

async fn cds_submission(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
    Json(req): Json<SubmissionRequest>,
) -> Result<Json<RmaCase>, ApiError> {
    let case = state.service.submit(&id, &req).map_err(api_error)?;
    Ok(Json(case))
}

async fn cds_approval(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<RmaCase>, ApiError> {
    let case = state.service.decide(&id, &req).map_err(api_error)?;
    Ok(Json(case))
}

async fn shipment(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
    Json(req): Json<ShipmentRequest>,
) -> Result<Json<RmaCase>, ApiError> {
    let case = state.service.ship(&id, &req).map_err(api_error)?;
    Ok(Json(case))
}

async fn replacement_receipt(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
    Json(req): Json<ReceiptRequest>,
) -> Result<Json<RmaCase>, ApiError> {
    let case = state.service.receive(&id, &req).map_err(api_error)?;
    Ok(Json(case))
}

async fn start_return(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
    Json(req): Json<ReturnRequest>,
) -> Result<Json<RmaCase>, ApiError> {
    let case = state.service.start_return(&id, &req).map_err(api_error)?;
    Ok(Json(case))
}

async fn return_confirmation(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
    Json(req): Json<ReturnConfirmationRequest>,
) -> Result<Json<RmaCase>, ApiError> {
    let case = state.service.confirm_return(&id, &req).map_err(api_error)?;
    Ok(Json(case))
}

async fn complete(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
    Json(req): Json<CompletionRequest>,
) -> Result<Json<RmaCase>, ApiError> {
    let case = state.service.complete(&id, &req).map_err(api_error)?;
    Ok(Json(case))
}

async fn assign(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<RmaCase>, ApiError> {
    let case = state.service.assign(&id, &req).map_err(api_error)?;
    Ok(Json(case))
}

async fn add_comment(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<RmaCase>), ApiError> {
    let case = state.service.comment(&id, &req).map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(case)))
}

// ============================================================================
// Workflow Routes
// ============================================================================

pub fn workflow_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/workflow/rules", get(workflow_rules))
}

async fn workflow_rules(State(state): State<AppStateArc>) -> Json<WorkflowRules> {
    Json(state.service.rules().clone())
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(
        env!("CARGO_PKG_VERSION"),
        state.start_time.elapsed().as_secs(),
    ))
}
