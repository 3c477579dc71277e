use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    DocumentRequestId, DocumentSubmission, DocumentTypeId, FileId, RequirementUpload,
    ResidentId, StaffId,
};
use super::service::{DocumentIssuanceService, DocumentServiceError};
use super::verification::{VerificationCode, VerificationOutcome};

type SharedService = Arc<DocumentIssuanceService>;

/// Router builder exposing the document issuance endpoints.
pub fn document_router(service: SharedService) -> Router {
    Router::new()
        .route("/api/v1/documents/requests", post(submit_handler))
        .route("/api/v1/documents/requests/:request_id", get(status_handler))
        .route(
            "/api/v1/documents/requests/:request_id/approve",
            post(approve_handler),
        )
        .route(
            "/api/v1/documents/requests/:request_id/reject",
            post(reject_handler),
        )
        .route(
            "/api/v1/documents/requests/:request_id/complete",
            post(complete_handler),
        )
        .route(
            "/api/v1/documents/requests/:request_id/cancel",
            post(cancel_handler),
        )
        .route(
            "/api/v1/documents/requests/:request_id/files",
            post(attach_file_handler),
        )
        .route(
            "/api/v1/documents/requests/:request_id/files/:file_id",
            delete(remove_file_handler),
        )
        .route(
            "/api/v1/residents/:resident_id/documents",
            get(resident_requests_handler),
        )
        .route("/api/v1/documents/verify/:code", get(verify_handler))
        .route("/api/v1/documents/expired", get(expired_handler))
        .route("/api/v1/documents/sweep", post(sweep_all_handler))
        .route(
            "/api/v1/documents/types/:document_type_id/sweep",
            post(sweep_type_handler),
        )
        .route(
            "/api/v1/documents/types/:document_type_id",
            delete(delete_type_handler),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovePayload {
    admin_id: String,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectPayload {
    admin_id: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletePayload {
    admin_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CancelPayload {
    requester_id: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeleteTypeParams {
    #[serde(default)]
    force: bool,
    #[serde(default)]
    reason: String,
}

pub(crate) async fn submit_handler(
    State(service): State<SharedService>,
    axum::Json(submission): axum::Json<DocumentSubmission>,
) -> Response {
    let now = Utc::now();
    match service.submit(submission, now) {
        Ok(request) => (StatusCode::CREATED, axum::Json(request.status_view(now))).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn status_handler(
    State(service): State<SharedService>,
    Path(request_id): Path<String>,
) -> Response {
    match service.get(&DocumentRequestId(request_id)) {
        Ok(request) => {
            (StatusCode::OK, axum::Json(request.status_view(Utc::now()))).into_response()
        }
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn approve_handler(
    State(service): State<SharedService>,
    Path(request_id): Path<String>,
    axum::Json(payload): axum::Json<ApprovePayload>,
) -> Response {
    let now = Utc::now();
    let id = DocumentRequestId(request_id);
    match service.approve_and_issue(&id, &StaffId(payload.admin_id), payload.notes, now) {
        Ok(outcome) => {
            let body = json!({
                "request": outcome.request.status_view(now),
                "verification_code": outcome.verification.code,
                "notification": outcome.notification,
                "warnings": outcome.warnings,
            });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn reject_handler(
    State(service): State<SharedService>,
    Path(request_id): Path<String>,
    axum::Json(payload): axum::Json<RejectPayload>,
) -> Response {
    let now = Utc::now();
    let id = DocumentRequestId(request_id);
    match service.reject(&id, &StaffId(payload.admin_id), &payload.reason, now) {
        Ok(request) => (StatusCode::OK, axum::Json(request.status_view(now))).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn complete_handler(
    State(service): State<SharedService>,
    Path(request_id): Path<String>,
    axum::Json(payload): axum::Json<CompletePayload>,
) -> Response {
    let now = Utc::now();
    let id = DocumentRequestId(request_id);
    match service.mark_completed(&id, &StaffId(payload.admin_id), now) {
        Ok(request) => (StatusCode::OK, axum::Json(request.status_view(now))).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn cancel_handler(
    State(service): State<SharedService>,
    Path(request_id): Path<String>,
    axum::Json(payload): axum::Json<CancelPayload>,
) -> Response {
    let now = Utc::now();
    let id = DocumentRequestId(request_id);
    match service.cancel_request(&id, &ResidentId(payload.requester_id), payload.reason, now) {
        Ok(request) => (StatusCode::OK, axum::Json(request.status_view(now))).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn attach_file_handler(
    State(service): State<SharedService>,
    Path(request_id): Path<String>,
    axum::Json(upload): axum::Json<RequirementUpload>,
) -> Response {
    let id = DocumentRequestId(request_id);
    match service.attach_requirement_file(&id, upload, Utc::now()) {
        Ok(files) => (StatusCode::CREATED, axum::Json(json!({ "files": files }))).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn remove_file_handler(
    State(service): State<SharedService>,
    Path((request_id, file_id)): Path<(String, String)>,
) -> Response {
    let id = DocumentRequestId(request_id);
    match service.remove_requirement_file(&id, &FileId(file_id), Utc::now()) {
        Ok(files) => (StatusCode::OK, axum::Json(json!({ "files": files }))).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn resident_requests_handler(
    State(service): State<SharedService>,
    Path(resident_id): Path<String>,
) -> Response {
    let now = Utc::now();
    match service.list_for_requester(&ResidentId(resident_id)) {
        Ok(requests) => {
            let views: Vec<_> = requests.iter().map(|request| request.status_view(now)).collect();
            (StatusCode::OK, axum::Json(json!({ "requests": views }))).into_response()
        }
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn verify_handler(
    State(service): State<SharedService>,
    Path(code): Path<String>,
) -> Response {
    match service.verify(&VerificationCode(code), Utc::now()) {
        Ok(outcome) => {
            let status = match &outcome {
                VerificationOutcome::Valid { .. } => StatusCode::OK,
                VerificationOutcome::Expired { .. } => StatusCode::GONE,
                VerificationOutcome::NotFound => StatusCode::NOT_FOUND,
            };
            (status, axum::Json(outcome)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn expired_handler(State(service): State<SharedService>) -> Response {
    let now = Utc::now();
    match service.expired_awaiting_sweep(now) {
        Ok(requests) => {
            let views: Vec<_> = requests.iter().map(|request| request.status_view(now)).collect();
            let body = json!({ "count": views.len(), "requests": views });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn sweep_all_handler(State(service): State<SharedService>) -> Response {
    match service.sweep_expired(None, Utc::now()) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn sweep_type_handler(
    State(service): State<SharedService>,
    Path(document_type_id): Path<String>,
) -> Response {
    let type_id = DocumentTypeId(document_type_id);
    match service.sweep_expired(Some(&type_id), Utc::now()) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub(crate) async fn delete_type_handler(
    State(service): State<SharedService>,
    Path(document_type_id): Path<String>,
    Query(params): Query<DeleteTypeParams>,
) -> Response {
    let type_id = DocumentTypeId(document_type_id);
    match service.delete_document_type(&type_id, params.force, &params.reason, Utc::now()) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => error_response(&err),
    }
}

/// HTTP status for each service error kind.
pub fn status_for(err: &DocumentServiceError) -> StatusCode {
    match err {
        DocumentServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DocumentServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
        DocumentServiceError::StateConflict(_) => StatusCode::CONFLICT,
        DocumentServiceError::AccessDenied(_) => StatusCode::FORBIDDEN,
        DocumentServiceError::Dependency(_) => StatusCode::BAD_GATEWAY,
        DocumentServiceError::Repository(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_response(err: &DocumentServiceError) -> Response {
    let payload = json!({
        "error": err.to_string(),
        "kind": err.kind(),
    });
    (status_for(err), axum::Json(payload)).into_response()
}
