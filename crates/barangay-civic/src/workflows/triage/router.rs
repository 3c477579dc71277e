use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::envelope::RequestKind;
use super::queue::{TriageError, TriageQuery, TriageService};
use super::scoring::PriorityBucket;

/// Router builder exposing the admin triage queue.
pub fn triage_router(service: Arc<TriageService>) -> Router {
    Router::new()
        .route("/api/v1/triage/requests", get(queue_handler))
        .with_state(service)
}

/// Raw query string; `all` or an empty value disables a filter.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueueParams {
    #[serde(rename = "type")]
    kind: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    page: Option<usize>,
    per_page: Option<usize>,
}

impl QueueParams {
    fn into_query(self) -> Result<TriageQuery, TriageError> {
        let kind = match active(self.kind) {
            Some(raw) => Some(RequestKind::parse(&raw).ok_or_else(|| {
                TriageError::InvalidQuery(format!("unknown request type {raw}"))
            })?),
            None => None,
        };
        let priority = match active(self.priority) {
            Some(raw) => Some(PriorityBucket::parse(&raw).ok_or_else(|| {
                TriageError::InvalidQuery(format!("unknown priority {raw}"))
            })?),
            None => None,
        };

        Ok(TriageQuery {
            kind,
            status: active(self.status),
            priority,
            page: self.page,
            per_page: self.per_page,
        })
    }
}

fn active(value: Option<String>) -> Option<String> {
    value.filter(|raw| {
        let raw = raw.trim();
        !raw.is_empty() && !raw.eq_ignore_ascii_case("all")
    })
}

pub(crate) async fn queue_handler(
    State(service): State<Arc<TriageService>>,
    Query(params): Query<QueueParams>,
) -> Response {
    let result = match params.into_query() {
        // The fan-out joins one OS thread per store.
        Ok(query) => tokio::task::spawn_blocking(move || service.queue(&query, Utc::now()))
            .await
            .unwrap_or_else(|err| Err(TriageError::WorkerFailed(err.to_string()))),
        Err(err) => Err(err),
    };

    match result {
        Ok(page) => (StatusCode::OK, axum::Json(page)).into_response(),
        Err(err) => {
            let status = match err {
                TriageError::InvalidQuery(_) => StatusCode::UNPROCESSABLE_ENTITY,
                TriageError::Source { .. } | TriageError::FetchAborted(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                TriageError::WorkerFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let payload = json!({
                "error": err.to_string(),
                "kind": err.kind(),
            });
            (status, axum::Json(payload)).into_response()
        }
    }
}
