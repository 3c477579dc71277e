use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use barangay_civic::workflows::documents::{document_router, DocumentIssuanceService};
use barangay_civic::workflows::triage::{triage_router, TriageService};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_civic_routes(
    documents: Arc<DocumentIssuanceService>,
    triage: Arc<TriageService>,
) -> axum::Router {
    document_router(documents)
        .merge(triage_router(triage))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{InMemoryBackends, LoggingNotifier, PlainTextRenderer};
    use crate::server::{document_service, triage_service};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use barangay_civic::config::{IssuanceConfig, TenantConfig, TriageConfig};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn router() -> axum::Router {
        let tenant = TenantConfig {
            barangay_id: "brgy-001".to_string(),
            barangay_name: "Barangay Poblacion".to_string(),
        };
        let backends = InMemoryBackends::new(
            std::env::temp_dir().join("barangay-civic-api-routes"),
            &tenant.barangay_id,
            &tenant.barangay_name,
        );
        let documents = document_service(
            &backends,
            Arc::new(PlainTextRenderer),
            Arc::new(LoggingNotifier),
            tenant,
            IssuanceConfig::default(),
        );
        let triage = triage_service(&backends, TriageConfig::default());
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_civic_routes(documents, triage).layer(Extension(state))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        let response = readiness_endpoint(Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn merged_router_serves_both_workflows() {
        let app = router();

        let triage = app
            .clone()
            .oneshot(
                Request::get("/api/v1/triage/requests")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router responds");
        assert_eq!(triage.status(), StatusCode::OK);
        assert_eq!(json_body(triage).await["meta"]["total"], 0);

        let verify = app
            .clone()
            .oneshot(
                Request::get("/api/v1/documents/verify/unknown-code")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router responds");
        assert_eq!(verify.status(), StatusCode::NOT_FOUND);

        let ready = app
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("router responds");
        assert_eq!(ready.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn submitted_requests_are_readable_over_http() {
        let app = router();
        let payload = json!({
            "requester_id": "resident-0001",
            "document_type_id": "doctype-clearance",
            "purpose": "Employment"
        });

        let created = app
            .clone()
            .oneshot(
                Request::post("/api/v1/documents/requests")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router responds");
        assert_eq!(created.status(), StatusCode::CREATED);
        let body = json_body(created).await;
        let id = body["id"].as_str().expect("id present").to_string();

        let fetched = app
            .oneshot(
                Request::get(format!("/api/v1/documents/requests/{id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router responds");
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(json_body(fetched).await["status"], "pending");
    }
}
