use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryBackends, LoggingNotifier, PlainTextRenderer};
use crate::routes::with_civic_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use barangay_civic::config::{AppConfig, IssuanceConfig, TenantConfig, TriageConfig};
use barangay_civic::error::AppError;
use barangay_civic::telemetry;
use barangay_civic::workflows::documents::{
    ArtifactRenderer, DocumentIssuanceService, DocumentPorts, Notifier,
};
use barangay_civic::workflows::triage::{TriageService, TriageSources};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let backends = InMemoryBackends::new(
        config.storage.upload_dir.clone(),
        &config.tenant.barangay_id,
        &config.tenant.barangay_name,
    );
    let documents = document_service(
        &backends,
        Arc::new(PlainTextRenderer),
        Arc::new(LoggingNotifier),
        config.tenant.clone(),
        config.issuance.clone(),
    );
    let triage = triage_service(&backends, config.triage);

    let app = with_civic_routes(documents, triage)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        barangay = %config.tenant.barangay_name,
        upload_dir = %config.storage.upload_dir.display(),
        "barangay civic services ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) fn document_service(
    backends: &InMemoryBackends,
    renderer: Arc<dyn ArtifactRenderer>,
    notifier: Arc<dyn Notifier>,
    tenant: TenantConfig,
    config: IssuanceConfig,
) -> Arc<DocumentIssuanceService> {
    let ports = DocumentPorts {
        requests: backends.requests.clone(),
        types: backends.types.clone(),
        people: backends.people.clone(),
        verifications: backends.verifications.clone(),
        renderer,
        notifier,
        files: backends.files.clone(),
    };
    Arc::new(DocumentIssuanceService::new(ports, tenant, config))
}

pub(crate) fn triage_service(backends: &InMemoryBackends, config: TriageConfig) -> Arc<TriageService> {
    let sources = TriageSources {
        requests: backends.requests.clone(),
        types: backends.types.clone(),
        people: backends.people.clone(),
        sos: backends.sos.clone(),
        relocations: backends.relocations.clone(),
        items: backends.items.clone(),
    };
    Arc::new(TriageService::new(sources, config))
}
