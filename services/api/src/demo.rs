use crate::infra::{InMemoryBackends, LoggingNotifier, PlainTextRenderer};
use crate::server::{document_service, triage_service};
use barangay_civic::config::{IssuanceConfig, TenantConfig, TriageConfig};
use barangay_civic::error::AppError;
use barangay_civic::workflows::documents::{
    DeliveryInfo, DeliveryMethod, DocumentIssuanceService, DocumentSubmission, DocumentTypeId,
    NotificationStatus, RepositoryError, RequirementUpload, ResidentId, StaffId, VerificationCode,
    VerificationOutcome,
};
use barangay_civic::workflows::triage::{
    ItemLoanRecord, RelocationRecord, RequestKind, SosRecord, TriageError, TriagePage,
    TriageQuery,
};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Barangay name printed on the demo certificate.
    #[arg(long, default_value = "Barangay Poblacion")]
    pub(crate) barangay_name: String,
    /// Directory receiving rendered certificates and requirement uploads.
    /// Defaults to a folder under the system temp directory.
    #[arg(long)]
    pub(crate) upload_dir: Option<PathBuf>,
    /// Requirement file to attach to the demo request (repeatable).
    #[arg(long = "requirement")]
    pub(crate) requirements: Vec<PathBuf>,
    /// Deliver the certificate by e-mail instead of pickup.
    #[arg(long)]
    pub(crate) email: bool,
    /// Skip the triage portion of the demo.
    #[arg(long)]
    pub(crate) skip_triage: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        barangay_name,
        upload_dir,
        requirements,
        email,
        skip_triage,
    } = args;

    let tenant = TenantConfig {
        barangay_id: "brgy-001".to_string(),
        barangay_name,
    };
    let upload_dir =
        upload_dir.unwrap_or_else(|| std::env::temp_dir().join("barangay-civic-demo"));
    let backends = InMemoryBackends::new(&upload_dir, &tenant.barangay_id, &tenant.barangay_name);
    let documents = document_service(
        &backends,
        std::sync::Arc::new(PlainTextRenderer),
        std::sync::Arc::new(LoggingNotifier),
        tenant.clone(),
        IssuanceConfig::default(),
    );

    println!("Barangay civic services demo");
    println!("Barangay: {} ({})", tenant.barangay_name, tenant.barangay_id);
    println!("Upload directory: {}", upload_dir.display());

    let submitted_at = Utc::now();
    let code = run_issuance(&documents, submitted_at, load_uploads(&requirements)?, email)?;
    run_verification(&documents, &code, submitted_at)?;

    if !skip_triage {
        let triage = triage_service(&backends, TriageConfig::default());
        seed_triage_records(&backends, submitted_at)?;
        let page = triage.queue(&TriageQuery::default(), submitted_at + Duration::hours(2))?;
        render_triage_page(&page);
    }

    Ok(())
}

fn load_uploads(paths: &[PathBuf]) -> Result<Vec<RequirementUpload>, AppError> {
    paths
        .iter()
        .map(|path| -> Result<RequirementUpload, AppError> {
            let bytes = std::fs::read(path)?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "requirement".to_string());
            let content_type = mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string();
            Ok(RequirementUpload {
                file_name,
                content_type,
                bytes,
            })
        })
        .collect()
}

fn run_issuance(
    documents: &DocumentIssuanceService,
    submitted_at: DateTime<Utc>,
    files: Vec<RequirementUpload>,
    email: bool,
) -> Result<VerificationCode, AppError> {
    println!("\nDocument issuance");

    let delivery = DeliveryInfo {
        method: if email {
            DeliveryMethod::Email
        } else {
            DeliveryMethod::Pickup
        },
        ..DeliveryInfo::default()
    };
    let request = documents.submit(
        DocumentSubmission {
            requester_id: ResidentId("resident-0001".to_string()),
            document_type_id: DocumentTypeId("doctype-clearance".to_string()),
            purpose: Some("Employment".to_string()),
            quantity: 1,
            delivery,
            files,
        },
        submitted_at,
    )?;
    println!(
        "  Submitted {} ({}), {} requirement file(s)",
        request.id.0,
        request.status.label(),
        request.requirement_files.len()
    );
    for file in &request.requirement_files {
        println!(
            "    - {} [{}] -> {}",
            file.file_name, file.content_type, file.storage_ref.0
        );
    }

    let approved_at = submitted_at + Duration::hours(1);
    let outcome = documents.approve_and_issue(
        &request.id,
        &StaffId("staff-0001".to_string()),
        Some("Requirements complete".to_string()),
        approved_at,
    )?;
    println!(
        "  Issued by {} with code {}",
        outcome.verification.snapshot.issuer_name, outcome.verification.code.0
    );
    if let Some(artifact) = &outcome.request.artifact_ref {
        println!("  Certificate stored at {}", artifact.0);
    }
    match &outcome.notification {
        NotificationStatus::NotRequested => println!("  Delivery: pickup at the barangay hall"),
        NotificationStatus::Sent => println!("  Delivery: e-mailed to the resident"),
        NotificationStatus::Failed { reason } => println!("  Delivery failed: {reason}"),
    }
    for warning in &outcome.warnings {
        println!("  Warning: {warning}");
    }

    Ok(outcome.verification.code)
}

fn run_verification(
    documents: &DocumentIssuanceService,
    code: &VerificationCode,
    submitted_at: DateTime<Utc>,
) -> Result<(), AppError> {
    println!("\nVerification");
    let approved_at = submitted_at + Duration::hours(1);

    for days in [5, 31] {
        let at = approved_at + Duration::days(days);
        let outcome = documents.verify(code, at)?;
        println!("  Day {days:>2}: {}", describe_outcome(&outcome));
    }

    let sweep_at = approved_at + Duration::days(31);
    let awaiting = documents.expired_awaiting_sweep(sweep_at)?;
    println!("  Awaiting sweep: {}", awaiting.len());
    let report = documents.sweep_expired(None, sweep_at)?;
    println!(
        "  Sweep retired {} document(s), removed {} artifact(s)",
        report.count,
        report.removed_artifact_refs.len()
    );
    for failure in &report.failures {
        println!("    ! {}: {}", failure.request_id.0, failure.reason);
    }

    Ok(())
}

fn describe_outcome(outcome: &VerificationOutcome) -> String {
    match outcome {
        VerificationOutcome::NotFound => "not found".to_string(),
        VerificationOutcome::Expired { snapshot, .. } => {
            format!("expired ({} for {})", snapshot.document_type_name, snapshot.requester_name)
        }
        VerificationOutcome::Valid {
            snapshot,
            status,
            days_until_expiry,
            ..
        } => match days_until_expiry {
            Some(days) => format!(
                "valid, {status}, {days} day(s) left ({} for {})",
                snapshot.document_type_name, snapshot.requester_name
            ),
            None => format!(
                "valid, {status}, no expiry ({} for {})",
                snapshot.document_type_name, snapshot.requester_name
            ),
        },
    }
}

fn seed_triage_records(
    backends: &InMemoryBackends,
    submitted_at: DateTime<Utc>,
) -> Result<(), AppError> {
    let stamp = |at: DateTime<Utc>| at.to_rfc3339();
    let failed =
        |kind: RequestKind| move |source: RepositoryError| TriageError::Source { kind, source };

    backends
        .sos
        .push(SosRecord {
            id: "sos-0001".to_string(),
            requester_id: ResidentId("resident-0002".to_string()),
            status: "pending".to_string(),
            emergency_type: "Fire".to_string(),
            description: "Kitchen fire spreading to neighbor".to_string(),
            created_at: stamp(submitted_at - Duration::minutes(20)),
            responded_at: None,
        })
        .map_err(failed(RequestKind::Sos))?;

    backends
        .relocations
        .push(RelocationRecord {
            id: "reloc-0001".to_string(),
            requester_id: ResidentId("resident-0002".to_string()),
            status: "pending".to_string(),
            from_barangay_id: "brgy-002".to_string(),
            to_barangay_id: "brgy-001".to_string(),
            created_at: stamp(submitted_at - Duration::days(9)),
            processed_at: None,
        })
        .map_err(failed(RequestKind::Relocation))?;

    backends
        .items
        .push(ItemLoanRecord {
            id: "loan-0001".to_string(),
            requester_id: ResidentId("resident-0001".to_string()),
            status: "pending".to_string(),
            item_id: "item-chairs".to_string(),
            created_at: stamp(submitted_at - Duration::days(1)),
            processed_at: None,
        })
        .map_err(failed(RequestKind::Item))?;

    Ok(())
}

fn render_triage_page(page: &TriagePage) {
    println!("\nTriage queue");
    println!(
        "  {} request(s), page {} of {}",
        page.meta.total, page.meta.page, page.meta.pages
    );
    for item in &page.items {
        println!(
            "  [{:<6}] {:>3}  {:<10} {:<12} {}",
            item.priority.label(),
            item.score,
            item.envelope.kind.label(),
            item.envelope.status,
            item.envelope.description
        );
    }
}
