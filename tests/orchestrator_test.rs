//! End-to-end orchestration: the access gate, incident pipeline, emergency
//! protocol, posture, and reporting.

use std::sync::Arc;

use wardend::config::WardenConfig;
use wardend::events::{FileOperation, SecurityEvent, Severity};
use wardend::isolation::SecurityLevel;
use wardend::orchestrator::incident::{IncidentStatus, IncidentType, ResponseAction};
use wardend::orchestrator::posture::{compliance_for, ComplianceStatus};
use wardend::orchestrator::SecurityOrchestrator;

fn config(data: &tempfile::TempDir) -> WardenConfig {
    let mut config = WardenConfig::load(&data.path().join("missing.toml")).unwrap();
    config.data_dir = data.path().to_path_buf();
    config.boundary.monitoring_enabled = false;
    config
}

fn orch(data: &tempfile::TempDir) -> Arc<SecurityOrchestrator> {
    SecurityOrchestrator::new(config(data))
}

// ─── Compliance buckets ───────────────────────────────────────────────────────

#[test]
fn compliance_thresholds_are_exact() {
    assert_eq!(compliance_for(100.0), ComplianceStatus::Compliant);
    assert_eq!(compliance_for(95.0), ComplianceStatus::Compliant);
    assert_eq!(compliance_for(94.9), ComplianceStatus::Warning);
    assert_eq!(compliance_for(85.0), ComplianceStatus::Warning);
    assert_eq!(compliance_for(84.9), ComplianceStatus::Violation);
    assert_eq!(compliance_for(70.0), ComplianceStatus::Violation);
    assert_eq!(compliance_for(69.9), ComplianceStatus::Critical);
}

// ─── Access gate ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn traversal_attempts_create_an_incident_synchronously() {
    let data = tempfile::tempdir().unwrap();
    let orch = orch(&data);

    let result = orch
        .validate_secure_access("../../../etc/shadow", "alpha", FileOperation::Write)
        .await;
    assert!(!result.allowed);
    let incident = result.incident.expect("incident");
    assert_eq!(incident.incident_type, IncidentType::PathTraversalAttack);
    assert!(incident
        .response_actions
        .iter()
        .any(|r| r.action == ResponseAction::IsolateNetworkAccess && r.succeeded));

    // The audit trail was written before any response ran.
    let audit = std::fs::read_to_string(data.path().join("audit.log")).unwrap();
    assert!(audit.contains(&incident.id));
    assert!(audit.contains("path_traversal_attack"));

    // The raw triggering event is preserved per incident id, and the
    // network isolation the response claimed is actually in effect.
    let evidence = data.path().join("evidence").join(format!("{}.json", incident.id));
    assert!(evidence.exists());
    assert!(orch.is_network_isolated("alpha").await);
}

#[tokio::test]
async fn the_gate_allows_clean_access_within_a_project() {
    let data = tempfile::tempdir().unwrap();
    let orch = orch(&data);
    orch.start().await.unwrap();

    let project = tempfile::tempdir().unwrap();
    orch.create_secure_project("alpha", project.path(), Some(SecurityLevel::Standard))
        .await
        .unwrap();

    let target = project.path().join("src/main.rs");
    let result = orch
        .validate_secure_access(&target.to_string_lossy(), "alpha", FileOperation::Write)
        .await;
    assert!(result.allowed, "reason: {:?}", result.reason);
    assert!(result.incident.is_none());

    orch.stop().await;
}

#[tokio::test]
async fn cross_project_access_is_denied_with_a_violation_incident() {
    let data = tempfile::tempdir().unwrap();
    let orch = orch(&data);
    orch.start().await.unwrap();

    let alpha = tempfile::tempdir().unwrap();
    let beta = tempfile::tempdir().unwrap();
    orch.create_secure_project("alpha", alpha.path(), Some(SecurityLevel::Standard))
        .await
        .unwrap();
    orch.create_secure_project("beta", beta.path(), Some(SecurityLevel::Standard))
        .await
        .unwrap();

    let foreign = beta.path().join("Cargo.toml");
    let result = orch
        .validate_secure_access(&foreign.to_string_lossy(), "alpha", FileOperation::Write)
        .await;
    assert!(!result.allowed);
    let incident = result.incident.expect("incident");
    assert_eq!(incident.incident_type, IncidentType::BoundaryViolation);
    assert_eq!(incident.severity, Severity::High);

    orch.stop().await;
}

// ─── Emergency protocol ───────────────────────────────────────────────────────

#[tokio::test]
async fn critical_incidents_escalate_and_pause_operations() {
    let data = tempfile::tempdir().unwrap();
    let orch = orch(&data);

    let incident = orch
        .raise_event(SecurityEvent::IntegrityViolation {
            boundary_id: "sandbox-alpha".into(),
            detail: "tree hash mismatch".into(),
            severity: Severity::Critical,
        })
        .await;
    assert_eq!(incident.status, IncidentStatus::Escalated);
    assert_eq!(incident.project_id.as_deref(), Some("alpha"));

    // A forensic bundle was preserved.
    let bundles: Vec<_> = std::fs::read_dir(data.path().join("forensics"))
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(bundles.len(), 1);

    // Everything is paused until an operator intervenes.
    let result = orch
        .validate_secure_access("/tmp/anything", "alpha", FileOperation::Read)
        .await;
    assert!(!result.allowed);
    assert!(result.reason.unwrap().contains("paused"));
}

#[tokio::test]
async fn incident_notifications_reach_subscribers() {
    let data = tempfile::tempdir().unwrap();
    let orch = orch(&data);
    let mut sub = orch.events.subscribe();

    orch.raise_event(SecurityEvent::VerificationFailed {
        project_id: "alpha".into(),
        check_name: "filesystem-integrity".into(),
        failure_action: "alert".into(),
        consecutive_failures: 1,
    })
    .await;

    let mut methods = Vec::new();
    while let Ok(msg) = sub.try_recv() {
        methods.push(msg);
    }
    assert!(methods.iter().any(|m| m.contains("securityIncident")));
    assert!(methods.iter().any(|m| m.contains("projectAccessBlocked")));
}

// ─── Retention, posture, reporting ────────────────────────────────────────────

#[tokio::test]
async fn the_incident_window_is_bounded() {
    let data = tempfile::tempdir().unwrap();
    let mut config = config(&data);
    config.orchestrator.max_incidents = 3;
    let orch = SecurityOrchestrator::new(config);

    for i in 0..5 {
        orch.raise_event(SecurityEvent::UnauthorizedAccess {
            project_id: format!("p{i}"),
            operation: FileOperation::Write,
            target_path: "/tmp/x".into(),
            reason: "test".into(),
        })
        .await;
    }
    assert_eq!(orch.recent_incidents(10).await.len(), 3);
    // Newest first.
    assert_eq!(
        orch.recent_incidents(1).await[0].project_id.as_deref(),
        Some("p4")
    );
}

#[tokio::test]
async fn a_quiet_system_assesses_as_compliant() {
    let data = tempfile::tempdir().unwrap();
    let orch = orch(&data);
    let posture = orch.assess_posture().await;
    assert_eq!(posture.overall_score, 100.0);
    assert_eq!(posture.compliance_status, ComplianceStatus::Compliant);
    assert!(posture.recommendations.is_empty());
    assert!(orch.last_posture().await.is_some());
}

#[tokio::test]
async fn the_comprehensive_report_covers_every_subsystem() {
    let data = tempfile::tempdir().unwrap();
    let orch = orch(&data);

    orch.raise_event(SecurityEvent::UnauthorizedAccess {
        project_id: "alpha".into(),
        operation: FileOperation::Write,
        target_path: "/tmp/x".into(),
        reason: "test".into(),
    })
    .await;

    let report = orch.export_comprehensive_security_report().await;
    assert!(report["posture"]["overall_score"].is_number());
    assert!(report["pathGuard"].is_object());
    assert!(report["boundaryEngine"].is_object());
    assert!(report["isolation"].is_object());
    assert_eq!(report["incidents"]["recent"].as_array().unwrap().len(), 1);
    assert_eq!(report["operationsPaused"], false);
    assert_eq!(report["metrics"]["incidents_created"], 1);
}

// ─── Configuration-driven defaults ────────────────────────────────────────────

#[tokio::test]
async fn relative_projects_land_under_the_sandbox_root_at_the_default_level() {
    let data = tempfile::tempdir().unwrap();
    let sandboxes = tempfile::tempdir().unwrap();
    let mut config = config(&data);
    config.sandbox_root = sandboxes.path().to_path_buf();
    config.isolation.default_security_level = SecurityLevel::Enhanced;
    let orch = SecurityOrchestrator::new(config);

    let boundary = orch
        .create_secure_project("alpha", std::path::Path::new("alpha"), None)
        .await
        .unwrap();
    assert_eq!(boundary.project_path, sandboxes.path().join("alpha"));
    assert_eq!(boundary.security_level, SecurityLevel::Enhanced);
}

// ─── Operator resume ──────────────────────────────────────────────────────────

#[tokio::test]
async fn an_operator_can_resume_after_an_emergency_pause() {
    let data = tempfile::tempdir().unwrap();
    let orch = orch(&data);
    let mut sub = orch.events.subscribe();

    orch.raise_event(SecurityEvent::IntegrityViolation {
        boundary_id: "framework_core".into(),
        detail: "tree hash mismatch".into(),
        severity: Severity::Critical,
    })
    .await;
    let denied = orch
        .validate_secure_access("/tmp/notes.txt", "alpha", FileOperation::Read)
        .await;
    assert!(!denied.allowed);
    assert!(denied.reason.unwrap().contains("paused"));

    orch.resume_operations();
    let result = orch
        .validate_secure_access("/tmp/notes.txt", "alpha", FileOperation::Read)
        .await;
    // Still denied (unknown project), but no longer on account of the pause.
    assert!(!result.reason.unwrap().contains("paused"));

    let mut saw_resume = false;
    while let Ok(msg) = sub.try_recv() {
        if msg.contains("operationsResumed") {
            saw_resume = true;
        }
    }
    assert!(saw_resume);
}
