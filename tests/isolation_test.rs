//! Zero-trust isolation: lifecycle, verification checks, threat scanning.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use wardend::boundary::BoundaryEngine;
use wardend::events::{FileOperation, SecurityEvent};
use wardend::isolation::checks::{catalog_for, CheckFrequency, FailureAction};
use wardend::isolation::threat::ActivityKind;
use wardend::isolation::{IsolationError, SecurityLevel, ZeroTrustIsolation};
use wardend::metrics::WardenMetrics;
use wardend::pathguard::PathGuard;

struct Rig {
    isolation: Arc<ZeroTrustIsolation>,
    rx: mpsc::UnboundedReceiver<SecurityEvent>,
    _data: tempfile::TempDir,
}

async fn rig() -> Rig {
    let data = tempfile::tempdir().unwrap();
    let metrics = Arc::new(WardenMetrics::new());
    let pathguard = Arc::new(PathGuard::new(
        Vec::new(),
        Vec::new(),
        Arc::clone(&metrics),
    ));
    let (tx, rx) = mpsc::unbounded_channel();
    let engine = Arc::new(BoundaryEngine::new(
        Arc::clone(&pathguard),
        tx.clone(),
        Arc::clone(&metrics),
        data.path(),
        Vec::new(),
        Duration::from_millis(300),
        Duration::from_secs(60),
    ));
    engine.seed(data.path()).await.unwrap();
    let isolation = Arc::new(ZeroTrustIsolation::new(engine, pathguard, tx, metrics));
    Rig {
        isolation,
        rx,
        _data: data,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<SecurityEvent>) -> Vec<SecurityEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

// ─── Check catalogs ───────────────────────────────────────────────────────────

#[test]
fn standard_catalog_covers_integrity_and_cross_project() {
    let checks = catalog_for(SecurityLevel::Standard);
    assert_eq!(checks.len(), 2);
    let fs = &checks[0];
    assert_eq!(fs.check_name, "filesystem-integrity");
    assert_eq!(fs.period, Some(Duration::from_secs(300)));
    assert_eq!(fs.failure_action, FailureAction::Alert);
    assert_eq!(checks[1].frequency, CheckFrequency::Continuous);
}

#[test]
fn maximum_catalog_tightens_periods_and_actions() {
    let checks = catalog_for(SecurityLevel::Maximum);
    let fs = checks
        .iter()
        .find(|c| c.check_name == "filesystem-integrity")
        .unwrap();
    assert_eq!(fs.period, Some(Duration::from_secs(60)));
    assert_eq!(fs.failure_action, FailureAction::Quarantine);
    assert!(checks.len() > catalog_for(SecurityLevel::Standard).len());
}

// ─── Lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn isolated_projects_get_a_boundary_and_checks() {
    let rig = rig().await;
    let project = tempfile::tempdir().unwrap();
    let boundary = rig
        .isolation
        .create_project_isolation("alpha", project.path(), SecurityLevel::Enhanced)
        .await
        .unwrap();
    assert_eq!(boundary.project_id, "alpha");
    assert_eq!(boundary.security_level, SecurityLevel::Enhanced);
    assert_eq!(boundary.verification_checks.len(), 4);
    assert_eq!(boundary.metrics.boundary_integrity_score, 100.0);
}

#[tokio::test]
async fn duplicate_projects_are_rejected() {
    let rig = rig().await;
    let project = tempfile::tempdir().unwrap();
    rig.isolation
        .create_project_isolation("alpha", project.path(), SecurityLevel::Standard)
        .await
        .unwrap();
    let err = rig
        .isolation
        .create_project_isolation("alpha", project.path(), SecurityLevel::Standard)
        .await
        .unwrap_err();
    assert!(matches!(err, IsolationError::DuplicateProject(_)));
}

#[tokio::test]
async fn hostile_project_paths_are_rejected() {
    let rig = rig().await;
    let err = rig
        .isolation
        .create_project_isolation("evil", std::path::Path::new("../../etc"), SecurityLevel::Standard)
        .await
        .unwrap_err();
    assert!(matches!(err, IsolationError::InvalidProjectPath { .. }));
}

#[tokio::test]
async fn unknown_projects_error_on_access_and_removal() {
    let rig = rig().await;
    let err = rig
        .isolation
        .validate_project_access("ghost", FileOperation::Read, "/tmp/x")
        .await
        .unwrap_err();
    assert!(matches!(err, IsolationError::UnknownProject(_)));
    assert!(rig
        .isolation
        .remove_project_isolation("ghost")
        .await
        .is_err());
}

// ─── Access validation ────────────────────────────────────────────────────────

#[tokio::test]
async fn access_within_the_own_sandbox_passes() {
    let rig = rig().await;
    let project = tempfile::tempdir().unwrap();
    rig.isolation
        .create_project_isolation("alpha", project.path(), SecurityLevel::Standard)
        .await
        .unwrap();
    let target = project.path().join("notes.md");
    let allowed = rig
        .isolation
        .validate_project_access("alpha", FileOperation::Write, &target.to_string_lossy())
        .await
        .unwrap();
    assert!(allowed);
}

#[tokio::test]
async fn cross_project_access_is_blocked_and_decays_the_score() {
    let mut rig = rig().await;
    let alpha = tempfile::tempdir().unwrap();
    let beta = tempfile::tempdir().unwrap();
    rig.isolation
        .create_project_isolation("alpha", alpha.path(), SecurityLevel::Standard)
        .await
        .unwrap();
    rig.isolation
        .create_project_isolation("beta", beta.path(), SecurityLevel::Standard)
        .await
        .unwrap();

    let foreign = beta.path().join("secrets.env");
    let allowed = rig
        .isolation
        .validate_project_access("alpha", FileOperation::Read, &foreign.to_string_lossy())
        .await
        .unwrap();
    assert!(!allowed);

    let boundary = rig.isolation.boundary("alpha").await.unwrap();
    assert_eq!(boundary.metrics.boundary_integrity_score, 85.0);
    assert_eq!(boundary.metrics.verification_failures, 1);

    // The block failure action denies all further access.
    assert!(rig.isolation.is_blocked("alpha").await);
    let own = alpha.path().join("x.txt");
    let allowed = rig
        .isolation
        .validate_project_access("alpha", FileOperation::Write, &own.to_string_lossy())
        .await
        .unwrap();
    assert!(!allowed);

    let kinds: Vec<&str> = drain(&mut rig.rx).iter().map(|e| e.kind()).collect();
    assert!(kinds.contains(&"verification_failed"));
    assert!(kinds.contains(&"unauthorized_access"));
}

// ─── Quarantine ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn quarantine_tears_down_the_boundary() {
    let mut rig = rig().await;
    let project = tempfile::tempdir().unwrap();
    rig.isolation
        .create_project_isolation("alpha", project.path(), SecurityLevel::Standard)
        .await
        .unwrap();

    rig.isolation.quarantine_project("alpha", "test").await;
    assert!(rig.isolation.boundary("alpha").await.is_none());
    assert!(rig.isolation.is_blocked("alpha").await);

    let kinds: Vec<&str> = drain(&mut rig.rx).iter().map(|e| e.kind()).collect();
    assert!(kinds.contains(&"project_quarantined"));

    // Quarantining twice is a no-op, not a second event.
    rig.isolation.quarantine_project("alpha", "again").await;
    let kinds: Vec<&str> = drain(&mut rig.rx).iter().map(|e| e.kind()).collect();
    assert!(!kinds.contains(&"project_quarantined"));
}

// ─── Threat scanning ──────────────────────────────────────────────────────────

#[tokio::test]
async fn privilege_escalation_activity_fires_once_and_blocks() {
    let mut rig = rig().await;
    let project = tempfile::tempdir().unwrap();
    rig.isolation
        .create_project_isolation("alpha", project.path(), SecurityLevel::Standard)
        .await
        .unwrap();
    rig.isolation
        .record_activity("alpha", ActivityKind::CommandObserved, "sudo rm -rf /srv")
        .await;

    rig.isolation.run_threat_scan().await;
    let events = drain(&mut rig.rx);
    let threat = events
        .iter()
        .find_map(|e| match e {
            SecurityEvent::ThreatDetected {
                rule_id,
                confidence,
                ..
            } => Some((rule_id.clone(), *confidence)),
            _ => None,
        })
        .expect("threat event");
    assert_eq!(threat.0, "tr-privilege-escalation");
    assert!(threat.1 >= 0.7);

    // Automatic block, quarantine parked for approval.
    assert!(rig.isolation.is_blocked("alpha").await);
    let approvals = rig.isolation.pending_approvals("alpha").await;
    assert_eq!(approvals.len(), 1);
    assert!(approvals[0].requires_approval);

    // Same match must not fire twice.
    rig.isolation.run_threat_scan().await;
    assert!(drain(&mut rig.rx)
        .iter()
        .all(|e| e.kind() != "threat_detected"));
}

#[tokio::test]
async fn low_confidence_patterns_stay_below_the_threshold() {
    let mut rig = rig().await;
    let project = tempfile::tempdir().unwrap();
    rig.isolation
        .create_project_isolation("alpha", project.path(), SecurityLevel::Standard)
        .await
        .unwrap();
    rig.isolation
        .record_activity("alpha", ActivityKind::FileCreated, "build/cache.symlink")
        .await;
    rig.isolation.run_threat_scan().await;
    assert!(drain(&mut rig.rx)
        .iter()
        .all(|e| e.kind() != "threat_detected"));
}

#[tokio::test]
async fn health_is_the_mean_of_project_scores() {
    let rig = rig().await;
    assert_eq!(rig.isolation.health_score().await, 100.0);
    let project = tempfile::tempdir().unwrap();
    rig.isolation
        .create_project_isolation("alpha", project.path(), SecurityLevel::Standard)
        .await
        .unwrap();
    assert_eq!(rig.isolation.health_score().await, 100.0);
}

// ─── Integrity escalation ─────────────────────────────────────────────────────

#[tokio::test]
async fn three_consecutive_integrity_failures_quarantine_the_project() {
    let mut rig = rig().await;
    let project = tempfile::tempdir().unwrap();
    rig.isolation
        .create_project_isolation("alpha", project.path(), SecurityLevel::Standard)
        .await
        .unwrap();

    for round in 0..3 {
        // Tamper the tree with no recorded activity to explain it.
        std::fs::write(project.path().join(format!("dropped-{round}")), "x").unwrap();
        rig.isolation.run_checks_now("alpha").await.unwrap();
    }

    // The third failure escalates past the standard alert action.
    assert!(rig.isolation.boundary("alpha").await.is_none());
    assert!(rig.isolation.is_blocked("alpha").await);

    let events = drain(&mut rig.rx);
    let failures: Vec<(String, u32)> = events
        .iter()
        .filter_map(|e| match e {
            SecurityEvent::VerificationFailed {
                failure_action,
                consecutive_failures,
                ..
            } => Some((failure_action.clone(), *consecutive_failures)),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 3);
    assert_eq!(failures[0], ("alert".to_string(), 1));
    assert_eq!(failures[2], ("quarantine".to_string(), 3));

    let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
    assert!(kinds.contains(&"boundary_compromised"));
    assert!(kinds.contains(&"project_quarantined"));
}
