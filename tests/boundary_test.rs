//! Boundary engine: rule evaluation, the access gate, enforcement, and
//! integrity hashing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use wardend::boundary::{enforce, integrity, BoundaryEngine};
use wardend::events::{FileOperation, SecurityEvent, Severity};
use wardend::metrics::WardenMetrics;
use wardend::pathguard::PathGuard;

struct Rig {
    engine: Arc<BoundaryEngine>,
    rx: mpsc::UnboundedReceiver<SecurityEvent>,
    data: tempfile::TempDir,
    alpha: tempfile::TempDir,
    beta: tempfile::TempDir,
}

async fn rig(protected: Vec<PathBuf>) -> Rig {
    let data = tempfile::tempdir().unwrap();
    let alpha = tempfile::tempdir().unwrap();
    let beta = tempfile::tempdir().unwrap();
    let metrics = Arc::new(WardenMetrics::new());
    let pathguard = Arc::new(PathGuard::new(
        protected.clone(),
        Vec::new(),
        Arc::clone(&metrics),
    ));
    let (tx, rx) = mpsc::unbounded_channel();
    let engine = Arc::new(BoundaryEngine::new(
        pathguard,
        tx,
        metrics,
        data.path(),
        protected,
        Duration::from_millis(300),
        Duration::from_secs(60),
    ));
    engine.seed(data.path()).await.unwrap();
    engine
        .add_project_boundary("alpha", alpha.path(), false)
        .await;
    engine.add_project_boundary("beta", beta.path(), false).await;
    Rig {
        engine,
        rx,
        data,
        alpha,
        beta,
    }
}

#[tokio::test]
async fn writes_inside_the_own_sandbox_are_allowed() {
    let rig = rig(Vec::new()).await;
    let target = rig.alpha.path().join("src/lib.rs");
    let decision = rig
        .engine
        .validate_file_access(&target.to_string_lossy(), FileOperation::Write, Some("alpha"))
        .await;
    assert!(decision.allowed, "reason: {:?}", decision.reason);
    assert!(decision.violation.is_none());
}

#[tokio::test]
async fn cross_project_writes_produce_a_high_severity_violation() {
    let rig = rig(Vec::new()).await;
    let target = rig.beta.path().join("Cargo.toml");
    let decision = rig
        .engine
        .validate_file_access(&target.to_string_lossy(), FileOperation::Write, Some("alpha"))
        .await;
    assert!(!decision.allowed);
    let violation = decision.violation.expect("violation");
    assert_eq!(violation.violation_type, "cross_project_write");
    assert_eq!(violation.severity, Severity::High);
    assert!(violation.blocked);
}

#[tokio::test]
async fn writes_into_the_framework_core_are_critical() {
    let rig = rig(Vec::new()).await;
    let target = rig.data.path().join("warden.toml");
    let decision = rig
        .engine
        .validate_file_access(&target.to_string_lossy(), FileOperation::Write, Some("alpha"))
        .await;
    assert!(!decision.allowed);
    let violation = decision.violation.expect("violation");
    assert_eq!(violation.severity, Severity::Critical);
}

#[tokio::test]
async fn the_wardens_own_quarantine_dir_stays_writable() {
    let rig = rig(Vec::new()).await;
    let target = rig.data.path().join("quarantine/123-payload.sh");
    let decision = rig
        .engine
        .validate_file_access(&target.to_string_lossy(), FileOperation::Write, Some("alpha"))
        .await;
    // The allow rule matches, so no violation is built even though the
    // caller's sandbox does not contain the path.
    assert!(decision.violation.is_none());
}

#[tokio::test]
async fn executable_drops_are_quarantined_when_the_level_demands_it() {
    let mut rig = rig(Vec::new()).await;
    let gamma = tempfile::tempdir().unwrap();
    rig.engine
        .add_project_boundary("gamma", gamma.path(), true)
        .await;
    let payload = gamma.path().join("dropper.sh");
    std::fs::write(&payload, b"#!/bin/sh\n").unwrap();

    rig.engine
        .handle_change(wardend::boundary::FsChange {
            boundary_id: "sandbox-gamma".into(),
            path: payload.clone(),
            kind: wardend::boundary::rules::ChangeKind::Created,
            is_executable: true,
            size: 10,
        })
        .await;

    assert!(!payload.exists(), "payload should have been moved");
    let quarantined: Vec<_> = std::fs::read_dir(rig.data.path().join("quarantine"))
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert!(quarantined
        .iter()
        .any(|e| e.file_name().to_string_lossy().ends_with("-dropper.sh")));

    let event = rig.rx.recv().await.expect("violation event");
    match event {
        SecurityEvent::BoundaryViolation(v) => {
            assert_eq!(v.violation_type, "executable_dropped");
        }
        other => panic!("unexpected event: {}", other.kind()),
    }
}

#[tokio::test]
async fn removed_boundaries_stop_gating() {
    let rig = rig(Vec::new()).await;
    assert!(rig.engine.remove_project_boundary("beta").await);
    assert!(!rig.engine.remove_project_boundary("beta").await);
    assert!(rig.engine.boundary("sandbox-beta").await.is_none());
}

// ─── Enforcement ──────────────────────────────────────────────────────────────

fn violation_for(target: &Path) -> wardend::boundary::BoundaryViolation {
    wardend::boundary::BoundaryViolation {
        id: "v1".into(),
        timestamp: chrono::Utc::now(),
        violation_type: "boundary_violation".into(),
        source_path: "project:alpha".into(),
        target_path: target.to_string_lossy().into_owned(),
        project_id: Some("alpha".into()),
        severity: Severity::Medium,
        blocked: true,
        remediation_action: "deny".into(),
        evidence: serde_json::json!({}),
    }
}

#[tokio::test]
async fn deny_refuses_to_delete_outside_the_boundary_root() {
    let root = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let victim = outside.path().join("precious.txt");
    std::fs::write(&victim, b"keep me").unwrap();

    let outcome = enforce::enforce(
        &violation_for(&victim),
        wardend::boundary::rules::RuleAction::Deny,
        root.path(),
        root.path(),
    )
    .await;
    assert!(matches!(outcome, enforce::EnforcementOutcome::Failed { .. }));
    assert!(victim.exists());
}

#[tokio::test]
async fn quarantine_moves_the_artifact_with_a_timestamped_name() {
    let root = tempfile::tempdir().unwrap();
    let quarantine = tempfile::tempdir().unwrap();
    let artifact = root.path().join("payload.bin");
    std::fs::write(&artifact, b"x").unwrap();

    let outcome = enforce::enforce(
        &violation_for(&artifact),
        wardend::boundary::rules::RuleAction::Quarantine,
        root.path(),
        quarantine.path(),
    )
    .await;
    let enforce::EnforcementOutcome::Quarantined { to, .. } = outcome else {
        panic!("expected quarantine");
    };
    assert!(!artifact.exists());
    assert!(to.exists());
    assert!(to
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with("-payload.bin"));
}

// ─── Integrity ────────────────────────────────────────────────────────────────

#[test]
fn tree_hash_changes_only_when_content_does() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"one").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub/b.txt"), b"two").unwrap();

    let first = integrity::hash_tree(dir.path()).unwrap();
    let second = integrity::hash_tree(dir.path()).unwrap();
    assert_eq!(first, second, "hash must be deterministic");

    std::fs::write(dir.path().join("a.txt"), b"one!").unwrap();
    let third = integrity::hash_tree(dir.path()).unwrap();
    assert_ne!(first, third);
}

#[test]
fn missing_trees_hash_to_the_empty_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let gone = dir.path().join("never-created");
    let hash = integrity::hash_tree(&gone).unwrap();
    assert!(!hash.is_empty());
}
