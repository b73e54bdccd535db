// SPDX-License-Identifier: MIT
//! Automated response-action execution.
//!
//! Every action runs independently: one failed action never prevents the
//! next from running, and every attempt is recorded on the incident as an
//! [`ActionRecord`]. Quarantine and backup for the same project are
//! serialized through a per-project lock so they never race each other.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::audit::AuditLog;
use crate::boundary::enforce::{enforce, EnforcementOutcome};
use crate::boundary::rules::RuleAction;
use crate::boundary::{BoundaryEngine, BoundaryViolation};
use crate::events::EventBroadcaster;
use crate::isolation::ZeroTrustIsolation;
use crate::metrics::WardenMetrics;
use crate::orchestrator::forensics::{capture_process_snapshot, write_bundle, ForensicBundle};
use crate::orchestrator::incident::{ActionRecord, ResponseAction, SecurityIncident};

/// How many audit entries to fold into a forensic bundle.
const FORENSIC_AUDIT_TAIL: usize = 100;

// ─── ResponseExecutor ─────────────────────────────────────────────────────────

pub struct ResponseExecutor {
    engine: Arc<BoundaryEngine>,
    isolation: Arc<ZeroTrustIsolation>,
    events: Arc<EventBroadcaster>,
    metrics: Arc<WardenMetrics>,
    audit: Arc<AuditLog>,
    forensics_dir: PathBuf,
    backups_dir: PathBuf,
    /// Project roots as registered at creation time. Never pruned: the
    /// backup and revert actions need the path after the boundary itself
    /// has already been torn down by a quarantine.
    project_paths: RwLock<HashMap<String, PathBuf>>,
    /// Per-project serialization for quarantine/backup.
    project_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    network_isolated: RwLock<HashSet<String>>,
    operations_paused: AtomicBool,
}

impl ResponseExecutor {
    pub fn new(
        engine: Arc<BoundaryEngine>,
        isolation: Arc<ZeroTrustIsolation>,
        events: Arc<EventBroadcaster>,
        metrics: Arc<WardenMetrics>,
        audit: Arc<AuditLog>,
        forensics_dir: PathBuf,
        backups_dir: PathBuf,
    ) -> Self {
        Self {
            engine,
            isolation,
            events,
            metrics,
            audit,
            forensics_dir,
            backups_dir,
            project_paths: RwLock::new(HashMap::new()),
            project_locks: Mutex::new(HashMap::new()),
            network_isolated: RwLock::new(HashSet::new()),
            operations_paused: AtomicBool::new(false),
        }
    }

    pub async fn register_project(&self, project_id: &str, path: &Path) {
        self.project_paths
            .write()
            .await
            .insert(project_id.to_string(), path.to_path_buf());
    }

    pub fn operations_paused(&self) -> bool {
        self.operations_paused.load(Ordering::Relaxed)
    }

    pub fn resume_operations(&self) {
        if self.operations_paused.swap(false, Ordering::Relaxed) {
            info!("operations resumed");
        }
    }

    pub async fn is_network_isolated(&self, project_id: &str) -> bool {
        self.network_isolated.read().await.contains(project_id)
    }

    /// Execute the policy's actions for an incident, appending one
    /// [`ActionRecord`] per attempt. `recent` is the orchestrator's
    /// incident window, used when a forensic bundle is produced.
    pub async fn execute(
        &self,
        incident: &mut SecurityIncident,
        actions: &[ResponseAction],
        recent: &[SecurityIncident],
    ) {
        let mut records = Vec::with_capacity(actions.len());
        for action in actions {
            let record = self.run_action(*action, incident, recent).await;
            if !record.succeeded {
                warn!(
                    incident = incident.id,
                    action = %record.action,
                    detail = record.detail,
                    "response action failed"
                );
            }
            records.push(record);
        }
        incident.response_actions.extend(records);
    }

    /// The emergency protocol: pause all operations, quarantine the
    /// affected project if one is known, and notify every subscriber.
    pub async fn emergency_protocol(&self, incident: &SecurityIncident) {
        self.operations_paused.store(true, Ordering::Relaxed);
        error!(
            incident = incident.id,
            severity = %incident.severity,
            "EMERGENCY PROTOCOL ACTIVATED"
        );
        self.events.broadcast(
            "operationsPaused",
            json!({
                "incidentId": incident.id,
                "reason": incident.description,
            }),
        );
        if let Some(project_id) = &incident.project_id {
            let lock = self.lock_for(project_id).await;
            let _guard = lock.lock().await;
            self.isolation
                .quarantine_project(project_id, &incident.description)
                .await;
        }
        self.events.broadcast(
            "emergencyProtocol",
            json!({
                "incidentId": incident.id,
                "incidentType": incident.incident_type.to_string(),
                "severity": incident.severity,
                "projectId": incident.project_id,
                "activatedAt": Utc::now(),
            }),
        );
    }

    // ── Individual actions ────────────────────────────────────────────────

    async fn run_action(
        &self,
        action: ResponseAction,
        incident: &SecurityIncident,
        recent: &[SecurityIncident],
    ) -> ActionRecord {
        let result = match action {
            ResponseAction::BlockAccess => self.block_access(incident).await,
            ResponseAction::QuarantineProject => self.quarantine_project(incident).await,
            ResponseAction::BackupProjectState => self.backup_project(incident).await,
            ResponseAction::ForensicAnalysis => self.forensic_analysis(incident, recent).await,
            ResponseAction::IsolateNetworkAccess => self.isolate_network(incident).await,
            ResponseAction::EnhanceMonitoring => self.enhance_monitoring(incident).await,
            ResponseAction::AlertSecurityTeam => self.alert_security_team(incident),
            ResponseAction::QuarantineFile => self.quarantine_file(incident).await,
            ResponseAction::RevertChanges => self.revert_changes(incident).await,
            ResponseAction::LogOnly => {
                info!(
                    incident = incident.id,
                    kind = %incident.incident_type,
                    "incident recorded, no active response"
                );
                Ok("logged".to_string())
            }
        };
        match result {
            Ok(detail) => ActionRecord {
                action,
                succeeded: true,
                detail,
            },
            Err(detail) => ActionRecord {
                action,
                succeeded: false,
                detail,
            },
        }
    }

    async fn block_access(&self, incident: &SecurityIncident) -> Result<String, String> {
        let project_id = require_project(incident)?;
        self.isolation.block_project(project_id).await;
        self.metrics.inc_access_denied();
        self.events.broadcast(
            "projectAccessBlocked",
            json!({
                "projectId": project_id,
                "incidentId": incident.id,
                "reason": incident.description,
            }),
        );
        Ok(format!("access blocked for {project_id}"))
    }

    async fn quarantine_project(&self, incident: &SecurityIncident) -> Result<String, String> {
        let project_id = require_project(incident)?;
        let lock = self.lock_for(project_id).await;
        let _guard = lock.lock().await;
        self.isolation
            .quarantine_project(project_id, &incident.description)
            .await;
        Ok(format!("project {project_id} quarantined"))
    }

    async fn backup_project(&self, incident: &SecurityIncident) -> Result<String, String> {
        let project_id = require_project(incident)?;
        let source = self
            .project_paths
            .read()
            .await
            .get(project_id)
            .cloned()
            .ok_or_else(|| format!("no registered path for {project_id}"))?;
        let lock = self.lock_for(project_id).await;
        let _guard = lock.lock().await;
        let dest = self
            .backups_dir
            .join(format!("{}-{}", project_id, Utc::now().timestamp_millis()));
        let dest_for_copy = dest.clone();
        let copied = tokio::task::spawn_blocking(move || copy_tree(&source, &dest_for_copy))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?;
        info!(
            project = project_id,
            files = copied,
            dest = %dest.display(),
            "project state backed up"
        );
        Ok(format!("{copied} files backed up to {}", dest.display()))
    }

    async fn forensic_analysis(
        &self,
        incident: &SecurityIncident,
        recent: &[SecurityIncident],
    ) -> Result<String, String> {
        let process_snapshot = tokio::task::spawn_blocking(capture_process_snapshot)
            .await
            .map_err(|e| e.to_string())?;
        let bundle = ForensicBundle {
            incident,
            process_snapshot,
            recent_audit_entries: self.audit.tail(FORENSIC_AUDIT_TAIL).await,
            recent_incidents: recent.iter().collect(),
        };
        let path = write_bundle(&self.forensics_dir, &bundle)
            .await
            .map_err(|e| e.to_string())?;
        Ok(format!("forensic bundle written to {}", path.display()))
    }

    async fn isolate_network(&self, incident: &SecurityIncident) -> Result<String, String> {
        let project_id = require_project(incident)?;
        self.network_isolated
            .write()
            .await
            .insert(project_id.to_string());
        self.events.broadcast(
            "networkIsolated",
            json!({
                "projectId": project_id,
                "incidentId": incident.id,
            }),
        );
        Ok(format!("network access isolated for {project_id}"))
    }

    async fn enhance_monitoring(&self, incident: &SecurityIncident) -> Result<String, String> {
        let project_id = require_project(incident)?;
        self.isolation.enhance_monitoring(project_id).await;
        // Verify immediately under the tightened schedule rather than
        // waiting for the next tick.
        let _ = self.isolation.run_checks_now(project_id).await;
        Ok(format!("monitoring enhanced for {project_id}"))
    }

    fn alert_security_team(&self, incident: &SecurityIncident) -> Result<String, String> {
        error!(
            incident = incident.id,
            kind = %incident.incident_type,
            severity = %incident.severity,
            project = ?incident.project_id,
            description = incident.description,
            "SECURITY ALERT"
        );
        Ok("security team alerted".to_string())
    }

    async fn quarantine_file(&self, incident: &SecurityIncident) -> Result<String, String> {
        let target = evidence_path(incident)?;
        let violation = synthetic_violation(incident, &target);
        match enforce(
            &violation,
            RuleAction::Quarantine,
            Path::new("/"),
            self.engine.quarantine_dir(),
        )
        .await
        {
            EnforcementOutcome::Quarantined { to, .. } => {
                self.metrics.inc_files_quarantined();
                Ok(format!("file quarantined to {}", to.display()))
            }
            EnforcementOutcome::Failed { error, .. } => Err(error),
            other => Err(format!("unexpected quarantine outcome: {other:?}")),
        }
    }

    async fn revert_changes(&self, incident: &SecurityIncident) -> Result<String, String> {
        let project_id = require_project(incident)?;
        let root = self
            .project_paths
            .read()
            .await
            .get(project_id)
            .cloned()
            .ok_or_else(|| format!("no registered path for {project_id}"))?;
        let target = evidence_path(incident)?;
        let violation = synthetic_violation(incident, &target);
        match enforce(
            &violation,
            RuleAction::Deny,
            &root,
            self.engine.quarantine_dir(),
        )
        .await
        {
            EnforcementOutcome::Deleted { path } => {
                Ok(format!("reverted: removed {}", path.display()))
            }
            EnforcementOutcome::Failed { error, .. } => Err(error),
            other => Err(format!("unexpected revert outcome: {other:?}")),
        }
    }

    async fn lock_for(&self, project_id: &str) -> Arc<Mutex<()>> {
        self.project_locks
            .lock()
            .await
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn require_project(incident: &SecurityIncident) -> Result<&str, String> {
    incident
        .project_id
        .as_deref()
        .ok_or_else(|| "incident has no associated project".to_string())
}

fn evidence_path(incident: &SecurityIncident) -> Result<PathBuf, String> {
    incident
        .evidence
        .get("target_path")
        .or_else(|| incident.evidence.get("path"))
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .ok_or_else(|| "incident evidence carries no target path".to_string())
}

fn synthetic_violation(incident: &SecurityIncident, target: &Path) -> BoundaryViolation {
    BoundaryViolation {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        violation_type: "response_action".to_string(),
        source_path: String::new(),
        target_path: target.to_string_lossy().into_owned(),
        project_id: incident.project_id.clone(),
        severity: incident.severity,
        blocked: true,
        remediation_action: "enforced by response executor".to_string(),
        evidence: json!({ "incidentId": incident.id }),
    }
}

/// Recursive copy, returning the number of files written.
fn copy_tree(src: &Path, dest: &Path) -> std::io::Result<u64> {
    std::fs::create_dir_all(dest)?;
    let mut copied = 0;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copied += copy_tree(&from, &to)?;
        } else if file_type.is_file() {
            std::fs::copy(&from, &to)?;
            copied += 1;
        }
        // Symlinks are skipped: a backup must not follow links out of the
        // project tree.
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_tree_counts_files() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("nested")).unwrap();
        std::fs::write(src.path().join("a.txt"), b"a").unwrap();
        std::fs::write(src.path().join("nested/b.txt"), b"b").unwrap();
        let dest = tempfile::tempdir().unwrap();
        let n = copy_tree(src.path(), &dest.path().join("backup")).unwrap();
        assert_eq!(n, 2);
        assert!(dest.path().join("backup/nested/b.txt").exists());
    }

    #[test]
    fn evidence_path_prefers_target_path() {
        let incident = SecurityIncident::new(
            crate::orchestrator::incident::IncidentType::BoundaryViolation,
            crate::events::Severity::Medium,
            "boundary_engine",
            Some("p1".into()),
            "test".into(),
            json!({ "target_path": "/tmp/x", "path": "/tmp/y" }),
        );
        assert_eq!(evidence_path(&incident).unwrap(), PathBuf::from("/tmp/x"));
    }
}
