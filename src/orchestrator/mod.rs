// SPDX-License-Identifier: MIT
//! Central coordination: one incident per inbound event, policy-driven
//! response, posture assessment, and the synchronous three-stage access gate.
//!
//! The orchestrator owns the receiving end of the subsystem event channel.
//! Every [`SecurityEvent`] becomes exactly one [`SecurityIncident`]; the
//! incident is audited BEFORE any response runs, so the trail survives a
//! crash mid-response.

pub mod forensics;
pub mod incident;
pub mod posture;
pub mod response;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::audit::{AuditEntry, AuditLog};
use crate::boundary::{BoundaryEngine, FsChange};
use crate::config::WardenConfig;
use crate::events::{EventBroadcaster, FileOperation, SecurityEvent, Severity};
use crate::isolation::{
    IsolationError, ProjectIsolationBoundary, SecurityLevel, ZeroTrustIsolation,
};
use crate::metrics::WardenMetrics;
use crate::pathguard::{PathGuard, PathTraversalAttempt, SafePath};

use incident::{
    response_actions_for, IncidentStatus, IncidentType, ResponseAction, SecurityIncident,
};
use posture::{PostureAssessor, SecurityPosture, SystemHealth};
use response::ResponseExecutor;

/// How often the periodic-verification scheduler wakes up. Individual check
/// periods are longer; the tick only decides which are due.
const VERIFICATION_TICK: Duration = Duration::from_secs(30);

/// How many trailing incidents a forensic bundle sees.
const FORENSIC_INCIDENT_CONTEXT: usize = 20;

/// How many incidents the comprehensive report includes.
const REPORT_INCIDENT_LIMIT: usize = 100;

// ─── Gate result ──────────────────────────────────────────────────────────────

/// Outcome of [`SecurityOrchestrator::validate_secure_access`].
#[derive(Debug, Clone)]
pub struct SecureAccessResult {
    pub allowed: bool,
    pub reason: Option<String>,
    /// Present when the denial itself created an incident synchronously.
    /// Isolation-stage denials raise their incident through the event
    /// channel instead and leave this `None`.
    pub incident: Option<SecurityIncident>,
    pub safe_path: Option<SafePath>,
}

impl SecureAccessResult {
    fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            incident: None,
            safe_path: None,
        }
    }
}

// ─── SecurityOrchestrator ─────────────────────────────────────────────────────

pub struct SecurityOrchestrator {
    config: WardenConfig,
    pub metrics: Arc<WardenMetrics>,
    pub events: Arc<EventBroadcaster>,
    pub audit: Arc<AuditLog>,
    pub pathguard: Arc<PathGuard>,
    pub engine: Arc<BoundaryEngine>,
    pub isolation: Arc<ZeroTrustIsolation>,
    executor: Arc<ResponseExecutor>,
    assessor: PostureAssessor,
    incidents: RwLock<VecDeque<SecurityIncident>>,
    last_posture: RwLock<Option<SecurityPosture>>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<SecurityEvent>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SecurityOrchestrator {
    pub fn new(config: WardenConfig) -> Arc<Self> {
        let metrics = Arc::new(WardenMetrics::new());
        let events = Arc::new(EventBroadcaster::new());
        let audit = Arc::new(AuditLog::new(&config.data_dir));
        let (event_tx, event_rx) = mpsc::unbounded_channel::<SecurityEvent>();

        let pathguard = Arc::new(PathGuard::new(
            config.all_protected_paths(),
            config.read_whitelist.clone(),
            Arc::clone(&metrics),
        ));
        let engine = Arc::new(BoundaryEngine::new(
            Arc::clone(&pathguard),
            event_tx.clone(),
            Arc::clone(&metrics),
            &config.data_dir,
            config.all_protected_paths(),
            config.debounce(),
            config.integrity_interval(),
        ));
        let isolation = Arc::new(ZeroTrustIsolation::new(
            Arc::clone(&engine),
            Arc::clone(&pathguard),
            event_tx,
            Arc::clone(&metrics),
        ));
        let executor = Arc::new(ResponseExecutor::new(
            Arc::clone(&engine),
            Arc::clone(&isolation),
            Arc::clone(&events),
            Arc::clone(&metrics),
            Arc::clone(&audit),
            config.forensics_dir(),
            config.backups_dir(),
        ));

        Arc::new(Self {
            config,
            metrics,
            events,
            audit,
            pathguard,
            engine,
            isolation,
            executor,
            assessor: PostureAssessor::default(),
            incidents: RwLock::new(VecDeque::new()),
            last_posture: RwLock::new(None),
            event_rx: Mutex::new(Some(event_rx)),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Seed boundaries, start monitoring, and spawn the background loops.
    pub async fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(self.config.forensics_dir()).await?;
        tokio::fs::create_dir_all(self.config.backups_dir()).await?;
        tokio::fs::create_dir_all(self.config.evidence_dir()).await?;
        self.engine.seed(&self.config.data_dir).await?;

        // Activity pump: every classified filesystem change feeds the
        // isolation layer's feed for threat scanning.
        let (activity_tx, mut activity_rx) = mpsc::unbounded_channel::<FsChange>();
        self.engine.set_activity_sink(activity_tx).await;
        let isolation = Arc::clone(&self.isolation);
        let activity_pump = tokio::spawn(async move {
            while let Some(change) = activity_rx.recv().await {
                isolation.ingest_change(&change).await;
            }
        });

        if self.config.boundary.monitoring_enabled {
            self.engine.start_monitoring().await?;
        }

        // Event loop: one incident per inbound subsystem event.
        let rx = self.event_rx.lock().await.take();
        let Some(mut rx) = rx else {
            anyhow::bail!("orchestrator already started");
        };
        let orch = Arc::clone(self);
        let event_loop = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                orch.raise_event(event).await;
            }
        });

        let orch = Arc::clone(self);
        let posture_interval = self.config.posture_interval();
        let posture_timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(posture_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let posture = orch.assess_posture().await;
                orch.events.broadcast(
                    "securityPostureUpdated",
                    serde_json::to_value(&posture).unwrap_or_default(),
                );
            }
        });

        let isolation = Arc::clone(&self.isolation);
        let verification_timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(VERIFICATION_TICK);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                isolation.run_due_checks().await;
            }
        });

        let isolation = Arc::clone(&self.isolation);
        let scan_interval = self.config.threat_scan_interval();
        let threat_timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scan_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                isolation.run_threat_scan().await;
            }
        });

        let mut tasks = self.tasks.lock().await;
        tasks.extend([
            activity_pump,
            event_loop,
            posture_timer,
            verification_timer,
            threat_timer,
        ]);
        info!("security orchestrator started");
        Ok(())
    }

    /// Operator override: lift an emergency pause once the incident that
    /// triggered it has been handled.
    pub fn resume_operations(&self) {
        self.executor.resume_operations();
        self.events
            .broadcast("operationsResumed", serde_json::json!({}));
    }

    /// Whether a project's network access is currently isolated by a
    /// response action.
    pub async fn is_network_isolated(&self, project_id: &str) -> bool {
        self.executor.is_network_isolated(project_id).await
    }

    pub async fn stop(&self) {
        self.engine.stop().await;
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        info!("security orchestrator stopped");
    }

    // ── Incident pipeline ─────────────────────────────────────────────────

    /// Turn one subsystem event into one incident: classify, audit, respond,
    /// broadcast, retain.
    pub async fn raise_event(&self, event: SecurityEvent) -> SecurityIncident {
        let (incident_type, severity, source_system, project_id, description) = classify(&event);
        let evidence = serde_json::to_value(&event).unwrap_or_default();
        let mut incident = SecurityIncident::new(
            incident_type,
            severity,
            source_system,
            project_id,
            description,
            evidence,
        );
        self.metrics.inc_incidents_created();
        warn!(
            incident = incident.id,
            kind = %incident.incident_type,
            severity = %incident.severity,
            project = ?incident.project_id,
            "security incident"
        );

        // Audit before responding: if a response wedges, the record exists.
        self.audit.append(&AuditEntry::from_incident(&incident)).await;
        self.persist_evidence(&incident).await;

        let actions = response_actions_for(incident.incident_type, incident.severity);
        incident.transition(IncidentStatus::Investigating);

        let recent: Vec<SecurityIncident> = {
            let incidents = self.incidents.read().await;
            incidents
                .iter()
                .rev()
                .take(FORENSIC_INCIDENT_CONTEXT)
                .cloned()
                .collect()
        };
        self.executor.execute(&mut incident, &actions, &recent).await;

        if incident.severity == Severity::Critical {
            incident.transition(IncidentStatus::Escalated);
            self.executor.emergency_protocol(&incident).await;
        } else if incident
            .response_actions
            .iter()
            .any(|r| r.succeeded && r.action != ResponseAction::LogOnly)
        {
            incident.transition(IncidentStatus::Contained);
        } else {
            incident.transition(IncidentStatus::Resolved);
        }

        self.events.broadcast(
            "securityIncident",
            serde_json::to_value(&incident).unwrap_or_default(),
        );

        let mut incidents = self.incidents.write().await;
        incidents.push_back(incident.clone());
        while incidents.len() > self.config.orchestrator.max_incidents {
            incidents.pop_front();
        }
        incident
    }

    /// Preserve the raw triggering event under the evidence directory. Kept
    /// separate from forensic bundles so log-only incidents leave a record
    /// an operator can pull up by incident id.
    async fn persist_evidence(&self, incident: &SecurityIncident) {
        let dir = self.config.evidence_dir();
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!(incident = incident.id, err = %e, "evidence dir unavailable");
            return;
        }
        let path = dir.join(format!("{}.json", incident.id));
        match serde_json::to_vec_pretty(&incident.evidence) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&path, bytes).await {
                    warn!(incident = incident.id, err = %e, "failed to persist evidence");
                }
            }
            Err(e) => {
                warn!(incident = incident.id, err = %e, "failed to serialize evidence");
            }
        }
    }

    // ── Access gate ───────────────────────────────────────────────────────

    /// The synchronous three-stage gate: path validation, boundary rules,
    /// zero-trust verification. Short-circuits on the first denial.
    pub async fn validate_secure_access(
        &self,
        path: &str,
        project_id: &str,
        operation: FileOperation,
    ) -> SecureAccessResult {
        if self.executor.operations_paused() {
            return SecureAccessResult::denied("operations are paused by emergency protocol");
        }

        // Stages 1 and 2 share one engine call: PathGuard runs inside it.
        let decision = self
            .engine
            .validate_file_access(path, operation, Some(project_id))
            .await;

        if let Some(attack_type) = decision.safe_path.attack_type {
            let severity = decision
                .safe_path
                .severity
                .unwrap_or(Severity::Medium);
            let attempt = PathTraversalAttempt {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                attack_type,
                original_path: decision.safe_path.original_path.clone(),
                normalized_path: decision.safe_path.sanitized_path.clone(),
                intended_target: decision.safe_path.sanitized_path.clone(),
                severity,
                blocked: true,
                project_id: Some(project_id.to_string()),
                evidence: json!({
                    "operation": operation.to_string(),
                    "violations": decision.safe_path.violations,
                }),
            };
            let incident = self
                .raise_event(SecurityEvent::TraversalAttempt(attempt))
                .await;
            return SecureAccessResult {
                allowed: false,
                reason: decision.reason,
                incident: Some(incident),
                safe_path: Some(decision.safe_path),
            };
        }

        if let Some(violation) = decision.violation {
            let incident = self
                .raise_event(SecurityEvent::BoundaryViolation(violation))
                .await;
            return SecureAccessResult {
                allowed: false,
                reason: decision.reason,
                incident: Some(incident),
                safe_path: Some(decision.safe_path),
            };
        }
        if !decision.allowed {
            self.metrics.inc_access_denied();
            return SecureAccessResult {
                allowed: false,
                reason: decision.reason,
                incident: None,
                safe_path: Some(decision.safe_path),
            };
        }

        // Stage 3: zero-trust verification. A denial here raises its event
        // over the channel, so the incident arrives asynchronously.
        match self
            .isolation
            .validate_project_access(project_id, operation, path)
            .await
        {
            Ok(true) => SecureAccessResult {
                allowed: true,
                reason: None,
                incident: None,
                safe_path: Some(decision.safe_path),
            },
            Ok(false) => SecureAccessResult {
                allowed: false,
                reason: Some("zero-trust verification denied the operation".to_string()),
                incident: None,
                safe_path: Some(decision.safe_path),
            },
            Err(e) => SecureAccessResult::denied(e.to_string()),
        }
    }

    // ── Project lifecycle ─────────────────────────────────────────────────

    /// Register a project for enforcement. `None` takes the configured
    /// default security level; a relative `project_path` is resolved under
    /// the configured sandbox root.
    pub async fn create_secure_project(
        &self,
        project_id: &str,
        project_path: &Path,
        security_level: Option<SecurityLevel>,
    ) -> Result<ProjectIsolationBoundary, IsolationError> {
        let security_level =
            security_level.unwrap_or(self.config.isolation.default_security_level);
        let project_path = if project_path.is_absolute() {
            project_path.to_path_buf()
        } else {
            self.config.sandbox_root.join(project_path)
        };
        let boundary = self
            .isolation
            .create_project_isolation(project_id, &project_path, security_level)
            .await?;
        self.executor
            .register_project(project_id, &project_path)
            .await;
        self.engine
            .watch_boundary(&format!("sandbox-{project_id}"))
            .await;
        info!(
            project = project_id,
            path = %project_path.display(),
            level = ?security_level,
            "secure project created"
        );
        Ok(boundary)
    }

    pub async fn remove_secure_project(&self, project_id: &str) -> Result<(), IsolationError> {
        self.isolation.remove_project_isolation(project_id).await
    }

    // ── Posture & reporting ───────────────────────────────────────────────

    /// Orchestrator self-health: full marks minus open critical/high load.
    async fn own_health(&self) -> f64 {
        let incidents = self.incidents.read().await;
        let mut score = 100.0_f64;
        for incident in incidents.iter() {
            if incident.status == IncidentStatus::Resolved {
                continue;
            }
            match incident.severity {
                Severity::Critical => score -= 2.0,
                Severity::High => score -= 0.5,
                _ => {}
            }
        }
        score.max(0.0)
    }

    pub async fn assess_posture(&self) -> SecurityPosture {
        let health = SystemHealth {
            path_guard: self.pathguard.health_score().await,
            boundary_engine: self.engine.health_score().await,
            isolation: self.isolation.health_score().await,
            orchestrator: self.own_health().await,
        };
        let (active_threats, resolved) = {
            let incidents = self.incidents.read().await;
            let active = incidents
                .iter()
                .filter(|i| !i.status.is_terminal() || i.status == IncidentStatus::Escalated)
                .count();
            let resolved = incidents
                .iter()
                .filter(|i| i.status == IncidentStatus::Resolved)
                .count();
            (active, resolved)
        };
        let posture = self.assessor.assess(health, active_threats, resolved);
        if posture.overall_score < 70.0 {
            error!(score = posture.overall_score, "security posture is non-compliant");
        }
        *self.last_posture.write().await = Some(posture.clone());
        posture
    }

    pub async fn last_posture(&self) -> Option<SecurityPosture> {
        self.last_posture.read().await.clone()
    }

    pub async fn incident(&self, id: &str) -> Option<SecurityIncident> {
        self.incidents.read().await.iter().find(|i| i.id == id).cloned()
    }

    pub async fn recent_incidents(&self, limit: usize) -> Vec<SecurityIncident> {
        let incidents = self.incidents.read().await;
        incidents.iter().rev().take(limit).cloned().collect()
    }

    /// Everything an operator needs in one document: posture, per-subsystem
    /// reports, the recent incident window, and counters.
    pub async fn export_comprehensive_security_report(&self) -> serde_json::Value {
        let posture = self.assess_posture().await;
        let recent = self.recent_incidents(REPORT_INCIDENT_LIMIT).await;
        let window = Utc::now() - ChronoDuration::hours(24);
        let last_day = recent.iter().filter(|i| i.timestamp > window).count();
        json!({
            "generatedAt": Utc::now(),
            "posture": posture,
            "pathGuard": self.pathguard.report().await,
            "boundaryEngine": self.engine.report().await,
            "isolation": self.isolation.report().await,
            "incidents": {
                "recent": recent,
                "last24h": last_day,
            },
            "metrics": self.metrics.snapshot(),
            "auditLog": self.audit.path().display().to_string(),
            "operationsPaused": self.executor.operations_paused(),
        })
    }
}

// ─── Event classification ─────────────────────────────────────────────────────

/// Map one subsystem event onto the incident vocabulary. Exhaustive on
/// purpose: a new event kind must decide its incident shape here.
fn classify(
    event: &SecurityEvent,
) -> (IncidentType, Severity, &'static str, Option<String>, String) {
    match event {
        SecurityEvent::TraversalAttempt(a) => (
            IncidentType::PathTraversalAttack,
            a.severity,
            "path_guard",
            a.project_id.clone(),
            format!(
                "path traversal attempt ({}): {}",
                a.attack_type, a.original_path
            ),
        ),
        SecurityEvent::BoundaryViolation(v) => (
            IncidentType::BoundaryViolation,
            v.severity,
            "boundary_engine",
            v.project_id.clone(),
            format!("{}: {}", v.violation_type, v.target_path),
        ),
        SecurityEvent::IntegrityViolation {
            boundary_id,
            detail,
            severity,
        } => (
            IncidentType::IntegrityViolation,
            *severity,
            "boundary_engine",
            boundary_id
                .strip_prefix("sandbox-")
                .map(|p| p.to_string()),
            format!("integrity violation on {boundary_id}: {detail}"),
        ),
        SecurityEvent::ThreatDetected {
            project_id,
            rule_id,
            threat_category,
            severity,
            confidence,
            ..
        } => (
            IncidentType::ThreatDetected,
            *severity,
            "zero_trust_isolation",
            Some(project_id.clone()),
            format!("threat {threat_category} ({rule_id}) at confidence {confidence:.2}"),
        ),
        SecurityEvent::BoundaryCompromised {
            project_id,
            boundary_id,
            reason,
            severity,
        } => (
            IncidentType::BoundaryCompromised,
            *severity,
            "zero_trust_isolation",
            Some(project_id.clone()),
            format!("boundary {boundary_id} compromised: {reason}"),
        ),
        SecurityEvent::ProjectQuarantined { project_id, reason } => (
            IncidentType::ProjectQuarantined,
            Severity::High,
            "zero_trust_isolation",
            Some(project_id.clone()),
            format!("project quarantined: {reason}"),
        ),
        SecurityEvent::VerificationFailed {
            project_id,
            check_name,
            failure_action,
            consecutive_failures,
        } => (
            IncidentType::VerificationFailure,
            if *consecutive_failures >= 3 {
                Severity::High
            } else {
                Severity::Medium
            },
            "zero_trust_isolation",
            Some(project_id.clone()),
            format!(
                "verification check {check_name} failed ({failure_action}, {consecutive_failures} consecutive)"
            ),
        ),
        SecurityEvent::UnauthorizedAccess {
            project_id,
            operation,
            target_path,
            reason,
        } => (
            IncidentType::UnauthorizedAccess,
            Severity::Medium,
            "zero_trust_isolation",
            Some(project_id.clone()),
            format!("unauthorized {operation} of {target_path}: {reason}"),
        ),
        SecurityEvent::EnforcementFailed {
            violation_id,
            action,
            error,
        } => (
            IncidentType::EnforcementFailure,
            Severity::High,
            "boundary_engine",
            None,
            format!("enforcement {action} failed for violation {violation_id}: {error}"),
        ),
    }
}
