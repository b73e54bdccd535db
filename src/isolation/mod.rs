// SPDX-License-Identifier: MIT
//! ZeroTrustIsolation — one isolation boundary per project, continuously
//! re-verified.
//!
//! A prior grant means nothing here: the per-access gate re-runs the
//! continuous checks inline, periodic checks re-hash the project on a
//! timer, and a threat-scan cycle matches the static rule catalog against
//! recent activity. Verification failures decay the boundary's integrity
//! score — the sole health signal this layer reports upward — and repeated
//! integrity failures escalate to full project quarantine.

pub mod checks;
pub mod threat;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::boundary::{integrity, watcher::FsChange, BoundaryEngine};
use crate::events::{FileOperation, SecurityEvent, Severity};
use crate::metrics::WardenMetrics;
use crate::orchestrator::incident::ResponseAction;
use crate::pathguard::PathGuard;

use checks::{
    catalog_for, mechanisms_for, CheckFrequency, CheckKind, EnforcementMechanism, FailureAction,
    VerificationCheck, CRITICAL_CONFIG_NAMES,
};
use threat::{ActivityFeed, ActivityKind, ThreatResponseAction, THREAT_RULES};

pub use checks::SecurityLevel;

/// Integrity score lost per verification failure / regained per pass.
const SCORE_DECAY: f64 = 15.0;
const SCORE_RECOVERY: f64 = 5.0;

/// Consecutive filesystem-integrity failures before the failure action is
/// escalated to quarantine.
const INTEGRITY_ESCALATION_THRESHOLD: u32 = 3;

/// Upper bound on the fired-threat dedup set; cleared wholesale when full.
const FIRED_DEDUP_CAPACITY: usize = 4096;

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Caller bugs — these are thrown, unlike adversarial input.
#[derive(Debug, Error)]
pub enum IsolationError {
    #[error("unknown project: {0}")]
    UnknownProject(String),

    #[error("project already isolated: {0}")]
    DuplicateProject(String),

    #[error("invalid project path '{path}': {reason}")]
    InvalidProjectPath { path: String, reason: String },
}

// ─── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationBoundaryType {
    Physical,
    Logical,
    Temporal,
    Credential,
}

/// Live health counters for one project boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryMetrics {
    /// 0–100; decays on verification failure, recovers on pass.
    pub boundary_integrity_score: f64,
    pub breach_attempts: u64,
    pub last_verification: Option<DateTime<Utc>>,
    pub verification_failures: u64,
}

impl Default for BoundaryMetrics {
    fn default() -> Self {
        Self {
            boundary_integrity_score: 100.0,
            breach_attempts: 0,
            last_verification: None,
            verification_failures: 0,
        }
    }
}

/// Zero-trust boundary wrapped around one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectIsolationBoundary {
    pub boundary_id: String,
    pub project_id: String,
    pub boundary_type: IsolationBoundaryType,
    pub security_level: SecurityLevel,
    pub project_path: PathBuf,
    pub enforcement_mechanisms: Vec<EnforcementMechanism>,
    pub verification_checks: Vec<VerificationCheck>,
    pub metrics: BoundaryMetrics,
    /// Last known project tree hash (filesystem-integrity baseline).
    baseline_hash: String,
    /// Content hashes of critical config files.
    config_hashes: HashMap<String, String>,
    /// Consecutive filesystem-integrity failures.
    consecutive_integrity_failures: u32,
    /// Per-check last execution time.
    last_runs: HashMap<String, DateTime<Utc>>,
    /// <1.0 shortens periodic check intervals (enhanced monitoring).
    monitoring_multiplier: f64,
}

// ─── ZeroTrustIsolation ───────────────────────────────────────────────────────

pub struct ZeroTrustIsolation {
    boundaries: RwLock<HashMap<String, ProjectIsolationBoundary>>,
    engine: Arc<BoundaryEngine>,
    pathguard: Arc<PathGuard>,
    events: mpsc::UnboundedSender<SecurityEvent>,
    metrics: Arc<WardenMetrics>,
    activity: RwLock<HashMap<String, ActivityFeed>>,
    /// Response actions awaiting operator approval, per project.
    approvals: RwLock<HashMap<String, Vec<ThreatResponseAction>>>,
    /// Projects denied all access by a `block` failure action.
    blocked: RwLock<HashSet<String>>,
    /// (project, rule, detail) triples already fired, to stop a scan cycle
    /// re-raising the same match.
    fired: RwLock<HashSet<(String, String, String)>>,
}

impl ZeroTrustIsolation {
    pub fn new(
        engine: Arc<BoundaryEngine>,
        pathguard: Arc<PathGuard>,
        events: mpsc::UnboundedSender<SecurityEvent>,
        metrics: Arc<WardenMetrics>,
    ) -> Self {
        Self {
            boundaries: RwLock::new(HashMap::new()),
            engine,
            pathguard,
            events,
            metrics,
            activity: RwLock::new(HashMap::new()),
            approvals: RwLock::new(HashMap::new()),
            blocked: RwLock::new(HashSet::new()),
            fired: RwLock::new(HashSet::new()),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Build the isolation boundary for a project and register its sandbox
    /// with the boundary engine.
    pub async fn create_project_isolation(
        &self,
        project_id: &str,
        project_path: &Path,
        security_level: SecurityLevel,
    ) -> Result<ProjectIsolationBoundary, IsolationError> {
        if self.boundaries.read().await.contains_key(project_id) {
            return Err(IsolationError::DuplicateProject(project_id.to_string()));
        }

        let raw = project_path.to_string_lossy();
        let validated = self
            .pathguard
            .validate(&raw, None, FileOperation::Write)
            .await;
        if validated.attack_type.is_some() {
            return Err(IsolationError::InvalidProjectPath {
                path: raw.into_owned(),
                reason: validated.violations.join("; "),
            });
        }
        let root = PathBuf::from(&validated.sanitized_path);

        let boundary_id = self
            .engine
            .add_project_boundary(project_id, &root, security_level != SecurityLevel::Standard)
            .await;

        let baseline_hash = {
            let root = root.clone();
            tokio::task::spawn_blocking(move || integrity::hash_tree(&root))
                .await
                .ok()
                .and_then(|r| r.ok())
                .unwrap_or_default()
        };

        let boundary = ProjectIsolationBoundary {
            boundary_id,
            project_id: project_id.to_string(),
            boundary_type: IsolationBoundaryType::Physical,
            security_level,
            config_hashes: hash_critical_configs(&root),
            project_path: root,
            enforcement_mechanisms: mechanisms_for(security_level),
            verification_checks: catalog_for(security_level),
            metrics: BoundaryMetrics::default(),
            baseline_hash,
            consecutive_integrity_failures: 0,
            last_runs: HashMap::new(),
            monitoring_multiplier: 1.0,
        };

        info!(
            project = project_id,
            level = %security_level,
            checks = boundary.verification_checks.len(),
            "project isolation created"
        );
        self.boundaries
            .write()
            .await
            .insert(project_id.to_string(), boundary.clone());
        self.activity
            .write()
            .await
            .insert(project_id.to_string(), ActivityFeed::default());
        Ok(boundary)
    }

    /// Tear down a project's isolation. Unknown ids are a caller bug.
    pub async fn remove_project_isolation(&self, project_id: &str) -> Result<(), IsolationError> {
        let removed = self.boundaries.write().await.remove(project_id);
        if removed.is_none() {
            return Err(IsolationError::UnknownProject(project_id.to_string()));
        }
        self.engine.remove_project_boundary(project_id).await;
        self.activity.write().await.remove(project_id);
        self.approvals.write().await.remove(project_id);
        self.blocked.write().await.remove(project_id);
        self.fired
            .write()
            .await
            .retain(|(p, _, _)| p != project_id);
        info!(project = project_id, "project isolation removed");
        Ok(())
    }

    /// Full project quarantine: revoke the isolation boundary, remove the
    /// project from the boundary engine, and emit `projectQuarantined`.
    pub async fn quarantine_project(&self, project_id: &str, reason: &str) {
        let existed = self.boundaries.write().await.remove(project_id).is_some();
        self.engine.remove_project_boundary(project_id).await;
        self.blocked.write().await.insert(project_id.to_string());
        if existed {
            warn!(project = project_id, reason, "project quarantined");
            let _ = self.events.send(SecurityEvent::ProjectQuarantined {
                project_id: project_id.to_string(),
                reason: reason.to_string(),
            });
        }
    }

    pub async fn boundary(&self, project_id: &str) -> Option<ProjectIsolationBoundary> {
        self.boundaries.read().await.get(project_id).cloned()
    }

    pub async fn is_blocked(&self, project_id: &str) -> bool {
        self.blocked.read().await.contains(project_id)
    }

    /// Deny all further access for a project (response action).
    pub async fn block_project(&self, project_id: &str) {
        self.blocked.write().await.insert(project_id.to_string());
        warn!(project = project_id, "project access blocked");
    }

    /// Shorten a project's periodic check intervals (response action).
    pub async fn enhance_monitoring(&self, project_id: &str) {
        if let Some(b) = self.boundaries.write().await.get_mut(project_id) {
            b.monitoring_multiplier = 0.5;
            info!(project = project_id, "monitoring enhanced");
        }
    }

    // ── Access gate ───────────────────────────────────────────────────────

    /// Per-access gate: runs the continuous-frequency checks inline.
    ///
    /// `Ok(false)` always also raises an unauthorized-access event upstream.
    /// Unknown project ids are a caller bug and are thrown.
    pub async fn validate_project_access(
        &self,
        project_id: &str,
        operation: FileOperation,
        target_path: &str,
    ) -> Result<bool, IsolationError> {
        if self.blocked.read().await.contains(project_id) {
            self.raise_unauthorized(project_id, operation, target_path, "project is blocked")
                .await;
            return Ok(false);
        }
        let Some(boundary) = self.boundaries.read().await.get(project_id).cloned() else {
            return Err(IsolationError::UnknownProject(project_id.to_string()));
        };

        self.record_activity(project_id, ActivityKind::AccessRequested, target_path)
            .await;

        for check in boundary
            .verification_checks
            .iter()
            .filter(|c| c.frequency == CheckFrequency::Continuous)
        {
            self.metrics.inc_checks_run();
            let outcome = self
                .execute_check(&boundary, check, Some(target_path))
                .await;
            if let Some(detail) = outcome {
                self.handle_failure(project_id, check, &detail).await;
                if matches!(
                    check.failure_action,
                    FailureAction::Block | FailureAction::Quarantine
                ) {
                    self.raise_unauthorized(project_id, operation, target_path, &detail)
                        .await;
                    return Ok(false);
                }
            } else {
                self.handle_pass(project_id, check).await;
            }
        }
        Ok(true)
    }

    async fn raise_unauthorized(
        &self,
        project_id: &str,
        operation: FileOperation,
        target_path: &str,
        reason: &str,
    ) {
        self.metrics.inc_access_denied();
        if let Some(b) = self.boundaries.write().await.get_mut(project_id) {
            b.metrics.breach_attempts += 1;
        }
        let _ = self.events.send(SecurityEvent::UnauthorizedAccess {
            project_id: project_id.to_string(),
            operation,
            target_path: target_path.to_string(),
            reason: reason.to_string(),
        });
    }

    // ── Activity feed ─────────────────────────────────────────────────────

    /// Record one observed action for threat scanning.
    pub async fn record_activity(&self, project_id: &str, kind: ActivityKind, detail: &str) {
        let mut feeds = self.activity.write().await;
        feeds
            .entry(project_id.to_string())
            .or_default()
            .push(kind, detail);
    }

    /// Ingest a classified filesystem change from the boundary engine and
    /// run `on_change` checks when a critical config file moved.
    pub async fn ingest_change(&self, change: &FsChange) {
        let Some(project_id) = change
            .boundary_id
            .strip_prefix("sandbox-")
            .map(String::from)
        else {
            return;
        };
        let kind = match change.kind {
            crate::boundary::rules::ChangeKind::Created => ActivityKind::FileCreated,
            crate::boundary::rules::ChangeKind::Modified => ActivityKind::FileModified,
            crate::boundary::rules::ChangeKind::Removed => ActivityKind::FileRemoved,
        };
        let detail = change.path.to_string_lossy().into_owned();
        self.record_activity(&project_id, kind, &detail).await;

        let is_critical_config = change
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| CRITICAL_CONFIG_NAMES.contains(&n))
            .unwrap_or(false);
        if !is_critical_config {
            return;
        }
        let Some(boundary) = self.boundaries.read().await.get(&project_id).cloned() else {
            return;
        };
        for check in boundary
            .verification_checks
            .iter()
            .filter(|c| c.frequency == CheckFrequency::OnChange)
        {
            self.metrics.inc_checks_run();
            match self.execute_check(&boundary, check, None).await {
                Some(detail) => self.handle_failure(&project_id, check, &detail).await,
                None => self.handle_pass(&project_id, check).await,
            }
        }
    }

    // ── Periodic verification ─────────────────────────────────────────────

    /// Run every periodic check whose (level-scaled) period has elapsed.
    /// Driven by the orchestrator's verification tick.
    pub async fn run_due_checks(&self) {
        let now = Utc::now();
        let snapshot: Vec<ProjectIsolationBoundary> = {
            let boundaries = self.boundaries.read().await;
            boundaries.values().cloned().collect()
        };
        for boundary in snapshot {
            for check in boundary
                .verification_checks
                .iter()
                .filter(|c| c.frequency == CheckFrequency::Periodic)
            {
                let period = match check.period {
                    Some(p) => p.mul_f64(boundary.monitoring_multiplier),
                    None => continue,
                };
                let due = boundary
                    .last_runs
                    .get(&check.check_name)
                    .map(|last| now - *last >= chrono::Duration::from_std(period).unwrap_or_default())
                    .unwrap_or(true);
                if !due {
                    continue;
                }
                {
                    let mut boundaries = self.boundaries.write().await;
                    if let Some(b) = boundaries.get_mut(&boundary.project_id) {
                        b.last_runs.insert(check.check_name.clone(), now);
                    } else {
                        // Quarantined mid-cycle.
                        continue;
                    }
                }
                self.metrics.inc_checks_run();
                match self.execute_check(&boundary, check, None).await {
                    Some(detail) => self.handle_failure(&boundary.project_id, check, &detail).await,
                    None => self.handle_pass(&boundary.project_id, check).await,
                }
            }
        }
    }

    /// Run every periodic check for one project immediately, ignoring due
    /// times. Used when monitoring is escalated and something suspicious
    /// warrants verification before the next tick.
    pub async fn run_checks_now(&self, project_id: &str) -> Result<(), IsolationError> {
        let boundary = self
            .boundaries
            .read()
            .await
            .get(project_id)
            .cloned()
            .ok_or_else(|| IsolationError::UnknownProject(project_id.to_string()))?;
        let now = Utc::now();
        for check in boundary
            .verification_checks
            .iter()
            .filter(|c| c.frequency == CheckFrequency::Periodic)
        {
            {
                let mut boundaries = self.boundaries.write().await;
                match boundaries.get_mut(project_id) {
                    Some(b) => {
                        b.last_runs.insert(check.check_name.clone(), now);
                    }
                    // Quarantined mid-cycle.
                    None => return Ok(()),
                }
            }
            self.metrics.inc_checks_run();
            match self.execute_check(&boundary, check, None).await {
                Some(detail) => self.handle_failure(project_id, check, &detail).await,
                None => self.handle_pass(project_id, check).await,
            }
        }
        Ok(())
    }

    /// Execute one check. `Some(detail)` is a failure.
    async fn execute_check(
        &self,
        boundary: &ProjectIsolationBoundary,
        check: &VerificationCheck,
        access_target: Option<&str>,
    ) -> Option<String> {
        match check.kind {
            CheckKind::FilesystemIntegrity => {
                let root = boundary.project_path.clone();
                let hash = tokio::task::spawn_blocking(move || integrity::hash_tree(&root))
                    .await
                    .ok()
                    .and_then(|r| r.ok())?;
                if hash == boundary.baseline_hash {
                    return None;
                }
                // A change explained by observed sandbox activity is the
                // agent doing its job; silently advance the baseline.
                let explained = {
                    let feeds = self.activity.read().await;
                    feeds
                        .get(&boundary.project_id)
                        .map(|f| {
                            let since = boundary.metrics.last_verification;
                            f.iter().any(|r| {
                                matches!(
                                    r.kind,
                                    ActivityKind::FileCreated
                                        | ActivityKind::FileModified
                                        | ActivityKind::FileRemoved
                                ) && since.map(|s| r.timestamp > s).unwrap_or(true)
                            })
                        })
                        .unwrap_or(false)
                };
                {
                    let mut boundaries = self.boundaries.write().await;
                    if let Some(b) = boundaries.get_mut(&boundary.project_id) {
                        b.baseline_hash = hash;
                    }
                }
                if explained {
                    None
                } else {
                    Some("project tree changed with no recorded activity".into())
                }
            }
            CheckKind::CrossProjectAccess => {
                if let Some(target) = access_target {
                    let normalized =
                        crate::pathguard::decode::normalize_path(Path::new(target));
                    let foreign = {
                        let boundaries = self.boundaries.read().await;
                        boundaries.values().any(|other| {
                            other.project_id != boundary.project_id
                                && normalized.starts_with(&other.project_path)
                        })
                    };
                    if foreign {
                        return Some(format!(
                            "access from {} targets another project's sandbox: {target}",
                            boundary.project_id
                        ));
                    }
                }
                // Periodic form: look for foreign paths in recorded activity.
                let feeds = self.activity.read().await;
                let boundaries = self.boundaries.read().await;
                let hit = feeds.get(&boundary.project_id).and_then(|f| {
                    f.iter().find_map(|r| {
                        let p = Path::new(&r.detail);
                        boundaries
                            .values()
                            .any(|other| {
                                other.project_id != boundary.project_id
                                    && p.starts_with(&other.project_path)
                            })
                            .then(|| r.detail.clone())
                    })
                });
                hit.map(|d| format!("recorded activity touched a foreign sandbox: {d}"))
            }
            CheckKind::PrivilegeEscalation => {
                let feeds = self.activity.read().await;
                let feed = feeds.get(&boundary.project_id)?;
                let rule = THREAT_RULES
                    .iter()
                    .find(|r| r.rule.threat_category == "privilege_escalation")?;
                rule.evaluate(feed)
                    .map(|m| format!("escalation pattern matched: {}", m.matched_detail))
            }
            CheckKind::ConfigurationIntegrity => {
                let current = hash_critical_configs(&boundary.project_path);
                for (name, old_hash) in &boundary.config_hashes {
                    match current.get(name) {
                        Some(new_hash) if new_hash != old_hash => {
                            let mut boundaries = self.boundaries.write().await;
                            if let Some(b) = boundaries.get_mut(&boundary.project_id) {
                                b.config_hashes = current.clone();
                            }
                            return Some(format!("critical config changed: {name}"));
                        }
                        None => {
                            return Some(format!("critical config removed: {name}"));
                        }
                        _ => {}
                    }
                }
                // Newly appeared configs become part of the baseline.
                let mut boundaries = self.boundaries.write().await;
                if let Some(b) = boundaries.get_mut(&boundary.project_id) {
                    b.config_hashes = current;
                }
                None
            }
        }
    }

    async fn handle_pass(&self, project_id: &str, check: &VerificationCheck) {
        let mut boundaries = self.boundaries.write().await;
        let Some(b) = boundaries.get_mut(project_id) else {
            return;
        };
        b.metrics.last_verification = Some(Utc::now());
        b.metrics.boundary_integrity_score =
            (b.metrics.boundary_integrity_score + SCORE_RECOVERY).min(100.0);
        if check.kind == CheckKind::FilesystemIntegrity {
            b.consecutive_integrity_failures = 0;
        }
    }

    async fn handle_failure(&self, project_id: &str, check: &VerificationCheck, detail: &str) {
        let (failure_action, consecutive, boundary_id) = {
            let mut boundaries = self.boundaries.write().await;
            let Some(b) = boundaries.get_mut(project_id) else {
                return;
            };
            b.metrics.verification_failures += 1;
            b.metrics.last_verification = Some(Utc::now());
            b.metrics.boundary_integrity_score =
                (b.metrics.boundary_integrity_score - SCORE_DECAY).max(0.0);
            let consecutive = if check.kind == CheckKind::FilesystemIntegrity {
                b.consecutive_integrity_failures += 1;
                b.consecutive_integrity_failures
            } else {
                0
            };
            // Repeated integrity failures stop being an anomaly and become
            // a compromise.
            let action = if consecutive >= INTEGRITY_ESCALATION_THRESHOLD {
                FailureAction::Quarantine
            } else {
                check.failure_action
            };
            (action, consecutive, b.boundary_id.clone())
        };

        warn!(
            project = project_id,
            check = check.check_name,
            action = %failure_action,
            detail,
            "verification check failed"
        );
        let _ = self.events.send(SecurityEvent::VerificationFailed {
            project_id: project_id.to_string(),
            check_name: check.check_name.clone(),
            failure_action: failure_action.to_string(),
            consecutive_failures: consecutive,
        });

        if consecutive >= INTEGRITY_ESCALATION_THRESHOLD {
            let _ = self.events.send(SecurityEvent::BoundaryCompromised {
                project_id: project_id.to_string(),
                boundary_id,
                reason: format!(
                    "{} failed {consecutive} consecutive times: {detail}",
                    check.check_name
                ),
                severity: Severity::High,
            });
        }

        match failure_action {
            FailureAction::Log => {
                debug!(project = project_id, check = check.check_name, "logged only");
            }
            FailureAction::Alert => {
                // The VerificationFailed event above is the alert.
            }
            FailureAction::Block => {
                self.blocked.write().await.insert(project_id.to_string());
            }
            FailureAction::Quarantine => {
                self.quarantine_project(
                    project_id,
                    &format!("verification failure: {} ({detail})", check.check_name),
                )
                .await;
            }
        }
    }

    // ── Threat scanning ───────────────────────────────────────────────────

    /// One threat-scan cycle over every project's recent activity.
    pub async fn run_threat_scan(&self) {
        let project_ids: Vec<String> = self.boundaries.read().await.keys().cloned().collect();
        for project_id in project_ids {
            let matched = {
                let feeds = self.activity.read().await;
                let Some(feed) = feeds.get(&project_id) else {
                    continue;
                };
                THREAT_RULES
                    .iter()
                    .filter_map(|r| r.evaluate(feed).map(|m| (m, &r.rule.response_actions)))
                    .collect::<Vec<_>>()
            };
            for (threat, actions) in matched {
                let key = (
                    project_id.clone(),
                    threat.rule_id.clone(),
                    threat.matched_detail.clone(),
                );
                {
                    let mut fired = self.fired.write().await;
                    // Bounded: dropping old entries only risks a duplicate
                    // incident, never a missed one.
                    if fired.len() >= FIRED_DEDUP_CAPACITY {
                        fired.clear();
                    }
                    if !fired.insert(key) {
                        continue;
                    }
                }
                warn!(
                    project = project_id,
                    rule = threat.rule_id,
                    category = threat.threat_category,
                    confidence = threat.confidence,
                    "threat detected"
                );
                if let Some(b) = self.boundaries.write().await.get_mut(&project_id) {
                    b.metrics.breach_attempts += 1;
                }
                let _ = self.events.send(SecurityEvent::ThreatDetected {
                    project_id: project_id.clone(),
                    rule_id: threat.rule_id.clone(),
                    threat_category: threat.threat_category.clone(),
                    severity: threat.severity,
                    confidence: threat.confidence,
                    evidence: serde_json::json!({
                        "matched": threat.matched_detail,
                    }),
                });
                self.execute_threat_actions(&project_id, actions).await;
            }
        }
    }

    /// Run a rule's response actions in ascending priority order. Actions
    /// requiring approval are queued, not executed.
    async fn execute_threat_actions(&self, project_id: &str, actions: &[ThreatResponseAction]) {
        let mut ordered: Vec<&ThreatResponseAction> = actions.iter().collect();
        ordered.sort_by_key(|a| a.priority);
        for action in ordered {
            if action.requires_approval {
                self.approvals
                    .write()
                    .await
                    .entry(project_id.to_string())
                    .or_default()
                    .push(action.clone());
                continue;
            }
            match action.action {
                ResponseAction::BlockAccess => {
                    self.blocked.write().await.insert(project_id.to_string());
                }
                ResponseAction::QuarantineProject => {
                    self.quarantine_project(project_id, "threat response").await;
                }
                ResponseAction::EnhanceMonitoring => {
                    self.enhance_monitoring(project_id).await;
                }
                // Everything else (network isolation, backup, forensics)
                // is the orchestrator's job; the ThreatDetected event it
                // just received drives those through the policy table.
                _ => {}
            }
        }
    }

    /// Response actions queued for operator approval.
    pub async fn pending_approvals(&self, project_id: &str) -> Vec<ThreatResponseAction> {
        self.approvals
            .read()
            .await
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    // ── Health & reporting ────────────────────────────────────────────────

    /// Mean integrity score across projects; 100 with none managed.
    pub async fn health_score(&self) -> f64 {
        let boundaries = self.boundaries.read().await;
        if boundaries.is_empty() {
            return 100.0;
        }
        let sum: f64 = boundaries
            .values()
            .map(|b| b.metrics.boundary_integrity_score)
            .sum();
        sum / boundaries.len() as f64
    }

    pub async fn report(&self) -> serde_json::Value {
        let boundaries = self.boundaries.read().await;
        let projects: Vec<serde_json::Value> = boundaries
            .values()
            .map(|b| {
                serde_json::json!({
                    "project_id": b.project_id,
                    "security_level": b.security_level,
                    "integrity_score": b.metrics.boundary_integrity_score,
                    "breach_attempts": b.metrics.breach_attempts,
                    "verification_failures": b.metrics.verification_failures,
                    "last_verification": b.metrics.last_verification.map(|t| t.to_rfc3339()),
                })
            })
            .collect();
        serde_json::json!({
            "projects": projects,
            "blocked": self.blocked.read().await.len(),
        })
    }
}

/// Hash every critical config file present in `root`.
fn hash_critical_configs(root: &Path) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for name in CRITICAL_CONFIG_NAMES {
        let path = root.join(name);
        if let Ok(hash) = integrity::hash_file(&path) {
            out.insert(name.to_string(), hash);
        }
    }
    out
}
