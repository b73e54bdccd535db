// SPDX-License-Identifier: MIT
//! BoundaryEngine — named filesystem boundaries with ordered rule sets,
//! real-time watching, and enforcement.
//!
//! The registry is seeded with one `framework_core` boundary (the warden's
//! own data directory, blocking) and one `quarantine` boundary. Project
//! sandboxes and shared resources are added on demand. Every observed
//! filesystem change is classified, run through the boundary's rules in
//! (priority, rule_id) order, and the first enabled match decides the
//! action; `deny`/`quarantine` go through the single [`enforce::enforce`]
//! entry point.

pub mod enforce;
pub mod integrity;
pub mod rules;
pub mod watcher;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{FileOperation, SecurityEvent, Severity};
use crate::metrics::WardenMetrics;
use crate::pathguard::{decode::normalize_path, PathGuard, SafePath};

use enforce::EnforcementOutcome;
use rules::{
    evaluate_rules, BoundaryRule, ChangeKind, EnforcementLevel, RuleAction, RuleCondition,
    RuleContext,
};
use watcher::WatchHandle;

pub use watcher::FsChange;

/// Violation timestamps kept for the health score window.
const VIOLATION_WINDOW: chrono::Duration = chrono::Duration::hours(1);

// ─── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryType {
    FrameworkCore,
    ProjectSandbox,
    SharedResource,
    Quarantine,
}

/// One managed filesystem region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSystemBoundary {
    pub boundary_id: String,
    pub boundary_type: BoundaryType,
    pub root_path: PathBuf,
    pub allowed_paths: Vec<PathBuf>,
    pub forbidden_paths: Vec<PathBuf>,
    pub access_rules: Vec<BoundaryRule>,
    /// Sandbox boundaries carry their owning project.
    pub project_id: Option<String>,
    pub integrity_hash: String,
    pub last_integrity_check: DateTime<Utc>,
    pub monitoring_enabled: bool,
}

/// Raised when an event matches a deny/quarantine rule or fails the
/// protected-path/allowed-root checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryViolation {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub violation_type: String,
    pub source_path: String,
    pub target_path: String,
    pub project_id: Option<String>,
    pub severity: Severity,
    pub blocked: bool,
    pub remediation_action: String,
    pub evidence: serde_json::Value,
}

/// Result of the synchronous access check.
#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub violation: Option<BoundaryViolation>,
    pub safe_path: SafePath,
}

// ─── BoundaryEngine ───────────────────────────────────────────────────────────

pub struct BoundaryEngine {
    boundaries: RwLock<HashMap<String, FileSystemBoundary>>,
    pathguard: Arc<PathGuard>,
    events: mpsc::UnboundedSender<SecurityEvent>,
    metrics: Arc<WardenMetrics>,
    quarantine_dir: PathBuf,
    protected_paths: Vec<PathBuf>,
    debounce: Duration,
    integrity_interval: Duration,
    /// Live watch handles; dropped on stop.
    watches: Mutex<Vec<WatchHandle>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Optional sink for every classified change (the isolation layer's
    /// activity feed).
    activity_sink: RwLock<Option<mpsc::UnboundedSender<FsChange>>>,
    /// Sender feeding the change pump, kept so boundaries added after
    /// start-up can be watched too.
    change_tx: RwLock<Option<mpsc::UnboundedSender<FsChange>>>,
    /// Paths the engine itself just mutated, so the integrity sweep does not
    /// flag its own enforcement as tampering.
    recent_enforcements: RwLock<Vec<(String, DateTime<Utc>)>>,
    /// Violation timestamps within the health window.
    recent_violations: RwLock<Vec<(DateTime<Utc>, Severity)>>,
}

impl BoundaryEngine {
    pub fn new(
        pathguard: Arc<PathGuard>,
        events: mpsc::UnboundedSender<SecurityEvent>,
        metrics: Arc<WardenMetrics>,
        data_dir: &Path,
        protected_paths: Vec<PathBuf>,
        debounce: Duration,
        integrity_interval: Duration,
    ) -> Self {
        Self {
            boundaries: RwLock::new(HashMap::new()),
            pathguard,
            events,
            metrics,
            quarantine_dir: data_dir.join("quarantine"),
            protected_paths: protected_paths.iter().map(|p| normalize_path(p)).collect(),
            debounce,
            integrity_interval,
            watches: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            activity_sink: RwLock::new(None),
            change_tx: RwLock::new(None),
            recent_enforcements: RwLock::new(Vec::new()),
            recent_violations: RwLock::new(Vec::new()),
        }
    }

    /// Seed the registry: one blocking `framework_core` boundary over the
    /// warden data directory and one `quarantine` boundary.
    pub async fn seed(&self, data_dir: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.quarantine_dir).await?;
        self.insert_boundary(
            "framework-core",
            BoundaryType::FrameworkCore,
            data_dir,
            None,
            framework_core_rules(data_dir),
        )
        .await;
        let qdir = self.quarantine_dir.clone();
        self.insert_boundary(
            "quarantine",
            BoundaryType::Quarantine,
            &qdir,
            None,
            quarantine_rules(),
        )
        .await;
        Ok(())
    }

    async fn insert_boundary(
        &self,
        boundary_id: &str,
        boundary_type: BoundaryType,
        root: &Path,
        project_id: Option<&str>,
        access_rules: Vec<BoundaryRule>,
    ) {
        let root = normalize_path(root);
        let hash = integrity::hash_tree(&root).unwrap_or_default();
        let boundary = FileSystemBoundary {
            boundary_id: boundary_id.to_string(),
            boundary_type,
            allowed_paths: vec![root.clone()],
            forbidden_paths: self.protected_paths.clone(),
            access_rules,
            project_id: project_id.map(String::from),
            integrity_hash: hash,
            last_integrity_check: Utc::now(),
            root_path: root,
            monitoring_enabled: true,
        };
        info!(boundary = boundary_id, kind = ?boundary_type, "boundary registered");
        self.boundaries
            .write()
            .await
            .insert(boundary_id.to_string(), boundary);
    }

    /// Register a `project_sandbox` boundary rooted at the project path.
    ///
    /// `quarantine_executables` switches the dropped-executable rule from
    /// audit to quarantine (Enhanced/Maximum security levels).
    pub async fn add_project_boundary(
        &self,
        project_id: &str,
        root: &Path,
        quarantine_executables: bool,
    ) -> String {
        let boundary_id = format!("sandbox-{project_id}");
        self.insert_boundary(
            &boundary_id,
            BoundaryType::ProjectSandbox,
            root,
            Some(project_id),
            sandbox_rules(quarantine_executables),
        )
        .await;
        self.pathguard.register_root(project_id, root).await;
        boundary_id
    }

    /// Register a `shared_resource` boundary (read-mostly, executables
    /// quarantined).
    pub async fn add_shared_boundary(&self, name: &str, root: &Path) -> String {
        let boundary_id = format!("shared-{name}");
        self.insert_boundary(
            &boundary_id,
            BoundaryType::SharedResource,
            root,
            None,
            shared_rules(),
        )
        .await;
        boundary_id
    }

    /// Remove a project's boundary. Returns `true` if one existed.
    pub async fn remove_project_boundary(&self, project_id: &str) -> bool {
        self.pathguard.unregister_root(project_id).await;
        self.boundaries
            .write()
            .await
            .remove(&format!("sandbox-{project_id}"))
            .is_some()
    }

    pub async fn boundary(&self, boundary_id: &str) -> Option<FileSystemBoundary> {
        self.boundaries.read().await.get(boundary_id).cloned()
    }

    pub fn quarantine_dir(&self) -> &Path {
        &self.quarantine_dir
    }

    // ── Access validation ─────────────────────────────────────────────────

    /// Synchronous-feeling public check used by the orchestrator gate.
    ///
    /// Runs PathGuard validation plus a rule lookup; mutates no watcher
    /// state. `deny`/`quarantine` matches produce a violation record but no
    /// enforcement — the path was never written.
    pub async fn validate_file_access(
        &self,
        path: &str,
        operation: FileOperation,
        project_id: Option<&str>,
    ) -> AccessDecision {
        let safe_path = self.pathguard.validate(path, project_id, operation).await;
        if safe_path.attack_type.is_some() {
            // A classified attack never reaches rule evaluation.
            return AccessDecision {
                allowed: false,
                reason: Some(safe_path.violations.join("; ")),
                violation: None,
                safe_path,
            };
        }

        // Containment failures without an attack signature still run the
        // rule lookup: a write aimed at another project's sandbox should be
        // reported as the cross-project violation it is, not a bare "outside
        // root" string.
        let normalized = PathBuf::from(&safe_path.sanitized_path);
        let boundaries = self.boundaries.read().await;
        let Some(boundary) = containing_boundary(&boundaries, &normalized) else {
            return AccessDecision {
                allowed: safe_path.is_safe,
                reason: (!safe_path.is_safe).then(|| safe_path.violations.join("; ")),
                violation: None,
                safe_path,
            };
        };

        let crosses = crosses_project_boundary(&boundaries, &normalized, project_id);
        let protected = self.is_protected(&normalized);
        let source = project_id
            .map(|p| format!("project:{p}"))
            .unwrap_or_else(|| "gate".to_string());
        let cx = RuleContext {
            source_path: &source,
            target_path: &safe_path.sanitized_path,
            operation,
            change: None,
            is_executable: watcher::is_executable(&normalized, None),
            crosses_project_boundary: crosses,
            targets_protected_path: protected,
            size: 0,
        };

        match evaluate_rules(&boundary.access_rules, &cx) {
            Some(rule) if matches!(rule.action, RuleAction::Deny | RuleAction::Quarantine) => {
                let violation = self
                    .build_violation(boundary, rule, &cx, operation.to_string())
                    .await;
                AccessDecision {
                    allowed: false,
                    reason: Some(format!("rule {} ({})", rule.rule_id, rule.action)),
                    violation: Some(violation),
                    safe_path,
                }
            }
            Some(rule) if rule.action == RuleAction::Audit => {
                info!(path = %normalized.display(), rule = rule.rule_id, "audited access");
                AccessDecision {
                    allowed: safe_path.is_safe,
                    reason: (!safe_path.is_safe).then(|| safe_path.violations.join("; ")),
                    violation: None,
                    safe_path,
                }
            }
            _ => AccessDecision {
                // No deny rule matched; the PathGuard containment verdict
                // stands.
                allowed: safe_path.is_safe,
                reason: (!safe_path.is_safe).then(|| safe_path.violations.join("; ")),
                violation: None,
                safe_path,
            },
        }
    }

    // ── Monitoring ────────────────────────────────────────────────────────

    /// Install watchers on every monitored boundary and start the change
    /// pump and integrity sweep tasks.
    pub async fn start_monitoring(self: &Arc<Self>) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<FsChange>();
        *self.change_tx.write().await = Some(tx.clone());

        {
            let boundaries = self.boundaries.read().await;
            let mut watches = self.watches.lock().await;
            for boundary in boundaries.values().filter(|b| b.monitoring_enabled) {
                match watcher::start_watch(
                    &boundary.boundary_id,
                    &boundary.root_path,
                    self.debounce,
                    tx.clone(),
                ) {
                    Ok(handle) => watches.push(handle),
                    Err(e) => warn!(
                        boundary = boundary.boundary_id,
                        err = %e,
                        "failed to watch boundary root"
                    ),
                }
            }
        }

        let engine = Arc::clone(self);
        let pump = tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                engine.handle_change(change).await;
            }
        });

        let engine = Arc::clone(self);
        let interval = self.integrity_interval;
        let sweep = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                engine.integrity_sweep().await;
            }
        });

        let mut tasks = self.tasks.lock().await;
        tasks.push(pump);
        tasks.push(sweep);
        Ok(())
    }

    /// Install a watcher for one just-added boundary (projects created after
    /// start-up). A no-op until monitoring has started.
    pub async fn watch_boundary(&self, boundary_id: &str) {
        let Some(tx) = self.change_tx.read().await.clone() else {
            return;
        };
        let boundaries = self.boundaries.read().await;
        if let Some(b) = boundaries.get(boundary_id) {
            match watcher::start_watch(&b.boundary_id, &b.root_path, self.debounce, tx) {
                Ok(handle) => self.watches.lock().await.push(handle),
                Err(e) => warn!(boundary = boundary_id, err = %e, "failed to watch boundary"),
            }
        }
    }

    /// Stop all watchers and background tasks. In-flight handling completes.
    pub async fn stop(&self) {
        *self.change_tx.write().await = None;
        self.watches.lock().await.clear();
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }

    /// Route every classified change into the activity sink (set by the
    /// orchestrator during wiring).
    pub async fn set_activity_sink(&self, tx: mpsc::UnboundedSender<FsChange>) {
        *self.activity_sink.write().await = Some(tx);
    }

    /// Classify one debounced change and enforce the matching rule.
    pub async fn handle_change(&self, change: FsChange) {
        if let Some(sink) = self.activity_sink.read().await.as_ref() {
            let _ = sink.send(change.clone());
        }
        let boundaries = self.boundaries.read().await;
        let Some(boundary) = boundaries.get(&change.boundary_id).cloned() else {
            return;
        };
        let crosses =
            crosses_project_boundary(&boundaries, &change.path, boundary.project_id.as_deref());
        drop(boundaries);

        let protected = self.is_protected(&change.path);
        let target = change.path.to_string_lossy().into_owned();
        let source = boundary
            .project_id
            .as_deref()
            .map(|p| format!("project:{p}"))
            .unwrap_or_else(|| format!("boundary:{}", boundary.boundary_id));
        let cx = RuleContext {
            source_path: &source,
            target_path: &target,
            operation: FileOperation::Write,
            change: Some(change.kind),
            is_executable: change.is_executable,
            crosses_project_boundary: crosses,
            targets_protected_path: protected,
            size: change.size,
        };

        let Some(rule) = evaluate_rules(&boundary.access_rules, &cx).cloned() else {
            return;
        };
        match rule.action {
            RuleAction::Allow => {}
            RuleAction::Audit => {
                debug!(path = %change.path.display(), rule = rule.rule_id, "audited change");
            }
            RuleAction::Deny | RuleAction::Quarantine => {
                let violation = self
                    .build_violation(&boundary, &rule, &cx, format!("{:?}", change.kind))
                    .await;
                self.record_enforcement(&boundary.boundary_id).await;
                let outcome = enforce::enforce(
                    &violation,
                    rule.action,
                    &boundary.root_path,
                    &self.quarantine_dir,
                )
                .await;
                match &outcome {
                    EnforcementOutcome::Quarantined { .. } => {
                        self.metrics.inc_files_quarantined();
                    }
                    EnforcementOutcome::Failed { action, error } => {
                        let _ = self.events.send(SecurityEvent::EnforcementFailed {
                            violation_id: violation.id.clone(),
                            action: action.clone(),
                            error: error.clone(),
                        });
                    }
                    _ => {}
                }
                let _ = self.events.send(SecurityEvent::BoundaryViolation(violation));
            }
        }
    }

    async fn build_violation(
        &self,
        boundary: &FileSystemBoundary,
        rule: &BoundaryRule,
        cx: &RuleContext<'_>,
        observed: String,
    ) -> BoundaryViolation {
        self.metrics.inc_violations_detected();
        let severity = severity_for(
            rule.action,
            boundary.boundary_type,
            cx.targets_protected_path,
            cx.crosses_project_boundary,
        );
        let violation = BoundaryViolation {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            violation_type: violation_type_for(rule, cx),
            source_path: cx.source_path.to_string(),
            target_path: cx.target_path.to_string(),
            project_id: boundary.project_id.clone(),
            severity,
            blocked: rule.enforcement_level != EnforcementLevel::Advisory,
            remediation_action: rule.action.to_string(),
            evidence: serde_json::json!({
                "boundary_id": boundary.boundary_id,
                "rule_id": rule.rule_id,
                "observed": observed,
                "is_executable": cx.is_executable,
            }),
        };
        let mut recent = self.recent_violations.write().await;
        let cutoff = Utc::now() - VIOLATION_WINDOW;
        recent.retain(|(t, _)| *t > cutoff);
        recent.push((violation.timestamp, severity));
        warn!(
            target = cx.target_path,
            rule = rule.rule_id,
            severity = %severity,
            "boundary violation"
        );
        violation
    }

    async fn record_enforcement(&self, boundary_id: &str) {
        let mut recent = self.recent_enforcements.write().await;
        let cutoff = Utc::now() - chrono::Duration::seconds(
            (self.integrity_interval.as_secs() as i64) * 2,
        );
        recent.retain(|(_, t)| *t > cutoff);
        recent.push((boundary_id.to_string(), Utc::now()));
    }

    /// Recompute each boundary's content hash; a mismatch outside a recorded
    /// enforcement action means out-of-band tampering.
    pub async fn integrity_sweep(&self) {
        let snapshot: Vec<(String, PathBuf, String)> = {
            let boundaries = self.boundaries.read().await;
            boundaries
                .values()
                .map(|b| {
                    (
                        b.boundary_id.clone(),
                        b.root_path.clone(),
                        b.integrity_hash.clone(),
                    )
                })
                .collect()
        };

        for (boundary_id, root, known_hash) in snapshot {
            let hash = {
                let root = root.clone();
                tokio::task::spawn_blocking(move || integrity::hash_tree(&root))
                    .await
                    .ok()
                    .and_then(|r| r.ok())
            };
            let Some(hash) = hash else { continue };
            if hash != known_hash {
                let excused = {
                    let recent = self.recent_enforcements.read().await;
                    recent.iter().any(|(b, _)| b == &boundary_id)
                };
                if !excused && !known_hash.is_empty() {
                    warn!(boundary = boundary_id, "integrity hash mismatch — tamper suspected");
                    let _ = self.events.send(SecurityEvent::IntegrityViolation {
                        boundary_id: boundary_id.clone(),
                        detail: "content hash changed outside any recorded enforcement".into(),
                        severity: Severity::Critical,
                    });
                    let mut recent = self.recent_violations.write().await;
                    recent.push((Utc::now(), Severity::Critical));
                }
            }
            let mut boundaries = self.boundaries.write().await;
            if let Some(b) = boundaries.get_mut(&boundary_id) {
                b.integrity_hash = hash;
                b.last_integrity_check = Utc::now();
            }
        }
    }

    fn is_protected(&self, path: &Path) -> bool {
        self.protected_paths.iter().any(|p| path.starts_with(p))
    }

    /// Health signal: 100 minus 5 per high / 15 per critical violation in
    /// the last hour, floored at 0.
    pub async fn health_score(&self) -> f64 {
        let cutoff = Utc::now() - VIOLATION_WINDOW;
        let recent = self.recent_violations.read().await;
        let penalty: f64 = recent
            .iter()
            .filter(|(t, _)| *t > cutoff)
            .map(|(_, s)| match s {
                Severity::Critical => 15.0,
                Severity::High => 5.0,
                _ => 2.0,
            })
            .sum();
        (100.0 - penalty).max(0.0)
    }

    pub async fn report(&self) -> serde_json::Value {
        let boundaries = self.boundaries.read().await;
        let list: Vec<serde_json::Value> = boundaries
            .values()
            .map(|b| {
                serde_json::json!({
                    "boundary_id": b.boundary_id,
                    "boundary_type": b.boundary_type,
                    "root_path": b.root_path,
                    "rules": b.access_rules.len(),
                    "last_integrity_check": b.last_integrity_check.to_rfc3339(),
                })
            })
            .collect();
        serde_json::json!({
            "boundaries": list,
            "recent_violations": self.recent_violations.read().await.len(),
        })
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Boundary whose root contains `path`; the longest root wins when nested.
fn containing_boundary<'a>(
    boundaries: &'a HashMap<String, FileSystemBoundary>,
    path: &Path,
) -> Option<&'a FileSystemBoundary> {
    boundaries
        .values()
        .filter(|b| path.starts_with(&b.root_path))
        .max_by_key(|b| b.root_path.as_os_str().len())
}

/// True when `path` sits inside a project sandbox other than `own_project`.
fn crosses_project_boundary(
    boundaries: &HashMap<String, FileSystemBoundary>,
    path: &Path,
    own_project: Option<&str>,
) -> bool {
    boundaries.values().any(|b| {
        b.boundary_type == BoundaryType::ProjectSandbox
            && b.project_id.as_deref() != own_project
            && path.starts_with(&b.root_path)
    })
}

/// Severity table keyed by action, boundary type, and target sensitivity.
fn severity_for(
    action: RuleAction,
    boundary_type: BoundaryType,
    protected: bool,
    crosses: bool,
) -> Severity {
    let sensitive = protected || boundary_type == BoundaryType::FrameworkCore;
    match action {
        RuleAction::Allow => Severity::Low,
        RuleAction::Audit => Severity::Low,
        RuleAction::Deny | RuleAction::Quarantine => {
            if sensitive {
                Severity::Critical
            } else if crosses {
                Severity::High
            } else {
                Severity::Medium
            }
        }
    }
}

fn violation_type_for(rule: &BoundaryRule, cx: &RuleContext<'_>) -> String {
    if cx.crosses_project_boundary && rule.conditions.contains(&RuleCondition::CrossesProjectBoundary)
    {
        "cross_project_write".into()
    } else if cx.targets_protected_path {
        "protected_path_write".into()
    } else if cx.is_executable && rule.conditions.contains(&RuleCondition::IsExecutable) {
        "executable_dropped".into()
    } else {
        "boundary_violation".into()
    }
}

// ─── Default rule sets ────────────────────────────────────────────────────────

/// Framework core: the warden's own writes (audit log, quarantine moves,
/// forensics, backups) are allowed; everything else is denied.
fn framework_core_rules(data_dir: &Path) -> Vec<BoundaryRule> {
    let root = data_dir.to_string_lossy();
    let self_dirs = ["quarantine", "forensics", "evidence", "backups"];
    let mut rules: Vec<BoundaryRule> = self_dirs
        .iter()
        .enumerate()
        .map(|(i, dir)| BoundaryRule {
            rule_id: format!("fc-allow-{dir}"),
            source_pattern: "**".into(),
            target_pattern: format!("{root}/{dir}/**"),
            action: RuleAction::Allow,
            enforcement_level: EnforcementLevel::Blocking,
            conditions: vec![],
            enabled: true,
            priority: i as u32,
        })
        .collect();
    rules.push(BoundaryRule {
        rule_id: "fc-allow-audit-log".into(),
        source_pattern: "**".into(),
        target_pattern: format!("{root}/audit.log*"),
        action: RuleAction::Allow,
        enforcement_level: EnforcementLevel::Blocking,
        conditions: vec![],
        enabled: true,
        priority: 4,
    });
    rules.push(BoundaryRule {
        rule_id: "fc-deny-write".into(),
        source_pattern: "**".into(),
        target_pattern: "**".into(),
        action: RuleAction::Deny,
        enforcement_level: EnforcementLevel::Blocking,
        conditions: vec![],
        enabled: true,
        priority: 100,
    });
    rules
}

/// Quarantine boundary: additions are expected (that is its job), log only.
fn quarantine_rules() -> Vec<BoundaryRule> {
    vec![BoundaryRule {
        rule_id: "q-audit".into(),
        source_pattern: "**".into(),
        target_pattern: "**".into(),
        action: RuleAction::Audit,
        enforcement_level: EnforcementLevel::Quarantine,
        conditions: vec![],
        enabled: true,
        priority: 0,
    }]
}

/// Project sandbox: cross-project and protected-path writes are denied,
/// dropped executables are audited or quarantined by security level, and
/// everything within the sandbox itself is allowed.
fn sandbox_rules(quarantine_executables: bool) -> Vec<BoundaryRule> {
    vec![
        BoundaryRule {
            rule_id: "ps-cross-project".into(),
            source_pattern: "**".into(),
            target_pattern: "**".into(),
            action: RuleAction::Deny,
            enforcement_level: EnforcementLevel::Blocking,
            conditions: vec![RuleCondition::CrossesProjectBoundary],
            enabled: true,
            priority: 10,
        },
        BoundaryRule {
            rule_id: "ps-protected-path".into(),
            source_pattern: "**".into(),
            target_pattern: "**".into(),
            action: RuleAction::Deny,
            enforcement_level: EnforcementLevel::Blocking,
            conditions: vec![RuleCondition::TargetsProtectedPath],
            enabled: true,
            priority: 11,
        },
        BoundaryRule {
            rule_id: "ps-executable".into(),
            source_pattern: "**".into(),
            target_pattern: "**".into(),
            action: if quarantine_executables {
                RuleAction::Quarantine
            } else {
                RuleAction::Audit
            },
            enforcement_level: if quarantine_executables {
                EnforcementLevel::Quarantine
            } else {
                EnforcementLevel::Advisory
            },
            conditions: vec![RuleCondition::IsExecutable],
            enabled: true,
            priority: 20,
        },
        BoundaryRule {
            rule_id: "ps-allow-own".into(),
            source_pattern: "**".into(),
            target_pattern: "**".into(),
            action: RuleAction::Allow,
            enforcement_level: EnforcementLevel::Advisory,
            conditions: vec![],
            enabled: true,
            priority: 100,
        },
    ]
}

/// Shared resources: executables are quarantined, all other writes audited.
fn shared_rules() -> Vec<BoundaryRule> {
    vec![
        BoundaryRule {
            rule_id: "sr-executable".into(),
            source_pattern: "**".into(),
            target_pattern: "**".into(),
            action: RuleAction::Quarantine,
            enforcement_level: EnforcementLevel::Quarantine,
            conditions: vec![RuleCondition::IsExecutable],
            enabled: true,
            priority: 10,
        },
        BoundaryRule {
            rule_id: "sr-audit".into(),
            source_pattern: "**".into(),
            target_pattern: "**".into(),
            action: RuleAction::Audit,
            enforcement_level: EnforcementLevel::Advisory,
            conditions: vec![],
            enabled: true,
            priority: 100,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_table_matches_contract() {
        // cross-project deny lands in {high, critical}
        let s = severity_for(RuleAction::Deny, BoundaryType::ProjectSandbox, false, true);
        assert!(s >= Severity::High);
        // framework core is always critical on deny
        assert_eq!(
            severity_for(RuleAction::Deny, BoundaryType::FrameworkCore, false, false),
            Severity::Critical
        );
        assert_eq!(
            severity_for(RuleAction::Audit, BoundaryType::ProjectSandbox, false, false),
            Severity::Low
        );
    }

    #[test]
    fn sandbox_rules_order_cross_project_first() {
        let rules = sandbox_rules(true);
        let mut ordered: Vec<&BoundaryRule> = rules.iter().collect();
        ordered.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.rule_id.cmp(&b.rule_id)));
        assert_eq!(ordered[0].rule_id, "ps-cross-project");
        assert_eq!(ordered.last().unwrap().rule_id, "ps-allow-own");
    }
}
