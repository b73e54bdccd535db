// SPDX-License-Identifier: MIT
//! Security incidents — the orchestrator's unit of record.
//!
//! # State machine
//!
//! ```text
//! Detected ──► Investigating ──► { Contained | Resolved }
//!     │               │
//!     └───────────────┴──(severity critical)──► Escalated
//! ```
//!
//! Transitions are monotonic forward; terminal states set `resolved_at`.
//! Incidents are never deleted, only evicted from the in-memory window by
//! retention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Severity;

// ─── Enums ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    PathTraversalAttack,
    BoundaryViolation,
    IntegrityViolation,
    ThreatDetected,
    BoundaryCompromised,
    ProjectQuarantined,
    VerificationFailure,
    UnauthorizedAccess,
    EnforcementFailure,
}

impl std::fmt::Display for IncidentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IncidentType::PathTraversalAttack => "path_traversal_attack",
            IncidentType::BoundaryViolation => "boundary_violation",
            IncidentType::IntegrityViolation => "integrity_violation",
            IncidentType::ThreatDetected => "threat_detected",
            IncidentType::BoundaryCompromised => "boundary_compromised",
            IncidentType::ProjectQuarantined => "project_quarantined",
            IncidentType::VerificationFailure => "verification_failure",
            IncidentType::UnauthorizedAccess => "unauthorized_access",
            IncidentType::EnforcementFailure => "enforcement_failure",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Detected,
    Investigating,
    Contained,
    Resolved,
    Escalated,
}

impl IncidentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            IncidentStatus::Contained | IncidentStatus::Resolved | IncidentStatus::Escalated
        )
    }

    /// Monotonic-forward transition rule.
    fn may_transition_to(self, next: IncidentStatus) -> bool {
        use IncidentStatus::*;
        match (self, next) {
            (Detected, Investigating) => true,
            (Investigating, Contained | Resolved) => true,
            // Escalated is reachable from any non-resolved state.
            (Detected | Investigating | Contained, Escalated) => true,
            _ => false,
        }
    }
}

/// Automated response actions, executed independently of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    BlockAccess,
    QuarantineProject,
    BackupProjectState,
    ForensicAnalysis,
    IsolateNetworkAccess,
    EnhanceMonitoring,
    AlertSecurityTeam,
    QuarantineFile,
    RevertChanges,
    LogOnly,
}

impl std::fmt::Display for ResponseAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResponseAction::BlockAccess => "block_access",
            ResponseAction::QuarantineProject => "quarantine_project",
            ResponseAction::BackupProjectState => "backup_project_state",
            ResponseAction::ForensicAnalysis => "forensic_analysis",
            ResponseAction::IsolateNetworkAccess => "isolate_network_access",
            ResponseAction::EnhanceMonitoring => "enhance_monitoring",
            ResponseAction::AlertSecurityTeam => "alert_security_team",
            ResponseAction::QuarantineFile => "quarantine_file",
            ResponseAction::RevertChanges => "revert_changes",
            ResponseAction::LogOnly => "log_only",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one executed response action, recorded in evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: ResponseAction,
    pub succeeded: bool,
    pub detail: String,
}

// ─── SecurityIncident ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityIncident {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub source_system: String,
    pub project_id: Option<String>,
    pub description: String,
    pub evidence: serde_json::Value,
    pub response_actions: Vec<ActionRecord>,
    pub status: IncidentStatus,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SecurityIncident {
    pub fn new(
        incident_type: IncidentType,
        severity: Severity,
        source_system: &str,
        project_id: Option<String>,
        description: String,
        evidence: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            incident_type,
            severity,
            source_system: source_system.to_string(),
            project_id,
            description,
            evidence,
            response_actions: Vec::new(),
            status: IncidentStatus::Detected,
            resolved_at: None,
        }
    }

    /// Advance the state machine. Illegal transitions are ignored (the
    /// incident keeps its current state) — status is derived bookkeeping,
    /// not a caller contract.
    pub fn transition(&mut self, next: IncidentStatus) {
        if self.status.may_transition_to(next) {
            self.status = next;
            if next.is_terminal() {
                self.resolved_at = Some(Utc::now());
            }
        }
    }
}

// ─── Policy table ─────────────────────────────────────────────────────────────

/// The fixed `{incident_type, severity} → response_actions` policy.
///
/// Critical always includes quarantine + backup + forensics; high always
/// includes block + enhanced monitoring + backup; path traversal always adds
/// network isolation on top of its severity tier.
pub fn response_actions_for(
    incident_type: IncidentType,
    severity: Severity,
) -> Vec<ResponseAction> {
    let mut actions = match severity {
        Severity::Critical => vec![
            ResponseAction::QuarantineProject,
            ResponseAction::BackupProjectState,
            ResponseAction::ForensicAnalysis,
            ResponseAction::AlertSecurityTeam,
        ],
        Severity::High => vec![
            ResponseAction::BlockAccess,
            ResponseAction::EnhanceMonitoring,
            ResponseAction::BackupProjectState,
        ],
        Severity::Medium => vec![
            ResponseAction::BlockAccess,
            ResponseAction::EnhanceMonitoring,
        ],
        Severity::Low => vec![ResponseAction::LogOnly],
    };

    match incident_type {
        IncidentType::PathTraversalAttack => {
            actions.push(ResponseAction::IsolateNetworkAccess);
        }
        IncidentType::IntegrityViolation | IncidentType::BoundaryCompromised => {
            if !actions.contains(&ResponseAction::ForensicAnalysis) {
                actions.push(ResponseAction::ForensicAnalysis);
            }
        }
        // Quarantine already happened; record and preserve evidence only.
        IncidentType::ProjectQuarantined => {
            actions.retain(|a| *a != ResponseAction::QuarantineProject);
            if !actions.contains(&ResponseAction::ForensicAnalysis) {
                actions.push(ResponseAction::ForensicAnalysis);
            }
        }
        _ => {}
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_always_quarantines_backs_up_and_forensics() {
        for t in [
            IncidentType::PathTraversalAttack,
            IncidentType::BoundaryViolation,
            IncidentType::ThreatDetected,
            IncidentType::IntegrityViolation,
        ] {
            let actions = response_actions_for(t, Severity::Critical);
            assert!(actions.contains(&ResponseAction::QuarantineProject), "{t}");
            assert!(actions.contains(&ResponseAction::BackupProjectState), "{t}");
            assert!(actions.contains(&ResponseAction::ForensicAnalysis), "{t}");
            assert!(!actions.is_empty());
        }
    }

    #[test]
    fn high_blocks_and_enhances() {
        let actions = response_actions_for(IncidentType::BoundaryViolation, Severity::High);
        assert!(actions.contains(&ResponseAction::BlockAccess));
        assert!(actions.contains(&ResponseAction::EnhanceMonitoring));
        assert!(actions.contains(&ResponseAction::BackupProjectState));
    }

    #[test]
    fn traversal_always_isolates_network() {
        for sev in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            let actions = response_actions_for(IncidentType::PathTraversalAttack, sev);
            assert!(actions.contains(&ResponseAction::IsolateNetworkAccess));
        }
    }

    #[test]
    fn status_machine_is_monotonic() {
        let mut inc = SecurityIncident::new(
            IncidentType::ThreatDetected,
            Severity::Medium,
            "zero_trust",
            None,
            "test".into(),
            serde_json::json!({}),
        );
        assert_eq!(inc.status, IncidentStatus::Detected);
        inc.transition(IncidentStatus::Investigating);
        inc.transition(IncidentStatus::Resolved);
        assert_eq!(inc.status, IncidentStatus::Resolved);
        assert!(inc.resolved_at.is_some());
        // backwards transition is ignored
        inc.transition(IncidentStatus::Detected);
        assert_eq!(inc.status, IncidentStatus::Resolved);
        // resolved never escalates
        inc.transition(IncidentStatus::Escalated);
        assert_eq!(inc.status, IncidentStatus::Resolved);
    }

    #[test]
    fn escalation_reachable_from_contained() {
        let mut inc = SecurityIncident::new(
            IncidentType::BoundaryViolation,
            Severity::Critical,
            "boundary_engine",
            Some("p1".into()),
            "test".into(),
            serde_json::json!({}),
        );
        inc.transition(IncidentStatus::Investigating);
        inc.transition(IncidentStatus::Contained);
        inc.transition(IncidentStatus::Escalated);
        assert_eq!(inc.status, IncidentStatus::Escalated);
    }
}
