// SPDX-License-Identifier: MIT
//! Internal security event taxonomy and egress broadcasting.
//!
//! Leaf subsystems (PathGuard, BoundaryEngine, ZeroTrustIsolation) never talk
//! to each other through callbacks. They push [`SecurityEvent`] values over a
//! single `mpsc` channel owned by the orchestrator, which matches on the
//! closed sum type exhaustively — adding an event kind is a compile-time
//! checked change.
//!
//! [`EventBroadcaster`] is the egress side: JSON-RPC style notifications
//! fanned out to external subscribers (schedulers, CLIs) over a tokio
//! broadcast channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

use crate::boundary::BoundaryViolation;
use crate::pathguard::PathTraversalAttempt;

// ─── Shared vocabulary ────────────────────────────────────────────────────────

/// Severity scale shared by attempts, violations, threats, and incidents.
///
/// Derives `Ord` so "escalate by one level" and "at least high" checks are
/// plain comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// One level up, saturating at `Critical`.
    pub fn escalate(self) -> Self {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High => Severity::Critical,
            Severity::Critical => Severity::Critical,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// File operation being gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Read,
    Write,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "read"),
            FileOperation::Write => write!(f, "write"),
        }
    }
}

// ─── SecurityEvent ────────────────────────────────────────────────────────────

/// All distinct event kinds the leaf subsystems can raise toward the
/// orchestrator. One inbound event maps to exactly one [`SecurityIncident`].
///
/// [`SecurityIncident`]: crate::orchestrator::incident::SecurityIncident
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SecurityEvent {
    /// PathGuard classified an input as a traversal attack.
    TraversalAttempt(PathTraversalAttempt),
    /// A filesystem event matched a deny/quarantine rule or escaped its root.
    BoundaryViolation(BoundaryViolation),
    /// A boundary's content hash changed outside any recorded enforcement.
    IntegrityViolation {
        boundary_id: String,
        detail: String,
        severity: Severity,
    },
    /// A threat-detection pattern matched recent project activity.
    ThreatDetected {
        project_id: String,
        rule_id: String,
        threat_category: String,
        severity: Severity,
        confidence: f64,
        evidence: Value,
    },
    /// An isolation boundary can no longer be trusted.
    BoundaryCompromised {
        project_id: String,
        boundary_id: String,
        reason: String,
        severity: Severity,
    },
    /// A project was fully quarantined and removed from enforcement.
    ProjectQuarantined { project_id: String, reason: String },
    /// A zero-trust verification check failed.
    VerificationFailed {
        project_id: String,
        check_name: String,
        failure_action: String,
        consecutive_failures: u32,
    },
    /// The per-access gate denied an operation.
    UnauthorizedAccess {
        project_id: String,
        operation: FileOperation,
        target_path: String,
        reason: String,
    },
    /// An enforcement step (delete/quarantine) itself failed.
    EnforcementFailed {
        violation_id: String,
        action: String,
        error: String,
    },
}

impl SecurityEvent {
    /// Short event-kind label used in logs and incident descriptions.
    pub fn kind(&self) -> &'static str {
        match self {
            SecurityEvent::TraversalAttempt(_) => "traversal_attempt",
            SecurityEvent::BoundaryViolation(_) => "boundary_violation",
            SecurityEvent::IntegrityViolation { .. } => "integrity_violation",
            SecurityEvent::ThreatDetected { .. } => "threat_detected",
            SecurityEvent::BoundaryCompromised { .. } => "boundary_compromised",
            SecurityEvent::ProjectQuarantined { .. } => "project_quarantined",
            SecurityEvent::VerificationFailed { .. } => "verification_failed",
            SecurityEvent::UnauthorizedAccess { .. } => "unauthorized_access",
            SecurityEvent::EnforcementFailed { .. } => "enforcement_failed",
        }
    }
}

// ─── EventBroadcaster ─────────────────────────────────────────────────────────

/// Broadcasts JSON notification strings to all external subscribers.
///
/// Fire-and-forget: no subscribers is fine, lagging subscribers are dropped
/// by the broadcast channel.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        // 1024-message channel absorbs bursts during an incident storm
        // before lagging receivers are dropped.
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Send a notification to all connected subscribers.
    ///
    /// `method` is one of the egress contract names: `securityIncident`,
    /// `emergencyProtocol`, `projectQuarantined`, `projectAccessBlocked`,
    /// `networkIsolated`, `securityPostureUpdated`, `operationsPaused`,
    /// `operationsResumed`.
    pub fn broadcast(&self, method: &str, params: Value) {
        let notification = serde_json::json!({
            "method": method,
            "params": params,
        });
        match serde_json::to_string(&notification) {
            Ok(json) => {
                // Ignore send errors — no subscribers is fine
                let _ = self.tx.send(json);
            }
            Err(e) => {
                warn!(method = method, err = %e, "failed to serialize broadcast event");
            }
        }
    }

    /// Subscribe to all broadcast notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_and_escalation() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert_eq!(Severity::Medium.escalate(), Severity::High);
        assert_eq!(Severity::Critical.escalate(), Severity::Critical);
    }

    #[tokio::test]
    async fn broadcast_reaches_subscriber() {
        let b = EventBroadcaster::new();
        let mut rx = b.subscribe();
        b.broadcast("securityPostureUpdated", serde_json::json!({"score": 100.0}));
        let msg = rx.recv().await.unwrap();
        assert!(msg.contains("securityPostureUpdated"));
    }
}
