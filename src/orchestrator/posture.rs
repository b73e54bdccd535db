// SPDX-License-Identifier: MIT
//! Security posture assessment.
//!
//! The aggregation function is a single pluggable point: the shipped
//! strategy is the plain unweighted mean of the four subsystem scores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four subsystem health scores, each 0–100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SystemHealth {
    pub path_guard: f64,
    pub boundary_engine: f64,
    pub isolation: f64,
    pub orchestrator: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    Warning,
    Violation,
    Critical,
}

/// Exact bucket thresholds: ≥95 compliant, ≥85 warning, ≥70 violation.
pub fn compliance_for(score: f64) -> ComplianceStatus {
    if score >= 95.0 {
        ComplianceStatus::Compliant
    } else if score >= 85.0 {
        ComplianceStatus::Warning
    } else if score >= 70.0 {
        ComplianceStatus::Violation
    } else {
        ComplianceStatus::Critical
    }
}

/// Pluggable aggregation strategy.
pub type Aggregator = fn(&SystemHealth) -> f64;

/// Unweighted mean of exactly the four subsystem scores.
pub fn mean_aggregate(health: &SystemHealth) -> f64 {
    (health.path_guard + health.boundary_engine + health.isolation + health.orchestrator) / 4.0
}

/// One posture assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityPosture {
    pub overall_score: f64,
    pub last_assessment: DateTime<Utc>,
    pub compliance_status: ComplianceStatus,
    pub active_threats: usize,
    pub resolved_incidents: usize,
    pub system_health: SystemHealth,
    pub recommendations: Vec<String>,
}

pub struct PostureAssessor {
    aggregate: Aggregator,
}

impl Default for PostureAssessor {
    fn default() -> Self {
        Self {
            aggregate: mean_aggregate,
        }
    }
}

impl PostureAssessor {
    #[allow(dead_code)]
    pub fn with_aggregator(aggregate: Aggregator) -> Self {
        Self { aggregate }
    }

    pub fn assess(
        &self,
        health: SystemHealth,
        active_threats: usize,
        resolved_incidents: usize,
    ) -> SecurityPosture {
        let overall_score = (self.aggregate)(&health).clamp(0.0, 100.0);
        SecurityPosture {
            overall_score,
            last_assessment: Utc::now(),
            compliance_status: compliance_for(overall_score),
            active_threats,
            resolved_incidents,
            recommendations: recommendations_for(&health, active_threats),
            system_health: health,
        }
    }
}

fn recommendations_for(health: &SystemHealth, active_threats: usize) -> Vec<String> {
    let mut out = Vec::new();
    if health.path_guard < 80.0 {
        out.push("sustained traversal attempts — review agent inputs and tighten allowed roots".into());
    }
    if health.boundary_engine < 80.0 {
        out.push("repeated boundary violations — audit project rule sets".into());
    }
    if health.isolation < 80.0 {
        out.push("isolation integrity degraded — consider raising project security levels".into());
    }
    if active_threats > 0 {
        out.push(format!(
            "{active_threats} unresolved threat(s) — review open incidents"
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn health(v: f64) -> SystemHealth {
        SystemHealth {
            path_guard: v,
            boundary_engine: v,
            isolation: v,
            orchestrator: v,
        }
    }

    #[test]
    fn mean_is_exact() {
        let h = SystemHealth {
            path_guard: 100.0,
            boundary_engine: 90.0,
            isolation: 80.0,
            orchestrator: 70.0,
        };
        assert_eq!(mean_aggregate(&h), 85.0);
    }

    #[test]
    fn compliance_boundaries_are_exact() {
        assert_eq!(compliance_for(95.0), ComplianceStatus::Compliant);
        assert_eq!(compliance_for(94.9), ComplianceStatus::Warning);
        assert_eq!(compliance_for(85.0), ComplianceStatus::Warning);
        assert_eq!(compliance_for(84.9), ComplianceStatus::Violation);
        assert_eq!(compliance_for(70.0), ComplianceStatus::Violation);
        assert_eq!(compliance_for(69.9), ComplianceStatus::Critical);
    }

    #[test]
    fn healthy_system_has_no_recommendations() {
        assert!(recommendations_for(&health(100.0), 0).is_empty());
        let degraded = recommendations_for(&health(60.0), 2);
        assert_eq!(degraded.len(), 4);
    }

    #[test]
    fn score_stays_in_range() {
        let assessor = PostureAssessor::default();
        let p = assessor.assess(health(100.0), 0, 0);
        assert!(p.overall_score <= 100.0 && p.overall_score >= 0.0);
        assert_eq!(p.compliance_status, ComplianceStatus::Compliant);
    }

    #[test]
    fn custom_aggregator_is_pluggable() {
        fn pessimist(h: &SystemHealth) -> f64 {
            h.path_guard
                .min(h.boundary_engine)
                .min(h.isolation)
                .min(h.orchestrator)
        }
        let assessor = PostureAssessor::with_aggregator(pessimist);
        let mut h = health(100.0);
        h.isolation = 40.0;
        assert_eq!(assessor.assess(h, 0, 0).overall_score, 40.0);
    }
}
