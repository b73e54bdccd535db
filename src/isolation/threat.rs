// SPDX-License-Identifier: MIT
//! Static threat-detection rule catalog and the per-project activity feed
//! it is evaluated against.
//!
//! Rules are data: detection patterns (compiled regexes over recent file
//! paths and commands) with a confidence weight, plus ordered response
//! actions. A match only fires when its confidence clears the acceptance
//! threshold.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::events::Severity;
use crate::orchestrator::incident::ResponseAction;

/// Minimum pattern confidence for a match to raise `threatDetected`.
pub const CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Activity records kept per project.
pub const ACTIVITY_RING_CAPACITY: usize = 512;

// ─── Activity feed ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    FileCreated,
    FileModified,
    FileRemoved,
    AccessRequested,
    CommandObserved,
}

/// One observed action attributed to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    /// Path or command line, whichever the kind implies.
    pub detail: String,
}

/// Bounded per-project activity ring.
#[derive(Debug, Default)]
pub struct ActivityFeed {
    ring: VecDeque<ActivityRecord>,
}

impl ActivityFeed {
    pub fn push(&mut self, kind: ActivityKind, detail: impl Into<String>) {
        if self.ring.len() >= ACTIVITY_RING_CAPACITY {
            self.ring.pop_front();
        }
        self.ring.push_back(ActivityRecord {
            timestamp: Utc::now(),
            kind,
            detail: detail.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.ring.iter()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

// ─── Rules ────────────────────────────────────────────────────────────────────

/// What a detection pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    FilePath,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionPattern {
    pub pattern_type: PatternType,
    /// Regex source; compiled lazily at catalog construction.
    pub pattern: String,
    pub severity: Severity,
    /// 0.0–1.0; must clear [`CONFIDENCE_THRESHOLD`] to fire.
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatResponseAction {
    pub action: ResponseAction,
    /// Ascending execution order.
    pub priority: u32,
    pub automatic: bool,
    pub requires_approval: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatDetectionRule {
    pub rule_id: String,
    pub threat_category: String,
    pub detection_patterns: Vec<DetectionPattern>,
    pub response_actions: Vec<ThreatResponseAction>,
}

/// A pattern match against a specific activity record.
#[derive(Debug, Clone)]
pub struct ThreatMatch {
    pub rule_id: String,
    pub threat_category: String,
    pub severity: Severity,
    pub confidence: f64,
    pub matched_detail: String,
}

/// Compiled form: rule plus its regexes, built once.
pub struct CompiledRule {
    pub rule: ThreatDetectionRule,
    patterns: Vec<(PatternType, Regex, Severity, f64)>,
}

impl CompiledRule {
    fn new(rule: ThreatDetectionRule) -> Option<Self> {
        let mut patterns = Vec::with_capacity(rule.detection_patterns.len());
        for p in &rule.detection_patterns {
            let re = Regex::new(&p.pattern).ok()?;
            patterns.push((p.pattern_type, re, p.severity, p.confidence));
        }
        Some(Self { rule, patterns })
    }

    /// Highest-confidence accepted match against the feed, if any.
    pub fn evaluate(&self, feed: &ActivityFeed) -> Option<ThreatMatch> {
        let mut best: Option<ThreatMatch> = None;
        for record in feed.iter() {
            for (ptype, re, severity, confidence) in &self.patterns {
                let applies = match (ptype, record.kind) {
                    (PatternType::Command, ActivityKind::CommandObserved) => true,
                    (PatternType::FilePath, ActivityKind::CommandObserved) => false,
                    (PatternType::FilePath, _) => true,
                    (PatternType::Command, _) => false,
                };
                if !applies || *confidence < CONFIDENCE_THRESHOLD || !re.is_match(&record.detail) {
                    continue;
                }
                let better = best
                    .as_ref()
                    .map(|b| *confidence > b.confidence)
                    .unwrap_or(true);
                if better {
                    best = Some(ThreatMatch {
                        rule_id: self.rule.rule_id.clone(),
                        threat_category: self.rule.threat_category.clone(),
                        severity: *severity,
                        confidence: *confidence,
                        matched_detail: record.detail.clone(),
                    });
                }
            }
        }
        best
    }
}

fn pattern(
    pattern_type: PatternType,
    pattern: &str,
    severity: Severity,
    confidence: f64,
) -> DetectionPattern {
    DetectionPattern {
        pattern_type,
        pattern: pattern.to_string(),
        severity,
        confidence,
    }
}

fn action(action: ResponseAction, priority: u32, requires_approval: bool) -> ThreatResponseAction {
    ThreatResponseAction {
        action,
        priority,
        automatic: !requires_approval,
        requires_approval,
    }
}

/// The static threat catalog, compiled once per process.
pub static THREAT_RULES: Lazy<Vec<CompiledRule>> = Lazy::new(|| {
    default_threat_rules()
        .into_iter()
        .filter_map(CompiledRule::new)
        .collect()
});

fn default_threat_rules() -> Vec<ThreatDetectionRule> {
    vec![
        ThreatDetectionRule {
            rule_id: "tr-privilege-escalation".into(),
            threat_category: "privilege_escalation".into(),
            detection_patterns: vec![
                pattern(
                    PatternType::Command,
                    r"(?i)\b(sudo|doas|pkexec)\b",
                    Severity::High,
                    0.8,
                ),
                pattern(
                    PatternType::Command,
                    r"chmod\s+([0-7]*[4567][0-7]{3}|u\+s)",
                    Severity::Critical,
                    0.9,
                ),
                pattern(
                    PatternType::FilePath,
                    r"/etc/(sudoers|passwd|shadow)",
                    Severity::Critical,
                    0.95,
                ),
            ],
            response_actions: vec![
                action(ResponseAction::BlockAccess, 1, false),
                action(ResponseAction::EnhanceMonitoring, 2, false),
                action(ResponseAction::QuarantineProject, 3, true),
            ],
        },
        ThreatDetectionRule {
            rule_id: "tr-data-exfiltration".into(),
            threat_category: "data_exfiltration".into(),
            detection_patterns: vec![
                pattern(
                    PatternType::Command,
                    r"(tar|zip|7z)\s+.*(\.\./|/sandbox/)",
                    Severity::High,
                    0.75,
                ),
                pattern(
                    PatternType::Command,
                    r"(curl|wget|nc)\s+.*\b(--upload|POST|-T)\b",
                    Severity::High,
                    0.7,
                ),
            ],
            response_actions: vec![
                action(ResponseAction::IsolateNetworkAccess, 1, false),
                action(ResponseAction::BackupProjectState, 2, false),
                action(ResponseAction::ForensicAnalysis, 3, false),
            ],
        },
        ThreatDetectionRule {
            rule_id: "tr-reverse-shell".into(),
            threat_category: "reverse_shell".into(),
            detection_patterns: vec![
                pattern(
                    PatternType::Command,
                    r"(nc|ncat|bash)\s+.*(-e\s*/bin/|/dev/tcp/)",
                    Severity::Critical,
                    0.9,
                ),
                pattern(
                    PatternType::Command,
                    r"python\S*\s+-c\s+.*socket.*connect",
                    Severity::Critical,
                    0.85,
                ),
            ],
            response_actions: vec![
                action(ResponseAction::IsolateNetworkAccess, 1, false),
                action(ResponseAction::QuarantineProject, 2, false),
                action(ResponseAction::ForensicAnalysis, 3, false),
            ],
        },
        ThreatDetectionRule {
            rule_id: "tr-symlink-farm".into(),
            threat_category: "symlink_farm".into(),
            detection_patterns: vec![
                pattern(
                    PatternType::Command,
                    r"ln\s+-s\w*\s+/",
                    Severity::Medium,
                    0.7,
                ),
                // Stays below the acceptance threshold on its own: symlink
                // creation inside the sandbox is common in builds.
                pattern(PatternType::FilePath, r"\.symlink$", Severity::Low, 0.4),
            ],
            response_actions: vec![
                action(ResponseAction::EnhanceMonitoring, 1, false),
                action(ResponseAction::RevertChanges, 2, true),
            ],
        },
    ]
}
