// SPDX-License-Identifier: MIT
//! Boundary access rules — glob patterns plus a closed condition predicate
//! set, evaluated in a deterministic total order.
//!
//! Rule conditions are an enum, not free-form strings: adding a predicate
//! kind is a compile-time-checked change and the interpreter match below is
//! exhaustive.

use serde::{Deserialize, Serialize};

use crate::events::FileOperation;

// ─── Actions and levels ───────────────────────────────────────────────────────

/// What a matching rule does to the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    Deny,
    Audit,
    Quarantine,
}

impl std::fmt::Display for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleAction::Allow => "allow",
            RuleAction::Deny => "deny",
            RuleAction::Audit => "audit",
            RuleAction::Quarantine => "quarantine",
        };
        write!(f, "{s}")
    }
}

/// How hard the owning boundary enforces its rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementLevel {
    Advisory,
    Blocking,
    Quarantine,
}

/// Kind of filesystem change observed by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

// ─── Conditions ───────────────────────────────────────────────────────────────

/// Closed predicate set evaluated against an observed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    /// The artifact carries an execute bit or a known executable extension.
    IsExecutable,
    /// The source process context belongs to a different project than the
    /// target path.
    CrossesProjectBoundary,
    /// The target sits under a protected framework path.
    TargetsProtectedPath,
    /// The gate operation matches (watcher events map create/modify/remove
    /// to `Write`).
    OperationIs { operation: FileOperation },
    /// The artifact is larger than `bytes`.
    SizeExceeds { bytes: u64 },
}

/// Everything the interpreter may inspect about one event.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub source_path: &'a str,
    pub target_path: &'a str,
    pub operation: FileOperation,
    pub change: Option<ChangeKind>,
    pub is_executable: bool,
    pub crosses_project_boundary: bool,
    pub targets_protected_path: bool,
    pub size: u64,
}

impl RuleCondition {
    /// Evaluate one predicate. Exhaustive by construction.
    pub fn holds(&self, cx: &RuleContext<'_>) -> bool {
        match self {
            RuleCondition::IsExecutable => cx.is_executable,
            RuleCondition::CrossesProjectBoundary => cx.crosses_project_boundary,
            RuleCondition::TargetsProtectedPath => cx.targets_protected_path,
            RuleCondition::OperationIs { operation } => cx.operation == *operation,
            RuleCondition::SizeExceeds { bytes } => cx.size > *bytes,
        }
    }
}

// ─── BoundaryRule ─────────────────────────────────────────────────────────────

/// One ordered access rule on a boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryRule {
    pub rule_id: String,
    /// Glob over the source process path (`**` matches everything).
    pub source_pattern: String,
    /// Glob over the target path.
    pub target_pattern: String,
    pub action: RuleAction,
    pub enforcement_level: EnforcementLevel,
    pub conditions: Vec<RuleCondition>,
    pub enabled: bool,
    /// Lower evaluates first. Ties resolve by ascending `rule_id`.
    pub priority: u32,
}

impl BoundaryRule {
    /// Both patterns match and every condition holds.
    pub fn matches(&self, cx: &RuleContext<'_>) -> bool {
        self.enabled
            && glob_matches(&self.source_pattern, cx.source_path)
            && glob_matches(&self.target_pattern, cx.target_path)
            && self.conditions.iter().all(|c| c.holds(cx))
    }
}

/// First enabled rule that matches, in (priority, rule_id) order.
pub fn evaluate_rules<'a>(
    rules: &'a [BoundaryRule],
    cx: &RuleContext<'_>,
) -> Option<&'a BoundaryRule> {
    let mut ordered: Vec<&BoundaryRule> = rules.iter().collect();
    ordered.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
    ordered.into_iter().find(|r| r.matches(cx))
}

// ─── Glob matcher ─────────────────────────────────────────────────────────────

/// Simple glob matcher: `*` matches any chars except `/`, `**` matches any
/// chars including `/`, `?` matches one char.
pub fn glob_matches(pattern: &str, path: &str) -> bool {
    glob_matches_inner(pattern.as_bytes(), path.as_bytes())
}

fn glob_matches_inner(pat: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;
    let mut star_p: Option<usize> = None;
    let mut star_t: usize = 0;

    while t < text.len() {
        if p < pat.len() && (pat[p] == b'?' || pat[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p + 1 < pat.len() && pat[p] == b'*' && pat[p + 1] == b'*' {
            // `**` — match any characters including `/`
            star_p = Some(p);
            star_t = t;
            p += 2;
            if p < pat.len() && pat[p] == b'/' {
                p += 1;
            }
        } else if p < pat.len() && pat[p] == b'*' {
            // `*` — match any characters except `/`
            star_p = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star_p {
            // backtrack to last star
            let last_star_double = sp + 1 < pat.len() && pat[sp + 1] == b'*';
            // A single `*` may not absorb a separator.
            if !last_star_double && text[star_t] == b'/' {
                return false;
            }
            star_t += 1;
            t = star_t;
            p = sp + if last_star_double { 2 } else { 1 };
        } else {
            return false;
        }
    }

    while p + 1 < pat.len() && pat[p] == b'*' && pat[p + 1] == b'*' {
        p += 2;
    }
    while p < pat.len() && pat[p] == b'*' {
        p += 1;
    }

    p == pat.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cx<'a>(target: &'a str) -> RuleContext<'a> {
        RuleContext {
            source_path: "/sandbox/proj1",
            target_path: target,
            operation: FileOperation::Write,
            change: Some(ChangeKind::Created),
            is_executable: false,
            crosses_project_boundary: false,
            targets_protected_path: false,
            size: 0,
        }
    }

    fn rule(id: &str, priority: u32, action: RuleAction) -> BoundaryRule {
        BoundaryRule {
            rule_id: id.into(),
            source_pattern: "**".into(),
            target_pattern: "**".into(),
            action,
            enforcement_level: EnforcementLevel::Blocking,
            conditions: vec![],
            enabled: true,
            priority,
        }
    }

    #[test]
    fn glob_star_does_not_cross_separator() {
        assert!(glob_matches("/a/*.txt", "/a/file.txt"));
        assert!(!glob_matches("/a/*.txt", "/a/b/file.txt"));
        assert!(!glob_matches("/root/*.tmp", "/root/sub/deep/x.tmp"));
        assert!(glob_matches("/a/**/*.txt", "/a/b/file.txt"));
        assert!(glob_matches("/a/*l*.txt", "/a/file.txt"));
        assert!(glob_matches("**", "/anything/at/all"));
    }

    #[test]
    fn lowest_priority_wins() {
        let rules = vec![
            rule("r-allow", 10, RuleAction::Allow),
            rule("r-deny", 1, RuleAction::Deny),
        ];
        let hit = evaluate_rules(&rules, &cx("/x")).unwrap();
        assert_eq!(hit.rule_id, "r-deny");
    }

    #[test]
    fn equal_priority_resolves_by_rule_id() {
        let rules = vec![
            rule("r-b", 5, RuleAction::Allow),
            rule("r-a", 5, RuleAction::Deny),
        ];
        let hit = evaluate_rules(&rules, &cx("/x")).unwrap();
        assert_eq!(hit.rule_id, "r-a");
        assert_eq!(hit.action, RuleAction::Deny);
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let mut r = rule("r-deny", 0, RuleAction::Deny);
        r.enabled = false;
        let rules = vec![r, rule("r-allow", 1, RuleAction::Allow)];
        let hit = evaluate_rules(&rules, &cx("/x")).unwrap();
        assert_eq!(hit.rule_id, "r-allow");
    }

    #[test]
    fn conditions_gate_the_match() {
        let mut r = rule("r-exec", 0, RuleAction::Quarantine);
        r.conditions = vec![RuleCondition::IsExecutable];
        let rules = vec![r];
        assert!(evaluate_rules(&rules, &cx("/x")).is_none());
        let mut c = cx("/x");
        c.is_executable = true;
        assert!(evaluate_rules(&rules, &c).is_some());
    }
}
