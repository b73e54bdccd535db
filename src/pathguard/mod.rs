// SPDX-License-Identifier: MIT
//! PathGuard — stateless path validation and traversal-attack classification.
//!
//! `validate` never fails: adversarial input is the *expected* case and is
//! always returned as a structured [`SafePath`]. Classification follows a
//! fixed step order so the same attack string always yields the same
//! [`AttackType`]:
//!
//! 1. capped percent-decode + Unicode homoglyph folding
//! 2. null-byte detection (always critical, always blocked)
//! 3. Windows drive/UNC prefixes and mixed separators
//! 4. `..` segments — raw, encoding-revealed, or unicode-revealed
//! 5. symlink resolution against the allowed roots
//! 6. lexical canonicalization into `normalized_path`
//!
//! Every attack-classified validation is recorded in a bounded in-memory
//! ring for forensics; callers that gate access surface the attempt upward
//! as an incident.

pub mod decode;

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::events::{FileOperation, Severity};
use crate::metrics::WardenMetrics;

use decode::{
    has_mixed_separators, has_windows_prefix, normalize_path, normalize_unicode,
    parent_segments, percent_decode, sanitize_filename,
};

/// Attempts kept in the in-memory ring.
const ATTEMPT_RING_CAPACITY: usize = 256;

// ─── Types ────────────────────────────────────────────────────────────────────

/// How a hostile path tried to escape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackType {
    BasicTraversal,
    EncodedTraversal,
    UnicodeTraversal,
    SymlinkTraversal,
    DoubleEncoding,
    NullByteInjection,
    WindowsTraversal,
    MixedSeparators,
}

impl std::fmt::Display for AttackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttackType::BasicTraversal => "basic_traversal",
            AttackType::EncodedTraversal => "encoded_traversal",
            AttackType::UnicodeTraversal => "unicode_traversal",
            AttackType::SymlinkTraversal => "symlink_traversal",
            AttackType::DoubleEncoding => "double_encoding",
            AttackType::NullByteInjection => "null_byte_injection",
            AttackType::WindowsTraversal => "windows_traversal",
            AttackType::MixedSeparators => "mixed_separators",
        };
        write!(f, "{s}")
    }
}

/// Result of one validation call. Produced fresh per call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafePath {
    pub original_path: String,
    /// Decoded, homoglyph-folded, lexically canonicalized form.
    pub sanitized_path: String,
    pub is_safe: bool,
    /// Human-readable findings, empty when safe.
    pub violations: Vec<String>,
    /// Attack classification when one applied.
    pub attack_type: Option<AttackType>,
    pub severity: Option<Severity>,
    /// Sanitized filename re-rooted under the project sandbox. Callers MAY
    /// use this to auto-correct instead of rejecting.
    pub recommended_path: Option<String>,
}

/// Immutable record of one attack-classified validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathTraversalAttempt {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub attack_type: AttackType,
    pub original_path: String,
    pub normalized_path: String,
    /// Where the path would have landed had it not been blocked.
    pub intended_target: String,
    pub severity: Severity,
    pub blocked: bool,
    pub project_id: Option<String>,
    pub evidence: serde_json::Value,
}

// ─── PathGuard ────────────────────────────────────────────────────────────────

/// Stateless validator plus a bounded attempt ring.
///
/// "Stateless" refers to validation itself: the outcome is a pure function
/// of the inputs, the registered roots, and current symlink state. The ring
/// and metrics are observability only.
pub struct PathGuard {
    /// project_id → declared sandbox root.
    allowed_roots: RwLock<HashMap<String, PathBuf>>,
    /// Framework paths that no project may write.
    protected_paths: Vec<PathBuf>,
    /// Protected paths that remain readable.
    read_whitelist: Vec<PathBuf>,
    attempts: RwLock<VecDeque<PathTraversalAttempt>>,
    metrics: Arc<WardenMetrics>,
}

impl PathGuard {
    pub fn new(
        protected_paths: Vec<PathBuf>,
        read_whitelist: Vec<PathBuf>,
        metrics: Arc<WardenMetrics>,
    ) -> Self {
        Self {
            allowed_roots: RwLock::new(HashMap::new()),
            protected_paths: protected_paths.iter().map(|p| normalize_path(p)).collect(),
            read_whitelist: read_whitelist.iter().map(|p| normalize_path(p)).collect(),
            attempts: RwLock::new(VecDeque::with_capacity(ATTEMPT_RING_CAPACITY)),
            metrics,
        }
    }

    /// Declare (or replace) a project's sandbox root.
    pub async fn register_root(&self, project_id: &str, root: &Path) {
        self.allowed_roots
            .write()
            .await
            .insert(project_id.to_string(), normalize_path(root));
    }

    pub async fn unregister_root(&self, project_id: &str) {
        self.allowed_roots.write().await.remove(project_id);
    }

    /// Validate `input_path` for `operation` in the context of `project_id`.
    ///
    /// Never returns an error — adversarial input is the expected case.
    pub async fn validate(
        &self,
        input_path: &str,
        project_id: Option<&str>,
        operation: FileOperation,
    ) -> SafePath {
        self.metrics.inc_paths_validated();

        let mut violations: Vec<String> = Vec::new();
        let mut attack: Option<AttackType> = None;

        // Step 1: capped percent-decode, then Unicode homoglyph folding.
        let decoded = percent_decode(input_path);
        let (folded, unicode_changed) = normalize_unicode(&decoded.text);

        // Step 2: null byte anywhere in the decoded string.
        if folded.contains('\0') || input_path.contains('\0') {
            violations.push("null byte in path".to_string());
            attack = Some(AttackType::NullByteInjection);
        }

        // Step 3: Windows prefixes and mixed separators.
        if attack.is_none() && has_windows_prefix(&folded) {
            violations.push("windows drive or UNC prefix".to_string());
            attack = Some(AttackType::WindowsTraversal);
        }
        if attack.is_none() && has_mixed_separators(&folded) {
            violations.push("mixed path separators".to_string());
            attack = Some(AttackType::MixedSeparators);
        }

        // Step 4: `..` segments — classify by which transform revealed them.
        let raw_parents = parent_segments(input_path);
        let decoded_parents = parent_segments(&decoded.text);
        let folded_parents = parent_segments(&folded);
        if attack.is_none() && folded_parents > 0 {
            if raw_parents > 0 {
                violations.push(format!("{raw_parents} parent-directory segment(s)"));
                attack = Some(AttackType::BasicTraversal);
            } else if decoded_parents > 0 {
                violations.push("parent segments revealed by percent-decoding".to_string());
                attack = Some(if decoded.passes > 1 {
                    AttackType::DoubleEncoding
                } else {
                    AttackType::EncodedTraversal
                });
            } else if unicode_changed {
                violations.push("parent segments revealed by unicode folding".to_string());
                attack = Some(AttackType::UnicodeTraversal);
            }
        }
        if attack.is_none() && decoded.residual_encoding && decoded.passes > 0 {
            violations.push("percent-encoding deeper than the decode cap".to_string());
            attack = Some(AttackType::DoubleEncoding);
        }

        // Step 6 (lexical part): canonicalize the folded string. The slash
        // form is used for all containment checks.
        let normalized = normalize_path(Path::new(folded.replace('\\', "/").trim()));

        // Step 5: symlink resolution. If the path (or its nearest existing
        // ancestor) resolves somewhere a lexical reading would not, and that
        // target is outside every allowed root, a symlink is smuggling.
        let roots = self.allowed_roots.read().await;
        if attack.is_none() {
            if let Some(resolved) = resolve_existing(&normalized) {
                if resolved != normalized
                    && !under_any_root(&resolved, roots.values())
                    && under_any_root(&normalized, roots.values())
                {
                    violations.push(format!(
                        "symlink resolves outside allowed roots: {}",
                        resolved.display()
                    ));
                    attack = Some(AttackType::SymlinkTraversal);
                }
            }
        }

        // Containment: the normalized path must sit under at least one
        // allowed root for this project, and must not touch a protected
        // framework path (reads of whitelisted paths excepted).
        let project_root = project_id.and_then(|p| roots.get(p).cloned());
        let in_allowed_root = match (&project_root, project_id) {
            (Some(root), _) => normalized.starts_with(root),
            // No project context: any registered root will do.
            (None, None) => under_any_root(&normalized, roots.values()),
            // Caller named a project we do not know: nothing is allowed.
            (None, Some(_)) => false,
        };
        let protected = self
            .protected_paths
            .iter()
            .any(|p| normalized.starts_with(p));
        let whitelisted_read = operation == FileOperation::Read
            && self.read_whitelist.iter().any(|p| normalized.starts_with(p));
        drop(roots);

        if !in_allowed_root && attack.is_none() && violations.is_empty() {
            violations.push("path outside every allowed root".to_string());
        }
        if protected && !whitelisted_read {
            violations.push("path targets a protected framework path".to_string());
        }

        let is_safe = attack.is_none() && in_allowed_root && (!protected || whitelisted_read);

        // Severity from the fixed precedence table, escalated by one when a
        // protected path is the target.
        let severity = attack.map(|a| {
            let base = match a {
                AttackType::NullByteInjection | AttackType::SymlinkTraversal => Severity::Critical,
                AttackType::EncodedTraversal | AttackType::DoubleEncoding => Severity::High,
                AttackType::BasicTraversal
                | AttackType::UnicodeTraversal
                | AttackType::WindowsTraversal
                | AttackType::MixedSeparators => Severity::Medium,
            };
            if protected {
                base.escalate()
            } else {
                base
            }
        });

        let recommended_path = if is_safe {
            None
        } else {
            project_root.as_ref().map(|root| {
                root.join(sanitize_filename(&folded))
                    .to_string_lossy()
                    .into_owned()
            })
        };

        let result = SafePath {
            original_path: input_path.to_string(),
            sanitized_path: normalized.to_string_lossy().into_owned(),
            is_safe,
            violations,
            attack_type: attack,
            severity,
            recommended_path,
        };

        if let (Some(attack_type), Some(severity)) = (attack, severity) {
            self.record_attempt(&result, attack_type, severity, project_id)
                .await;
        } else if !is_safe {
            debug!(path = input_path, "unsafe path without attack classification");
        }

        result
    }

    /// Record an attack in the bounded ring and counters.
    async fn record_attempt(
        &self,
        result: &SafePath,
        attack_type: AttackType,
        severity: Severity,
        project_id: Option<&str>,
    ) {
        self.metrics.inc_attacks_detected();
        warn!(
            path = result.original_path,
            attack = %attack_type,
            severity = %severity,
            project = project_id.unwrap_or("-"),
            "path traversal attempt"
        );
        let attempt = PathTraversalAttempt {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            attack_type,
            original_path: result.original_path.clone(),
            normalized_path: result.sanitized_path.clone(),
            intended_target: result.sanitized_path.clone(),
            severity,
            blocked: true,
            project_id: project_id.map(String::from),
            evidence: serde_json::json!({
                "violations": result.violations,
                "recommended_path": result.recommended_path,
            }),
        };
        let mut ring = self.attempts.write().await;
        if ring.len() >= ATTEMPT_RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(attempt);
    }

    /// Most recent attempts, newest last.
    pub async fn recent_attempts(&self, limit: usize) -> Vec<PathTraversalAttempt> {
        let ring = self.attempts.read().await;
        ring.iter().rev().take(limit).rev().cloned().collect()
    }

    /// Health signal for posture assessment: 100 minus a recency-decayed
    /// penalty per attempt in the last hour (critical 10, high 5, else 2),
    /// floored at 0.
    pub async fn health_score(&self) -> f64 {
        let cutoff = Utc::now() - chrono::Duration::hours(1);
        let ring = self.attempts.read().await;
        let penalty: f64 = ring
            .iter()
            .filter(|a| a.timestamp > cutoff)
            .map(|a| match a.severity {
                Severity::Critical => 10.0,
                Severity::High => 5.0,
                _ => 2.0,
            })
            .sum();
        (100.0 - penalty).max(0.0)
    }

    /// Subsystem sub-report for the comprehensive export.
    pub async fn report(&self) -> serde_json::Value {
        let ring = self.attempts.read().await;
        serde_json::json!({
            "recent_attempts": ring.len(),
            "last_attempt": ring.back().map(|a| a.timestamp.to_rfc3339()),
            "registered_roots": self.allowed_roots.read().await.len(),
        })
    }
}

/// True if `path` starts with any of `roots`.
fn under_any_root<'a>(path: &Path, mut roots: impl Iterator<Item = &'a PathBuf>) -> bool {
    // No roots registered means nothing to contain against — fail closed.
    roots.any(|root| path.starts_with(root))
}

/// Canonicalize the nearest existing ancestor of `path` and re-append the
/// non-existing suffix. Returns `None` when nothing along the path exists.
fn resolve_existing(path: &Path) -> Option<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut suffix = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(resolved) => {
                let mut out = resolved;
                for seg in suffix.iter().rev() {
                    out.push(seg);
                }
                return Some(out);
            }
            Err(_) => {
                let name = existing.file_name()?.to_os_string();
                suffix.push(name);
                existing = existing.parent()?.to_path_buf();
                if existing.as_os_str().is_empty() {
                    return None;
                }
            }
        }
    }
}
