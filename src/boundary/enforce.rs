// SPDX-License-Identifier: MIT
//! The single enforcement entry point for boundary violations.
//!
//! Detection decides *what* happened; everything destructive goes through
//! [`enforce`] so a future dry-run or quarantine-only mode replaces one
//! function. Enforcement is best-effort: failures are logged, reported as
//! an outcome, and never propagated into the watch loop.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use super::rules::RuleAction;
use super::BoundaryViolation;

/// What actually happened when a violation was enforced.
#[derive(Debug, Clone)]
pub enum EnforcementOutcome {
    /// Nothing destructive was required (allow/audit).
    Logged,
    /// The offending artifact was deleted.
    Deleted { path: PathBuf },
    /// The artifact was moved into quarantine.
    Quarantined { from: PathBuf, to: PathBuf },
    /// The action was attempted and failed; the violation still stands.
    Failed { action: String, error: String },
}

/// Apply the matched rule's action to the offending artifact.
///
/// `deny` deletes the artifact outright (destructive, preserved from the
/// original behavior); `quarantine` renames it into `quarantine_dir` as
/// `{unix_millis}-{original_name}`. A deny target outside `boundary_root`
/// is refused — a misconfigured rule must not turn the warden into an
/// arbitrary-delete primitive.
pub async fn enforce(
    violation: &BoundaryViolation,
    action: RuleAction,
    boundary_root: &Path,
    quarantine_dir: &Path,
) -> EnforcementOutcome {
    let target = PathBuf::from(&violation.target_path);
    match action {
        RuleAction::Allow | RuleAction::Audit => EnforcementOutcome::Logged,
        RuleAction::Deny => {
            if !target.starts_with(boundary_root) {
                warn!(
                    target = %target.display(),
                    root = %boundary_root.display(),
                    "refusing deny-delete outside boundary root"
                );
                return EnforcementOutcome::Failed {
                    action: "delete".into(),
                    error: "target outside boundary root".into(),
                };
            }
            match remove(&target).await {
                Ok(()) => {
                    info!(target = %target.display(), violation = violation.id, "deny: artifact removed");
                    EnforcementOutcome::Deleted { path: target }
                }
                Err(e) => {
                    warn!(target = %target.display(), err = %e, "deny enforcement failed");
                    EnforcementOutcome::Failed {
                        action: "delete".into(),
                        error: e.to_string(),
                    }
                }
            }
        }
        RuleAction::Quarantine => {
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "artifact".to_string());
            let dest = quarantine_dir.join(format!("{}-{}", Utc::now().timestamp_millis(), name));
            match move_into_quarantine(&target, &dest).await {
                Ok(()) => {
                    info!(
                        from = %target.display(),
                        to = %dest.display(),
                        violation = violation.id,
                        "artifact quarantined"
                    );
                    EnforcementOutcome::Quarantined {
                        from: target,
                        to: dest,
                    }
                }
                Err(e) => {
                    warn!(target = %target.display(), err = %e, "quarantine enforcement failed");
                    EnforcementOutcome::Failed {
                        action: "quarantine".into(),
                        error: e.to_string(),
                    }
                }
            }
        }
    }
}

async fn remove(target: &Path) -> std::io::Result<()> {
    let meta = tokio::fs::symlink_metadata(target).await?;
    if meta.is_dir() {
        tokio::fs::remove_dir_all(target).await
    } else {
        tokio::fs::remove_file(target).await
    }
}

async fn move_into_quarantine(target: &Path, dest: &Path) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    // Move, not copy: the suspect artifact must leave the boundary.
    tokio::fs::rename(target, dest).await
}
