// SPDX-License-Identifier: MIT
//! Append-only structured audit log for security incidents.
//!
//! One JSON line per incident at `{data_dir}/audit.log`, rotated to
//! `audit.log.1` at 50 MB. Writes are best-effort: a broken audit log is
//! logged at WARN and never interrupts incident handling — but the append is
//! attempted before any remediation runs, so "something bad happened" is
//! observable even when every response action fails.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

use crate::events::Severity;
use crate::orchestrator::incident::SecurityIncident;

/// Maximum audit log file size before rotation (50 MB).
const ROTATE_BYTES: u64 = 50 * 1024 * 1024;

// ─── Entry ────────────────────────────────────────────────────────────────────

/// One structured JSON line written per incident.
///
/// All fields are `camelCase` for easy `jq` querying:
/// ```sh
/// jq 'select(.severity == "critical")' ~/.local/share/wardend/audit.log
/// jq '[.incidentType, .projectId] | @tsv' ~/.local/share/wardend/audit.log
/// ```
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// RFC-3339 timestamp of when the incident was recorded.
    pub timestamp: String,
    /// Incident UUID.
    pub incident_id: String,
    /// Incident type: `"path_traversal_attack"`, `"boundary_violation"`, …
    pub incident_type: String,
    /// `"low"` | `"medium"` | `"high"` | `"critical"`.
    pub severity: Severity,
    /// Subsystem that raised the triggering event.
    pub source_system: String,
    /// Implicated project, when one could be attributed.
    pub project_id: Option<String>,
    /// Human-readable one-line description.
    pub description: String,
}

impl AuditEntry {
    pub fn from_incident(incident: &SecurityIncident) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            incident_id: incident.id.clone(),
            incident_type: incident.incident_type.to_string(),
            severity: incident.severity,
            source_system: incident.source_system.clone(),
            project_id: incident.project_id.clone(),
            description: incident.description.clone(),
        }
    }
}

// ─── Log ──────────────────────────────────────────────────────────────────────

/// Append-only newline-delimited JSON incident log.
///
/// The file handle is cached for the process lifetime to avoid an `open()`
/// syscall per incident.
pub struct AuditLog {
    path: PathBuf,
    /// Cached, open file handle; `None` until the first write.
    file: Mutex<Option<tokio::fs::File>>,
}

impl AuditLog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("audit.log"),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. Errors are logged at WARN and swallowed.
    pub async fn append(&self, entry: &AuditEntry) {
        if let Err(e) = self.try_append(entry).await {
            tracing::warn!(err = %e, "audit log write failed");
        }
    }

    async fn try_append(&self, entry: &AuditEntry) -> Result<()> {
        let line = serde_json::to_string(entry)? + "\n";
        let bytes = line.as_bytes();

        let mut guard = self.file.lock().await;

        // Rotation check: if the on-disk file has grown past the cap, close
        // the handle and rename before opening a fresh one.
        if guard.is_some() {
            if let Ok(meta) = tokio::fs::metadata(&self.path).await {
                if meta.len() >= ROTATE_BYTES {
                    *guard = None; // drop file handle (flushes on drop)
                    let rotated = self.path.with_extension("log.1");
                    let _ = tokio::fs::rename(&self.path, &rotated).await;
                }
            }
        }

        // Open (or re-open after rotation) lazily.
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            *guard = Some(f);
        }

        if let Some(f) = guard.as_mut() {
            f.write_all(bytes).await?;
        }
        Ok(())
    }

    /// Read the last `limit` entries back as raw JSON values (forensics).
    pub async fn tail(&self, limit: usize) -> Vec<serde_json::Value> {
        let Ok(raw) = tokio::fs::read_to_string(&self.path).await else {
            return Vec::new();
        };
        let lines: Vec<&str> = raw.lines().collect();
        lines
            .iter()
            .rev()
            .take(limit)
            .rev()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::incident::{IncidentType, SecurityIncident};

    #[tokio::test]
    async fn append_writes_one_json_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        let incident = SecurityIncident::new(
            IncidentType::BoundaryViolation,
            Severity::High,
            "boundary_engine",
            Some("proj1".into()),
            "write outside sandbox".into(),
            serde_json::json!({}),
        );
        log.append(&AuditEntry::from_incident(&incident)).await;

        let tail = log.tail(10).await;
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0]["incidentType"], "boundary_violation");
        assert_eq!(tail[0]["projectId"], "proj1");
        assert_eq!(tail[0]["severity"], "high");
    }

    #[tokio::test]
    async fn tail_returns_most_recent_last() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        for i in 0..5 {
            let incident = SecurityIncident::new(
                IncidentType::ThreatDetected,
                Severity::Low,
                "zero_trust",
                None,
                format!("scan {i}"),
                serde_json::json!({}),
            );
            log.append(&AuditEntry::from_incident(&incident)).await;
        }
        let tail = log.tail(2).await;
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1]["description"], "scan 4");
    }
}
