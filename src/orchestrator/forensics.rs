// SPDX-License-Identifier: MIT
//! Forensic evidence preservation.
//!
//! One JSON bundle per incident under the forensics directory, written
//! once: incident, process snapshot, recent audit-log tail, recent
//! incidents. Preservation is independent of every other response action —
//! it must succeed or fail on its own.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use sysinfo::System;
use tracing::warn;

use super::incident::SecurityIncident;

/// Processes included in the snapshot, heaviest consumers first.
const SNAPSHOT_PROCESS_LIMIT: usize = 25;

#[derive(Debug, Serialize)]
pub struct ProcessSnapshot {
    pub captured_at: String,
    pub hostname: Option<String>,
    pub total_memory_kb: u64,
    pub used_memory_kb: u64,
    pub processes: Vec<ProcessEntry>,
}

#[derive(Debug, Serialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub cpu_usage: f32,
    pub memory_kb: u64,
}

/// Capture the top processes by CPU plus memory totals.
pub fn capture_process_snapshot() -> ProcessSnapshot {
    let mut sys = System::new_all();
    sys.refresh_all();

    let mut processes: Vec<ProcessEntry> = sys
        .processes()
        .iter()
        .map(|(pid, p)| ProcessEntry {
            pid: pid.as_u32(),
            name: p.name().to_string_lossy().into_owned(),
            cpu_usage: p.cpu_usage(),
            memory_kb: p.memory() / 1024,
        })
        .collect();
    processes.sort_by(|a, b| b.cpu_usage.total_cmp(&a.cpu_usage));
    processes.truncate(SNAPSHOT_PROCESS_LIMIT);

    ProcessSnapshot {
        captured_at: Utc::now().to_rfc3339(),
        hostname: System::host_name(),
        total_memory_kb: sys.total_memory() / 1024,
        used_memory_kb: sys.used_memory() / 1024,
        processes,
    }
}

#[derive(Debug, Serialize)]
pub struct ForensicBundle<'a> {
    pub incident: &'a SecurityIncident,
    pub process_snapshot: ProcessSnapshot,
    pub recent_audit_entries: Vec<serde_json::Value>,
    pub recent_incidents: Vec<&'a SecurityIncident>,
}

/// Write the bundle as `{forensics_dir}/{incident_id}.json`.
///
/// Write-once: an existing bundle for the incident is never overwritten.
pub async fn write_bundle(
    forensics_dir: &Path,
    bundle: &ForensicBundle<'_>,
) -> Result<PathBuf> {
    let path = forensics_dir.join(format!("{}.json", bundle.incident.id));
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        warn!(path = %path.display(), "forensic bundle already exists, keeping original");
        return Ok(path);
    }
    tokio::fs::create_dir_all(forensics_dir).await?;
    let json = serde_json::to_vec_pretty(bundle)?;
    tokio::fs::write(&path, json).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Severity;
    use crate::orchestrator::incident::IncidentType;

    fn incident() -> SecurityIncident {
        SecurityIncident::new(
            IncidentType::IntegrityViolation,
            Severity::Critical,
            "boundary_engine",
            Some("proj1".into()),
            "tamper detected".into(),
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn bundle_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let inc = incident();
        let bundle = ForensicBundle {
            incident: &inc,
            process_snapshot: capture_process_snapshot(),
            recent_audit_entries: vec![],
            recent_incidents: vec![],
        };
        let p1 = write_bundle(dir.path(), &bundle).await.unwrap();
        let original = tokio::fs::read(&p1).await.unwrap();

        // Second write with different content must not clobber the first.
        let p2 = write_bundle(dir.path(), &bundle).await.unwrap();
        assert_eq!(p1, p2);
        assert_eq!(tokio::fs::read(&p2).await.unwrap(), original);
    }

    #[test]
    fn snapshot_is_bounded() {
        let snap = capture_process_snapshot();
        assert!(snap.processes.len() <= SNAPSHOT_PROCESS_LIMIT);
    }
}
