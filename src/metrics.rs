// SPDX-License-Identifier: MIT
//! In-process security counters.
//!
//! No external library needed — all counters are `AtomicU64` incremented
//! inline from the hot paths (validation, rule evaluation, enforcement).
//! Exposed as JSON by `snapshot()` for the report export.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters shared across all warden subsystems.
#[derive(Debug)]
pub struct WardenMetrics {
    /// Total PathGuard validations since start.
    pub paths_validated: AtomicU64,
    /// Validations classified as an attack.
    pub attacks_detected: AtomicU64,
    /// Boundary violations raised by the watcher or access checks.
    pub violations_detected: AtomicU64,
    /// Incidents created by the orchestrator.
    pub incidents_created: AtomicU64,
    /// Files moved into quarantine.
    pub files_quarantined: AtomicU64,
    /// Access-gate denials (`validateSecureAccess` returned allowed=false).
    pub access_denied: AtomicU64,
    /// Zero-trust verification checks executed.
    pub checks_run: AtomicU64,
    /// Warden start time — used for uptime in the report.
    pub started_at: Instant,
}

impl Default for WardenMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WardenMetrics {
    pub fn new() -> Self {
        Self {
            paths_validated: AtomicU64::new(0),
            attacks_detected: AtomicU64::new(0),
            violations_detected: AtomicU64::new(0),
            incidents_created: AtomicU64::new(0),
            files_quarantined: AtomicU64::new(0),
            access_denied: AtomicU64::new(0),
            checks_run: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn inc_paths_validated(&self) {
        self.paths_validated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_attacks_detected(&self) {
        self.attacks_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_violations_detected(&self) {
        self.violations_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_incidents_created(&self) {
        self.incidents_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_files_quarantined(&self) {
        self.files_quarantined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_access_denied(&self) {
        self.access_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_checks_run(&self) {
        self.checks_run.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters as a JSON object for the report export.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_secs": self.started_at.elapsed().as_secs(),
            "paths_validated": self.paths_validated.load(Ordering::Relaxed),
            "attacks_detected": self.attacks_detected.load(Ordering::Relaxed),
            "violations_detected": self.violations_detected.load(Ordering::Relaxed),
            "incidents_created": self.incidents_created.load(Ordering::Relaxed),
            "files_quarantined": self.files_quarantined.load(Ordering::Relaxed),
            "access_denied": self.access_denied.load(Ordering::Relaxed),
            "checks_run": self.checks_run.load(Ordering::Relaxed),
        })
    }
}
