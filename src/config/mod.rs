// SPDX-License-Identifier: MIT
//! Warden configuration — TOML file + environment + CLI flag overrides.
//!
//! Precedence (highest wins): CLI flags → environment variables → config
//! file → built-in defaults. Every section struct is `#[serde(default)]` so
//! a partial config file is always valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::isolation::checks::SecurityLevel;

const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_INTEGRITY_INTERVAL_SECS: u64 = 60;
const DEFAULT_POSTURE_INTERVAL_SECS: u64 = 300;
const DEFAULT_THREAT_SCAN_INTERVAL_SECS: u64 = 120;
const DEFAULT_MAX_INCIDENTS: usize = 10_000;

fn default_data_dir() -> PathBuf {
    dirs_fallback().join("wardend")
}

/// `~/.local/share` on unix, `.` when HOME is unset (CI containers).
fn dirs_fallback() -> PathBuf {
    std::env::var_os("HOME")
        .map(|h| PathBuf::from(h).join(".local").join("share"))
        .unwrap_or_else(|| PathBuf::from("."))
}

// ─── BoundaryConfig ───────────────────────────────────────────────────────────

/// Boundary engine tuning (`[boundary]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BoundaryConfig {
    /// Debounce window for filesystem events, in milliseconds. An event is
    /// only processed after the target file has been write-stable this long.
    pub debounce_ms: u64,
    /// Interval between boundary content-hash recomputations, in seconds.
    pub integrity_check_interval_secs: u64,
    /// Enable real-time directory watching. Disable for one-shot CLI use.
    pub monitoring_enabled: bool,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            integrity_check_interval_secs: DEFAULT_INTEGRITY_INTERVAL_SECS,
            monitoring_enabled: true,
        }
    }
}

// ─── IsolationConfig ──────────────────────────────────────────────────────────

/// Zero-trust isolation tuning (`[isolation]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IsolationConfig {
    /// Security level applied to projects created without an explicit level.
    pub default_security_level: SecurityLevel,
    /// Interval between threat-rule scan cycles, in seconds.
    pub threat_scan_interval_secs: u64,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            default_security_level: SecurityLevel::Standard,
            threat_scan_interval_secs: DEFAULT_THREAT_SCAN_INTERVAL_SECS,
        }
    }
}

// ─── OrchestratorConfig ───────────────────────────────────────────────────────

/// Orchestrator tuning (`[orchestrator]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Interval between posture assessments, in seconds.
    pub posture_interval_secs: u64,
    /// Maximum incidents retained in memory (oldest evicted first).
    pub max_incidents: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            posture_interval_secs: DEFAULT_POSTURE_INTERVAL_SECS,
            max_incidents: DEFAULT_MAX_INCIDENTS,
        }
    }
}

// ─── WardenConfig ─────────────────────────────────────────────────────────────

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Data directory: audit log, quarantine, forensics, backups all live here.
    pub data_dir: PathBuf,
    /// Root directory under which every project sandbox lives.
    pub sandbox_root: PathBuf,
    /// Framework paths no managed project may write to (the warden's own
    /// data directory is always protected, listed or not).
    pub protected_paths: Vec<PathBuf>,
    /// Protected paths that remain readable (reports, published docs).
    pub read_whitelist: Vec<PathBuf>,
    pub boundary: BoundaryConfig,
    pub isolation: IsolationConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Default for WardenConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            sandbox_root: data_dir.join("sandboxes"),
            data_dir,
            protected_paths: Vec::new(),
            read_whitelist: Vec::new(),
            boundary: BoundaryConfig::default(),
            isolation: IsolationConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl WardenConfig {
    /// Load from a TOML file. A missing file yields defaults; a malformed
    /// file is an error (silently ignoring a typo'd config is worse than
    /// refusing to start).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&raw)?;
        Ok(cfg)
    }

    /// Load, then apply CLI-level overrides. An explicit flag beats the
    /// file; the file beats built-in defaults.
    pub fn load_with_overrides(
        path: &Path,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let mut cfg = Self::load(path)?;
        if let Some(dir) = data_dir {
            cfg.data_dir = dir;
        }
        Ok(cfg)
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.data_dir.join("quarantine")
    }

    pub fn forensics_dir(&self) -> PathBuf {
        self.data_dir.join("forensics")
    }

    pub fn evidence_dir(&self) -> PathBuf {
        self.data_dir.join("evidence")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// Every framework path the PathGuard must treat as protected.
    pub fn all_protected_paths(&self) -> Vec<PathBuf> {
        let mut out = vec![self.data_dir.clone()];
        out.extend(self.protected_paths.iter().cloned());
        out
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.boundary.debounce_ms)
    }

    pub fn integrity_interval(&self) -> Duration {
        Duration::from_secs(self.boundary.integrity_check_interval_secs)
    }

    pub fn posture_interval(&self) -> Duration {
        Duration::from_secs(self.orchestrator.posture_interval_secs)
    }

    pub fn threat_scan_interval(&self) -> Duration {
        Duration::from_secs(self.isolation.threat_scan_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = WardenConfig::default();
        assert!(cfg.boundary.monitoring_enabled);
        assert_eq!(cfg.boundary.debounce_ms, 300);
        assert_eq!(cfg.orchestrator.max_incidents, 10_000);
        assert!(cfg.quarantine_dir().ends_with("quarantine"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: WardenConfig = toml::from_str(
            r#"
            data_dir = "/tmp/warden-test"

            [boundary]
            debounce_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/warden-test"));
        assert_eq!(cfg.boundary.debounce_ms, 50);
        // untouched sections keep defaults
        assert_eq!(cfg.orchestrator.posture_interval_secs, 300);
    }

    #[test]
    fn file_data_dir_survives_unless_flag_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.toml");
        std::fs::write(&path, "data_dir = \"/srv/warden\"\n").unwrap();

        let cfg = WardenConfig::load_with_overrides(&path, None).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/warden"));

        let cfg =
            WardenConfig::load_with_overrides(&path, Some(PathBuf::from("/tmp/override")))
                .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/override"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = WardenConfig::load(Path::new("/nonexistent/warden.toml")).unwrap();
        assert_eq!(cfg.boundary.debounce_ms, WardenConfig::default().boundary.debounce_ms);
    }
}
