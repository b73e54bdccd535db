// SPDX-License-Identifier: MIT
//! Verification check and enforcement mechanism catalogs, selected by
//! security level.
//!
//! Higher levels add checks and shorten their periods. The catalogs are
//! data, not behavior: execution lives in `isolation::mod` where project
//! state is available.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How hard a project's isolation is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    #[default]
    Standard,
    Enhanced,
    Maximum,
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SecurityLevel::Standard => "standard",
            SecurityLevel::Enhanced => "enhanced",
            SecurityLevel::Maximum => "maximum",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SecurityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(SecurityLevel::Standard),
            "enhanced" => Ok(SecurityLevel::Enhanced),
            "maximum" => Ok(SecurityLevel::Maximum),
            other => Err(format!("unknown security level: {other}")),
        }
    }
}

/// What a verification check inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    FilesystemIntegrity,
    CrossProjectAccess,
    PrivilegeEscalation,
    ConfigurationIntegrity,
}

/// When a check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckFrequency {
    /// On every access, inline in the gate.
    Continuous,
    /// On a timer.
    Periodic,
    /// On the first access after registration.
    OnAccess,
    /// From filesystem events.
    OnChange,
}

/// What happens when a check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureAction {
    Log,
    Alert,
    Block,
    Quarantine,
}

impl std::fmt::Display for FailureAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureAction::Log => "log",
            FailureAction::Alert => "alert",
            FailureAction::Block => "block",
            FailureAction::Quarantine => "quarantine",
        };
        write!(f, "{s}")
    }
}

/// One scheduled/continuous verification check on a project boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCheck {
    pub check_name: String,
    pub kind: CheckKind,
    pub frequency: CheckFrequency,
    /// Period for `Periodic` checks; `None` otherwise.
    pub period: Option<Duration>,
    pub failure_action: FailureAction,
    pub remediation_steps: Vec<String>,
}

/// Strength of one enforcement mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MechanismStrength {
    Weak,
    Medium,
    Strong,
    Cryptographic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementMechanism {
    pub mechanism: String,
    pub strength: MechanismStrength,
    pub monitoring_enabled: bool,
    pub automatic_remediation: bool,
}

fn check(
    name: &str,
    kind: CheckKind,
    frequency: CheckFrequency,
    period_secs: Option<u64>,
    failure_action: FailureAction,
    remediation: &[&str],
) -> VerificationCheck {
    VerificationCheck {
        check_name: name.to_string(),
        kind,
        frequency,
        period: period_secs.map(Duration::from_secs),
        failure_action,
        remediation_steps: remediation.iter().map(|s| s.to_string()).collect(),
    }
}

/// Verification checks for a security level.
pub fn catalog_for(level: SecurityLevel) -> Vec<VerificationCheck> {
    match level {
        SecurityLevel::Standard => vec![
            check(
                "filesystem-integrity",
                CheckKind::FilesystemIntegrity,
                CheckFrequency::Periodic,
                Some(300),
                FailureAction::Alert,
                &["rehash project root", "compare against last known hash"],
            ),
            check(
                "cross-project-access",
                CheckKind::CrossProjectAccess,
                CheckFrequency::Continuous,
                None,
                FailureAction::Block,
                &["deny the access", "record breach attempt"],
            ),
        ],
        SecurityLevel::Enhanced => vec![
            check(
                "filesystem-integrity",
                CheckKind::FilesystemIntegrity,
                CheckFrequency::Periodic,
                Some(120),
                FailureAction::Alert,
                &["rehash project root", "compare against last known hash"],
            ),
            check(
                "cross-project-access",
                CheckKind::CrossProjectAccess,
                CheckFrequency::Continuous,
                None,
                FailureAction::Block,
                &["deny the access", "record breach attempt"],
            ),
            check(
                "privilege-escalation",
                CheckKind::PrivilegeEscalation,
                CheckFrequency::Periodic,
                Some(120),
                FailureAction::Alert,
                &["scan recent activity for escalation patterns"],
            ),
            check(
                "configuration-integrity",
                CheckKind::ConfigurationIntegrity,
                CheckFrequency::OnChange,
                None,
                FailureAction::Alert,
                &["rehash critical config files"],
            ),
        ],
        SecurityLevel::Maximum => vec![
            check(
                "filesystem-integrity",
                CheckKind::FilesystemIntegrity,
                CheckFrequency::Periodic,
                Some(60),
                FailureAction::Quarantine,
                &["rehash project root", "quarantine on repeated mismatch"],
            ),
            check(
                "cross-project-access",
                CheckKind::CrossProjectAccess,
                CheckFrequency::Continuous,
                None,
                FailureAction::Block,
                &["deny the access", "record breach attempt"],
            ),
            check(
                "privilege-escalation",
                CheckKind::PrivilegeEscalation,
                CheckFrequency::Periodic,
                Some(60),
                FailureAction::Block,
                &["scan recent activity for escalation patterns"],
            ),
            check(
                "configuration-integrity",
                CheckKind::ConfigurationIntegrity,
                CheckFrequency::OnChange,
                None,
                FailureAction::Quarantine,
                &["rehash critical config files", "quarantine on tamper"],
            ),
        ],
    }
}

/// Enforcement mechanisms for a security level.
pub fn mechanisms_for(level: SecurityLevel) -> Vec<EnforcementMechanism> {
    let mut out = vec![
        EnforcementMechanism {
            mechanism: "path-validation".into(),
            strength: MechanismStrength::Strong,
            monitoring_enabled: true,
            automatic_remediation: true,
        },
        EnforcementMechanism {
            mechanism: "boundary-rules".into(),
            strength: MechanismStrength::Strong,
            monitoring_enabled: true,
            automatic_remediation: true,
        },
    ];
    if level != SecurityLevel::Standard {
        out.push(EnforcementMechanism {
            mechanism: "content-hashing".into(),
            strength: MechanismStrength::Cryptographic,
            monitoring_enabled: true,
            automatic_remediation: level == SecurityLevel::Maximum,
        });
    }
    if level == SecurityLevel::Maximum {
        out.push(EnforcementMechanism {
            mechanism: "executable-quarantine".into(),
            strength: MechanismStrength::Strong,
            monitoring_enabled: true,
            automatic_remediation: true,
        });
    }
    out
}

/// Critical config files hashed by the configuration-integrity check.
pub const CRITICAL_CONFIG_NAMES: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    ".env",
    "config.toml",
    "Makefile",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_levels_add_checks_and_shorten_periods() {
        let std_cat = catalog_for(SecurityLevel::Standard);
        let max_cat = catalog_for(SecurityLevel::Maximum);
        assert!(max_cat.len() > std_cat.len());

        let period = |cat: &[VerificationCheck]| {
            cat.iter()
                .find(|c| c.kind == CheckKind::FilesystemIntegrity)
                .and_then(|c| c.period)
                .unwrap()
        };
        assert!(period(&max_cat) < period(&std_cat));
    }

    #[test]
    fn cross_project_check_is_always_continuous() {
        for level in [
            SecurityLevel::Standard,
            SecurityLevel::Enhanced,
            SecurityLevel::Maximum,
        ] {
            let cat = catalog_for(level);
            let c = cat
                .iter()
                .find(|c| c.kind == CheckKind::CrossProjectAccess)
                .unwrap();
            assert_eq!(c.frequency, CheckFrequency::Continuous);
            assert_eq!(c.failure_action, FailureAction::Block);
        }
    }

    #[test]
    fn security_level_parses() {
        assert_eq!(
            "maximum".parse::<SecurityLevel>().unwrap(),
            SecurityLevel::Maximum
        );
        assert!("paranoid".parse::<SecurityLevel>().is_err());
    }
}
