pub mod audit;
pub mod boundary;
pub mod config;
pub mod events;
pub mod isolation;
pub mod metrics;
pub mod orchestrator;
pub mod pathguard;

pub use boundary::BoundaryEngine;
pub use config::WardenConfig;
pub use events::{EventBroadcaster, FileOperation, SecurityEvent, Severity};
pub use isolation::{SecurityLevel, ZeroTrustIsolation};
pub use metrics::WardenMetrics;
pub use orchestrator::{SecureAccessResult, SecurityOrchestrator};
pub use pathguard::{AttackType, PathGuard, SafePath};
