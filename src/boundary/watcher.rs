// SPDX-License-Identifier: MIT
//! Debounced filesystem watching per boundary.
//!
//! An event is only delivered after the target has been write-stable for the
//! debounce window, so half-written files are never classified. The notify
//! callback runs on the watcher's own thread; changes cross into the tokio
//! world over an unbounded mpsc sender.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use notify_debouncer_full::{
    new_debouncer,
    notify::{event::EventKind, RecursiveMode, Watcher},
    DebounceEventResult,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use super::rules::ChangeKind;

/// Extensions treated as executable even without a mode bit (cross-platform).
const EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "bat", "cmd", "com", "scr", "sh", "ps1"];

/// One debounced, classified filesystem change inside a boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsChange {
    pub boundary_id: String,
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub is_executable: bool,
    pub size: u64,
}

/// Live handle; dropping it stops the watch.
pub type WatchHandle = notify_debouncer_full::Debouncer<
    notify_debouncer_full::notify::RecommendedWatcher,
    notify_debouncer_full::FileIdMap,
>;

/// Start a debounced recursive watch on `root`, tagging every change with
/// `boundary_id` and pushing it into `tx`.
pub fn start_watch(
    boundary_id: &str,
    root: &Path,
    debounce: Duration,
    tx: UnboundedSender<FsChange>,
) -> Result<WatchHandle> {
    let boundary_id = boundary_id.to_string();
    let mut debouncer = new_debouncer(
        debounce,
        None,
        move |result: DebounceEventResult| match result {
            Ok(events) => {
                for event in &events {
                    let kind = match classify_kind(&event.kind) {
                        Some(k) => k,
                        None => continue,
                    };
                    for path in &event.paths {
                        let change = classify_change(&boundary_id, path, kind);
                        // Receiver gone means the engine is stopping.
                        if tx.send(change).is_err() {
                            return;
                        }
                    }
                }
            }
            Err(errors) => {
                for e in errors {
                    warn!(err = %e, "boundary watcher error");
                }
            }
        },
    )?;

    debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
    Ok(debouncer)
}

fn classify_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        _ => None,
    }
}

/// Stat the path (if it still exists) to fill size and executable flags.
fn classify_change(boundary_id: &str, path: &Path, kind: ChangeKind) -> FsChange {
    let meta = std::fs::metadata(path).ok();
    let size = meta.as_ref().map(|m| m.len()).unwrap_or(0);
    FsChange {
        boundary_id: boundary_id.to_string(),
        path: path.to_path_buf(),
        kind,
        is_executable: is_executable(path, meta.as_ref()),
        size,
    }
}

/// Execute bit on unix, known extension everywhere.
pub fn is_executable(path: &Path, meta: Option<&std::fs::Metadata>) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(meta) = meta {
            if meta.is_file() && meta.permissions().mode() & 0o111 != 0 {
                return true;
            }
        }
    }
    #[cfg(not(unix))]
    let _ = meta;

    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXECUTABLE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_table_flags_executables() {
        assert!(is_executable(Path::new("/tmp/x.exe"), None));
        assert!(is_executable(Path::new("/tmp/X.SH"), None));
        assert!(!is_executable(Path::new("/tmp/notes.txt"), None));
        assert!(!is_executable(Path::new("/tmp/noext"), None));
    }

    #[cfg(unix)]
    #[test]
    fn mode_bits_flag_executables() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("tool");
        std::fs::write(&p, "#!/bin/sh\n").unwrap();
        let mut perms = std::fs::metadata(&p).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&p, perms).unwrap();
        let meta = std::fs::metadata(&p).unwrap();
        assert!(is_executable(&p, Some(&meta)));
    }
}
