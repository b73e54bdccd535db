// SPDX-License-Identifier: MIT
//! Boundary content hashing for out-of-band tamper detection.
//!
//! The hash covers `(relative_path, size, mtime_millis)` of every file under
//! the boundary root, sorted, rather than full file contents — cheap enough
//! to recompute on a timer over large sandboxes. Config-integrity checks in
//! the isolation layer hash full content for their (small) critical set.

use std::path::Path;
use std::time::UNIX_EPOCH;

use anyhow::Result;
use sha2::{Digest, Sha256};

/// Hash the directory tree rooted at `root`. Deterministic for an unchanged
/// tree; any create/delete/resize/touch changes the digest.
pub fn hash_tree(root: &Path) -> Result<String> {
    let mut entries: Vec<(String, u64, u128)> = Vec::new();
    collect(root, root, &mut entries)?;
    entries.sort();

    let mut hasher = Sha256::new();
    for (rel, len, mtime) in &entries {
        hasher.update(rel.as_bytes());
        hasher.update(len.to_le_bytes());
        hasher.update(mtime.to_le_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<(String, u64, u128)>) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        // The root may have been removed mid-walk (quarantine in flight).
        Err(_) => return Ok(()),
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        if meta.is_dir() {
            collect(root, &path, out)?;
        } else {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis())
                .unwrap_or(0);
            out.push((rel, meta.len(), mtime));
        }
    }
    Ok(())
}

/// Hash the full contents of one file (used for critical config files).
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn hash_is_stable_and_change_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.txt"), b"world").unwrap();

        let h1 = hash_tree(dir.path()).unwrap();
        let h2 = hash_tree(dir.path()).unwrap();
        assert_eq!(h1, h2);

        fs::write(dir.path().join("c.txt"), b"new").unwrap();
        let h3 = hash_tree(dir.path()).unwrap();
        assert_ne!(h1, h3);
    }

    #[test]
    fn missing_root_hashes_to_empty_tree() {
        let h = hash_tree(Path::new("/nonexistent/warden/root")).unwrap();
        // Same digest as an empty directory — stable sentinel.
        let empty = tempfile::tempdir().unwrap();
        assert_eq!(h, hash_tree(empty.path()).unwrap());
    }
}
