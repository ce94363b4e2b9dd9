//! Bundle content fingerprinting.
//!
//! A fingerprint is a sha-256 hex digest over a bundle's emitted files. The
//! `FingerprintTable` keeps the last-seen digest per bundle name for the
//! lifetime of the process so that rebuilds only upload bundles whose
//! compiled content actually changed.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Digest a set of files into one fingerprint.
///
/// Files are hashed in sorted path order with the file name mixed in, so the
/// result does not depend on the order the caller discovered them in.
pub fn digest_files(paths: &[PathBuf]) -> io::Result<String> {
    let mut sorted: Vec<&PathBuf> = paths.iter().collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    for path in sorted {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        hasher.update(name.as_bytes());
        hasher.update(b"|");
        hasher.update(&fs::read(path)?);
        hasher.update(b"|");
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Last-seen fingerprint per bundle name.
///
/// Process-lifetime state: reset on restart, mutated only from the driver
/// loop after each build.
#[derive(Debug, Default)]
pub struct FingerprintTable {
    versions: HashMap<String, String>,
}

impl FingerprintTable {
    pub fn new() -> Self {
        Self {
            versions: HashMap::new(),
        }
    }

    /// Record the fingerprint for a bundle and report whether it changed.
    ///
    /// The record is updated unconditionally; a name seen for the first time
    /// always counts as changed.
    pub fn observe(&mut self, name: &str, hash: &str) -> bool {
        let previous = self.versions.insert(name.to_string(), hash.to_string());
        match previous {
            None => true,
            Some(old) => old != hash,
        }
    }

    /// Last recorded fingerprint for a bundle, if any.
    pub fn current(&self, name: &str) -> Option<&str> {
        self.versions.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_observation_is_changed() {
        let mut table = FingerprintTable::new();
        assert!(table.observe("ranger", "aaa"));
        assert_eq!(table.current("ranger"), Some("aaa"));
    }

    #[test]
    fn test_same_hash_is_unchanged() {
        let mut table = FingerprintTable::new();
        table.observe("ranger", "aaa");
        assert!(!table.observe("ranger", "aaa"));
    }

    #[test]
    fn test_new_hash_is_changed_and_recorded() {
        let mut table = FingerprintTable::new();
        table.observe("ranger", "aaa");
        assert!(table.observe("ranger", "bbb"));
        assert_eq!(table.current("ranger"), Some("bbb"));
    }

    #[test]
    fn test_names_are_independent() {
        let mut table = FingerprintTable::new();
        table.observe("ranger", "aaa");
        assert!(table.observe("priest", "aaa"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_digest_files_order_independent() -> io::Result<()> {
        let dir = TempDir::new()?;
        let js = dir.path().join("ranger.js");
        let map = dir.path().join("ranger.js.map");
        fs::write(&js, b"code")?;
        fs::write(&map, b"map")?;

        let forward = digest_files(&[js.clone(), map.clone()])?;
        let reversed = digest_files(&[map, js])?;
        assert_eq!(forward, reversed);
        assert_eq!(forward.len(), 64);
        Ok(())
    }

    #[test]
    fn test_digest_files_sees_content_changes() -> io::Result<()> {
        let dir = TempDir::new()?;
        let js = dir.path().join("ranger.js");

        fs::write(&js, b"attack(target);")?;
        let before = digest_files(&[js.clone()])?;

        fs::write(&js, b"heal(target);")?;
        let after = digest_files(&[js])?;

        assert_ne!(before, after);
        Ok(())
    }

    #[test]
    fn test_digest_files_missing_file_errors() {
        let err = digest_files(&[PathBuf::from("/nonexistent/ranger.js")]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
