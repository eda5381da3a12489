//! Generation cache for incremental catalog runs.
//!
//! A catalog run writes a few dozen files from one source. When neither the
//! source nor the settings changed, every one of them would come out
//! byte-identical, so the batch driver skips the decode and encode entirely.
//!
//! ## Cache keys
//!
//! Entries are keyed by output file name. Each records:
//!
//! - **`source_hash`**: SHA-256 of the source file contents (and of the
//!   emblem, for launch images). Content-based rather than mtime-based so it
//!   survives `git checkout`.
//! - **`params_hash`**: SHA-256 of everything else that shapes the output:
//!   target size, strategy, quality and matte.
//!
//! A hit requires both hashes to match **and** the output file to still exist.
//!
//! ## Storage
//!
//! The manifest is a JSON file at `<out_dir>/.assetgen-cache.json`, next to
//! the files it describes. `--no-cache` loads an empty manifest so every
//! entry is regenerated.

use crate::catalog::{GeometrySpec, Matte};
use crate::imaging::Quality;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the output directory.
const MANIFEST_FILENAME: &str = ".assetgen-cache.json";

/// Bump to invalidate every existing manifest when key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// A single cached output file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
}

/// On-disk manifest mapping output names to the inputs that produced them.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or a first run).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
        }
    }

    /// Load from the output directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(output_dir: &Path) -> Self {
        let content = match std::fs::read_to_string(manifest_path(output_dir)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(m) if m.version == MANIFEST_VERSION => m,
            _ => Self::empty(),
        }
    }

    /// Save to the output directory.
    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(manifest_path(output_dir), json)
    }

    /// Whether `output_name` was produced from these exact inputs and is
    /// still on disk.
    pub fn is_fresh(
        &self,
        output_name: &str,
        source_hash: &str,
        params_hash: &str,
        output_dir: &Path,
    ) -> bool {
        self.entries.get(output_name).is_some_and(|e| {
            e.source_hash == source_hash && e.params_hash == params_hash
        }) && output_dir.join(output_name).is_file()
    }

    /// Record the inputs an output was produced from.
    pub fn insert(&mut self, output_name: String, source_hash: String, params_hash: String) {
        self.entries.insert(
            output_name,
            CacheEntry {
                source_hash,
                params_hash,
            },
        );
    }

    /// Forget an output, e.g. after it failed to generate.
    pub fn remove(&mut self, output_name: &str) {
        self.entries.remove(output_name);
    }
}

/// SHA-256 of a byte slice, as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    Ok(hash_bytes(&std::fs::read(path)?))
}

/// Combined hash of a background and an optional emblem.
pub fn hash_sources(background: &[u8], emblem: Option<&[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(background);
    match emblem {
        Some(bytes) => {
            hasher.update(b"\x01");
            hasher.update(bytes);
        }
        None => hasher.update(b"\x00"),
    }
    format!("{:x}", hasher.finalize())
}

/// SHA-256 hash of the settings that shape one catalog output.
pub fn hash_entry_params(geometry: &GeometrySpec, quality: Quality, matte: Option<&Matte>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"entry\0");
    hasher.update(geometry.width.to_le_bytes());
    hasher.update(geometry.height.to_le_bytes());
    hasher.update(format!("{:?}", geometry.strategy).as_bytes());
    hasher.update(quality.value().to_le_bytes());
    match matte {
        Some(m) => {
            hasher.update(b"\x01");
            hasher.update(m.inset_percent.to_le_bytes());
            hasher.update(m.color);
        }
        None => hasher.update(b"\x00"),
    }
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a catalog run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} generated ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} generated", self.misses)
        }
    }
}

/// Resolve the cache manifest path for an output directory.
pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StrategyId;
    use std::fs;
    use tempfile::TempDir;

    fn geometry(w: u32, h: u32) -> GeometrySpec {
        GeometrySpec::new(w, h, "out.png", StrategyId::ScaleCrop).unwrap()
    }

    // =========================================================================
    // CacheManifest basics
    // =========================================================================

    #[test]
    fn empty_manifest_has_no_entries() {
        let m = CacheManifest::empty();
        assert_eq!(m.version, MANIFEST_VERSION);
        assert!(m.entries.is_empty());
    }

    #[test]
    fn fresh_when_hashes_match_and_file_exists() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("Icon-29x29.png".into(), "src".into(), "prm".into());
        fs::write(tmp.path().join("Icon-29x29.png"), "data").unwrap();

        assert!(m.is_fresh("Icon-29x29.png", "src", "prm", tmp.path()));
        assert!(!m.is_fresh("Icon-29x29.png", "other", "prm", tmp.path()));
        assert!(!m.is_fresh("Icon-29x29.png", "src", "other", tmp.path()));
        assert!(!m.is_fresh("Icon-40x40.png", "src", "prm", tmp.path()));
    }

    #[test]
    fn stale_when_output_deleted() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("gone.png".into(), "src".into(), "prm".into());
        assert!(!m.is_fresh("gone.png", "src", "prm", tmp.path()));
    }

    #[test]
    fn same_params_under_different_names_coexist() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("Icon-29@2x.png".into(), "s".into(), "p".into());
        m.insert("Icon-29x29@2x.png".into(), "s".into(), "p".into());
        fs::write(tmp.path().join("Icon-29@2x.png"), "a").unwrap();
        fs::write(tmp.path().join("Icon-29x29@2x.png"), "b").unwrap();
        assert!(m.is_fresh("Icon-29@2x.png", "s", "p", tmp.path()));
        assert!(m.is_fresh("Icon-29x29@2x.png", "s", "p", tmp.path()));
    }

    #[test]
    fn remove_forgets_entry() {
        let mut m = CacheManifest::empty();
        m.insert("a.png".into(), "s".into(), "p".into());
        m.remove("a.png");
        assert!(m.entries.is_empty());
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("a.png".into(), "s1".into(), "p1".into());
        m.save(tmp.path()).unwrap();

        let loaded = CacheManifest::load(tmp.path());
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries["a.png"].source_hash, "s1");
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn load_corrupt_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(manifest_path(tmp.path()), "not json {{{").unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "entries": {{"a.png": {{"source_hash": "s", "params_hash": "p"}}}}}}"#,
            MANIFEST_VERSION + 1
        );
        fs::write(manifest_path(tmp.path()), json).unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    // =========================================================================
    // Hashing
    // =========================================================================

    #[test]
    fn hash_file_matches_hash_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f.bin");
        fs::write(&path, b"hello").unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"hello"));
        assert_eq!(hash_bytes(b"hello").len(), 64);
    }

    #[test]
    fn hash_file_missing_is_error() {
        assert!(hash_file(Path::new("/nonexistent/file.png")).is_err());
    }

    #[test]
    fn emblem_changes_source_hash() {
        let plain = hash_sources(b"bg", None);
        let with = hash_sources(b"bg", Some(b"logo"));
        let other = hash_sources(b"bg", Some(b"logo2"));
        assert_ne!(plain, with);
        assert_ne!(with, other);
    }

    #[test]
    fn params_hash_tracks_every_input() {
        let base = hash_entry_params(&geometry(29, 29), Quality::new(90), None);
        assert_eq!(base, hash_entry_params(&geometry(29, 29), Quality::new(90), None));
        assert_ne!(base, hash_entry_params(&geometry(30, 29), Quality::new(90), None));
        assert_ne!(base, hash_entry_params(&geometry(29, 29), Quality::new(80), None));
        let matte = Matte::default();
        assert_ne!(
            base,
            hash_entry_params(&geometry(29, 29), Quality::new(90), Some(&matte))
        );

        let mut other_strategy = geometry(29, 29);
        other_strategy.strategy = StrategyId::ScaleOnly;
        assert_ne!(
            base,
            hash_entry_params(&other_strategy, Quality::new(90), None)
        );
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display() {
        let fresh = CacheStats { hits: 0, misses: 2 };
        assert_eq!(fresh.to_string(), "2 generated");
        let mixed = CacheStats { hits: 1, misses: 2 };
        assert_eq!(mixed.to_string(), "1 cached, 2 generated (3 total)");
    }
}
