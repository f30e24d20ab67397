//! Catalog of produced bakes (`index.json` beside the bake files).
//!
//! The catalog is a JSON array sorted by `(duration, neck)`, holding at most
//! one entry per bake file. A missing or unreadable catalog is an empty one.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::options::{format_number, BakeOptions};
use crate::types::Timestamp;

/// File name of the catalog inside the bakes directory.
pub const CATALOG_FILE_NAME: &str = "index.json";

/// Descriptor of one produced bake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Bake file name, relative to the bakes directory. The catalog key.
    pub file: String,
    pub label: String,
    /// Requested playback duration in seconds.
    pub duration: f64,
    pub grains: u32,
    pub neck: f64,
    pub bulb: f64,
    pub half_height: f64,
    /// Retimed playback rate.
    pub fps: f64,
    pub frames: u32,
    pub created_at: Timestamp,
}

impl CatalogEntry {
    /// Build the entry for a finished bake.
    pub fn for_bake(
        file: impl Into<String>,
        options: &BakeOptions,
        grains: u32,
        frames: u32,
        fps: f64,
        created_at: Timestamp,
    ) -> Self {
        Self {
            file: file.into(),
            label: format!(
                "{}s · neck {} · {} grains",
                format_number(options.duration),
                format_number(options.neck),
                grains
            ),
            duration: options.duration,
            grains,
            neck: options.neck,
            bulb: options.bulb,
            half_height: options.half_height,
            fps,
            frames,
            created_at,
        }
    }
}

/// Replace-or-insert `entry` keyed by file, then restore the sort order.
pub fn upsert_entry(entries: &mut Vec<CatalogEntry>, entry: CatalogEntry) {
    entries.retain(|e| e.file != entry.file);
    entries.push(entry);
    entries.sort_by(|a, b| {
        a.duration
            .total_cmp(&b.duration)
            .then(a.neck.total_cmp(&b.neck))
    });
}

/// File-backed catalog.
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    path: PathBuf,
}

impl CatalogIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Catalog living in `bakes_dir/index.json`.
    pub fn in_dir(bakes_dir: impl AsRef<Path>) -> Self {
        Self::new(bakes_dir.as_ref().join(CATALOG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the catalog; missing or corrupt files read as empty.
    pub fn load(&self) -> Vec<CatalogEntry> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Catalog unreadable, treating as empty");
                }
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Catalog corrupt, treating as empty");
                Vec::new()
            }
        }
    }

    /// Upsert `entry` and persist the sorted catalog.
    ///
    /// The catalog is written to a uniquely named temporary file in the same
    /// directory and then renamed over `index.json`, so concurrent writers
    /// never share a temporary file and readers never see a partial write.
    /// Concurrent upserts are last-writer-wins.
    pub fn upsert(&self, entry: CatalogEntry) -> Result<Vec<CatalogEntry>, CoreError> {
        let mut entries = self.load();
        upsert_entry(&mut entries, entry);

        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| CoreError::Internal(format!("Failed to serialize catalog: {e}")))?;

        let dir = match self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => dir,
            None => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| {
            CoreError::Internal(format!("Failed to create {}: {e}", dir.display()))
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
            CoreError::Internal(format!("Failed to create temp file in {}: {e}", dir.display()))
        })?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| {
                CoreError::Internal(format!("Failed to write {}: {e}", tmp.path().display()))
            })?;
        tmp.persist(&self.path).map_err(|e| {
            CoreError::Internal(format!("Failed to replace {}: {}", self.path.display(), e.error))
        })?;

        tracing::debug!(path = %self.path.display(), entries = entries.len(), "Catalog updated");
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn entry(file: &str, duration: f64, neck: f64) -> CatalogEntry {
        CatalogEntry {
            file: file.to_string(),
            label: file.to_string(),
            duration,
            grains: 100,
            neck,
            bulb: 205.0,
            half_height: 330.0,
            fps: 30.0,
            frames: (duration * 30.0) as u32,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn is_sorted(entries: &[CatalogEntry]) -> bool {
        entries
            .windows(2)
            .all(|w| (w[0].duration, w[0].neck) <= (w[1].duration, w[1].neck))
    }

    #[test]
    fn upsert_keeps_sorted_by_duration_then_neck() {
        let mut entries = Vec::new();
        upsert_entry(&mut entries, entry("c", 60.0, 16.0));
        upsert_entry(&mut entries, entry("a", 30.0, 20.0));
        upsert_entry(&mut entries, entry("b", 30.0, 12.0));
        upsert_entry(&mut entries, entry("d", 120.0, 8.0));

        let files: Vec<_> = entries.iter().map(|e| e.file.as_str()).collect();
        assert_eq!(files, ["b", "a", "c", "d"]);
        assert!(is_sorted(&entries));
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut entries = vec![entry("x", 10.0, 5.0)];
        upsert_entry(&mut entries, entry("y", 20.0, 5.0));
        let once = entries.clone();
        upsert_entry(&mut entries, entry("y", 20.0, 5.0));
        assert_eq!(entries, once);
        assert_eq!(entries.iter().filter(|e| e.file == "y").count(), 1);
    }

    #[test]
    fn upsert_replaces_same_file() {
        let mut entries = vec![entry("x", 10.0, 5.0)];
        upsert_entry(&mut entries, entry("x", 90.0, 5.0));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].duration, 90.0);
    }

    #[test]
    fn missing_catalog_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = CatalogIndex::in_dir(dir.path());
        assert!(catalog.load().is_empty());
    }

    #[test]
    fn corrupt_catalog_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = CatalogIndex::in_dir(dir.path());
        std::fs::write(catalog.path(), "{ not an array").unwrap();
        assert!(catalog.load().is_empty());
    }

    #[test]
    fn upsert_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = CatalogIndex::in_dir(dir.path().join("bakes"));

        catalog.upsert(entry("b.json", 60.0, 16.0)).unwrap();
        catalog.upsert(entry("a.json", 30.0, 16.0)).unwrap();
        catalog.upsert(entry("a.json", 30.0, 16.0)).unwrap();

        let loaded = catalog.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].file, "a.json");
        assert!(is_sorted(&loaded));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(catalog.path()).unwrap()).unwrap();
        assert!(raw[0]["halfHeight"].is_number());
        assert!(raw[0]["createdAt"].is_string());
    }

    #[test]
    fn concurrent_upserts_all_succeed() {
        use std::sync::{Arc, Barrier};

        for round in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let writers = 4;
            let barrier = Arc::new(Barrier::new(writers));

            let handles: Vec<_> = (0..writers)
                .map(|i| {
                    let catalog = CatalogIndex::in_dir(dir.path());
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        catalog.upsert(entry(&format!("bake_{i}.json"), i as f64 + 1.0, 16.0))
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap().unwrap_or_else(|e| panic!("round {round}: {e}"));
            }

            let catalog = CatalogIndex::in_dir(dir.path());
            let loaded = catalog.load();
            assert!(!loaded.is_empty(), "round {round}: catalog empty or torn");
            assert!(is_sorted(&loaded));

            let leftovers: Vec<_> = std::fs::read_dir(dir.path())
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .filter(|name| name != CATALOG_FILE_NAME)
                .collect();
            assert!(leftovers.is_empty(), "round {round}: stray files {leftovers:?}");

            // A later writer sees a consistent catalog and extends it.
            let after = catalog.upsert(entry("late.json", 99.0, 16.0)).unwrap();
            assert_eq!(after.len(), loaded.len() + 1);
        }
    }

    #[test]
    fn label_describes_the_bake() {
        let opts = BakeOptions {
            duration: 60.0,
            neck: 16.0,
            ..Default::default()
        };
        let e = CatalogEntry::for_bake("f.json", &opts, 3500, 1800, 30.0, Utc::now());
        assert_eq!(e.label, "60s · neck 16 · 3500 grains");
    }
}
