//! Captured record collections and their archival.
//!
//! # Design
//! A `Snapshot` is immutable once captured: fields are private and only
//! exposed by reference. The store is a seam so the CLI can archive to disk
//! while tests (and `--no-archive`) keep everything in memory. Archival is
//! best-effort; the orchestrator logs a failed `save` and carries on with the
//! in-memory copy.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::category::Category;
use crate::error::{SyncError, SyncResult};
use crate::record::ConfigRecord;
use crate::types::ResourceRecord;

/// Records of one category from one environment at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    environment: String,
    category: Category,
    captured_at: DateTime<Utc>,
    records: Vec<ResourceRecord>,
}

impl Snapshot {
    pub fn capture(
        environment: impl Into<String>,
        category: Category,
        records: Vec<ResourceRecord>,
    ) -> Self {
        Self {
            environment: environment.into(),
            category,
            captured_at: Utc::now(),
            records,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Validate every record, in snapshot order. The first malformed record
    /// fails the whole snapshot.
    pub fn ingest(&self) -> SyncResult<Vec<ConfigRecord>> {
        self.records
            .iter()
            .map(|record| ConfigRecord::ingest(self.category, record))
            .collect()
    }
}

/// Run directory name for a run started at `started_at`, e.g.
/// `20240131T081500Z`. Sorts chronologically.
pub fn run_id(started_at: DateTime<Utc>) -> String {
    started_at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Durable storage for snapshots.
pub trait SnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> SyncResult<()>;
}

/// Writes `<root>/<run_id>/<environment>/<category>.json`.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    run_dir: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(root: impl AsRef<Path>, run_id: &str) -> Self {
        Self {
            run_dir: root.as_ref().join(path_component(run_id)),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn snapshot_path(&self, environment: &str, category: Category) -> PathBuf {
        self.run_dir
            .join(path_component(environment))
            .join(format!("{}.json", category.slug()))
    }

    /// Write any serializable value next to the snapshots, e.g. the run's
    /// change report.
    pub fn save_json<T: Serialize>(&self, file_name: &str, value: &T) -> SyncResult<PathBuf> {
        let path = self.run_dir.join(file_name);
        write_pretty(&path, value)?;
        Ok(path)
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> SyncResult<()> {
        let path = self.snapshot_path(snapshot.environment(), snapshot.category());
        write_pretty(&path, &snapshot.records)?;
        debug!(path = %path.display(), records = snapshot.len(), "archived snapshot");
        Ok(())
    }
}

/// Keeps snapshots in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    saved: RefCell<Vec<Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<Snapshot> {
        self.saved.borrow().clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: &Snapshot) -> SyncResult<()> {
        self.saved.borrow_mut().push(snapshot.clone());
        Ok(())
    }
}

fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> SyncResult<()> {
    let persistence = |reason: String| SyncError::Persistence {
        path: path.display().to_string(),
        reason,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| persistence(e.to_string()))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| persistence(e.to_string()))?;
    fs::write(path, json).map_err(|e| persistence(e.to_string()))
}

fn path_component(raw: &str) -> String {
    raw.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn records() -> Vec<ResourceRecord> {
        vec![
            serde_json::from_value(json!({"id":"stat_2","label":"Won"})).unwrap(),
            serde_json::from_value(json!({"id":"stat_1","label":"Lost"})).unwrap(),
        ]
    }

    #[test]
    fn run_id_is_compact_utc_timestamp() {
        let at = DateTime::parse_from_rfc3339("2024-01-31T08:15:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(run_id(at), "20240131T081500Z");
    }

    #[test]
    fn fs_store_writes_ordered_human_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path(), "20240101T000000Z");
        let snapshot = Snapshot::capture("prod", Category::LeadStatus, records());
        store.save(&snapshot).unwrap();

        let path = dir
            .path()
            .join("20240101T000000Z")
            .join("prod")
            .join("lead-status.json");
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains('\n'), "expected pretty-printed output");
        let back: Vec<ResourceRecord> = serde_json::from_str(&written).unwrap();
        assert_eq!(back, records());
    }

    #[test]
    fn fs_store_overwrites_within_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::new(dir.path(), "run");
        store
            .save(&Snapshot::capture("dev", Category::LeadStatus, records()))
            .unwrap();
        store
            .save(&Snapshot::capture("dev", Category::LeadStatus, Vec::new()))
            .unwrap();
        let written = fs::read_to_string(store.snapshot_path("dev", Category::LeadStatus)).unwrap();
        let back: Vec<ResourceRecord> = serde_json::from_str(&written).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn fs_store_reports_persistence_errors() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "a file, not a directory").unwrap();
        let store = FsSnapshotStore::new(&blocker, "run");
        let err = store
            .save(&Snapshot::capture("prod", Category::LeadStatus, records()))
            .unwrap_err();
        assert!(matches!(err, SyncError::Persistence { .. }));
    }

    #[test]
    fn environment_labels_cannot_escape_the_run_dir() {
        let store = FsSnapshotStore::new("/tmp/archive", "run");
        let path = store.snapshot_path("../prod", Category::LeadStatus);
        assert_eq!(path, PathBuf::from("/tmp/archive/run/.._prod/lead-status.json"));
    }

    #[test]
    fn memory_store_keeps_copies() {
        let store = MemorySnapshotStore::new();
        let snapshot = Snapshot::capture("prod", Category::LeadStatus, records());
        store.save(&snapshot).unwrap();
        assert_eq!(store.saved(), vec![snapshot]);
    }

    #[test]
    fn ingest_preserves_order() {
        let snapshot = Snapshot::capture("prod", Category::LeadStatus, records());
        let typed = snapshot.ingest().unwrap();
        let keys: Vec<_> = typed.iter().map(|r| r.natural_key()).collect();
        assert_eq!(keys, vec!["Won", "Lost"]);
    }
}
