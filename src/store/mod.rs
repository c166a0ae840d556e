//! JSON-backed link store.
//!
//! The store is a human-editable JSON array of [`LinkRecord`]s. Loading never
//! fails: a missing file is an empty store, and a corrupt one is copied aside
//! and treated as empty. Saving writes a temp file next to the target and
//! renames it into place, so readers never see a half-written store.

mod record;

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub use record::{LinkRecord, LinkStatus};

/// Errors produced while saving the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system error.
    #[error("IO error on link store {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// JSON serialization error.
    #[error("failed to serialize link store: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Counts of records by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    /// Records still to archive.
    pub new: usize,
    /// Records already archived.
    pub downloaded: usize,
}

impl StoreSummary {
    /// Summarises `records`.
    #[must_use]
    pub fn of(records: &[LinkRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, record| {
            match record.status {
                LinkStatus::New => acc.new += 1,
                LinkStatus::Downloaded => acc.downloaded += 1,
            }
            acc
        })
    }

    /// Total number of records.
    #[must_use]
    pub fn total(&self) -> usize {
        self.new + self.downloaded
    }
}

/// Handle to the link store file.
#[derive(Debug, Clone)]
pub struct LinkStore {
    path: PathBuf,
}

impl LinkStore {
    /// Creates a handle for the store at `path`; nothing is read yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all records.
    ///
    /// Returns an empty list when the file is missing, unreadable or not a
    /// valid store. A file that exists but fails to parse is copied to
    /// `<path>.corrupt` first.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    #[must_use]
    pub fn load(&self) -> Vec<LinkRecord> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("link store does not exist yet");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "link store unreadable, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<LinkRecord>>(&raw) {
            Ok(records) => {
                debug!(records = records.len(), "link store loaded");
                records
            }
            Err(e) => {
                warn!(error = %e, "link store is malformed, starting empty");
                self.preserve_corrupt();
                Vec::new()
            }
        }
    }

    /// Writes `records`, replacing the store atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the temp file cannot be written or renamed.
    #[instrument(skip(self, records), fields(path = %self.path.display(), records = records.len()))]
    pub fn save(&self, records: &[LinkRecord]) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let temp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer
                .write_all(b"\n")
                .and_then(|()| writer.flush())
                .map_err(|e| StoreError::io(temp.path(), e))?;
        }
        temp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path, e.error))?;

        info!("link store saved");
        Ok(())
    }

    fn preserve_corrupt(&self) {
        let mut backup: OsString = self.path.clone().into_os_string();
        backup.push(".corrupt");
        let backup = PathBuf::from(backup);
        match fs::copy(&self.path, &backup) {
            Ok(_) => warn!(backup = %backup.display(), "corrupt link store copied aside"),
            Err(e) => warn!(error = %e, "failed to copy corrupt link store aside"),
        }
    }
}

/// Merges `discovered` into `existing`, keyed by record id.
///
/// Existing records keep their position and all their fields except metadata
/// that was absent before; new ids are appended in discovery order. Merging
/// the same discovery twice gives the same result as merging it once.
#[must_use]
pub fn merge(existing: Vec<LinkRecord>, discovered: Vec<LinkRecord>) -> Vec<LinkRecord> {
    let mut merged: Vec<LinkRecord> = Vec::with_capacity(existing.len() + discovered.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in existing.into_iter().chain(discovered) {
        if let Some(&position) = index.get(&record.id) {
            merged[position].absorb(record);
        } else {
            index.insert(record.id.clone(), merged.len());
            merged.push(record);
        }
    }

    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, n).unwrap()
    }

    fn rec(id: &str) -> LinkRecord {
        LinkRecord::discovered(id, format!("title {id}"), format!("https://redd.it/{id}"), day(1))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LinkStore::new(dir.path().join("links_store.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_empty_and_backed_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("links_store.json");
        fs::write(&path, "[{not json").unwrap();

        let store = LinkStore::new(&path);
        assert!(store.load().is_empty());

        let backup = dir.path().join("links_store.json.corrupt");
        assert_eq!(fs::read_to_string(backup).unwrap(), "[{not json");
    }

    #[test]
    fn test_save_then_load_preserves_records() {
        let dir = TempDir::new().unwrap();
        let store = LinkStore::new(dir.path().join("nested").join("store.json"));
        let mut records = vec![rec("a"), rec("b").with_subreddit("memes")];
        records[0].mark_downloaded(day(9));

        store.save(&records).unwrap();
        assert_eq!(store.load(), records);
    }

    #[test]
    fn test_save_writes_pretty_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store = LinkStore::new(&path);
        let mut record = rec("a");
        record.title = "猫".to_string();

        store.save(&[record]).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("猫"), "non-ASCII must not be escaped: {raw}");
        assert!(raw.contains("\n  {"), "expected 2-space indent: {raw}");
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = LinkStore::new(dir.path().join("store.json"));
        store.save(&[rec("a")]).unwrap();
        store.save(&[rec("a"), rec("b")]).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_merge_appends_new_ids_in_order() {
        let merged = merge(vec![rec("a"), rec("b")], vec![rec("c"), rec("a"), rec("d")]);
        let ids: Vec<&str> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_merge_does_not_reset_status_or_first_seen() {
        let mut done = rec("a");
        done.mark_downloaded(day(3));
        let rediscovered = LinkRecord::discovered("a", "renamed", "https://redd.it/a", day(20));

        let merged = merge(vec![done.clone()], vec![rediscovered]);
        assert_eq!(merged, vec![done]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let existing = vec![rec("a"), rec("b")];
        let discovered = vec![
            rec("b").with_subreddit("pics"),
            rec("c").with_subreddit("memes"),
            rec("c"),
        ];

        let once = merge(existing, discovered.clone());
        let twice = merge(once.clone(), discovered);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
        assert_eq!(once[1].subreddit.as_deref(), Some("pics"));
    }

    #[test]
    fn test_summary_counts_statuses() {
        let mut records = vec![rec("a"), rec("b"), rec("c")];
        records[1].mark_downloaded(day(2));
        let summary = StoreSummary::of(&records);
        assert_eq!(summary.new, 2);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.total(), 3);
    }
}
