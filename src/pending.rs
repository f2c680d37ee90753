//! Pending caption records on disk.
//!
//! The store is a JSON array of [`PendingRecord`]s in creation order. It is
//! shared with other processes (whatever queues records when a provider
//! link is opened), so every save:
//!
//! 1. re-reads the file,
//! 2. merges in-memory records by key (new ones appended; a record matched
//!    on either side stays matched),
//! 3. keeps only the newest [`MAX_PENDING_RECORDS`],
//! 4. replaces the file atomically.
//!
//! There is no lock, so two writers racing between read and rename can
//! still lose an update.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::warn;

use photodesk_core::models::PendingRecord;
use photodesk_core::reconcile::is_eligible;

use crate::fsutil::write_json_atomic;

pub const MAX_PENDING_RECORDS: usize = 500;

pub struct PendingStore {
    path: PathBuf,
}

impl PendingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all records. Missing or malformed files read as empty.
    pub fn load(&self) -> Vec<PendingRecord> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Could not read pending records {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<PendingRecord>>(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "Pending records {} are malformed, treating as empty: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Merge `records` into the file and truncate to the newest entries.
    pub fn save(&self, records: &[PendingRecord]) -> Result<()> {
        let merged = merge(self.load(), records);
        let start = merged.len().saturating_sub(MAX_PENDING_RECORDS);
        write_json_atomic(&self.path, &merged[start..])
    }

    pub fn append(&self, record: PendingRecord) -> Result<()> {
        self.save(std::slice::from_ref(&record))
    }
}

fn record_key(record: &PendingRecord) -> String {
    if record.id.is_empty() {
        format!("{}@{}", record.page_url, record.created_at)
    } else {
        record.id.clone()
    }
}

/// Merge `local` into `disk`, keeping disk order.
///
/// A local record missing from disk and older than everything on disk was
/// evicted by another writer's truncation and is not brought back.
pub fn merge(mut disk: Vec<PendingRecord>, local: &[PendingRecord]) -> Vec<PendingRecord> {
    let oldest_on_disk = disk.iter().map(|r| r.created_at).min();
    for record in local {
        let key = record_key(record);
        match disk.iter_mut().find(|r| record_key(r) == key) {
            Some(existing) => {
                if record.matched && !existing.matched {
                    *existing = record.clone();
                }
            }
            None => {
                if oldest_on_disk.is_some_and(|oldest| record.created_at < oldest) {
                    continue;
                }
                disk.push(record.clone());
            }
        }
    }
    disk
}

/// Build a new record stamped with `now`.
///
/// Without an explicit asset id, one is taken from the page URL when its
/// last path segment is all digits.
pub fn new_record(
    page_url: &str,
    title: &str,
    caption: &str,
    asset_id: Option<&str>,
    now: i64,
) -> PendingRecord {
    let mut record = PendingRecord::new(&uuid::Uuid::new_v4().to_string(), title.trim(), caption.trim(), now);
    record.page_url = page_url.trim().to_string();
    record.asset_id = match asset_id {
        Some(id) => id.trim().to_string(),
        None => asset_id_from_url(page_url).unwrap_or_default(),
    };
    record
}

pub fn asset_id_from_url(url: &str) -> Option<String> {
    let without_query = url.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
    let last = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("");
    if !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) {
        Some(last.to_string())
    } else {
        None
    }
}

/// Print every record with its match status, oldest first.
pub fn print_records(records: &[PendingRecord], now: i64) {
    if records.is_empty() {
        println!("No pending records.");
        return;
    }
    for record in records {
        let status = if record.matched {
            format!("matched -> {}", record.matched_file)
        } else if is_eligible(record, now) {
            "waiting".to_string()
        } else {
            "expired".to_string()
        };
        let created = chrono::DateTime::from_timestamp(record.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("{}  [{}]  {}", record.id, status, record.title);
        println!("    created: {}", created);
        if !record.asset_id.is_empty() {
            println!("    asset: {}", record.asset_id);
        }
        println!("    url: {}", record.page_url);
        println!("    caption: {}", record.caption);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, created_at: i64) -> PendingRecord {
        PendingRecord::new(id, "Title", "Caption", created_at)
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pending.json");
        assert!(PendingStore::new(&path).load().is_empty());
        std::fs::write(&path, r#"{"not": "a list"}"#).unwrap();
        assert!(PendingStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_save_keeps_newest_500() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = PendingStore::new(dir.path().join("pending.json"));
        let records: Vec<PendingRecord> = (0..510).map(|i| rec(&format!("r{}", i), i)).collect();
        store.save(&records).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), MAX_PENDING_RECORDS);
        assert_eq!(loaded[0].id, "r10");
        assert_eq!(loaded[499].id, "r509");
    }

    #[test]
    fn test_save_keeps_records_from_other_writers() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = PendingStore::new(dir.path().join("pending.json"));
        store.save(&[rec("a", 1)]).unwrap();

        // Watcher loads, another process appends, watcher saves a match.
        let mut local = store.load();
        store.append(rec("b", 2)).unwrap();
        local[0].matched = true;
        store.save(&local).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
        assert!(loaded[0].matched);
        assert_eq!(loaded[1].id, "b");
    }

    #[test]
    fn test_merge_never_unmatches() {
        let mut matched = rec("a", 1);
        matched.matched = true;
        let merged = merge(vec![matched], &[rec("a", 1)]);
        assert!(merged[0].matched);
    }

    #[test]
    fn test_merge_does_not_revive_evicted_records() {
        let disk = vec![rec("b", 5), rec("c", 6)];
        let mut evicted = rec("a", 1);
        evicted.matched = true;
        let merged = merge(disk, &[evicted, rec("b", 5), rec("d", 7)]);
        let ids: Vec<&str> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_new_record_derives_asset_id() {
        let r = new_record(
            "https://www.gettyimages.com/detail/news-photo/air-force-one/2261576047?adppopup=true",
            " Air Force One ",
            "Caption",
            None,
            100,
        );
        assert_eq!(r.asset_id, "2261576047");
        assert_eq!(r.title, "Air Force One");
        assert_eq!(r.created_at, 100);
        assert!(!r.id.is_empty());
        assert!(!r.matched);
    }

    #[test]
    fn test_explicit_asset_id_wins() {
        let r = new_record("https://example.com/detail/123", "t", "c", Some("ABC"), 1);
        assert_eq!(r.asset_id, "ABC");
    }

    #[test]
    fn test_asset_id_from_url() {
        assert_eq!(asset_id_from_url("https://x/detail/abc/42/"), Some("42".to_string()));
        assert_eq!(asset_id_from_url("https://x/detail/abc-def"), None);
        assert_eq!(asset_id_from_url(""), None);
    }
}
