//! Persistence for the processed-file ledger.
//!
//! The file holds a JSON array of canonical path strings, sorted. A missing
//! or unreadable file starts an empty ledger. Saves rewrite the whole file.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::warn;

use photodesk_core::state::ProcessedKeySet;

use crate::fsutil::write_json_atomic;

pub struct ProcessedStateStore {
    path: PathBuf,
}

impl ProcessedStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> ProcessedKeySet {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ProcessedKeySet::new(),
            Err(e) => {
                warn!("Could not read processed state {}: {}", self.path.display(), e);
                return ProcessedKeySet::new();
            }
        };
        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(keys) => ProcessedKeySet::from_keys(keys),
            Err(e) => {
                warn!(
                    "Processed state {} is corrupt, starting empty: {}",
                    self.path.display(),
                    e
                );
                ProcessedKeySet::new()
            }
        }
    }

    pub fn save(&self, keys: &ProcessedKeySet) -> Result<()> {
        write_json_atomic(&self.path, &keys.to_sorted_vec())
    }
}
