//! Reconciliation of downloaded files against pending caption records.
//!
//! Runs once per poll tick over the files currently visible in the
//! downloads folder and the pending records on disk.
//!
//! # Eligibility
//!
//! A record is considered only if it is unmatched, has a non-empty caption,
//! and was created at most [`PENDING_TTL_SECS`] ago. Expired records are not
//! removed; they simply never match again. Files whose key is already in
//! the [`ProcessedKeySet`] are skipped.
//!
//! # Match Score
//!
//! ```text
//! target = tokens(title) ∪ first CAPTION_TOKEN_CAP tokens(caption)
//! score  = |tokens(filename) ∩ target| / max(|target|, 1)
//!        + ASSET_ID_BONUS   if asset_id is non-empty and a substring of filename
//! ```
//!
//! Long captions are capped so their tokens cannot soak up unrelated
//! filename tokens. The ratio term is at most `1.0`, so an asset-id hit
//! always outranks overlap alone.
//!
//! # Selection
//!
//! The single pair with the strictly highest score across the whole
//! cross product wins (first seen wins ties), and only if it reaches
//! [`MATCH_THRESHOLD`]. At most one match is applied per tick.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::models::PendingRecord;
use crate::state::ProcessedKeySet;
use crate::tokenize::{tokenize, tokenize_ordered};

pub const MATCH_THRESHOLD: f64 = 0.20;
pub const PENDING_TTL_SECS: i64 = 24 * 60 * 60;
pub const CAPTION_TOKEN_CAP: usize = 8;
pub const ASSET_ID_BONUS: f64 = 1.0;

/// Image container detected by a [`MetadataInjector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
        }
    }
}

/// Writes caption metadata into image bytes.
pub trait MetadataInjector {
    fn inject(&self, bytes: &[u8], caption: &str, source_label: &str)
        -> Result<(Vec<u8>, ImageFormat)>;
}

/// A file visible in the downloads folder during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedFile {
    pub path: PathBuf,
    /// Canonical absolute path, the processed-ledger key.
    pub key: String,
}

impl ObservedFile {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// The winning pair of a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPlan {
    pub file_index: usize,
    pub record_index: usize,
    pub score: f64,
}

/// What a tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No pair reached the threshold.
    Idle,
    Injected {
        file: PathBuf,
        record_id: String,
        score: f64,
    },
    /// The file is now processed; the record stays open.
    InjectionFailed {
        file: PathBuf,
        record_id: String,
        score: f64,
        reason: String,
    },
}

impl TickOutcome {
    /// Whether persisted state needs saving.
    pub fn changed_state(&self) -> bool {
        !matches!(self, TickOutcome::Idle)
    }
}

pub fn is_eligible(record: &PendingRecord, now: i64) -> bool {
    !record.matched
        && !record.caption.trim().is_empty()
        && record.created_at > 0
        && now - record.created_at <= PENDING_TTL_SECS
}

fn target_tokens(record: &PendingRecord) -> HashSet<String> {
    let mut target = tokenize(&record.title);
    target.extend(
        tokenize_ordered(&record.caption)
            .into_iter()
            .take(CAPTION_TOKEN_CAP),
    );
    target
}

pub fn match_score(filename: &str, record: &PendingRecord) -> f64 {
    let name_tokens = tokenize(filename);
    let target = target_tokens(record);
    let mut score =
        name_tokens.intersection(&target).count() as f64 / target.len().max(1) as f64;

    let asset_id = record.asset_id.trim();
    if !asset_id.is_empty() && filename.contains(asset_id) {
        score += ASSET_ID_BONUS;
    }
    score
}

/// Pick the best (file, record) pair for this tick.
pub fn find_best_match(
    files: &[ObservedFile],
    records: &[PendingRecord],
    processed: &ProcessedKeySet,
    now: i64,
) -> Option<MatchPlan> {
    let mut best: Option<MatchPlan> = None;

    for (record_index, record) in records.iter().enumerate() {
        if !is_eligible(record, now) {
            continue;
        }
        for (file_index, file) in files.iter().enumerate() {
            if processed.contains(&file.key) {
                continue;
            }
            let score = match_score(&file.file_name(), record);
            if score > best.map_or(0.0, |b| b.score) {
                best = Some(MatchPlan {
                    file_index,
                    record_index,
                    score,
                });
            }
        }
    }

    best.filter(|b| b.score >= MATCH_THRESHOLD)
}

/// Run one reconciliation tick.
///
/// `inject` receives the chosen file, the record's caption, and its page
/// URL. Whatever it returns, the file key joins `processed`. On success the
/// record is marked matched at `now`.
pub fn reconcile_tick<F>(
    files: &[ObservedFile],
    records: &mut [PendingRecord],
    processed: &mut ProcessedKeySet,
    now: i64,
    inject: F,
) -> TickOutcome
where
    F: FnOnce(&ObservedFile, &str, &str) -> Result<()>,
{
    let Some(plan) = find_best_match(files, records, processed, now) else {
        return TickOutcome::Idle;
    };

    let file = &files[plan.file_index];
    let record = &mut records[plan.record_index];
    let result = inject(file, &record.caption, &record.page_url);
    processed.insert(file.key.clone());

    match result {
        Ok(()) => {
            record.matched = true;
            record.matched_file = file.key.clone();
            record.matched_at = Some(now);
            TickOutcome::Injected {
                file: file.path.clone(),
                record_id: record.id.clone(),
                score: plan.score,
            }
        }
        Err(e) => TickOutcome::InjectionFailed {
            file: file.path.clone(),
            record_id: record.id.clone(),
            score: plan.score,
            reason: format!("{:#}", e),
        },
    }
}
