//! Downloads watcher: reconcile freshly downloaded photos against pending
//! caption records.
//!
//! Each tick:
//!
//! 1. Scan the downloads folder (non-recursive) for image files modified
//!    within `max_file_age_hours`, newest first.
//! 2. Load pending records from disk.
//! 3. Let [`reconcile_tick`] pick at most one (file, record) pair and inject
//!    the record's caption into the file.
//! 4. Save the processed-file ledger, then the pending records, when the
//!    tick applied a match.
//!
//! Pending records are reloaded every tick, so `pdesk pending add` from
//! another process is picked up without restarting the watcher. The
//! processed-file ledger is read once at startup and kept in memory.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use photodesk_core::reconcile::{
    is_eligible, reconcile_tick, MetadataInjector, ObservedFile, TickOutcome,
};
use photodesk_core::state::ProcessedKeySet;

use crate::config::WatcherConfig;
use crate::fsutil::write_atomic;
use crate::pending::PendingStore;
use crate::state::ProcessedStateStore;

fn build_extension_set(extensions: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        let ext = ext.trim().trim_start_matches('.');
        if ext.is_empty() {
            continue;
        }
        let glob = GlobBuilder::new(&format!("*.{}", ext))
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid watcher extension: {}", ext))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Image files directly inside the downloads folder that are young enough
/// to be a fresh download, newest first.
pub fn scan_downloads(config: &WatcherConfig, now: DateTime<Utc>) -> Result<Vec<ObservedFile>> {
    let dir = &config.downloads_dir;
    if !dir.is_dir() {
        bail!("Downloads directory does not exist: {}", dir.display());
    }
    let extensions = build_extension_set(&config.extensions)?;
    let max_age = Duration::hours(config.max_file_age_hours as i64);

    let mut found: Vec<(DateTime<Utc>, ObservedFile)> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if !extensions.is_match(entry.file_name()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let modified: DateTime<Utc> = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
            Some(t) => t.into(),
            None => continue,
        };
        if now - modified > max_age {
            debug!("Skipping old file: {}", name);
            continue;
        }
        let key = match std::fs::canonicalize(entry.path()) {
            Ok(p) => p.to_string_lossy().to_string(),
            Err(_) => continue,
        };
        found.push((modified, ObservedFile::new(entry.path(), key)));
    }

    found.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(found.into_iter().map(|(_, f)| f).collect())
}

/// Read, inject, and atomically rewrite one file.
pub fn inject_file<I: MetadataInjector + ?Sized>(
    injector: &I,
    path: &Path,
    caption: &str,
    source_label: &str,
) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (out, format) = injector.inject(&bytes, caption, source_label)?;
    write_atomic(path, &out)?;
    debug!("Wrote {} metadata to {}", format.as_str(), path.display());
    Ok(())
}

pub struct Watcher<I: MetadataInjector> {
    config: WatcherConfig,
    pending: PendingStore,
    state: ProcessedStateStore,
    /// Loaded once; only grows for the life of the watcher.
    processed: ProcessedKeySet,
    injector: I,
}

impl<I: MetadataInjector> Watcher<I> {
    pub fn new(config: &WatcherConfig, injector: I) -> Self {
        let state = ProcessedStateStore::new(&config.state_path);
        let processed = state.load();
        Self {
            config: config.clone(),
            pending: PendingStore::new(&config.pending_path),
            state,
            processed,
            injector,
        }
    }

    pub fn processed(&self) -> &ProcessedKeySet {
        &self.processed
    }

    /// One scan-match-inject pass.
    ///
    /// The file key is recorded in memory before anything is saved, so a
    /// failed save never makes a file eligible again in this process.
    pub fn run_tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let files = scan_downloads(&self.config, now)?;
        let mut records = self.pending.load();
        let now_secs = now.timestamp();

        debug!(
            "{} candidate files, {} open records, {} processed",
            files.len(),
            records.iter().filter(|r| is_eligible(r, now_secs)).count(),
            self.processed.len()
        );

        let injector = &self.injector;
        let outcome = reconcile_tick(
            &files,
            &mut records,
            &mut self.processed,
            now_secs,
            |file, caption, page_url| inject_file(injector, &file.path, caption, page_url),
        );

        if outcome.changed_state() {
            let state_saved = self.state.save(&self.processed);
            let pending_saved = self.pending.save(&records);
            state_saved?;
            pending_saved?;
        }
        Ok(outcome)
    }

    /// Poll until interrupted, or run a single tick with `once`.
    pub fn run(&mut self, once: bool) -> Result<()> {
        info!(
            "Watching {} for new downloads (every {:.1}s)",
            self.config.downloads_dir.display(),
            self.config.poll_interval().as_secs_f64()
        );
        loop {
            match self.run_tick(Utc::now()) {
                Ok(outcome) => report(&outcome),
                Err(e) if once => return Err(e),
                Err(e) => warn!("Watcher tick failed: {:#}", e),
            }
            if once {
                return Ok(());
            }
            std::thread::sleep(self.config.poll_interval());
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn report(outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Idle => debug!("No match this tick"),
        TickOutcome::Injected {
            file,
            record_id,
            score,
        } => {
            info!("Matched record {} (score {:.3})", record_id, score);
            println!("Caption injected: {}", display_name(file));
        }
        TickOutcome::InjectionFailed {
            file,
            record_id,
            score,
            reason,
        } => {
            warn!(
                "Injection failed for record {} (score {:.3}): {}",
                record_id, score, reason
            );
            println!("Failed to inject caption for: {}", display_name(file));
        }
    }
}
