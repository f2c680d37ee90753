//! Candidate source backed by a JSON file.
//!
//! Provider page scraping happens elsewhere; its output lands in a file
//! holding an array of raw candidates:
//!
//! ```json
//! [
//!   {
//!     "provider": "getty",
//!     "title": "Wildfire smoke covers downtown",
//!     "page_url": "https://www.gettyimages.com/detail/news-photo/2261576047",
//!     "image_url": "https://media.gettyimages.com/id/2261576047/photo.jpg",
//!     "caption": "Officials discuss wildfire response",
//!     "captured_at": "2026-02-18T14:05:00Z"
//!   }
//! ]
//! ```
//!
//! `captured_at` accepts RFC 3339, naive date-times (taken as UTC), or a
//! bare date. Unparseable values become "unknown".

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

use photodesk_core::models::Candidate;
use photodesk_core::provider::ProviderSearch;

#[derive(Debug, Deserialize)]
struct RawCandidate {
    provider: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    page_url: String,
    #[serde(default)]
    image_url: String,
    #[serde(default, alias = "raw_caption")]
    caption: String,
    #[serde(default)]
    captured_at: Option<String>,
}

impl RawCandidate {
    fn into_candidate(self) -> Candidate {
        let mut c = Candidate::new(
            self.provider.trim(),
            &normalize(&self.title),
            &normalize(&self.caption),
        );
        c.page_url = self.page_url.trim().to_string();
        c.image_url = self.image_url.trim().to_string();
        c.captured_at = self.captured_at.as_deref().and_then(parse_timestamp);
        c
    }
}

fn normalize(text: &str) -> String {
    photodesk_core::tokenize::normalize_ws(text)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Reads candidates from a JSON file, capping each provider at `limit`
/// candidates in file order.
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProviderSearch for JsonFileProvider {
    fn name(&self) -> &str {
        "json-file"
    }

    fn search(&self, _prompt: &str, limit: usize) -> Result<Vec<Candidate>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read candidates file: {}", self.path.display()))?;
        let raw: Vec<RawCandidate> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse candidates file: {}", self.path.display()))?;

        let mut per_provider: HashMap<String, usize> = HashMap::new();
        let mut out = Vec::new();
        for item in raw {
            let candidate = item.into_candidate();
            let count = per_provider.entry(candidate.provider.clone()).or_insert(0);
            if *count >= limit {
                continue;
            }
            *count += 1;
            out.push(candidate);
        }
        Ok(out)
    }
}

/// Query every provider in order. A failing provider contributes nothing.
pub fn collect_candidates(
    providers: &[Box<dyn ProviderSearch>],
    prompt: &str,
    limit: usize,
) -> Vec<Candidate> {
    let mut all = Vec::new();
    for provider in providers {
        match provider.search(prompt, limit) {
            Ok(found) => {
                debug!("{} returned {} candidates", provider.name(), found.len());
                all.extend(found);
            }
            Err(e) => warn!("Provider {} failed: {:#}", provider.name(), e),
        }
    }
    all
}
