//! Core data models shared by the ranking and reconciliation pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which engine produced a candidate's final caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionEngine {
    Llm,
    Template,
}

impl CaptionEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionEngine::Llm => "llm",
            CaptionEngine::Template => "template",
        }
    }
}

/// A provider-sourced photo under evaluation for one search.
///
/// Providers fill the descriptive fields. `score` is set by the scoring
/// pass; `caption`, `caption_engine`, and `caption_failure` are set by the
/// caption decision pass and left untouched afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub provider: String,
    pub title: String,
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub raw_caption: String,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub caption_engine: Option<CaptionEngine>,
    /// Empty when the caption decision did not degrade.
    #[serde(default)]
    pub caption_failure: String,
}

impl Candidate {
    pub fn new(provider: &str, title: &str, raw_caption: &str) -> Self {
        Self {
            provider: provider.to_string(),
            title: title.to_string(),
            page_url: String::new(),
            image_url: String::new(),
            raw_caption: raw_caption.to_string(),
            captured_at: None,
            score: 0.0,
            caption: String::new(),
            caption_engine: None,
            caption_failure: String::new(),
        }
    }

    /// Title and raw caption joined, the text that scoring looks at.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.raw_caption)
    }
}

/// A caption queued for a file that has not been downloaded yet.
///
/// Created when a provider link is opened. The reconciliation matcher sets
/// `matched`, `matched_file`, and `matched_at` exactly once, after a
/// successful injection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub asset_id: String,
    /// Unix seconds.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub matched: bool,
    #[serde(default)]
    pub matched_file: String,
    #[serde(default)]
    pub matched_at: Option<i64>,
}

impl PendingRecord {
    pub fn new(id: &str, title: &str, caption: &str, created_at: i64) -> Self {
        Self {
            id: id.to_string(),
            page_url: String::new(),
            title: title.to_string(),
            caption: caption.to_string(),
            asset_id: String::new(),
            created_at,
            matched: false,
            matched_file: String::new(),
            matched_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_record_defaults_from_sparse_json() {
        let record: PendingRecord =
            serde_json::from_str(r#"{"id": "r1", "caption": "A caption", "created_at": 10}"#)
                .unwrap();
        assert_eq!(record.id, "r1");
        assert!(!record.matched);
        assert!(record.asset_id.is_empty());
        assert_eq!(record.matched_at, None);
    }

    #[test]
    fn test_caption_engine_serializes_lowercase() {
        let json = serde_json::to_string(&CaptionEngine::Template).unwrap();
        assert_eq!(json, "\"template\"");
        assert_eq!(CaptionEngine::Llm.as_str(), "llm");
    }
}
