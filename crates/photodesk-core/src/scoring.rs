//! Candidate scoring, relevance gating, and ranking.
//!
//! # Scoring Algorithm
//!
//! Each candidate is reduced to a [`ScoringFeatures`] value, then combined:
//!
//! ```text
//! score = (0.40 × overlap_ratio + 0.45 × freshness + keyword_hits × keyword_boost)
//!         × provider_weight
//! ```
//!
//! - `overlap_ratio`: share of prompt tokens found in title + caption.
//! - `freshness`: `0.5 ^ (age_days / half_life_days)`, age floored at zero;
//!   [`NEUTRAL_FRESHNESS`] when the capture time is unknown.
//! - `keyword_hits`: configured keywords found as case-insensitive
//!   substrings. The boost is additive and uncapped.
//! - `provider_weight`: per-provider multiplier, `1.0` when unlisted.
//!
//! # Ranking
//!
//! 1. Drop candidates failing [`passes_relevance`] (independent of score).
//! 2. Sort by score, descending. The sort is stable, so equal scores keep
//!    provider emission order.
//! 3. Truncate to `top_n`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::models::Candidate;
use crate::tokenize::tokenize;

pub const OVERLAP_WEIGHT: f64 = 0.40;
pub const FRESHNESS_WEIGHT: f64 = 0.45;
/// Freshness assigned to candidates without a capture timestamp.
pub const NEUTRAL_FRESHNESS: f64 = 0.25;
pub const DEFAULT_PROVIDER_WEIGHT: f64 = 1.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Ranking parameters for one search. Built once and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub provider_weight: HashMap<String, f64>,
    pub freshness_half_life_days: u32,
    pub min_overlap_ratio: f64,
    pub min_overlap_terms: usize,
    pub news_keywords: Vec<String>,
    pub keyword_boost: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            provider_weight: HashMap::from([
                ("getty".to_string(), 1.0),
                ("ap".to_string(), 1.0),
            ]),
            freshness_half_life_days: 14,
            min_overlap_ratio: 0.12,
            min_overlap_terms: 1,
            news_keywords: [
                "breaking",
                "election",
                "conflict",
                "wildfire",
                "protest",
                "government",
                "court",
                "policy",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            keyword_boost: 0.15,
        }
    }
}

impl RankingConfig {
    pub fn provider_weight(&self, provider: &str) -> f64 {
        self.provider_weight
            .get(provider)
            .copied()
            .unwrap_or(DEFAULT_PROVIDER_WEIGHT)
    }
}

/// Prompt/text token overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlap {
    pub terms: usize,
    pub ratio: f64,
}

/// Compute token overlap between a tokenized prompt and candidate text.
pub fn overlap(prompt_tokens: &HashSet<String>, text: &str) -> Overlap {
    let text_tokens = tokenize(text);
    let terms = prompt_tokens.intersection(&text_tokens).count();
    Overlap {
        terms,
        ratio: terms as f64 / prompt_tokens.len().max(1) as f64,
    }
}

/// The independent inputs of a candidate's score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringFeatures {
    pub overlap_terms: usize,
    pub overlap_ratio: f64,
    pub freshness: f64,
    pub keyword_hits: usize,
    pub keyword_boost: f64,
    pub provider_weight: f64,
}

impl ScoringFeatures {
    pub fn extract(
        candidate: &Candidate,
        prompt: &str,
        config: &RankingConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let text = candidate.searchable_text();
        let ov = overlap(&tokenize(prompt), &text);
        Self {
            overlap_terms: ov.terms,
            overlap_ratio: ov.ratio,
            freshness: freshness_score(
                candidate.captured_at,
                now,
                config.freshness_half_life_days,
            ),
            keyword_hits: keyword_hits(&text, &config.news_keywords),
            keyword_boost: config.keyword_boost,
            provider_weight: config.provider_weight(&candidate.provider),
        }
    }

    /// Total boost contributed by keyword hits.
    pub fn keyword_term(&self) -> f64 {
        self.keyword_hits as f64 * self.keyword_boost
    }

    pub fn combine(&self) -> f64 {
        (OVERLAP_WEIGHT * self.overlap_ratio + FRESHNESS_WEIGHT * self.freshness
            + self.keyword_term())
            * self.provider_weight
    }
}

/// Exponential recency decay relative to `now`.
///
/// Future timestamps count as age zero. A half-life of zero is treated
/// as one day.
pub fn freshness_score(
    captured_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    half_life_days: u32,
) -> f64 {
    let Some(ts) = captured_at else {
        return NEUTRAL_FRESHNESS;
    };
    let age_days = ((now - ts).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0);
    0.5_f64.powf(age_days / half_life_days.max(1) as f64)
}

/// Count configured keywords appearing as case-insensitive substrings.
pub fn keyword_hits(text: &str, keywords: &[String]) -> usize {
    let lowered = text.to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.is_empty() && lowered.contains(&k.to_lowercase()))
        .count()
}

pub fn score(candidate: &Candidate, prompt: &str, config: &RankingConfig, now: DateTime<Utc>) -> f64 {
    ScoringFeatures::extract(candidate, prompt, config, now).combine()
}

/// Hard relevance gate applied before ranking.
///
/// Always true for prompts without tokens. Otherwise both the overlap term
/// count and the overlap ratio must reach their configured minimums.
pub fn passes_relevance(candidate: &Candidate, prompt: &str, config: &RankingConfig) -> bool {
    let prompt_tokens = tokenize(prompt);
    if prompt_tokens.is_empty() {
        return true;
    }
    let ov = overlap(&prompt_tokens, &candidate.searchable_text());
    ov.terms >= config.min_overlap_terms && ov.ratio >= config.min_overlap_ratio
}

/// Score every candidate, drop irrelevant ones, and return the top `top_n`
/// in descending score order.
pub fn rank(
    mut candidates: Vec<Candidate>,
    prompt: &str,
    config: &RankingConfig,
    now: DateTime<Utc>,
    top_n: usize,
) -> Vec<Candidate> {
    for candidate in candidates.iter_mut() {
        candidate.score = score(candidate, prompt, config, now);
    }

    let mut ranked: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| passes_relevance(c, prompt, config))
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(top_n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_config() -> RankingConfig {
        RankingConfig {
            freshness_half_life_days: 10,
            news_keywords: vec!["wildfire".to_string(), "election".to_string()],
            keyword_boost: 0.1,
            ..RankingConfig::default()
        }
    }

    fn candidate(provider: &str, title: &str, caption: &str) -> Candidate {
        Candidate::new(provider, title, caption)
    }

    #[test]
    fn test_freshness_recent_higher_than_old() {
        let now = Utc::now();
        let recent = freshness_score(Some(now - Duration::days(1)), now, 10);
        let old = freshness_score(Some(now - Duration::days(30)), now, 10);
        assert!(recent > old);
    }

    #[test]
    fn test_freshness_strictly_monotone_within_a_day() {
        let now = Utc::now();
        let a = freshness_score(Some(now), now, 14);
        let b = freshness_score(Some(now - Duration::hours(3)), now, 14);
        assert!(a > b);
    }

    #[test]
    fn test_freshness_half_life() {
        let now = Utc::now();
        let f = freshness_score(Some(now - Duration::days(14)), now, 14);
        assert!((f - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_freshness_future_is_age_zero() {
        let now = Utc::now();
        let f = freshness_score(Some(now + Duration::days(3)), now, 14);
        assert!((f - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_freshness_unknown_is_neutral() {
        assert_eq!(freshness_score(None, Utc::now(), 14), NEUTRAL_FRESHNESS);
    }

    #[test]
    fn test_combine_weights() {
        let features = ScoringFeatures {
            overlap_terms: 1,
            overlap_ratio: 0.5,
            freshness: 1.0,
            keyword_hits: 2,
            keyword_boost: 0.1,
            provider_weight: 2.0,
        };
        // (0.2 + 0.45 + 0.2) * 2
        assert!((features.combine() - 1.7).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_boost_is_uncapped() {
        let keywords: Vec<String> = ["court", "policy", "protest", "election"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let hits = keyword_hits("Court policy PROTEST before election", &keywords);
        assert_eq!(hits, 4);
        let features = ScoringFeatures {
            overlap_terms: 0,
            overlap_ratio: 0.0,
            freshness: 0.0,
            keyword_hits: hits,
            keyword_boost: 0.5,
            provider_weight: 1.0,
        };
        assert!((features.combine() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_is_substring_match() {
        let keywords = vec!["court".to_string()];
        assert_eq!(keyword_hits("Outside the courthouse", &keywords), 1);
    }

    #[test]
    fn test_higher_overlap_scores_higher() {
        let config = test_config();
        let now = Utc::now();
        let prompt = "senate budget vote";
        let a = candidate("getty", "Senate budget vote passes", "");
        let b = candidate("getty", "Senate recess begins", "");
        assert!(score(&a, prompt, &config, now) > score(&b, prompt, &config, now));
    }

    #[test]
    fn test_unknown_provider_weight_defaults() {
        let config = test_config();
        assert_eq!(config.provider_weight("reuters"), 1.0);
    }

    #[test]
    fn test_provider_weight_scales_score() {
        let mut config = test_config();
        config.provider_weight.insert("ap".to_string(), 2.0);
        let now = Utc::now();
        let a = candidate("ap", "Harbor cranes", "");
        let b = candidate("getty", "Harbor cranes", "");
        let sa = score(&a, "harbor", &config, now);
        let sb = score(&b, "harbor", &config, now);
        assert!((sa - 2.0 * sb).abs() < 1e-9);
    }

    #[test]
    fn test_wildfire_end_to_end() {
        let mut config = test_config();
        config.min_overlap_ratio = 0.12;
        let now = Utc::now();
        let prompt = "wildfire response downtown";
        let a = candidate(
            "getty",
            "Wildfire smoke covers downtown",
            "Officials discuss wildfire response",
        );
        let b = candidate("getty", "Basketball playoff game", "Quarterfinal action");
        assert!(score(&a, prompt, &config, now) > score(&b, prompt, &config, now));
        assert!(passes_relevance(&a, prompt, &config));
        assert!(!passes_relevance(&b, prompt, &config));
    }

    #[test]
    fn test_passes_relevance_requires_real_overlap() {
        let config = test_config();
        let prompt = "a photo for a story about the supreme court";
        let relevant = candidate(
            "ap",
            "U.S. Supreme Court justices during session",
            "A view of the Supreme Court chamber.",
        );
        let irrelevant = candidate(
            "ap",
            "NBA Finals pregame introductions",
            "Players line up before tipoff.",
        );
        assert!(passes_relevance(&relevant, prompt, &config));
        assert!(!passes_relevance(&irrelevant, prompt, &config));
    }

    #[test]
    fn test_relevance_gate_independent_of_score() {
        let mut config = test_config();
        config.keyword_boost = 5.0;
        let now = Utc::now();
        let c = candidate("ap", "Wildfire election coverage", "");
        assert!(score(&c, "harbor cranes", &config, now) > 5.0);
        assert!(!passes_relevance(&c, "harbor cranes", &config));
    }

    #[test]
    fn test_relevance_thresholds() {
        let mut config = test_config();
        let c = candidate("ap", "alpha bravo", "");
        // 1 of 4 prompt tokens => ratio 0.25
        let prompt = "alpha charlie delta echo";
        config.min_overlap_ratio = 0.25;
        assert!(passes_relevance(&c, prompt, &config));
        config.min_overlap_ratio = 0.26;
        assert!(!passes_relevance(&c, prompt, &config));
        config.min_overlap_ratio = 0.0;
        config.min_overlap_terms = 2;
        assert!(!passes_relevance(&c, prompt, &config));
    }

    #[test]
    fn test_empty_prompt_always_passes() {
        let config = test_config();
        let c = candidate("ap", "Anything at all", "");
        assert!(passes_relevance(&c, "a photo of the", &config));
    }

    #[test]
    fn test_rank_is_stable_for_ties() {
        let config = test_config();
        let now = Utc::now();
        let candidates = vec![
            candidate("getty", "harbor first", ""),
            candidate("ap", "harbor second", ""),
            candidate("getty", "harbor third", ""),
        ];
        let ranked = rank(candidates, "harbor", &config, now, 10);
        let titles: Vec<&str> = ranked.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["harbor first", "harbor second", "harbor third"]);
    }

    #[test]
    fn test_rank_filters_sorts_and_truncates() {
        let config = test_config();
        let now = Utc::now();
        let mut fresh = candidate("ap", "harbor cranes unload", "");
        fresh.captured_at = Some(now);
        let candidates = vec![
            candidate("getty", "harbor cranes", ""),
            candidate("getty", "basketball", ""),
            fresh,
            candidate("ap", "harbor", ""),
        ];
        let ranked = rank(candidates, "harbor cranes", &config, now, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].title, "harbor cranes unload");
        assert_eq!(ranked[1].title, "harbor cranes");
        assert!(ranked[0].score >= ranked[1].score);
    }
}
