//! Photo search: rank provider candidates against a story prompt and decide
//! their captions.
//!
//! Pipeline for `pdesk search`:
//!
//! 1. Collect raw candidates from every configured source.
//! 2. Score every candidate, apply the relevance gate, rank, keep top N.
//! 3. Decide a caption for each survivor (template or LLM rewrite).
//! 4. Print human-readable results, or JSON with `--json`.
//!
//! Caption degradation never fails the command. When LLM mode was requested
//! and at least one result fell back, a warning names the first reason.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

use photodesk_core::caption::{CaptionDecisionEngine, CaptionMode, LlmClient};
use photodesk_core::models::Candidate;
use photodesk_core::provider::ProviderSearch;
use photodesk_core::scoring::{rank, ScoringFeatures};

use crate::candidates::{collect_candidates, JsonFileProvider};
use crate::config::Config;
use crate::llm::OpenAiClient;

/// Options of one search invocation.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub top: Option<usize>,
    pub json: bool,
    pub explain: bool,
}

/// Rank and caption candidates. Pure apart from the LLM client.
pub fn find_photos(
    config: &Config,
    prompt: &str,
    providers: &[Box<dyn ProviderSearch>],
    top: usize,
    client: Option<&dyn LlmClient>,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let all = collect_candidates(providers, prompt, config.search.per_provider_limit);
    debug!("{} raw candidates", all.len());

    let mut selected = rank(all, prompt, &config.ranking, now, top);
    CaptionDecisionEngine::new(&config.caption, client).apply(&mut selected, prompt);
    selected
}

/// First degradation reason among LLM-mode results, if any.
pub fn caption_warning(config: &Config, results: &[Candidate]) -> Option<String> {
    if config.caption.mode != CaptionMode::Llm {
        return None;
    }
    results
        .iter()
        .find(|c| !c.caption_failure.is_empty())
        .map(|c| {
            format!(
                "AI caption rules were not applied to all results. Reason: {}",
                c.caption_failure
            )
        })
}

pub fn run_search(
    config: &Config,
    prompt: &str,
    candidates_path: &Path,
    opts: &SearchOptions,
) -> Result<()> {
    let prompt = prompt.trim();
    let top = opts.top.unwrap_or(config.search.top);
    let providers: Vec<Box<dyn ProviderSearch>> =
        vec![Box::new(JsonFileProvider::new(candidates_path))];

    let client = if config.caption.mode == CaptionMode::Llm {
        match OpenAiClient::from_config(&config.llm) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("LLM client unavailable: {:#}", e);
                None
            }
        }
    } else {
        None
    };
    let client_ref = client.as_ref().map(|c| c as &dyn LlmClient);

    let now = Utc::now();
    let results = find_photos(config, prompt, &providers, top, client_ref, now);

    if opts.json {
        let rendered: Vec<Value> = results
            .iter()
            .map(|c| render_json(c, prompt, config, now, opts.explain))
            .collect::<Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        print_results(&results, prompt, config, now, opts.explain);
    }

    if let Some(warning) = caption_warning(config, &results) {
        eprintln!("Warning: {}", warning);
    }
    Ok(())
}

fn render_json(
    candidate: &Candidate,
    prompt: &str,
    config: &Config,
    now: DateTime<Utc>,
    explain: bool,
) -> Result<Value> {
    let mut value = serde_json::to_value(candidate)?;
    if explain {
        let features = ScoringFeatures::extract(candidate, prompt, &config.ranking, now);
        if let Value::Object(ref mut map) = value {
            map.insert("features".to_string(), serde_json::to_value(features)?);
        }
    }
    Ok(value)
}

fn print_results(
    results: &[Candidate],
    prompt: &str,
    config: &Config,
    now: DateTime<Utc>,
    explain: bool,
) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        let when = result
            .captured_at
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let caption = if result.caption.is_empty() {
            "(empty)"
        } else {
            result.caption.as_str()
        };

        println!();
        println!(
            "[{}] {}  score={:.3}",
            i + 1,
            result.provider.to_uppercase(),
            result.score
        );
        println!("Title: {}", result.title);
        println!("Date: {}", when);
        println!("Edited Caption: {}", caption);
        if let Some(engine) = result.caption_engine {
            println!("Caption Engine: {}", engine.as_str());
        }
        if !result.caption_failure.is_empty() {
            println!("Caption Note: {}", result.caption_failure);
        }
        println!("Source Link: {}", result.page_url);
        if !result.image_url.is_empty() {
            println!("Preview Image: {}", result.image_url);
        }
        if explain {
            let f = ScoringFeatures::extract(result, prompt, &config.ranking, now);
            println!(
                "Score: overlap={}/{:.3} freshness={:.3} keywords={} (+{:.3}) weight={:.2}",
                f.overlap_terms,
                f.overlap_ratio,
                f.freshness,
                f.keyword_hits,
                f.keyword_term(),
                f.provider_weight
            );
        }
    }
}
