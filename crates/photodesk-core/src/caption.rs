//! Caption decisions: template truncation and LLM rewriting.
//!
//! # Modes
//!
//! - **template**: whitespace-normalise the source caption and truncate it
//!   to `max_words` words with an ellipsis. No network call.
//! - **llm**: ask an [`LlmClient`] for a rewrite. When the client, its
//!   credential, the model, or the instructions are missing, the decision
//!   degrades to the template with a reason naming what is missing.
//!
//! # Forced-rewrite protocol
//!
//! Short factual captions are often echoed back unchanged. The protocol
//! allows exactly one retry with amended instructions:
//!
//! ```text
//! first = rewrite(instructions)
//! first differs from original        → accept, no reason
//! first echoes original              → second = rewrite(instructions + FORCE_REWRITE_RULE)
//!   second differs                   → accept, "forced_rewrite_applied"
//!   second echoes                    → original, "unchanged_by_model"
//! any transport failure              → original, failure text (no further calls)
//! ```
//!
//! Comparison is on [`normalize_for_compare`]: case-folded, whitespace
//! collapsed. An empty response counts as an echo.

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::models::{Candidate, CaptionEngine};
use crate::tokenize::normalize_ws;

pub const REASON_UNCHANGED: &str = "unchanged_by_model";
pub const REASON_FORCED: &str = "forced_rewrite_applied";
pub const ELLIPSIS: &str = "...";

/// Appended to the instructions on the forced retry.
pub const FORCE_REWRITE_RULE: &str =
    "You must rewrite wording and structure. Do not return the original text verbatim.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionMode {
    Template,
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    pub mode: CaptionMode,
    pub instructions: String,
    pub max_words: usize,
    #[serde(alias = "openai_model")]
    pub model: String,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            mode: CaptionMode::Llm,
            instructions: "Write a concise, factual news caption. Keep AP style tone. \
                Avoid speculation, loaded language, and unsupported claims. \
                Include who/what/where/when when known."
                .to_string(),
            max_words: 45,
            model: "gpt-4.1-mini".to_string(),
        }
    }
}

/// Rewrite transport consumed by the caption pipeline.
pub trait LlmClient: Send + Sync {
    /// Name of the credential this client needs (e.g. `OPENAI_API_KEY`).
    fn credential_name(&self) -> &str;

    fn has_credential(&self) -> bool;

    /// Request one rewrite. Returns the raw response text.
    fn rewrite(&self, instructions: &str, prompt: &str, model: &str) -> Result<String, LlmError>;
}

/// Result of running the forced-rewrite protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteOutcome {
    pub caption: String,
    /// Empty, [`REASON_FORCED`], [`REASON_UNCHANGED`], or a failure text.
    pub reason: String,
    /// True when `caption` came from the model.
    pub rewritten: bool,
}

/// Final caption chosen for a candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionDecision {
    pub caption: String,
    pub engine: CaptionEngine,
    pub failure: String,
}

pub fn normalize_for_compare(text: &str) -> String {
    normalize_ws(text).to_lowercase()
}

pub fn forced_instructions(instructions: &str) -> String {
    format!("{}\n{}", instructions, FORCE_REWRITE_RULE)
}

/// Normalise whitespace and cap to `max_words` words.
pub fn template_caption(text: &str, max_words: usize) -> String {
    let normalized = normalize_ws(text);
    let words: Vec<&str> = normalized.split(' ').collect();
    if words.len() <= max_words {
        return normalized;
    }
    let kept = words[..max_words].join(" ");
    format!(
        "{}{}",
        kept.trim_end_matches(&['.', ',', ';', ':'][..]),
        ELLIPSIS
    )
}

/// Run the forced-rewrite protocol against `client`.
///
/// Issues at most two requests.
pub fn rewrite_with_retry(
    client: &dyn LlmClient,
    model: &str,
    instructions: &str,
    user_prompt: &str,
    original: &str,
) -> RewriteOutcome {
    let original = normalize_ws(original);
    let fallback = |reason: String| RewriteOutcome {
        caption: original.clone(),
        reason,
        rewritten: false,
    };
    let original_key = normalize_for_compare(&original);

    let first = match client.rewrite(instructions, user_prompt, model) {
        Ok(text) => normalize_ws(&text),
        Err(e) => return fallback(e.to_string()),
    };
    if !first.is_empty() && normalize_for_compare(&first) != original_key {
        return RewriteOutcome {
            caption: first,
            reason: String::new(),
            rewritten: true,
        };
    }

    let second = match client.rewrite(&forced_instructions(instructions), user_prompt, model) {
        Ok(text) => normalize_ws(&text),
        Err(e) => return fallback(e.to_string()),
    };
    if second.is_empty() || normalize_for_compare(&second) == original_key {
        return fallback(REASON_UNCHANGED.to_string());
    }
    RewriteOutcome {
        caption: second,
        reason: REASON_FORCED.to_string(),
        rewritten: true,
    }
}

/// Prompt sent to the model when captioning a search candidate.
pub fn build_candidate_prompt(candidate: &Candidate, story_prompt: &str, max_words: usize) -> String {
    format!(
        "Story prompt: {}\n\
         Provider: {}\n\
         Title: {}\n\
         Original caption: {}\n\
         \n\
         Rewrite the caption per the instructions.\n\
         Hard constraints:\n\
         - Max {} words.\n\
         - Preserve factual meaning.\n\
         - Output only the rewritten caption.",
        story_prompt, candidate.provider, candidate.title, candidate.raw_caption, max_words
    )
}

/// Caption text a candidate starts from: the raw caption, or the title when
/// there is none.
fn source_text(candidate: &Candidate) -> &str {
    if candidate.raw_caption.trim().is_empty() {
        &candidate.title
    } else {
        &candidate.raw_caption
    }
}

/// Decides captions for ranked candidates under one [`CaptionConfig`].
pub struct CaptionDecisionEngine<'a> {
    config: &'a CaptionConfig,
    client: Option<&'a dyn LlmClient>,
}

impl<'a> CaptionDecisionEngine<'a> {
    pub fn new(config: &'a CaptionConfig, client: Option<&'a dyn LlmClient>) -> Self {
        Self { config, client }
    }

    /// Check everything LLM mode needs, returning the usable client.
    pub fn llm_available(&self) -> Result<&'a dyn LlmClient, LlmError> {
        let client = self.client.ok_or(LlmError::ClientMissing)?;
        if !client.has_credential() {
            return Err(LlmError::CredentialMissing(
                client.credential_name().to_string(),
            ));
        }
        if self.config.model.trim().is_empty() {
            return Err(LlmError::NotConfigured("caption.model is empty".to_string()));
        }
        if self.config.instructions.trim().is_empty() {
            return Err(LlmError::NotConfigured(
                "caption.instructions is empty".to_string(),
            ));
        }
        Ok(client)
    }

    fn template(&self, candidate: &Candidate) -> String {
        template_caption(source_text(candidate), self.config.max_words)
    }

    pub fn decide(&self, candidate: &Candidate, story_prompt: &str) -> CaptionDecision {
        if self.config.mode == CaptionMode::Template {
            return CaptionDecision {
                caption: self.template(candidate),
                engine: CaptionEngine::Template,
                failure: String::new(),
            };
        }

        let client = match self.llm_available() {
            Ok(client) => client,
            Err(e) => {
                return CaptionDecision {
                    caption: self.template(candidate),
                    engine: CaptionEngine::Template,
                    failure: e.to_string(),
                }
            }
        };

        let user_prompt = build_candidate_prompt(candidate, story_prompt, self.config.max_words);
        let outcome = rewrite_with_retry(
            client,
            &self.config.model,
            &self.config.instructions,
            &user_prompt,
            source_text(candidate),
        );
        CaptionDecision {
            caption: outcome.caption,
            engine: if outcome.rewritten {
                CaptionEngine::Llm
            } else {
                CaptionEngine::Template
            },
            failure: outcome.reason,
        }
    }

    /// Decide and store captions on every candidate, in order.
    pub fn apply(&self, candidates: &mut [Candidate], story_prompt: &str) {
        for candidate in candidates.iter_mut() {
            let decision = self.decide(candidate, story_prompt);
            candidate.caption = decision.caption;
            candidate.caption_engine = Some(decision.engine);
            candidate.caption_failure = decision.failure;
        }
    }
}
