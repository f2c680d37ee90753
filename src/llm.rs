//! OpenAI Responses API client for caption rewrites.
//!
//! Implements [`LlmClient`] on top of a blocking `reqwest` client. The API
//! key is read from the environment variable named by
//! `llm.api_key_env` (default `OPENAI_API_KEY`); it is never read from the
//! config file.
//!
//! Each call is a single `POST {api_base}/v1/responses` bounded by
//! `llm.timeout_secs`. There is no retry here: the caption pipeline's
//! forced-rewrite protocol decides whether a second request is made, and a
//! transport failure ends the decision.

use anyhow::Result;
use serde_json::{json, Value};
use std::time::Duration;

use photodesk_core::caption::LlmClient;
use photodesk_core::error::LlmError;

use crate::config::LlmConfig;

pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    api_key_env: String,
    max_output_tokens: u32,
}

impl OpenAiClient {
    /// Build a client, reading the API key from the configured variable.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let key = std::env::var(&config.api_key_env).ok();
        Self::with_key(config, key)
    }

    pub fn with_key(config: &LlmConfig, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/v1/responses", config.api_base.trim_end_matches('/')),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_key_env: config.api_key_env.clone(),
            max_output_tokens: config.max_output_tokens,
        })
    }
}

impl LlmClient for OpenAiClient {
    fn credential_name(&self) -> &str {
        &self.api_key_env
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn rewrite(&self, instructions: &str, prompt: &str, model: &str) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::CredentialMissing(self.api_key_env.clone()))?;

        let body = json!({
            "model": model,
            "input": [
                {"role": "system", "content": instructions},
                {"role": "user", "content": prompt},
            ],
            "max_output_tokens": self.max_output_tokens,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json: Value = response
            .json()
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(extract_response_text(&json))
    }
}

/// Pull the generated text out of a Responses API body.
///
/// Prefers the top-level `output_text` convenience field, else joins every
/// `output[].content[]` item of type `output_text`.
pub fn extract_response_text(json: &Value) -> String {
    if let Some(text) = json.get("output_text").and_then(|t| t.as_str()) {
        if !text.is_empty() {
            return text.to_string();
        }
    }

    let mut chunks: Vec<&str> = Vec::new();
    let outputs = json
        .get("output")
        .and_then(|o| o.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    for item in outputs {
        let contents = item
            .get("content")
            .and_then(|c| c.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        for content in contents {
            if content.get("type").and_then(|t| t.as_str()) != Some("output_text") {
                continue;
            }
            if let Some(text) = content.get("text").and_then(|t| t.as_str()) {
                if !text.is_empty() {
                    chunks.push(text);
                }
            }
        }
    }
    chunks.join(" ").trim().to_string()
}
