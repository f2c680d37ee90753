//! Error taxonomy for LLM rewrite transports.
//!
//! These never escape the caption pipeline as hard failures. Their
//! `Display` text becomes the human-readable failure reason recorded on a
//! degraded caption decision.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LlmError {
    /// No rewrite client was wired in.
    #[error("LLM client is not configured")]
    ClientMissing,

    /// Model or instructions are empty.
    #[error("LLM rewrite is not configured: {0}")]
    NotConfigured(String),

    /// The client exists but its credential is absent.
    #[error("{0} is not set")]
    CredentialMissing(String),

    /// Network or transport failure.
    #[error("LLM request failed: {0}")]
    Request(String),

    /// Non-success HTTP status from the rewrite endpoint.
    #[error("LLM request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be interpreted.
    #[error("LLM returned an invalid response: {0}")]
    InvalidResponse(String),
}
