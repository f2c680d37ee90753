//! Candidate provider contract.

use anyhow::Result;

use crate::models::Candidate;

/// A source of raw photo candidates for a prompt.
///
/// Implementations return candidates in provider emission order, at most
/// `limit` per upstream provider. Errors are treated by callers as "no
/// candidates".
pub trait ProviderSearch {
    fn name(&self) -> &str;

    fn search(&self, prompt: &str, limit: usize) -> Result<Vec<Candidate>>;
}
