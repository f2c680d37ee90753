//! # photodesk core
//!
//! Pure logic for photodesk: text tokenization, candidate scoring and
//! ranking, caption decisions, and reconciliation of downloaded files
//! against pending caption records.
//!
//! This crate performs no filesystem or network I/O. External work
//! (fetching candidates, calling an LLM, rewriting image bytes) is reached
//! through the collaborator traits [`provider::ProviderSearch`],
//! [`caption::LlmClient`], and [`reconcile::MetadataInjector`], which the
//! application crate implements.

pub mod caption;
pub mod error;
pub mod models;
pub mod provider;
pub mod reconcile;
pub mod scoring;
pub mod state;
pub mod tokenize;
