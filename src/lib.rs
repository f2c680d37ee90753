//! # Photodesk
//!
//! Find news photos for a story, caption them, and get those captions into
//! the files you actually download.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Candidates  │──▶│  Ranking    │──▶│  Captions    │──▶ stdout / JSON
//! │ (providers) │   │  (scoring)  │   │ template/LLM │
//! └─────────────┘   └─────────────┘   └──────────────┘
//!
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Pending    │──▶│ Reconcile   │──▶│  Injector    │──▶ Downloads/*.jpg
//! │  records    │   │ (watcher)   │   │  JPEG / PNG  │
//! └─────────────┘   └─────────────┘   └──────────────┘
//! ```
//!
//! Pure logic (tokenizer, scoring, caption protocol, matching) lives in the
//! `photodesk-core` crate. This crate adds configuration, persistence, the
//! LLM transport, file scanning, and the CLI/HTTP surfaces.
//!
//! ## Quick Start
//!
//! ```bash
//! pdesk search "wildfire smoke downtown" --candidates scraped.json
//! pdesk pending add --page-url https://www.gettyimages.com/detail/news-photo/2261576047 \
//!     --title "Wildfire smoke covers downtown" --caption "Smoke drifts over the skyline"
//! pdesk watch
//! pdesk serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`candidates`] | JSON-file candidate source |
//! | [`search`] | Ranking and caption command |
//! | [`llm`] | OpenAI Responses API client |
//! | [`pending`] | Pending caption records |
//! | [`state`] | Processed-file ledger persistence |
//! | [`inject`] | JPEG/PNG caption injection |
//! | [`watcher`] | Downloads reconciliation loop |
//! | [`server`] | Caption rewrite HTTP API |
//! | [`fsutil`] | Atomic file writes |

pub mod candidates;
pub mod config;
pub mod fsutil;
pub mod inject;
pub mod llm;
pub mod pending;
pub mod search;
pub mod server;
pub mod state;
pub mod watcher;
