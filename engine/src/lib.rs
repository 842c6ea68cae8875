//! Repository-intelligence engine: parses a source tree into a symbol
//! index, a dependency graph with centrality/impact analytics, fuzzy/
//! semantic/hybrid identifier search, intent-aware ranking, entrypoint
//! discovery and clustering, persistent hierarchical exploration trees, and
//! token-budgeted rendering for an LLM-facing front end.
//!
//! This crate never loads a config file, never configures logging, never
//! starts a server, and never talks to an LLM vendor (§1) — it exposes a
//! plain Rust API (see [`engine::Engine`]) for a thin front end to call.

pub mod ast;
pub mod cache;
pub mod config;
pub mod critical;
pub mod engine;
pub mod entrypoints;
pub mod error;
pub mod fuzzy;
pub mod graph;
pub mod hybrid;
pub mod index;
pub mod rank;
pub mod render;
pub mod scan;
pub mod semantic;
pub mod session;
pub mod tokenizer;
pub mod tree;
pub mod types;

pub use config::EngineConfig;
pub use engine::{suggest_session_id, AnalysisSummary, Engine, SearchMode, SearchResult};
pub use error::{EngineError, ErrorKind, Result};
