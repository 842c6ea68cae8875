//! Engine configuration surface (§6).
//!
//! The engine never reads a config file itself — a front end loads
//! `.repomind.toml` (or whatever it likes) and hands the engine an already
//! parsed [`EngineConfig`]. This mirrors the source project's split between
//! its `init`/CLI config loading and the `ScanConfig` it ultimately builds.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

fn default_extensions() -> HashSet<String> {
    [
        "rs", "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "pyi", "go", "c", "h", "cpp", "cc",
        "cxx", "hpp", "hh", "hxx", "java",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_file_bytes() -> u64 {
    512 * 1024
}

fn default_map_tokens() -> usize {
    50_000
}

fn default_workers() -> usize {
    0 // 0 means "use available parallelism", resolved at engine construction
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    pub enabled: bool,
    pub threshold: f64,
    pub strategies: Vec<String>,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 50.0,
            strategies: vec![
                "prefix".into(),
                "substring".into(),
                "levenshtein".into(),
                "word".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    pub enabled: bool,
    pub threshold: f64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self { enabled: true, threshold: 0.6 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerWeights {
    pub relevance: f64,
    pub centrality: f64,
    pub context_affinity: f64,
    pub kind_prior: f64,
}

impl Default for RankerWeights {
    fn default() -> Self {
        Self { relevance: 0.40, centrality: 0.30, context_affinity: 0.20, kind_prior: 0.10 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralityWeights {
    pub in_degree: f64,
    pub out_degree: f64,
    pub betweenness: f64,
    pub pagerank: f64,
}

impl Default for CentralityWeights {
    fn default() -> Self {
        Self { in_degree: 0.25, out_degree: 0.15, betweenness: 0.30, pagerank: 0.30 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub max_nodes: usize,
    pub fanout: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { max_depth: 4, max_nodes: 500, fanout: 10 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 4096, ttl_seconds: 300 }
    }
}

/// Top-level configuration accepted by the engine, per §6's option table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(default = "default_extensions")]
    pub supported_extensions: HashSet<String>,
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_map_tokens")]
    pub map_tokens: usize,
    pub fuzzy: FuzzyConfig,
    pub semantic: SemanticConfig,
    pub hybrid_alpha: f64,
    pub ranker_weights: RankerWeights,
    pub centrality_weights: CentralityWeights,
    pub tree: TreeConfig,
    pub cache: CacheConfig,
    #[serde(default = "default_workers")]
    pub workers: usize,
    pub session_dir: Option<PathBuf>,
    /// Radius `D` used by `context_affinity` (§4.8), in graph hops.
    pub context_radius: usize,
    /// τ_fuzzy / τ_sem used by entrypoint discovery (§4.9).
    pub entrypoint_fuzzy_threshold: f64,
    pub entrypoint_semantic_threshold: f64,
    pub min_cluster_size: usize,
    /// Lock-wait timeout for the session store (§4.11).
    pub session_lock_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            supported_extensions: default_extensions(),
            ignore_patterns: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
            map_tokens: default_map_tokens(),
            fuzzy: FuzzyConfig::default(),
            semantic: SemanticConfig::default(),
            hybrid_alpha: 0.5,
            ranker_weights: RankerWeights::default(),
            centrality_weights: CentralityWeights::default(),
            tree: TreeConfig::default(),
            cache: CacheConfig::default(),
            workers: default_workers(),
            session_dir: None,
            context_radius: 4,
            entrypoint_fuzzy_threshold: 0.7,
            entrypoint_semantic_threshold: 0.6,
            min_cluster_size: 2,
            session_lock_timeout_ms: 5_000,
        }
    }
}

impl EngineConfig {
    /// Parse from TOML text. The engine doesn't read files itself (§1's
    /// "configuration file loading" is a front-end concern) but exposes this
    /// so a front end doesn't need to hand-roll the same `toml` plumbing.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
