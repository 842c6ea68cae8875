//! Top-level facade (§6): wires C1-C14 into the operations a front end
//! calls. The engine never touches a config file, a logger's init(), or a
//! process's argv — all of that is the caller's job (§1's out-of-scope
//! list); this module only orchestrates already-configured components.

use crate::ast::extract_tags;
use crate::cache::CacheManager;
use crate::config::EngineConfig;
use crate::critical::extract_critical_lines;
use crate::entrypoints::{cluster_entrypoints, discover_entrypoints};
use crate::error::{EngineError, Result};
use crate::fuzzy::{fuzzy_match, Strategy};
use crate::graph::DependencyGraph;
use crate::hybrid::hybrid_match;
use crate::index::IdentifierIndex;
use crate::rank::{rank_symbols, truncate_to_budget, RankCandidate, RankedSymbol};
use crate::render::{render, NodeDetail, RenderMode, RenderedOutput};
use crate::scan::scan;
use crate::semantic::{default_category_lexicon, SemanticMatcher};
use crate::session::SessionStore;
use crate::tokenizer::{create_tokenizer, Tokenizer};
use crate::tree::{build_tree, expand_area, focus_path, map_tree, prune_area, MapRow};
use crate::types::{Entrypoint, ExplorationSession, ExplorationTree, Tag, TagKind, TreeCluster};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Summary returned by `analyze` (§4.1-§4.4's combined "Project info").
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub files_indexed: usize,
    pub tags_extracted: usize,
    pub edges_built: usize,
    pub cycles_found: usize,
    /// File count keyed by extension (§6 "file-type histogram").
    pub file_type_histogram: BTreeMap<String, usize>,
    /// Definition-tag count keyed by category (§6 "identifier-kind
    /// histogram").
    pub identifier_kind_histogram: BTreeMap<String, usize>,
    /// Wall-clock duration of this `analyze()` call, in milliseconds (§6
    /// "timings"; §C's supplemental "`analyze()` timings" feature).
    pub analyze_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Fuzzy,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub identifier: String,
    pub score: f64,
}

/// The long-lived engine instance a front end constructs once per project
/// root (§6). Holds the current index/graph snapshot plus whatever caches
/// and matchers have been trained against it.
pub struct Engine {
    root: PathBuf,
    config: EngineConfig,
    index: IdentifierIndex,
    graph: DependencyGraph,
    semantic: SemanticMatcher,
    tokenizer: Arc<dyn Tokenizer>,
    search_cache: CacheManager<Vec<SearchResult>>,
    session_store: Option<SessionStore>,
}

impl Engine {
    pub fn new(root: impl Into<PathBuf>, config: EngineConfig) -> Self {
        let session_store = config
            .session_dir
            .clone()
            .map(|dir| SessionStore::new(dir, std::time::Duration::from_millis(config.session_lock_timeout_ms)));
        let tokenizer = create_tokenizer("bpe-heuristic");
        Self {
            root: root.into(),
            search_cache: CacheManager::new(config.cache.max_entries, config.cache.ttl_seconds * 1000),
            session_store,
            semantic: SemanticMatcher::new(default_category_lexicon()),
            index: IdentifierIndex::new(),
            graph: DependencyGraph::default(),
            tokenizer,
            config,
        }
    }

    /// Scans the project, extracts tags from every file (parallel, §4.2,
    /// §5), rebuilds the identifier index, builds the dependency graph, and
    /// trains the semantic matcher (§4.1-§4.6 combined).
    pub fn analyze(&mut self) -> Result<AnalysisSummary> {
        let start = Instant::now();
        let files = scan(&self.root, &self.config.supported_extensions, &self.config.ignore_patterns, self.config.max_file_bytes)?;

        let mut file_type_histogram: BTreeMap<String, usize> = BTreeMap::new();
        for file in &files {
            *file_type_histogram.entry(file.ext.clone()).or_insert(0) += 1;
        }

        use rayon::prelude::*;
        let tags_per_file: Vec<Vec<Tag>> = files
            .par_iter()
            .map(|file| {
                let content = std::fs::read_to_string(&file.abs_path).unwrap_or_default();
                extract_tags(&file.rel_path, &content, &file.ext)
            })
            .collect();

        let all_tags: Vec<Tag> = tags_per_file.into_iter().flatten().collect();
        self.index.rebuild(all_tags);

        let file_names: Vec<String> = files.iter().map(|f| f.rel_path.clone()).collect();
        let mut tags_by_file: HashMap<String, Vec<&Tag>> = HashMap::new();
        for tag in self.index.tags() {
            tags_by_file.entry(tag.file.clone()).or_default().push(tag);
        }
        self.graph = DependencyGraph::build(&file_names, &tags_by_file);

        let identifiers: Vec<&str> = self.index.identifiers();
        self.semantic.learn(identifiers.iter().copied());

        let mut identifier_kind_histogram: BTreeMap<String, usize> = BTreeMap::new();
        for tag in self.index.tags().iter().filter(|t| t.kind == TagKind::Def) {
            let key = format!("{:?}", tag.category).to_lowercase();
            *identifier_kind_histogram.entry(key).or_insert(0) += 1;
        }

        let summary = AnalysisSummary {
            files_indexed: files.len(),
            tags_extracted: self.index.len(),
            edges_built: self.graph.edges().len(),
            cycles_found: self.graph.cycles().len(),
            file_type_histogram,
            identifier_kind_histogram,
            analyze_ms: start.elapsed().as_millis() as u64,
        };
        info!(?summary, "analyze complete");
        Ok(summary)
    }

    fn tags_by_file(&self) -> HashMap<String, Vec<&Tag>> {
        let mut map: HashMap<String, Vec<&Tag>> = HashMap::new();
        for tag in self.index.tags() {
            map.entry(tag.file.clone()).or_default().push(tag);
        }
        map
    }

    /// Runs C5/C6/C7 over the current identifier universe, per `mode`
    /// (§4.5-§4.7). Cached on `(mode, query)` for the configured TTL.
    pub fn search(&self, query: &str, mode: SearchMode) -> Vec<SearchResult> {
        let cache_key = format!("search:{mode:?}:{query}");
        if let Some(cached) = self.search_cache.get(&cache_key) {
            return cached;
        }

        let universe: Vec<&str> = self.index.identifiers();
        let strategies: Vec<Strategy> =
            self.config.fuzzy.strategies.iter().filter_map(|s| Strategy::parse(s)).collect();

        let results: Vec<SearchResult> = match mode {
            SearchMode::Fuzzy => fuzzy_match(query, &universe, self.config.fuzzy.threshold, &strategies)
                .into_iter()
                .map(|(identifier, score)| SearchResult { identifier, score: score / 100.0 })
                .collect(),
            SearchMode::Semantic => self
                .semantic
                .semantic_match(query, &universe, self.config.semantic.threshold)
                .into_iter()
                .map(|(identifier, score)| SearchResult { identifier, score })
                .collect(),
            SearchMode::Hybrid => {
                let fuzzy = fuzzy_match(query, &universe, 0.0, &strategies);
                let semantic = self.semantic.semantic_match(query, &universe, 0.0);
                hybrid_match(
                    &fuzzy,
                    &semantic,
                    self.config.hybrid_alpha,
                    self.config.fuzzy.threshold,
                    self.config.semantic.threshold,
                )
                .into_iter()
                .map(|(identifier, score)| SearchResult { identifier, score })
                .collect()
            }
        };

        self.search_cache.put(&cache_key, results.clone());
        results
    }

    /// Ranks every definition matching `intent` by the composite formula
    /// (§4.8), truncated to `token_budget` (§4.8 "Budget-aware truncation").
    pub fn rank_for_intent(
        &self,
        intent: &str,
        context_files: &BTreeSet<String>,
        token_budget: usize,
    ) -> Vec<RankedSymbol> {
        let defs: Vec<&Tag> = self.index.tags().iter().filter(|t| t.kind == TagKind::Def).collect();
        let universe: Vec<&str> = defs.iter().map(|t| t.name.as_str()).collect();
        let strategies: Vec<Strategy> =
            self.config.fuzzy.strategies.iter().filter_map(|s| Strategy::parse(s)).collect();
        let fuzzy = fuzzy_match(intent, &universe, 0.0, &strategies);
        let semantic = self.semantic.semantic_match(intent, &universe, 0.0);
        let relevance: HashMap<String, f64> = hybrid_match(&fuzzy, &semantic, self.config.hybrid_alpha, 0.0, 0.0)
            .into_iter()
            .collect();

        let candidates: Vec<RankCandidate<'_>> = defs
            .iter()
            .map(|tag| RankCandidate { tag, relevance: relevance.get(&tag.name).copied().unwrap_or(0.0) })
            .collect();

        let ranked = rank_symbols(&candidates, &self.graph, context_files, self.config.ranker_weights, self.config.context_radius);
        truncate_to_budget(ranked, self.tokenizer.as_ref(), token_budget)
    }

    /// Discovers and clusters entrypoints for the current index (§4.9).
    pub fn discover(&self) -> Vec<TreeCluster> {
        let tags: Vec<&Tag> = self.index.tags().iter().collect();
        let entrypoints = discover_entrypoints(&tags, &self.semantic, &self.config);
        cluster_entrypoints(entrypoints, self.config.min_cluster_size)
    }

    /// Builds a fresh exploration tree for `entrypoint` inside `cluster` and
    /// stores it on `session` (§4.10's "Build" combined with §4.11 write
    /// path; the caller is expected to `save_session` afterward).
    pub fn build_tree_for(&self, cluster: &TreeCluster, entrypoint: &Entrypoint) -> ExplorationTree {
        let tree_id = format!("{}_{}", cluster.context_name, entrypoint.identifier);
        build_tree(tree_id, entrypoint, cluster.context_name.clone(), cluster.confidence, self.config.tree, now_ms())
    }

    /// Expands every node in `tree` whose identifier or file path contains
    /// `area` (case-insensitive), per §4.10.
    pub fn expand(&self, tree: &mut ExplorationTree, area: &str) -> Result<usize> {
        let tags_by_file = self.tags_by_file();
        expand_area(tree, area, &self.graph, &tags_by_file, self.config.tree.fanout, now_ms())
    }

    /// Prunes every node in `tree` whose identifier or file path contains
    /// `area` (case-insensitive), per §4.10.
    pub fn prune(&self, tree: &mut ExplorationTree, area: &str) -> bool {
        prune_area(tree, area, now_ms())
    }

    pub fn focus(&self, tree: &ExplorationTree, identifier: &str, location: &str) -> Result<String> {
        focus_path(tree, location, identifier)
    }

    pub fn map(&self, tree: &ExplorationTree) -> Vec<MapRow> {
        map_tree(tree)
    }

    /// Renders `tree` within `token_budget` (§4.12-§4.13 combined): pulls
    /// each visible node's signature and critical lines from the current
    /// index/AST, then hands off to the formatter.
    pub fn render_tree(&self, tree: &ExplorationTree, intent_categories: &[String], token_budget: usize, mode: RenderMode) -> RenderedOutput {
        let mut details: HashMap<(String, String), NodeDetail> = HashMap::new();
        for row in map_tree(tree) {
            let Some(file) = row.location.split(':').next() else { continue };
            let signature = self
                .index
                .lookup(&row.identifier)
                .into_iter()
                .find(|t| t.file == file && t.kind == TagKind::Def)
                .and_then(|t| t.signature.clone());

            let content = std::fs::read_to_string(self.root.join(file)).unwrap_or_default();
            let ext = Path::new(file).extension().and_then(|e| e.to_str()).unwrap_or("");
            let critical_lines = if content.is_empty() {
                Vec::new()
            } else {
                extract_critical_lines(&content, ext, row.depth.max(1) as u32, 0.5, 3, intent_categories)
            };
            let categories = self.semantic.categories(&row.identifier, 3);

            details.insert((row.identifier, row.location), NodeDetail { signature, critical_lines, categories });
        }
        render(tree, &details, self.tokenizer.as_ref(), token_budget, mode)
    }

    pub fn impact(&self, changed: &BTreeSet<String>, depth: usize) -> (BTreeSet<String>, f64) {
        self.graph.impact(changed, depth)
    }

    pub fn centrality(&self) -> HashMap<String, f64> {
        self.graph.centrality(self.config.centrality_weights)
    }

    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        self.graph.cycles()
    }

    fn session_store(&self) -> Result<&SessionStore> {
        self.session_store
            .as_ref()
            .ok_or_else(|| EngineError::InvalidInput("no session_dir configured".to_string()))
    }

    /// Loads a session, reconstructing every tree's parent back-references
    /// (§6, §9: not persisted, rebuilt on load).
    pub fn load_session(&self, session_id: &str) -> Result<ExplorationSession> {
        let mut session = self.session_store()?.load(session_id)?;
        for tree in session.trees.values_mut() {
            tree.root.relink_parents();
        }
        Ok(session)
    }

    /// Creates a new, empty session rooted at the engine's project path
    /// (§4.11 "Create"). Does not persist it; call `save_session` to write.
    pub fn new_session(&self, session_id: &str) -> Result<ExplorationSession> {
        if !crate::types::is_valid_session_id(session_id) {
            return Err(EngineError::InvalidInput(format!("invalid session id: {session_id}")));
        }
        Ok(ExplorationSession::new(session_id.to_string(), self.root.display().to_string(), now_ms()))
    }

    pub fn save_session(&self, session: &ExplorationSession) -> Result<()> {
        self.session_store()?.save(session)
    }

    pub fn session_list(&self) -> Result<Vec<String>> {
        self.session_store()?.list()
    }

    pub fn session_delete(&self, session_id: &str) -> Result<()> {
        self.session_store()?.delete(session_id)
    }

    /// Sanitizes `intent` into a session id when the caller doesn't supply
    /// one, in the absence of a date (the engine core never calls the
    /// system clock for session naming; see `suggest_session_id` for the
    /// date-aware, front-end-facing convention).
    fn default_session_id(&self, intent: &str) -> String {
        let slug: String =
            intent.chars().map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' }).collect();
        let slug = slug.trim_matches('_');
        let mut id = format!("auto_{slug}_{}", now_ms());
        id.truncate(64);
        id.trim_end_matches('_').to_string()
    }

    /// Discovers/clusters entrypoints for `intent`, builds one tree per
    /// cluster rooted at its top entrypoint, and stores them all into a
    /// session (creating one if `session_id` names none, or generating an
    /// id if `session_id` is `None`) — §6 "`explore(intent, project_root,
    /// session_id?)`". Persists the session before returning it.
    pub fn explore(&self, intent: &str, session_id: Option<String>) -> Result<ExplorationSession> {
        let session_id = session_id.unwrap_or_else(|| self.default_session_id(intent));
        if !crate::types::is_valid_session_id(&session_id) {
            return Err(EngineError::InvalidInput(format!("invalid session id: {session_id}")));
        }

        let mut session = match self.load_session(&session_id) {
            Ok(existing) => existing,
            Err(_) => ExplorationSession::new(session_id.clone(), self.root.display().to_string(), now_ms()),
        };

        let clusters = self.discover();
        let mut first_tree_id = None;
        for cluster in &clusters {
            let Some(entrypoint) = cluster.entrypoints.first() else { continue };
            let tree = self.build_tree_for(cluster, entrypoint);
            if first_tree_id.is_none() {
                first_tree_id = Some(tree.tree_id.clone());
            }
            session.trees.insert(tree.tree_id.clone(), tree);
        }
        if session.current_focus.is_none() {
            session.current_focus = first_tree_id;
        }
        session.last_activity_ms = now_ms();

        self.save_session(&session)?;
        Ok(session)
    }

    fn resolve_tree_id(&self, session: &ExplorationSession, tree_id: Option<&str>) -> Result<String> {
        tree_id
            .map(str::to_string)
            .or_else(|| session.current_focus.clone())
            .ok_or_else(|| EngineError::InvalidInput("no tree_id given and session has no current focus".to_string()))
    }

    /// Sets `session`'s current focus to `tree_id` (§4.10/§6 "`focus(session,
    /// tree_id)`"), failing if that tree doesn't exist in the session.
    pub fn focus_session(&self, session_id: &str, tree_id: &str) -> Result<ExplorationSession> {
        let mut session = self.load_session(session_id)?;
        if !session.trees.contains_key(tree_id) {
            return Err(EngineError::NotFound(format!("tree {tree_id} not found in session {session_id}")));
        }
        session.current_focus = Some(tree_id.to_string());
        session.last_activity_ms = now_ms();
        self.save_session(&session)?;
        Ok(session)
    }

    /// Expands `area` within `tree_id` (or the session's current focus if
    /// omitted) and persists the result (§6 "`expand(session_id, ...)`").
    pub fn expand_session(&self, session_id: &str, area: &str, tree_id: Option<&str>) -> Result<(ExplorationSession, usize)> {
        let mut session = self.load_session(session_id)?;
        let tree_id = self.resolve_tree_id(&session, tree_id)?;
        let tags_by_file = self.tags_by_file();
        let tree = session
            .trees
            .get_mut(&tree_id)
            .ok_or_else(|| EngineError::NotFound(format!("tree {tree_id} not found in session {session_id}")))?;
        let added = expand_area(tree, area, &self.graph, &tags_by_file, self.config.tree.fanout, now_ms())?;
        session.last_activity_ms = now_ms();
        self.save_session(&session)?;
        Ok((session, added))
    }

    /// Prunes `area` within `tree_id` (or the session's current focus if
    /// omitted) and persists the result (§6 "`prune(session_id, ...)`").
    pub fn prune_session(&self, session_id: &str, area: &str, tree_id: Option<&str>) -> Result<(ExplorationSession, bool)> {
        let mut session = self.load_session(session_id)?;
        let tree_id = self.resolve_tree_id(&session, tree_id)?;
        let tree = session
            .trees
            .get_mut(&tree_id)
            .ok_or_else(|| EngineError::NotFound(format!("tree {tree_id} not found in session {session_id}")))?;
        let pruned = prune_area(tree, area, now_ms());
        session.last_activity_ms = now_ms();
        self.save_session(&session)?;
        Ok((session, pruned))
    }

    /// Flattens `tree_id` (or the session's current focus if omitted) for
    /// rendering (§6 "`map(session_id, ...)`").
    pub fn map_session(&self, session_id: &str, tree_id: Option<&str>) -> Result<Vec<MapRow>> {
        let session = self.load_session(session_id)?;
        let tree_id = self.resolve_tree_id(&session, tree_id)?;
        let tree = session
            .trees
            .get(&tree_id)
            .ok_or_else(|| EngineError::NotFound(format!("tree {tree_id} not found in session {session_id}")))?;
        Ok(map_tree(tree))
    }
}

/// Suggests a session id of the form `MMDD_<query>` (§9 "Session naming
/// convention"), sanitizing `query` down to `is_valid_session_id`'s
/// alphabet. `today` is injected (month, day) rather than read from the
/// clock, since the engine core never calls the system clock for anything
/// but cache/tree timestamps.
pub fn suggest_session_id(query: &str, today: (u32, u32)) -> String {
    let (month, day) = today;
    let slug: String = query
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = slug.trim_matches('_');
    let mut id = format!("{month:02}{day:02}_{slug}");
    id.truncate(64);
    id.trim_end_matches('_').to_string()
}
