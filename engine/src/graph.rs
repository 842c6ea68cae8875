//! Dependency Graph (C4, §4.4).
//!
//! Builds file→file edges from the tag stream (imports, calls, and type
//! references folded into an `inheritance` edge kind per §3's three edge
//! kinds), then layers centrality, impact, and cycle analytics on top.
//!
//! Grounded on the source project's `graph.rs` (symbol-location lookup,
//! closest-by-shared-directory-prefix import resolution) for the edge build,
//! and on `Loctree`'s `analyzer/cycles.rs` (Tarjan's SCC over a normalized
//! adjacency map) for `cycles()`. Centrality's betweenness/PageRank terms
//! have no source-project counterpart (it only ranks with PageRank over a
//! symbol-mention graph) and are implemented directly from their standard
//! definitions (Brandes' algorithm, power-iteration PageRank).

use crate::config::CentralityWeights;
use crate::types::{Tag, TagCategory, TagKind};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EdgeKind {
    Import,
    Call,
    Inheritance,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub weight: u32,
}

/// Directed file→file dependency graph (§3 "Dependency graph"). Node set is
/// always a subset of the indexed files; dangling edges to unresolved
/// imports are dropped before construction (§3 invariant).
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    node_index: HashMap<String, usize>,
    edges: Vec<Edge>,
    by_source: HashMap<String, Vec<usize>>,
    by_target: HashMap<String, Vec<usize>>,
}

/// Attempts to resolve an import tag's raw module string to one of the
/// project's indexed files. Tries, in order: exact relative-path match,
/// suffix match against `module/path` segments, then a last-segment
/// (module basename) match against file stems — preferring the candidate
/// sharing the longest directory prefix with `from_file` when multiple
/// files share a basename.
fn resolve_import<'a>(raw_module: &str, from_file: &str, files: &'a [String]) -> Option<&'a str> {
    let normalized = raw_module
        .trim_matches(|c| c == '"' || c == '\'')
        .replace("::", "/")
        .replace('.', "/");
    let normalized = normalized.trim_start_matches('/');

    if let Some(exact) = files.iter().find(|f| f.as_str() == normalized) {
        return Some(exact);
    }

    let stem = normalized.rsplit('/').next().unwrap_or(normalized);
    let mut candidates: Vec<&str> = files
        .iter()
        .filter(|f| {
            let file_stem = std::path::Path::new(f.as_str())
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("");
            file_stem == stem || f.ends_with(&format!("/{stem}.rs")) || f.as_str() == format!("{stem}.rs")
        })
        .map(String::as_str)
        .collect();

    if candidates.is_empty() {
        return None;
    }
    if candidates.len() == 1 {
        return Some(candidates[0]);
    }

    candidates.sort_by_key(|c| std::cmp::Reverse(shared_prefix_len(from_file, c)));
    Some(candidates[0])
}

fn shared_prefix_len(a: &str, b: &str) -> usize {
    let a_dirs: Vec<&str> = a.rsplit_once('/').map(|(d, _)| d).unwrap_or("").split('/').collect();
    let b_dirs: Vec<&str> = b.rsplit_once('/').map(|(d, _)| d).unwrap_or("").split('/').collect();
    a_dirs.iter().zip(b_dirs.iter()).take_while(|(x, y)| x == y).count()
}

impl DependencyGraph {
    /// Builds the graph from the full indexed file list and their tags.
    /// Never fails for content reasons (§4.4 "Failure semantics"); a file
    /// with no usable tags simply contributes no edges.
    pub fn build(files: &[String], tags_by_file: &HashMap<String, Vec<&Tag>>) -> Self {
        let nodes: Vec<String> = files.to_vec();
        let node_index: HashMap<String, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect();

        // def-name -> defining file, for resolving call/type refs to a target file.
        let mut def_location: HashMap<&str, &str> = HashMap::new();
        for (file, tags) in tags_by_file {
            for tag in tags {
                if tag.kind == TagKind::Def {
                    def_location.entry(tag.name.as_str()).or_insert(file.as_str());
                }
            }
        }

        let mut weights: BTreeMap<(String, String, EdgeKind), u32> = BTreeMap::new();

        for (from_file, tags) in tags_by_file {
            if !node_index.contains_key(from_file.as_str()) {
                continue;
            }
            for tag in tags {
                if tag.kind != TagKind::Ref {
                    continue;
                }
                let target = match tag.category {
                    TagCategory::Import => resolve_import(&tag.name, from_file, &nodes).map(|s| (s, EdgeKind::Import)),
                    TagCategory::Function => {
                        def_location.get(tag.name.as_str()).map(|&f| (f, EdgeKind::Call))
                    }
                    TagCategory::Class => {
                        def_location.get(tag.name.as_str()).map(|&f| (f, EdgeKind::Inheritance))
                    }
                    _ => None,
                };
                let Some((to_file, kind)) = target else { continue };
                if to_file == from_file.as_str() {
                    continue;
                }
                *weights.entry((from_file.clone(), to_file.to_string(), kind)).or_insert(0) += 1;
            }
        }

        let mut edges = Vec::with_capacity(weights.len());
        let mut by_source: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_target: HashMap<String, Vec<usize>> = HashMap::new();
        for ((from, to, kind), weight) in weights {
            let idx = edges.len();
            by_source.entry(from.clone()).or_default().push(idx);
            by_target.entry(to.clone()).or_default().push(idx);
            edges.push(Edge { from, to, kind, weight });
        }

        Self { nodes, node_index, edges, by_source, by_target }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edges_from(&self, file: &str) -> impl Iterator<Item = &Edge> {
        self.by_source.get(file).into_iter().flatten().map(move |&i| &self.edges[i])
    }

    pub fn edges_to(&self, file: &str) -> impl Iterator<Item = &Edge> {
        self.by_target.get(file).into_iter().flatten().map(move |&i| &self.edges[i])
    }

    fn adjacency(&self) -> HashMap<&str, Vec<&str>> {
        let mut adj: HashMap<&str, Vec<&str>> = self.nodes.iter().map(|n| (n.as_str(), Vec::new())).collect();
        for edge in &self.edges {
            adj.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        }
        adj
    }

    /// Composite centrality vector (§3), normalized to `[0, 1]` per node.
    /// Tie-breaking for any downstream sort: higher in-degree first, then
    /// lexicographic path order — callers implementing that tie-break should
    /// read `in_degree` back off before falling through to path comparison.
    pub fn centrality(&self, weights: CentralityWeights) -> HashMap<String, f64> {
        let n = self.nodes.len();
        if n == 0 {
            return HashMap::new();
        }
        let in_deg = self.in_degrees();
        let out_deg = self.out_degrees();
        let betweenness = self.betweenness();
        let pagerank = self.pagerank(0.85, 100);

        let max_in = in_deg.values().cloned().fold(0.0_f64, f64::max).max(1.0);
        let max_out = out_deg.values().cloned().fold(0.0_f64, f64::max).max(1.0);
        let max_between = betweenness.values().cloned().fold(0.0_f64, f64::max).max(1.0);
        let max_pr = pagerank.values().cloned().fold(0.0_f64, f64::max).max(f64::MIN_POSITIVE);

        self.nodes
            .iter()
            .map(|node| {
                let score = weights.in_degree * (in_deg.get(node).copied().unwrap_or(0.0) / max_in)
                    + weights.out_degree * (out_deg.get(node).copied().unwrap_or(0.0) / max_out)
                    + weights.betweenness * (betweenness.get(node).copied().unwrap_or(0.0) / max_between)
                    + weights.pagerank * (pagerank.get(node).copied().unwrap_or(0.0) / max_pr);
                (node.clone(), score.clamp(0.0, 1.0))
            })
            .collect()
    }

    pub fn in_degrees(&self) -> HashMap<String, f64> {
        let mut deg: HashMap<String, f64> = self.nodes.iter().map(|n| (n.clone(), 0.0)).collect();
        for edge in &self.edges {
            *deg.entry(edge.to.clone()).or_insert(0.0) += 1.0;
        }
        deg
    }

    pub fn out_degrees(&self) -> HashMap<String, f64> {
        let mut deg: HashMap<String, f64> = self.nodes.iter().map(|n| (n.clone(), 0.0)).collect();
        for edge in &self.edges {
            *deg.entry(edge.from.clone()).or_insert(0.0) += 1.0;
        }
        deg
    }

    /// Brandes' algorithm for unweighted shortest-path betweenness centrality.
    fn betweenness(&self) -> HashMap<String, f64> {
        let adj = self.adjacency();
        let mut centrality: HashMap<&str, f64> = self.nodes.iter().map(|n| (n.as_str(), 0.0)).collect();

        for s in &self.nodes {
            let s = s.as_str();
            let mut stack = Vec::new();
            let mut preds: HashMap<&str, Vec<&str>> = HashMap::new();
            let mut sigma: HashMap<&str, f64> = self.nodes.iter().map(|n| (n.as_str(), 0.0)).collect();
            let mut dist: HashMap<&str, i64> = self.nodes.iter().map(|n| (n.as_str(), -1)).collect();
            sigma.insert(s, 1.0);
            dist.insert(s, 0);
            let mut queue = VecDeque::new();
            queue.push_back(s);

            while let Some(v) = queue.pop_front() {
                stack.push(v);
                for &w in adj.get(v).into_iter().flatten() {
                    if dist[w] < 0 {
                        dist.insert(w, dist[v] + 1);
                        queue.push_back(w);
                    }
                    if dist[w] == dist[v] + 1 {
                        *sigma.get_mut(w).unwrap() += sigma[v];
                        preds.entry(w).or_default().push(v);
                    }
                }
            }

            let mut delta: HashMap<&str, f64> = self.nodes.iter().map(|n| (n.as_str(), 0.0)).collect();
            while let Some(w) = stack.pop() {
                for &v in preds.get(w).into_iter().flatten() {
                    delta.insert(v, delta[v] + (sigma[v] / sigma[w]) * (1.0 + delta[w]));
                }
                if w != s {
                    *centrality.get_mut(w).unwrap() += delta[w];
                }
            }
        }

        centrality.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn pagerank(&self, damping: f64, iterations: usize) -> HashMap<String, f64> {
        let n = self.nodes.len();
        if n == 0 {
            return HashMap::new();
        }
        let adj = self.adjacency();
        let mut rank: HashMap<&str, f64> = self.nodes.iter().map(|node| (node.as_str(), 1.0 / n as f64)).collect();

        for _ in 0..iterations {
            let mut next: HashMap<&str, f64> =
                self.nodes.iter().map(|node| (node.as_str(), (1.0 - damping) / n as f64)).collect();
            for node in &self.nodes {
                let node = node.as_str();
                let out_links = adj.get(node).map(|v| v.len()).unwrap_or(0);
                if out_links == 0 {
                    // Dangling mass is redistributed uniformly.
                    let share = damping * rank[node] / n as f64;
                    for v in next.values_mut() {
                        *v += share;
                    }
                    continue;
                }
                let share = damping * rank[node] / out_links as f64;
                for &target in &adj[node] {
                    *next.get_mut(target).unwrap() += share;
                }
            }
            rank = next;
        }
        rank.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    /// BFS over the reverse edge set from `changed`, up to `depth` hops
    /// (§4.4 "Impact"). `risk = min(1, affected/total + cycle_penalty)`
    /// where `cycle_penalty` is `0.2` if any affected node lies on a cycle.
    pub fn impact(&self, changed: &BTreeSet<String>, depth: usize) -> (BTreeSet<String>, f64) {
        let mut affected: BTreeSet<String> = changed.clone();
        let mut frontier: Vec<String> = changed.iter().cloned().collect();

        for _ in 0..depth {
            let mut next_frontier = Vec::new();
            for node in &frontier {
                for edge in self.edges_to(node) {
                    if affected.insert(edge.from.clone()) {
                        next_frontier.push(edge.from.clone());
                    }
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        let cycle_nodes: BTreeSet<String> = self.cycles().into_iter().flatten().collect();
        let cycle_penalty = if affected.iter().any(|n| cycle_nodes.contains(n)) { 0.2 } else { 0.0 };
        let total = self.nodes.len().max(1);
        let risk = (affected.len() as f64 / total as f64 + cycle_penalty).min(1.0);
        (affected, risk)
    }

    /// Tarjan's SCC algorithm; returns SCCs of size >= 2 plus any self-loops
    /// (§4.4 "Cycles"), matching `cycles()`'s `"exactly the non-trivial
    /// SCCs"` invariant (§8).
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let adj = self.adjacency();
        let mut sorted_nodes: Vec<&str> = self.nodes.iter().map(String::as_str).collect();
        sorted_nodes.sort_unstable();

        let mut tarjan = Tarjan::new();
        for &node in &sorted_nodes {
            if !tarjan.indices.contains_key(node) {
                tarjan.strongconnect(node, &adj);
            }
        }

        let self_loops: BTreeSet<&str> = self
            .edges
            .iter()
            .filter(|e| e.from == e.to)
            .map(|e| e.from.as_str())
            .collect();

        tarjan
            .sccs
            .into_iter()
            .filter(|scc| scc.len() >= 2 || (scc.len() == 1 && self_loops.contains(scc[0].as_str())))
            .map(|scc| {
                let mut scc: Vec<String> = scc.into_iter().map(String::from).collect();
                scc.sort();
                scc
            })
            .collect()
    }
}

struct Tarjan<'a> {
    index_counter: usize,
    indices: HashMap<&'a str, usize>,
    lowlinks: HashMap<&'a str, usize>,
    on_stack: HashMap<&'a str, bool>,
    stack: Vec<&'a str>,
    sccs: Vec<Vec<&'a str>>,
}

impl<'a> Tarjan<'a> {
    fn new() -> Self {
        Self {
            index_counter: 0,
            indices: HashMap::new(),
            lowlinks: HashMap::new(),
            on_stack: HashMap::new(),
            stack: Vec::new(),
            sccs: Vec::new(),
        }
    }

    fn strongconnect(&mut self, v: &'a str, adj: &HashMap<&'a str, Vec<&'a str>>) {
        self.indices.insert(v, self.index_counter);
        self.lowlinks.insert(v, self.index_counter);
        self.index_counter += 1;
        self.stack.push(v);
        self.on_stack.insert(v, true);

        for &w in adj.get(v).into_iter().flatten() {
            if !self.indices.contains_key(w) {
                self.strongconnect(w, adj);
                let w_low = self.lowlinks[w];
                let v_low = self.lowlinks[v];
                self.lowlinks.insert(v, v_low.min(w_low));
            } else if *self.on_stack.get(w).unwrap_or(&false) {
                let w_idx = self.indices[w];
                let v_low = self.lowlinks[v];
                self.lowlinks.insert(v, v_low.min(w_idx));
            }
        }

        if self.lowlinks[v] == self.indices[v] {
            let mut scc = Vec::new();
            loop {
                let w = self.stack.pop().unwrap();
                self.on_stack.insert(w, false);
                scc.push(w);
                if w == v {
                    break;
                }
            }
            self.sccs.push(scc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TagCategory, TagKind};

    fn ref_tag(name: &str, category: TagCategory) -> Tag {
        Tag {
            name: name.to_string(),
            kind: TagKind::Ref,
            category,
            file: String::new(),
            line: 1,
            signature: None,
            language: None,
        }
    }

    fn def_tag(name: &str, category: TagCategory) -> Tag {
        Tag { kind: TagKind::Def, ..ref_tag(name, category) }
    }

    #[test]
    fn cycle_detection_finds_three_node_scc() {
        let files = vec!["a.rs".to_string(), "b.rs".to_string(), "c.rs".to_string(), "d.rs".to_string()];
        let a_def = def_tag("a_fn", TagCategory::Function);
        let b_def = def_tag("b_fn", TagCategory::Function);
        let c_def = def_tag("c_fn", TagCategory::Function);
        let mut tags_by_file: HashMap<String, Vec<&Tag>> = HashMap::new();
        let a_call_b = ref_tag("b_fn", TagCategory::Function);
        let b_call_c = ref_tag("c_fn", TagCategory::Function);
        let c_call_a = ref_tag("a_fn", TagCategory::Function);
        let d_call_a = ref_tag("a_fn", TagCategory::Function);
        tags_by_file.insert("a.rs".into(), vec![&a_def, &a_call_b]);
        tags_by_file.insert("b.rs".into(), vec![&b_def, &b_call_c]);
        tags_by_file.insert("c.rs".into(), vec![&c_def, &c_call_a]);
        tags_by_file.insert("d.rs".into(), vec![&d_call_a]);

        let graph = DependencyGraph::build(&files, &tags_by_file);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0], vec!["a.rs".to_string(), "b.rs".to_string(), "c.rs".to_string()]);

        let (affected, risk) = graph.impact(&BTreeSet::from(["a.rs".to_string()]), 2);
        for f in ["a.rs", "b.rs", "c.rs", "d.rs"] {
            assert!(affected.contains(f), "{f} should be affected");
        }
        assert!(risk >= 0.2);
    }

    #[test]
    fn no_edges_to_unindexed_files() {
        let files = vec!["a.rs".to_string()];
        let mut tags_by_file: HashMap<String, Vec<&Tag>> = HashMap::new();
        let import = ref_tag("some_missing_module", TagCategory::Import);
        tags_by_file.insert("a.rs".into(), vec![&import]);
        let graph = DependencyGraph::build(&files, &tags_by_file);
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn centrality_scores_are_bounded() {
        let files = vec!["a.rs".to_string(), "b.rs".to_string()];
        let a_def = def_tag("a_fn", TagCategory::Function);
        let mut tags_by_file: HashMap<String, Vec<&Tag>> = HashMap::new();
        let call = ref_tag("a_fn", TagCategory::Function);
        tags_by_file.insert("a.rs".into(), vec![&a_def]);
        tags_by_file.insert("b.rs".into(), vec![&call]);
        let graph = DependencyGraph::build(&files, &tags_by_file);
        for (_, score) in graph.centrality(CentralityWeights::default()) {
            assert!((0.0..=1.0).contains(&score));
        }
    }
}
