//! Context-Aware Ranker (C8, §4.8).
//!
//! `S(s) = 0.40*relevance + 0.30*centrality + 0.20*context_affinity + 0.10*kind_prior`.
//! Ties break by higher centrality, then lower file path, then lower line
//! (§4.8 "Tie-breaking").

use crate::config::RankerWeights;
use crate::graph::DependencyGraph;
use crate::types::Tag;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// One candidate symbol fed into the ranker, already carrying its relevance
/// score from C5/C6/C7 (fuzzy, semantic, or hybrid — the ranker is agnostic
/// to which produced it).
#[derive(Debug, Clone)]
pub struct RankCandidate<'a> {
    pub tag: &'a Tag,
    pub relevance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedSymbol {
    pub name: String,
    pub file: String,
    pub line: u32,
    pub score: f64,
    pub relevance: f64,
    pub centrality: f64,
    pub context_affinity: f64,
    pub kind_prior: f64,
}

/// BFS hop-count from every file in `context_files` over the dependency
/// graph's undirected closure, capped at `radius` (§4.8 "context_affinity").
/// `context_affinity = max(0, 1 - hops/radius)`, 1.0 for files already in
/// `context_files`, 0.0 if unreachable within `radius` hops.
fn context_affinity_for(graph: &DependencyGraph, context_files: &BTreeSet<String>, file: &str, radius: usize) -> f64 {
    if context_files.is_empty() {
        return 0.0;
    }
    if context_files.contains(file) {
        return 1.0;
    }
    if radius == 0 {
        return 0.0;
    }

    let mut undirected: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in graph.edges() {
        undirected.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        undirected.entry(edge.to.as_str()).or_default().push(edge.from.as_str());
    }

    let mut visited: HashMap<&str, usize> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    for seed in context_files {
        if visited.insert(seed.as_str(), 0).is_none() {
            queue.push_back(seed.as_str());
        }
    }

    while let Some(node) = queue.pop_front() {
        let dist = visited[node];
        if dist >= radius {
            continue;
        }
        for &next in undirected.get(node).into_iter().flatten() {
            if !visited.contains_key(next) {
                visited.insert(next, dist + 1);
                queue.push_back(next);
            }
        }
    }

    match visited.get(file) {
        Some(&hops) if hops <= radius => 1.0 - (hops as f64 / radius as f64),
        _ => 0.0,
    }
}

/// Ranks `candidates` against `context_files` (the set of files the caller
/// is currently focused on — e.g. the open editor buffers, or an
/// exploration tree's expanded nodes) using the composite formula. Each
/// output score is clamped to `[0, 1]`.
pub fn rank_symbols(
    candidates: &[RankCandidate<'_>],
    graph: &DependencyGraph,
    context_files: &BTreeSet<String>,
    weights: RankerWeights,
    context_radius: usize,
) -> Vec<RankedSymbol> {
    let centrality = graph.centrality(crate::config::CentralityWeights::default());

    let mut ranked: Vec<RankedSymbol> = candidates
        .iter()
        .map(|c| {
            let centrality_score = centrality.get(&c.tag.file).copied().unwrap_or(0.0);
            let context_affinity = context_affinity_for(graph, context_files, &c.tag.file, context_radius.max(1));
            let kind_prior = c.tag.category.kind_prior();
            let score = (weights.relevance * c.relevance
                + weights.centrality * centrality_score
                + weights.context_affinity * context_affinity
                + weights.kind_prior * kind_prior)
                .clamp(0.0, 1.0);
            RankedSymbol {
                name: c.tag.name.clone(),
                file: c.tag.file.clone(),
                line: c.tag.line,
                score,
                relevance: c.relevance,
                centrality: centrality_score,
                context_affinity,
                kind_prior,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap()
            .then_with(|| b.centrality.partial_cmp(&a.centrality).unwrap())
            .then_with(|| a.file.cmp(&b.file))
            .then_with(|| a.line.cmp(&b.line))
    });
    ranked
}

/// Truncates a ranked list to fit within `token_budget`, estimating each
/// entry's cost via `tokenizer` applied to its rendered `"file:line name"`
/// form (§4.8 "Budget-aware truncation" — the actual rendering budget split
/// is C13's job; the ranker only guarantees the returned prefix is
/// affordable).
pub fn truncate_to_budget(
    ranked: Vec<RankedSymbol>,
    tokenizer: &dyn crate::tokenizer::Tokenizer,
    token_budget: usize,
) -> Vec<RankedSymbol> {
    let mut spent = 0usize;
    let mut out = Vec::new();
    for symbol in ranked {
        let text = format!("{}:{} {}", symbol.file, symbol.line, symbol.name);
        let cost = tokenizer.count_tokens(&text);
        if spent + cost > token_budget {
            break;
        }
        spent += cost;
        out.push(symbol);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::BpeHeuristicTokenizer;
    use crate::types::{TagCategory, TagKind};
    use std::collections::HashMap as StdHashMap;

    fn tag(name: &str, file: &str, category: TagCategory) -> Tag {
        Tag {
            name: name.to_string(),
            kind: TagKind::Def,
            category,
            file: file.to_string(),
            line: 1,
            signature: None,
            language: None,
        }
    }

    #[test]
    fn higher_relevance_ranks_first_with_equal_other_terms() {
        let files = vec!["a.rs".to_string()];
        let graph = DependencyGraph::build(&files, &StdHashMap::new());
        let tag_a = tag("foo", "a.rs", TagCategory::Function);
        let tag_b = tag("bar", "a.rs", TagCategory::Function);
        let candidates = vec![
            RankCandidate { tag: &tag_a, relevance: 0.9 },
            RankCandidate { tag: &tag_b, relevance: 0.1 },
        ];
        let ranked = rank_symbols(&candidates, &graph, &BTreeSet::new(), RankerWeights::default(), 4);
        assert_eq!(ranked[0].name, "foo");
    }

    #[test]
    fn context_files_get_full_affinity() {
        let files = vec!["a.rs".to_string()];
        let graph = DependencyGraph::build(&files, &StdHashMap::new());
        let context: BTreeSet<String> = BTreeSet::from(["a.rs".to_string()]);
        assert_eq!(context_affinity_for(&graph, &context, "a.rs", 4), 1.0);
    }

    #[test]
    fn truncation_respects_budget() {
        let files = vec!["a.rs".to_string()];
        let graph = DependencyGraph::build(&files, &StdHashMap::new());
        let tag_a = tag("foo", "a.rs", TagCategory::Function);
        let tag_b = tag("bar", "a.rs", TagCategory::Function);
        let candidates = vec![
            RankCandidate { tag: &tag_a, relevance: 0.9 },
            RankCandidate { tag: &tag_b, relevance: 0.8 },
        ];
        let ranked = rank_symbols(&candidates, &graph, &BTreeSet::new(), RankerWeights::default(), 4);
        let tokenizer = BpeHeuristicTokenizer;
        let truncated = truncate_to_budget(ranked, &tokenizer, 1);
        assert!(truncated.len() <= 1);
    }
}
