//! Entrypoint Discoverer + Clusterer (C9, §4.9).
//!
//! Discovery scores every definition tag against a fixed vocabulary of
//! entrypoint-shaped keywords using both C5 (fuzzy) and C6 (semantic),
//! keeping anything clearing either threshold. Clustering then groups
//! accepted entrypoints by inferred domain category into `TreeCluster`s.

use crate::config::EngineConfig;
use crate::fuzzy::{fuzzy_match, Strategy};
use crate::semantic::SemanticMatcher;
use crate::types::{Entrypoint, Tag, TagKind, TreeCluster};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Keywords a definition's identifier is compared against to decide whether
/// it looks like an exploration starting point (§4.9 "what counts as an
/// entrypoint"). Kept small and explicit rather than derived, matching §4.6's
/// "configuration, not code" stance on the category lexicon.
const ENTRYPOINT_KEYWORDS: &[&str] =
    &["main", "run", "start", "init", "serve", "handle", "handler", "route", "execute", "process", "new"];

/// Discovers candidate entrypoints from `tags`: every definition is scored
/// against [`ENTRYPOINT_KEYWORDS`] via fuzzy and semantic matching, kept if
/// either clears its threshold, deduplicated by `(identifier, file)`, and
/// scored `max(semantic, fuzzy/100)` (§4.9).
pub fn discover_entrypoints(
    tags: &[&Tag],
    semantic: &SemanticMatcher,
    config: &EngineConfig,
) -> Vec<Entrypoint> {
    let defs: Vec<&&Tag> = tags.iter().filter(|t| t.kind == TagKind::Def).collect();
    let strategies = [Strategy::Prefix, Strategy::Substring, Strategy::Word];

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut entrypoints = Vec::new();

    for tag in defs {
        let key = (tag.name.clone(), tag.file.clone());
        if !seen.insert(key) {
            continue;
        }

        let fuzzy_score = ENTRYPOINT_KEYWORDS
            .iter()
            .map(|&kw| fuzzy_match(kw, &[tag.name.as_str()], 0.0, &strategies).first().map(|(_, s)| *s).unwrap_or(0.0))
            .fold(0.0_f64, f64::max);
        let semantic_score = if semantic.is_trained() {
            ENTRYPOINT_KEYWORDS
                .iter()
                .map(|&kw| semantic.semantic_match(kw, &[tag.name.as_str()], 0.0).first().map(|(_, s)| *s).unwrap_or(0.0))
                .fold(0.0_f64, f64::max)
        } else {
            0.0
        };

        let fuzzy_pass = fuzzy_score / 100.0 >= config.entrypoint_fuzzy_threshold;
        let semantic_pass = semantic_score >= config.entrypoint_semantic_threshold;
        if !fuzzy_pass && !semantic_pass {
            continue;
        }

        let score = semantic_score.max(fuzzy_score / 100.0);
        let categories = semantic.categories(&tag.name, 3);
        entrypoints.push(Entrypoint {
            identifier: tag.name.clone(),
            location: format!("{}:{}", tag.file, tag.line),
            score,
            categories,
        });
    }

    entrypoints.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then_with(|| a.identifier.cmp(&b.identifier)));
    entrypoints
}

/// Human-friendly labels for a cluster's ranked top-two categories, keyed by
/// the `(primary, secondary)` pair in either orientation (§4.9 "a lookup
/// table of paired ... labels").
fn paired_context_labels() -> HashMap<(&'static str, &'static str), &'static str> {
    [
        (("authentication", "api"), "Auth Gateway"),
        (("authentication", "security"), "Identity & Access"),
        (("database", "caching"), "Data Layer"),
        (("api", "database"), "Backend Services"),
        (("network", "api"), "Network Services"),
        (("error_handling", "validation"), "Input Safety"),
        (("performance", "caching"), "Performance Layer"),
    ]
    .into_iter()
    .collect()
}

/// Labels for a cluster dominated by a single category (§4.9 "... and
/// singleton labels"), used when there's no second category to pair with.
fn singleton_context_labels() -> HashMap<&'static str, &'static str> {
    [
        ("authentication", "Auth Components"),
        ("file_operations", "File I/O Components"),
        ("mixed", "Mixed Components"),
    ]
    .into_iter()
    .collect()
}

fn titlecase(s: &str) -> String {
    s.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministically names a cluster from the frequency-ranked top-two
/// categories across its entrypoints, via [`paired_context_labels`] /
/// [`singleton_context_labels`], falling back to `"{Primary} Components"`
/// (§4.9). Ties in frequency break alphabetically by category name.
/// `bucket` is the cluster's grouping key, used only when no entrypoint
/// carries any inferred category at all.
fn deterministic_context_name(bucket: &str, entrypoints: &[Entrypoint]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for ep in entrypoints {
        for cat in &ep.categories {
            *counts.entry(cat.as_str()).or_insert(0) += 1;
        }
    }
    if counts.is_empty() {
        counts.insert(bucket, 1);
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let primary = ranked.first().map(|(c, _)| *c).unwrap_or(bucket);
    let secondary = ranked.get(1).map(|(c, _)| *c);

    let pairs = paired_context_labels();
    if let Some(secondary) = secondary {
        if let Some(label) = pairs.get(&(primary, secondary)).or_else(|| pairs.get(&(secondary, primary))) {
            return label.to_string();
        }
    }

    if let Some(label) = singleton_context_labels().get(primary) {
        return label.to_string();
    }

    format!("{} Components", titlecase(primary))
}

/// Mean entrypoint score scaled by cluster size, capped at 1 (§4.9
/// "Cluster confidence"): larger, internally-consistent clusters are
/// slightly more trustworthy than a lone high-scoring entrypoint.
fn cluster_confidence(group: &[Entrypoint]) -> f64 {
    let mean = group.iter().map(|e| e.score).sum::<f64>() / group.len().max(1) as f64;
    let size_boost = 1.0 + (1.0 + group.len() as f64).ln() / 5.0;
    (mean * size_boost).min(1.0)
}

/// Groups `entrypoints` by their primary (highest-scoring) category (§4.9
/// "Clustering"). Entrypoints without any inferred category, and clusters
/// that fall below `min_cluster_size`, are merged into a single `"mixed"`
/// cluster.
pub fn cluster_entrypoints(entrypoints: Vec<Entrypoint>, min_cluster_size: usize) -> Vec<TreeCluster> {
    let mut by_category: BTreeMap<String, Vec<Entrypoint>> = BTreeMap::new();
    for ep in entrypoints {
        let primary = ep.categories.first().cloned().unwrap_or_else(|| "mixed".to_string());
        by_category.entry(primary).or_default().push(ep);
    }

    let mut mixed: Vec<Entrypoint> = by_category.remove("mixed").unwrap_or_default();
    let mut accepted: BTreeMap<String, Vec<Entrypoint>> = BTreeMap::new();
    for (category, group) in by_category {
        if group.len() < min_cluster_size {
            mixed.extend(group);
        } else {
            accepted.insert(category, group);
        }
    }

    let mut clusters: Vec<TreeCluster> = accepted
        .into_iter()
        .map(|(category, group)| TreeCluster {
            context_name: deterministic_context_name(&category, &group),
            confidence: cluster_confidence(&group),
            entrypoints: group,
        })
        .collect();

    if !mixed.is_empty() {
        clusters.push(TreeCluster {
            context_name: deterministic_context_name("mixed", &mixed),
            confidence: cluster_confidence(&mixed),
            entrypoints: mixed,
        });
    }

    clusters.sort_by(|a, b| a.context_name.cmp(&b.context_name));
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::default_category_lexicon;
    use crate::types::{TagCategory, TagKind};

    fn def(name: &str, file: &str) -> Tag {
        Tag {
            name: name.to_string(),
            kind: TagKind::Def,
            category: TagCategory::Function,
            file: file.to_string(),
            line: 1,
            signature: None,
            language: None,
        }
    }

    #[test]
    fn discovers_entrypoint_shaped_identifiers() {
        let main_tag = def("main", "a.rs");
        let helper_tag = def("compute_tax_rate", "a.rs");
        let tags = vec![&main_tag, &helper_tag];
        let matcher = SemanticMatcher::new(default_category_lexicon());
        let config = EngineConfig::default();
        let found = discover_entrypoints(&tags, &matcher, &config);
        assert!(found.iter().any(|e| e.identifier == "main"));
    }

    #[test]
    fn dedups_by_identifier_and_file() {
        let a = def("run", "a.rs");
        let b = def("run", "a.rs");
        let tags = vec![&a, &b];
        let matcher = SemanticMatcher::new(default_category_lexicon());
        let config = EngineConfig::default();
        let found = discover_entrypoints(&tags, &matcher, &config);
        assert_eq!(found.iter().filter(|e| e.identifier == "run").count(), 1);
    }

    #[test]
    fn small_clusters_merge_into_mixed() {
        let entrypoints = vec![
            Entrypoint { identifier: "a".into(), location: "a.rs:1".into(), score: 0.9, categories: vec!["authentication".into()] },
        ];
        let clusters = cluster_entrypoints(entrypoints, 2);
        assert_eq!(clusters.len(), 1);
        // Merged into "mixed", but naming still runs off the entrypoints'
        // actual categories: a lone "authentication" entrypoint gets its
        // singleton label, not the literal bucket name.
        assert_eq!(clusters[0].context_name, "Auth Components");
    }

    #[test]
    fn large_enough_cluster_keeps_its_category() {
        let entrypoints = vec![
            Entrypoint { identifier: "login".into(), location: "a.rs:1".into(), score: 0.9, categories: vec!["authentication".into()] },
            Entrypoint { identifier: "logout".into(), location: "a.rs:2".into(), score: 0.8, categories: vec!["authentication".into()] },
        ];
        let clusters = cluster_entrypoints(entrypoints, 2);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].context_name, "Auth Components");
    }

    #[test]
    fn context_name_prefers_paired_label_over_singleton() {
        let entrypoints = vec![
            Entrypoint {
                identifier: "login".into(),
                location: "a.rs:1".into(),
                score: 0.9,
                categories: vec!["authentication".into(), "api".into()],
            },
            Entrypoint {
                identifier: "logout".into(),
                location: "a.rs:2".into(),
                score: 0.8,
                categories: vec!["authentication".into(), "api".into()],
            },
        ];
        let clusters = cluster_entrypoints(entrypoints, 2);
        assert_eq!(clusters[0].context_name, "Auth Gateway");
    }

    #[test]
    fn context_name_falls_back_to_titlecased_components() {
        let entrypoints = vec![
            Entrypoint { identifier: "a".into(), location: "a.rs:1".into(), score: 0.9, categories: vec!["performance".into()] },
            Entrypoint { identifier: "b".into(), location: "a.rs:2".into(), score: 0.8, categories: vec!["performance".into()] },
        ];
        let clusters = cluster_entrypoints(entrypoints, 2);
        assert_eq!(clusters[0].context_name, "Performance Components");
    }

    #[test]
    fn confidence_is_scaled_by_cluster_size_and_capped_at_one() {
        let entrypoints = vec![
            Entrypoint { identifier: "login".into(), location: "a.rs:1".into(), score: 1.0, categories: vec!["authentication".into()] },
            Entrypoint { identifier: "logout".into(), location: "a.rs:2".into(), score: 1.0, categories: vec!["authentication".into()] },
        ];
        let clusters = cluster_entrypoints(entrypoints, 2);
        assert!((clusters[0].confidence - 1.0).abs() < 1e-9, "mean-1.0 score must still cap at 1.0 after the size boost");
    }
}
