//! Fuzzy Matcher (C5, §4.5).
//!
//! Multi-strategy approximate string matching with max-fusion across
//! whichever strategies are enabled. Scores are in `[0, 100]`.
//!
//! The source project's own fuzzy matcher (`crates/core/src/fuzzy.rs`) is a
//! Smith-Waterman/FZF-v2 scorer tuned for file-path search UX. This
//! component implements a different, spec-exact contract (four independent
//! named strategies, max-fused) rather than adapting that algorithm, but
//! keeps its texture: a `Strategy` enum driving dispatch, scores normalized
//! to a fixed range, and `#[cfg(test)]` cases mirroring the literal
//! end-to-end scenarios from §8.

use crate::index::split_identifier_words;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Prefix,
    Substring,
    Levenshtein,
    Word,
}

impl Strategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prefix" => Some(Self::Prefix),
            "substring" => Some(Self::Substring),
            "levenshtein" => Some(Self::Levenshtein),
            "word" => Some(Self::Word),
            _ => None,
        }
    }
}

fn prefix_score(query: &str, name: &str) -> f64 {
    let (q, n) = (query.to_lowercase(), name.to_lowercase());
    if n.starts_with(&q) {
        return 100.0;
    }
    let shared = q.chars().zip(n.chars()).take_while(|(a, b)| a == b).count();
    if shared == 0 || q.is_empty() {
        return 0.0;
    }
    100.0 * shared as f64 / q.len() as f64
}

fn substring_score(query: &str, name: &str) -> f64 {
    if name.to_lowercase().contains(&query.to_lowercase()) {
        90.0
    } else {
        0.0
    }
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (alen, blen) = (a.len(), b.len());
    if alen == 0 {
        return blen;
    }
    if blen == 0 {
        return alen;
    }
    let mut prev: Vec<usize> = (0..=blen).collect();
    let mut curr = vec![0usize; blen + 1];
    for i in 1..=alen {
        curr[0] = i;
        for j in 1..=blen {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[blen]
}

fn levenshtein_score(query: &str, name: &str) -> f64 {
    let max_len = query.chars().count().max(name.chars().count());
    if max_len == 0 {
        return 100.0;
    }
    let d = levenshtein_distance(query, name);
    100.0 * (1.0 - d as f64 / max_len as f64)
}

fn word_score(query: &str, name: &str) -> f64 {
    let q_words: HashSet<String> = split_identifier_words(query).into_iter().collect();
    let n_words: HashSet<String> = split_identifier_words(name).into_iter().collect();
    if q_words.is_empty() || n_words.is_empty() {
        return 0.0;
    }
    let intersection = q_words.intersection(&n_words).count();
    let union = q_words.union(&n_words).count();
    if union == 0 {
        0.0
    } else {
        100.0 * intersection as f64 / union as f64
    }
}

fn strategy_score(strategy: Strategy, query: &str, name: &str) -> f64 {
    match strategy {
        Strategy::Prefix => prefix_score(query, name),
        Strategy::Substring => substring_score(query, name),
        Strategy::Levenshtein => levenshtein_score(query, name),
        Strategy::Word => word_score(query, name),
    }
}

/// Fuses enabled strategies by max and returns names scoring above
/// `threshold`, sorted by score desc then name asc (§4.5, §8).
pub fn fuzzy_match(
    query: &str,
    universe: &[&str],
    threshold: f64,
    strategies: &[Strategy],
) -> Vec<(String, f64)> {
    if query.is_empty() || strategies.is_empty() {
        return Vec::new();
    }
    let mut results: Vec<(String, f64)> = universe
        .iter()
        .map(|&name| {
            let score = strategies
                .iter()
                .map(|&s| strategy_score(s, query, name))
                .fold(0.0_f64, f64::max);
            (name.to_string(), score)
        })
        .filter(|(_, score)| *score >= threshold)
        .collect();

    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_1_fuzzy_exact() {
        let universe = ["authenticate_user", "login", "logout"];
        let strategies = [Strategy::Prefix, Strategy::Substring, Strategy::Levenshtein];
        let results = fuzzy_match("authenticate_user", &universe, 50.0, &strategies);
        assert_eq!(results[0], ("authenticate_user".to_string(), 100.0));
    }

    #[test]
    fn scenario_2_fuzzy_prefix_and_word() {
        let universe = ["auth", "authenticate", "user_auth", "database"];
        let strategies = [Strategy::Prefix, Strategy::Word];
        let results = fuzzy_match("auth", &universe, 50.0, &strategies);
        let by_name: std::collections::HashMap<_, _> = results.into_iter().collect();
        assert_eq!(by_name["auth"], 100.0);
        assert!(by_name["authenticate"] >= 50.0);
        assert_eq!(by_name["user_auth"], 50.0);
        assert!(!by_name.contains_key("database"));
    }

    #[test]
    fn empty_query_returns_empty() {
        assert!(fuzzy_match("", &["a", "b"], 0.0, &[Strategy::Prefix]).is_empty());
    }

    #[test]
    fn scores_are_bounded_0_to_100() {
        let universe = ["foo", "bar", "authenticate_user_session"];
        let strategies = [Strategy::Prefix, Strategy::Substring, Strategy::Levenshtein, Strategy::Word];
        for (_, score) in fuzzy_match("auth", &universe, 0.0, &strategies) {
            assert!((0.0..=100.0).contains(&score));
        }
    }

    #[test]
    fn results_sorted_desc_then_name_asc() {
        let universe = ["ab", "aa"];
        let results = fuzzy_match("a", &universe, 0.0, &[Strategy::Prefix]);
        // Both start with "a" so both score 100; the tie-break falls to
        // name ascending.
        assert_eq!(results[0].0, "aa");
        assert_eq!(results[1].0, "ab");
    }
}
