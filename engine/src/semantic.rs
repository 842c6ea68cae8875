//! Semantic (TF-IDF) Matcher (C6, §4.6).
//!
//! This is deliberately *not* a neural-embedding matcher — "semantic
//! embeddings beyond TF-IDF" is an explicit non-goal (§1). The source
//! project's `semantic.rs` builds a BERT embedding index via `candle`/
//! `fastembed`/`ort`; none of that is reusable here. Instead this mirrors
//! the source project's own `TermDocFreq`/`idf()` pattern in `types.rs`
//! (Laplace-smoothed IDF) and its `grep_relevance_score`'s term-weighting
//! shape, built out into a full TF-IDF vector space over compound-identifier
//! word tokens plus letter trigrams.

use std::collections::HashMap;

/// Case-folded word tokens from compound-identifier splitting, plus
/// English-letter 3-grams of each token (§4.6 vocabulary).
fn vocabulary_terms(identifier: &str) -> Vec<String> {
    let words = crate::index::split_identifier_words(identifier);
    let mut terms = Vec::new();
    for word in &words {
        terms.push(word.clone());
        let letters: Vec<char> = word.chars().filter(|c| c.is_ascii_alphabetic()).collect();
        if letters.len() >= 3 {
            for window in letters.windows(3) {
                terms.push(window.iter().collect());
            }
        }
    }
    terms
}

type SparseVec = HashMap<String, f64>;

fn l2_normalize(mut v: SparseVec) -> SparseVec {
    let norm: f64 = v.values().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for val in v.values_mut() {
            *val /= norm;
        }
    }
    v
}

fn cosine(a: &SparseVec, b: &SparseVec) -> f64 {
    let (small, large) = if a.len() < b.len() { (a, b) } else { (b, a) };
    small.iter().map(|(term, val)| val * large.get(term).copied().unwrap_or(0.0)).sum()
}

/// Default category lexicon (§4.6: "configuration, not code"). Keys are
/// category labels, values are the word-tokens that indicate membership.
pub fn default_category_lexicon() -> HashMap<String, Vec<String>> {
    let pairs: &[(&str, &[&str])] = &[
        ("authentication", &["auth", "login", "logout", "session", "token", "credential", "password"]),
        ("error_handling", &["error", "err", "exception", "fail", "failure", "panic", "recover"]),
        ("validation", &["validate", "valid", "check", "verify", "sanitize", "assert"]),
        ("api", &["api", "endpoint", "route", "handler", "request", "response", "rest"]),
        ("database", &["db", "database", "query", "sql", "table", "schema", "migration"]),
        ("caching", &["cache", "ttl", "evict", "memoize", "lru"]),
        ("security", &["security", "secure", "encrypt", "decrypt", "crypto", "permission", "acl"]),
        ("network", &["network", "socket", "http", "tcp", "udp", "connection", "client", "server"]),
        ("file_operations", &["file", "path", "read", "write", "scan", "walk", "directory"]),
        ("performance", &["perf", "performance", "benchmark", "profile", "optimize", "latency"]),
    ];
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect()
}

/// Learned TF-IDF vocabulary over a set of identifiers. `learn` is additive
/// and idempotent: calling it again fully replaces prior state (§4.6).
#[derive(Debug, Default)]
pub struct SemanticMatcher {
    document_frequency: HashMap<String, usize>,
    total_docs: usize,
    vectors: HashMap<String, SparseVec>,
    category_lexicon: HashMap<String, Vec<String>>,
}

impl SemanticMatcher {
    pub fn new(category_lexicon: HashMap<String, Vec<String>>) -> Self {
        Self { category_lexicon, ..Default::default() }
    }

    pub fn is_trained(&self) -> bool {
        self.total_docs > 0
    }

    /// Learns a TF-IDF vocabulary and per-identifier vectors from `identifiers`.
    /// Idempotent: calling this again fully replaces the previously learned
    /// state (§4.6).
    pub fn learn<'a>(&mut self, identifiers: impl IntoIterator<Item = &'a str> + Clone) {
        let mut term_counts_per_doc: HashMap<String, HashMap<String, usize>> = HashMap::new();
        let mut document_frequency: HashMap<String, usize> = HashMap::new();

        for identifier in identifiers.clone() {
            let terms = vocabulary_terms(identifier);
            let mut counts: HashMap<String, usize> = HashMap::new();
            for term in terms {
                *counts.entry(term).or_insert(0) += 1;
            }
            for term in counts.keys() {
                *document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
            term_counts_per_doc.insert(identifier.to_string(), counts);
        }

        let total_docs = term_counts_per_doc.len().max(1);
        let idf = |df: usize| -> f64 { (((total_docs + 1) as f64) / (df + 1) as f64).ln() + 1.0 };

        let mut vectors = HashMap::new();
        for (identifier, counts) in &term_counts_per_doc {
            let mut vec: SparseVec = HashMap::new();
            for (term, &count) in counts {
                let tf = 1.0 + (count as f64).ln();
                let df = document_frequency.get(term).copied().unwrap_or(1);
                vec.insert(term.clone(), tf * idf(df));
            }
            vectors.insert(identifier.clone(), l2_normalize(vec));
        }

        self.document_frequency = document_frequency;
        self.total_docs = term_counts_per_doc.len();
        self.vectors = vectors;
    }

    fn query_vector(&self, query: &str) -> SparseVec {
        let terms = vocabulary_terms(query);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for term in terms {
            *counts.entry(term).or_insert(0) += 1;
        }
        let idf = |df: usize| -> f64 { (((self.total_docs + 1) as f64) / (df + 1) as f64).ln() + 1.0 };
        let mut vec: SparseVec = HashMap::new();
        for (term, count) in counts {
            let tf = 1.0 + (count as f64).ln();
            let df = self.document_frequency.get(&term).copied().unwrap_or(0);
            vec.insert(term, tf * idf(df));
        }
        l2_normalize(vec)
    }

    /// Cosine similarity between `query` and every name in `universe`,
    /// filtered to `threshold`, sorted desc by score.
    pub fn semantic_match(&self, query: &str, universe: &[&str], threshold: f64) -> Vec<(String, f64)> {
        if query.is_empty() || !self.is_trained() {
            return Vec::new();
        }
        let q_vec = self.query_vector(query);
        let mut results: Vec<(String, f64)> = universe
            .iter()
            .map(|&name| {
                let score = self
                    .vectors
                    .get(name)
                    .map(|v| cosine(&q_vec, v))
                    .unwrap_or_else(|| cosine(&q_vec, &l2_normalize_terms(name)));
                (name.to_string(), score.clamp(0.0, 1.0))
            })
            .filter(|(_, score)| *score >= threshold)
            .collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        results
    }

    /// Top-k semantic categories for `name`, inferred from the fixed lexicon
    /// by counting word-token overlap (§4.6).
    pub fn categories(&self, name: &str, top_k: usize) -> Vec<String> {
        let words: std::collections::HashSet<String> =
            crate::index::split_identifier_words(name).into_iter().collect();
        let mut scored: Vec<(String, usize)> = self
            .category_lexicon
            .iter()
            .map(|(category, keywords)| {
                let hits = keywords.iter().filter(|kw| words.contains(*kw)).count();
                (category.clone(), hits)
            })
            .filter(|(_, hits)| *hits > 0)
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.into_iter().take(top_k).map(|(c, _)| c).collect()
    }
}

/// Fallback vector for a universe member never seen by `learn` (its own
/// term vector with uniform unit IDF), so `semantic_match` still returns a
/// sensible score for out-of-vocabulary names instead of a hard zero.
fn l2_normalize_terms(name: &str) -> SparseVec {
    let mut counts: HashMap<String, f64> = HashMap::new();
    for term in vocabulary_terms(name) {
        *counts.entry(term).or_insert(0.0) += 1.0;
    }
    l2_normalize(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learn_then_match_is_deterministic() {
        let mut matcher = SemanticMatcher::new(default_category_lexicon());
        matcher.learn(["authenticate_user", "login", "database_query"]);
        let results = matcher.semantic_match("authenticate", &["authenticate_user", "login", "database_query"], 0.0);
        assert_eq!(results[0].0, "authenticate_user");
        assert!(results[0].1 > 0.0);
    }

    #[test]
    fn scores_bounded_0_to_1() {
        let mut matcher = SemanticMatcher::new(default_category_lexicon());
        matcher.learn(["authenticate_user", "login"]);
        for (_, score) in matcher.semantic_match("auth", &["authenticate_user", "login"], 0.0) {
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn relearn_replaces_state_atomically() {
        let mut matcher = SemanticMatcher::new(default_category_lexicon());
        matcher.learn(["foo"]);
        assert!(matcher.vectors.contains_key("foo"));
        matcher.learn(["bar"]);
        assert!(!matcher.vectors.contains_key("foo"));
        assert!(matcher.vectors.contains_key("bar"));
    }

    #[test]
    fn categories_infer_from_lexicon() {
        let matcher = SemanticMatcher::new(default_category_lexicon());
        let cats = matcher.categories("authenticate_user_login", 3);
        assert!(cats.contains(&"authentication".to_string()));
    }

    #[test]
    fn untrained_matcher_returns_empty() {
        let matcher = SemanticMatcher::new(default_category_lexicon());
        assert!(matcher.semantic_match("auth", &["login"], 0.0).is_empty());
    }
}
