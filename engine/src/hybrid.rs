//! Hybrid Matcher (C7, §4.7).
//!
//! Score fusion of C5 (fuzzy, `[0,100]`) and C6 (semantic, `[0,1]`).

use std::collections::HashMap;

/// `score = alpha * fuzzy/100 + (1-alpha) * semantic`. Emits results above
/// `max(fuzzy_threshold/100, semantic_threshold)` (§4.7).
pub fn hybrid_match(
    fuzzy_results: &[(String, f64)],
    semantic_results: &[(String, f64)],
    alpha: f64,
    fuzzy_threshold: f64,
    semantic_threshold: f64,
) -> Vec<(String, f64)> {
    let fuzzy: HashMap<&str, f64> = fuzzy_results.iter().map(|(n, s)| (n.as_str(), *s)).collect();
    let semantic: HashMap<&str, f64> = semantic_results.iter().map(|(n, s)| (n.as_str(), *s)).collect();

    let names: std::collections::BTreeSet<&str> =
        fuzzy.keys().chain(semantic.keys()).copied().collect();

    let threshold = (fuzzy_threshold / 100.0).max(semantic_threshold);

    let mut results: Vec<(String, f64)> = names
        .into_iter()
        .map(|name| {
            let f = fuzzy.get(name).copied().unwrap_or(0.0) / 100.0;
            let s = semantic.get(name).copied().unwrap_or(0.0);
            (name.to_string(), alpha * f + (1.0 - alpha) * s)
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
    fn scenario_6_hybrid_fusion() {
        let fuzzy = vec![("X".to_string(), 80.0)];
        let semantic = vec![("X".to_string(), 0.4)];
        let results = hybrid_match(&fuzzy, &semantic, 0.5, 0.0, 0.55);
        assert_eq!(results.len(), 1);
        assert!((results[0].1 - 0.6).abs() < 1e-9);
    }

    #[test]
    fn below_threshold_is_excluded() {
        let fuzzy = vec![("Y".to_string(), 10.0)];
        let semantic = vec![("Y".to_string(), 0.1)];
        let results = hybrid_match(&fuzzy, &semantic, 0.5, 50.0, 0.6);
        assert!(results.is_empty());
    }
}
