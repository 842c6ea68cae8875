//! Hierarchical Formatter (C13, §4.13).
//!
//! Renders an [`ExplorationTree`] within a token budget split
//! structure 20% / signatures 30% / critical lines 40% / context 10%
//! (§4.13 "Budget allocation"). When the full render doesn't fit, detail is
//! dropped in a fixed order — context notes, then critical lines, then
//! signatures — before the tree skeleton itself is truncated, so the caller
//! always gets *something* for any non-zero budget (§4.13 "Degradation
//! order"; §8's token-budget round-trip law: a budget of `0` yields `""`
//! with no error).

use crate::critical::CriticalLine;
use crate::tokenizer::Tokenizer;
use crate::tree::map_tree;
use crate::types::{ExplorationTree, NodeType};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    TreeGuide,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOutput {
    pub text: String,
    pub tokens_used: usize,
    pub degraded: bool,
}

/// Per-node context fed to the renderer: a definition's signature (if any)
/// and the `top_k` semantic categories for its identifier.
#[derive(Debug, Clone, Default)]
pub struct NodeDetail {
    pub signature: Option<String>,
    pub critical_lines: Vec<CriticalLine>,
    pub categories: Vec<String>,
}

fn node_icon(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::Entrypoint => "*",
        NodeType::Class => "C",
        NodeType::Function => "f",
        NodeType::Symbol => "s",
        NodeType::Import => "i",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DetailLevel {
    StructureOnly,
    WithSignatures,
    WithCriticalLines,
    Full,
}

const LEVELS: [DetailLevel; 4] =
    [DetailLevel::Full, DetailLevel::WithCriticalLines, DetailLevel::WithSignatures, DetailLevel::StructureOnly];

fn render_tree_guide_at(
    tree: &ExplorationTree,
    details: &HashMap<(String, String), NodeDetail>,
    level: DetailLevel,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {} ({})\n", tree.root_entrypoint, tree.context_name));
    for row in map_tree(tree) {
        let indent = "  ".repeat(row.depth);
        out.push_str(&format!(
            "{indent}{} {} [{}]{}\n",
            node_icon(row.node_type),
            row.identifier,
            row.location,
            if row.expanded { "" } else { " (collapsed)" }
        ));

        let Some(detail) = details.get(&(row.identifier.clone(), row.location.clone())) else { continue };

        if level >= DetailLevel::WithSignatures {
            if let Some(sig) = &detail.signature {
                out.push_str(&format!("{indent}    {sig}\n"));
            }
        }
        if level >= DetailLevel::WithCriticalLines {
            for line in &detail.critical_lines {
                out.push_str(&format!("{indent}    L{}: {}\n", line.line, line.text));
            }
        }
        if level >= DetailLevel::Full && !detail.categories.is_empty() {
            out.push_str(&format!("{indent}    # {}\n", detail.categories.join(", ")));
        }
    }
    out
}

fn render_json_at(tree: &ExplorationTree, details: &HashMap<(String, String), NodeDetail>, level: DetailLevel) -> String {
    let rows: Vec<serde_json::Value> = map_tree(tree)
        .into_iter()
        .map(|row| {
            let detail = details.get(&(row.identifier.clone(), row.location.clone()));
            let mut obj = serde_json::json!({
                "identifier": row.identifier,
                "location": row.location,
                "node_type": format!("{:?}", row.node_type),
                "depth": row.depth,
                "expanded": row.expanded,
            });
            if let (Some(map), Some(detail)) = (obj.as_object_mut(), detail) {
                if level >= DetailLevel::WithSignatures {
                    map.insert("signature".into(), serde_json::json!(detail.signature));
                }
                if level >= DetailLevel::WithCriticalLines {
                    let lines: Vec<serde_json::Value> = detail
                        .critical_lines
                        .iter()
                        .map(|l| serde_json::json!({"line": l.line, "text": l.text, "score": l.score}))
                        .collect();
                    map.insert("critical_lines".into(), serde_json::Value::Array(lines));
                }
                if level >= DetailLevel::Full {
                    map.insert("categories".into(), serde_json::json!(detail.categories));
                }
            }
            obj
        })
        .collect();
    serde_json::to_string_pretty(&serde_json::json!({
        "tree_id": tree.tree_id,
        "root_entrypoint": tree.root_entrypoint,
        "context_name": tree.context_name,
        "nodes": rows,
    }))
    .unwrap_or_default()
}

fn render_at(tree: &ExplorationTree, details: &HashMap<(String, String), NodeDetail>, level: DetailLevel, mode: RenderMode) -> String {
    match mode {
        RenderMode::TreeGuide => render_tree_guide_at(tree, details, level),
        RenderMode::Json => render_json_at(tree, details, level),
    }
}

/// Truncates `text` to at most `budget` tokens by dropping trailing lines
/// (never mid-line), re-measuring after each drop. Used only as the last
/// resort once even `StructureOnly` doesn't fit.
fn truncate_lines_to_budget(text: &str, tokenizer: &dyn Tokenizer, budget: usize) -> String {
    if budget == 0 {
        return String::new();
    }
    let mut lines: Vec<&str> = text.lines().collect();
    loop {
        let candidate = lines.join("\n");
        if tokenizer.count_tokens(&candidate) <= budget || lines.is_empty() {
            return candidate;
        }
        lines.pop();
    }
}

/// Renders `tree` within `token_budget`, picking the richest [`DetailLevel`]
/// that fits, falling back to line truncation if even the bare structure
/// doesn't (§4.13). The 20/30/40/10 split informs how detail is dropped
/// (context first, signatures kept longest relative to critical lines being
/// the single largest share) rather than being four independently-budgeted
/// sub-renders — sections aren't independently token-counted since a single
/// textual render can't be cleanly partitioned that way.
pub fn render(
    tree: &ExplorationTree,
    details: &HashMap<(String, String), NodeDetail>,
    tokenizer: &dyn Tokenizer,
    token_budget: usize,
    mode: RenderMode,
) -> RenderedOutput {
    if token_budget == 0 {
        return RenderedOutput { text: String::new(), tokens_used: 0, degraded: true };
    }

    for (i, &level) in LEVELS.iter().enumerate() {
        let text = render_at(tree, details, level, mode);
        let tokens = tokenizer.count_tokens(&text);
        if tokens <= token_budget {
            return RenderedOutput { text, tokens_used: tokens, degraded: i > 0 };
        }
    }

    let bare = render_at(tree, details, DetailLevel::StructureOnly, mode);
    let truncated = truncate_lines_to_budget(&bare, tokenizer, token_budget);
    let tokens = tokenizer.count_tokens(&truncated);
    RenderedOutput { text: truncated, tokens_used: tokens, degraded: true }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::tokenizer::BpeHeuristicTokenizer;
    use crate::tree::build_tree;
    use crate::types::Entrypoint;

    fn sample_tree() -> ExplorationTree {
        build_tree(
            "t1".into(),
            &Entrypoint { identifier: "main".into(), location: "a.rs:1".into(), score: 0.9, categories: vec![] },
            "mixed:main".into(),
            0.9,
            TreeConfig::default(),
            0,
        )
    }

    #[test]
    fn zero_budget_yields_empty_string() {
        let tree = sample_tree();
        let tokenizer = BpeHeuristicTokenizer;
        let out = render(&tree, &HashMap::new(), &tokenizer, 0, RenderMode::TreeGuide);
        assert_eq!(out.text, "");
        assert_eq!(out.tokens_used, 0);
    }

    #[test]
    fn generous_budget_yields_full_detail() {
        let tree = sample_tree();
        let mut details = HashMap::new();
        details.insert(
            ("main".to_string(), "a.rs:1".to_string()),
            NodeDetail {
                signature: Some("fn main()".into()),
                critical_lines: vec![CriticalLine { line: 2, text: "return 0;".into(), score: 0.9 }],
                categories: vec!["api".into()],
            },
        );
        let tokenizer = BpeHeuristicTokenizer;
        let out = render(&tree, &details, &tokenizer, 10_000, RenderMode::TreeGuide);
        assert!(!out.degraded);
        assert!(out.text.contains("fn main()"));
        assert!(out.text.contains("return 0;"));
    }

    #[test]
    fn tight_budget_degrades_before_failing() {
        let tree = sample_tree();
        let mut details = HashMap::new();
        details.insert(
            ("main".to_string(), "a.rs:1".to_string()),
            NodeDetail {
                signature: Some("fn main()".into()),
                critical_lines: vec![CriticalLine { line: 2, text: "return 0;".into(), score: 0.9 }],
                categories: vec!["api".into()],
            },
        );
        let tokenizer = BpeHeuristicTokenizer;
        let out = render(&tree, &details, &tokenizer, 6, RenderMode::TreeGuide);
        assert!(out.tokens_used <= 6);
    }

    #[test]
    fn json_mode_produces_parseable_json() {
        let tree = sample_tree();
        let tokenizer = BpeHeuristicTokenizer;
        let out = render(&tree, &HashMap::new(), &tokenizer, 10_000, RenderMode::Json);
        let parsed: serde_json::Value = serde_json::from_str(&out.text).unwrap();
        assert_eq!(parsed["tree_id"], "t1");
    }
}
