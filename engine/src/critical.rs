//! Critical-Line Extractor (C12, §4.12 "Critical-line extractor").
//!
//! For a parsed symbol body, scores each line by a weighted sum of pattern
//! categories derived from the AST node kind — never from text patterns
//! (§4.2's "zero regex" rule extends here: classification keys off
//! tree-sitter node kinds, same dispatch-table style as `ast.rs`).

use crate::semantic::default_category_lexicon;
use tree_sitter::{Language, Node, Parser};

fn language_for_ext(ext: &str) -> Option<Language> {
    match ext {
        "rs" => Some(tree_sitter_rust::LANGUAGE.into()),
        "ts" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "js" | "jsx" | "mjs" | "cjs" => Some(tree_sitter_javascript::LANGUAGE.into()),
        "py" | "pyi" => Some(tree_sitter_python::LANGUAGE.into()),
        "go" => Some(tree_sitter_go::LANGUAGE.into()),
        "c" | "h" => Some(tree_sitter_c::LANGUAGE.into()),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some(tree_sitter_cpp::LANGUAGE.into()),
        "java" => Some(tree_sitter_java::LANGUAGE.into()),
        _ => None,
    }
}

/// Base weight for a line, keyed by AST node kind (§4.12's table).
fn base_weight(kind: &str) -> Option<f64> {
    match kind {
        "return_statement" | "return" => Some(0.9),
        "raise_statement" | "throw_statement" | "throw" => Some(0.85),
        "if_statement" | "if_expression" | "guard" | "conditional_expression" => Some(0.8),
        "call_expression" | "call" | "method_invocation" | "expression_statement" => Some(0.7),
        "list_comprehension" | "for_statement" | "for_expression" | "while_statement" | "for_in_statement" => {
            Some(0.5)
        }
        "assignment_expression" | "assignment" | "let_declaration" | "variable_declarator" | "short_var_declaration" => {
            Some(0.4)
        }
        "string" | "block_comment" | "line_comment" | "comment" => Some(0.2),
        _ => None,
    }
}

fn find_node_at_line<'a>(node: Node<'a>, line: u32) -> Option<Node<'a>> {
    if node.start_position().row as u32 + 1 == line {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if (child.start_position().row as u32 + 1..=child.end_position().row as u32 + 1).contains(&line) {
            if let Some(found) = find_node_at_line(child, line) {
                return Some(found);
            }
        }
    }
    None
}

/// A single scored line from a symbol's body.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticalLine {
    pub line: u32,
    pub text: String,
    pub score: f64,
}

/// Extracts up to `top_n` lines scoring at or above `threshold` from the
/// symbol starting at `symbol_start_line` in `content`. `intent_categories`
/// are the semantic categories (§4.6) present in the caller's intent; a
/// line whose identifiers overlap one of them gets a `+0.3` boost (§4.12).
pub fn extract_critical_lines(
    content: &str,
    ext: &str,
    symbol_start_line: u32,
    threshold: f64,
    top_n: usize,
    intent_categories: &[String],
) -> Vec<CriticalLine> {
    let Some(language) = language_for_ext(ext) else {
        return Vec::new();
    };
    let mut parser = Parser::new();
    if parser.set_language(&language).is_err() {
        return Vec::new();
    }
    let Some(tree) = parser.parse(content, None) else {
        return Vec::new();
    };
    let Some(symbol_node) = find_node_at_line(tree.root_node(), symbol_start_line) else {
        return Vec::new();
    };

    let lexicon = default_category_lexicon();
    let lines: Vec<&str> = content.lines().collect();

    let mut best_per_line: std::collections::HashMap<u32, f64> = std::collections::HashMap::new();
    score_subtree(symbol_node, &mut best_per_line);

    let mut scored: Vec<CriticalLine> = best_per_line
        .into_iter()
        .filter_map(|(line, mut score)| {
            let text = lines.get(line as usize - 1)?.trim().to_string();
            if line_matches_any_category(&text, intent_categories, &lexicon) {
                score += 0.3;
            }
            Some(CriticalLine { line, text, score: score.min(1.0) })
        })
        .filter(|cl| cl.score >= threshold)
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then_with(|| a.line.cmp(&b.line)));
    scored.truncate(top_n);
    scored
}

fn score_subtree(node: Node, best: &mut std::collections::HashMap<u32, f64>) {
    let line = node.start_position().row as u32 + 1;
    if let Some(weight) = base_weight(node.kind()) {
        let entry = best.entry(line).or_insert(0.0);
        if weight > *entry {
            *entry = weight;
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        score_subtree(child, best);
    }
}

fn line_matches_any_category(
    line_text: &str,
    intent_categories: &[String],
    lexicon: &std::collections::HashMap<String, Vec<String>>,
) -> bool {
    if intent_categories.is_empty() {
        return false;
    }
    let lower = line_text.to_lowercase();
    intent_categories.iter().any(|category| {
        lexicon
            .get(category)
            .map(|keywords| keywords.iter().any(|kw| lower.contains(kw.as_str())))
            .unwrap_or(false)
    })
}
