//! AST Tag Extractor (C2, §4.2).
//!
//! Every supported language is parsed by a real tree-sitter grammar. Under no
//! circumstances is identifier extraction done by regular expressions over
//! source text — this is a hard rule carried over from the source project's
//! "zero regex patterns" tag-extraction policy (§4.2, §9). Unsupported
//! extensions return an empty tag list with no error.
//!
//! Grounded on the source project's `ast.rs` (tree-sitter dispatch table,
//! node classification, parent-based Function→Method demotion) and `graph.rs`
//! (callee-name and type-identifier extraction for `ref` tags), generalized
//! from a "definitions only" symbol table into the full def/ref/import tag
//! stream §4.2 requires.

use crate::types::{Tag, TagCategory, TagKind};
use tree_sitter::{Language, Node, Parser};

/// Maps a file extension to its tree-sitter grammar. Returns `None` for
/// unsupported extensions (§4.2: "return an empty tag list with no error").
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

/// Node kinds that introduce a definition, and the category they map to
/// before any container-based demotion to `Method`.
fn classify_def_node(kind: &str, ext: &str) -> Option<TagCategory> {
    match ext {
        "rs" => match kind {
            "function_item" => Some(TagCategory::Function),
            "struct_item" | "enum_item" | "trait_item" => Some(TagCategory::Class),
            "const_item" | "static_item" => Some(TagCategory::Constant),
            "type_item" => Some(TagCategory::Other),
            _ => None,
        },
        "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" => match kind {
            "function_declaration" | "method_definition" | "arrow_function" => {
                Some(TagCategory::Function)
            }
            "class_declaration" | "interface_declaration" => Some(TagCategory::Class),
            "lexical_declaration" | "variable_declaration" => Some(TagCategory::Variable),
            _ => None,
        },
        "py" | "pyi" => match kind {
            "function_definition" => Some(TagCategory::Function),
            "class_definition" => Some(TagCategory::Class),
            _ => None,
        },
        "go" => match kind {
            "function_declaration" | "method_declaration" => Some(TagCategory::Function),
            "type_spec" => Some(TagCategory::Class),
            "const_spec" => Some(TagCategory::Constant),
            "var_spec" => Some(TagCategory::Variable),
            _ => None,
        },
        "c" | "h" | "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => match kind {
            "function_definition" => Some(TagCategory::Function),
            "struct_specifier" | "class_specifier" | "enum_specifier" => Some(TagCategory::Class),
            _ => None,
        },
        "java" => match kind {
            "method_declaration" | "constructor_declaration" => Some(TagCategory::Function),
            "class_declaration" | "interface_declaration" | "enum_declaration" => {
                Some(TagCategory::Class)
            }
            _ => None,
        },
        _ => None,
    }
}

fn is_container_kind(kind: &str) -> bool {
    matches!(
        kind,
        "struct_item"
            | "enum_item"
            | "trait_item"
            | "impl_item"
            | "class_declaration"
            | "class_definition"
            | "class_specifier"
            | "interface_declaration"
    )
}

fn is_call_kind(kind: &str) -> bool {
    matches!(kind, "call_expression" | "call" | "method_invocation")
}

fn is_import_kind(kind: &str) -> bool {
    matches!(
        kind,
        "use_declaration"
            | "import_statement"
            | "import_from_statement"
            | "import_declaration"
            | "import_spec"
    )
}

fn node_name<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    for field in ["name", "declarator"] {
        if let Some(child) = node.child_by_field_name(field) {
            return node_text(child, source);
        }
    }
    // Fallback: first identifier-like child.
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(child.kind(), "identifier" | "type_identifier" | "field_identifier") {
            return node_text(child, source);
        }
    }
    None
}

fn node_text<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    source.get(node.byte_range())
}

/// First source line of a definition, truncated at `{` (or `:` for Python),
/// capped at 200 chars on a char boundary.
fn extract_signature(node: Node, source: &str, ext: &str) -> String {
    let start = node.start_byte();
    let line_end = source[start..].find('\n').map(|i| start + i).unwrap_or(source.len());
    let line = &source[start..line_end];
    let cut = if ext == "py" || ext == "pyi" {
        line.find(':').map(|i| i + 1).unwrap_or(line.len())
    } else {
        line.find('{').unwrap_or(line.len())
    };
    let mut sig = line[..cut.min(line.len())].trim_end().to_string();
    let mut boundary = sig.len().min(200);
    while boundary > 0 && !sig.is_char_boundary(boundary) {
        boundary -= 1;
    }
    sig.truncate(boundary);
    sig
}

fn extract_import_target<'a>(node: Node, source: &'a str) -> Option<&'a str> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(
            child.kind(),
            "string_literal" | "string" | "interpreted_string_literal" | "dotted_name" | "scoped_identifier" | "relative_import"
        ) {
            let text = node_text(child, source)?;
            return Some(text.trim_matches(|c| c == '"' || c == '\'' || c == '`'));
        }
    }
    node_text(node, source)
}

/// Parse `content` (extension `ext`) for `rel_path`, producing the full
/// def/ref/import tag stream. Returns an empty vec for unsupported
/// extensions or files the grammar fails to parse.
pub fn extract_tags(rel_path: &str, content: &str, ext: &str) -> Vec<Tag> {
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

    let mut tags = Vec::new();
    walk(tree.root_node(), content, ext, rel_path, false, &mut tags);
    tags
}

fn walk(
    node: Node,
    source: &str,
    ext: &str,
    rel_path: &str,
    in_container: bool,
    out: &mut Vec<Tag>,
) {
    let kind = node.kind();
    let mut next_in_container = in_container;

    if let Some(mut category) = classify_def_node(kind, ext) {
        if in_container && category == TagCategory::Function {
            category = TagCategory::Method;
        }
        if let Some(name) = node_name(node, source) {
            let line = node.start_position().row as u32 + 1;
            out.push(Tag {
                name: name.to_string(),
                kind: TagKind::Def,
                category,
                file: rel_path.to_string(),
                line,
                signature: Some(extract_signature(node, source, ext)),
                language: Some(ext.to_string()),
            });
        }
    } else if is_call_kind(kind) {
        if let Some(func) = node.child_by_field_name("function").or_else(|| node.child(0)) {
            if let Some(name) = node_text(func, source) {
                let callee = name.rsplit(['.', ':']).next().unwrap_or(name);
                if !callee.is_empty() {
                    out.push(Tag {
                        name: callee.to_string(),
                        kind: TagKind::Ref,
                        category: TagCategory::Function,
                        file: rel_path.to_string(),
                        line: node.start_position().row as u32 + 1,
                        signature: None,
                        language: Some(ext.to_string()),
                    });
                }
            }
        }
    } else if matches!(kind, "type_identifier" | "scoped_type_identifier") {
        if let Some(name) = node_text(node, source) {
            if name.chars().next().map(char::is_uppercase).unwrap_or(false) {
                out.push(Tag {
                    name: name.to_string(),
                    kind: TagKind::Ref,
                    category: TagCategory::Class,
                    file: rel_path.to_string(),
                    line: node.start_position().row as u32 + 1,
                    signature: None,
                    language: Some(ext.to_string()),
                });
            }
        }
    } else if is_import_kind(kind) {
        if let Some(target) = extract_import_target(node, source) {
            out.push(Tag {
                name: target.to_string(),
                kind: TagKind::Ref,
                category: TagCategory::Import,
                file: rel_path.to_string(),
                line: node.start_position().row as u32 + 1,
                signature: None,
                language: Some(ext.to_string()),
            });
        }
        // Imports are leaves for our purposes; don't descend further.
        return;
    }

    if is_container_kind(kind) {
        next_in_container = true;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, ext, rel_path, next_in_container, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TagCategory, TagKind};

    #[test]
    fn extracts_rust_function_def() {
        let tags = extract_tags("lib.rs", "fn authenticate_user(name: &str) -> bool { true }", "rs");
        let def = tags.iter().find(|t| t.name == "authenticate_user").unwrap();
        assert_eq!(def.kind, TagKind::Def);
        assert_eq!(def.category, TagCategory::Function);
        assert_eq!(def.line, 1);
        assert!(def.signature.as_deref().unwrap().starts_with("fn authenticate_user"));
    }

    #[test]
    fn demotes_method_inside_impl() {
        let src = "struct User; impl User { fn login(&self) {} }";
        let tags = extract_tags("lib.rs", src, "rs");
        let login = tags.iter().find(|t| t.name == "login" && t.kind == TagKind::Def).unwrap();
        assert_eq!(login.category, TagCategory::Method);
    }

    #[test]
    fn extracts_rust_use_as_import() {
        let tags = extract_tags("lib.rs", "use std::collections::HashMap;", "rs");
        assert!(tags.iter().any(|t| t.category == TagCategory::Import));
    }

    #[test]
    fn extracts_call_reference() {
        let src = "fn run() { process_data(); }";
        let tags = extract_tags("lib.rs", src, "rs");
        assert!(tags
            .iter()
            .any(|t| t.name == "process_data" && t.kind == TagKind::Ref && t.category == TagCategory::Function));
    }

    #[test]
    fn extracts_python_def() {
        let tags = extract_tags("a.py", "def authenticate_user(name):\n    return True\n", "py");
        let def = tags.iter().find(|t| t.name == "authenticate_user").unwrap();
        assert_eq!(def.category, TagCategory::Function);
    }

    #[test]
    fn unsupported_extension_returns_empty() {
        assert!(extract_tags("x.unknownlang", "whatever", "unknownlang").is_empty());
    }
}
