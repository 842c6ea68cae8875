//! Shared data model (§3): tags, file records, entrypoints, and the
//! exploration-tree/session types. Graph-specific and cache-specific types
//! live in `graph.rs` and `cache.rs` respectively, next to the code that
//! builds them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a [`Tag`] is a definition or a reference occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    Def,
    Ref,
}

/// The semantic category of a tag. Doubles as the `kind_prior` input (§4.8)
/// and the `node_type` of derived tree nodes (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    Function,
    Class,
    Method,
    Variable,
    Constant,
    Import,
    Other,
}

impl TagCategory {
    /// `kind_prior` term of §4.8's ranking formula.
    pub fn kind_prior(self) -> f64 {
        match self {
            Self::Class => 1.0,
            Self::Function | Self::Method => 0.9,
            Self::Constant => 0.7,
            Self::Variable => 0.5,
            Self::Import | Self::Other => 0.4,
        }
    }
}

/// A single extracted definition or reference occurrence (§3 "Tag").
/// Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub kind: TagKind,
    pub category: TagCategory,
    pub file: String,
    pub line: u32,
    pub signature: Option<String>,
    pub language: Option<String>,
}

impl Tag {
    /// Panics are never acceptable here: callers (the AST extractor) are
    /// expected to only construct tags with a non-empty name and `line >= 1`,
    /// but this is checked defensively since tags flow into cache keys and
    /// persisted documents.
    pub fn is_well_formed(&self) -> bool {
        !self.name.is_empty() && self.line >= 1
    }
}

/// Per-file bookkeeping (§3 "File record"). `tag_indices` points into
/// whatever flat `Vec<Tag>` the identifier index holds for this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub language: Option<String>,
    pub modified_ms: u64,
    pub byte_len: u64,
    pub content_hash: String,
    pub tag_indices: Vec<usize>,
}

/// An identifier chosen as an exploration starting point (§3 "Entrypoint").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entrypoint {
    pub identifier: String,
    pub location: String,
    pub score: f64,
    pub categories: Vec<String>,
}

/// `node_type` of a [`TreeNode`] (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Entrypoint,
    Function,
    Class,
    Symbol,
    Import,
}

impl From<TagCategory> for NodeType {
    fn from(c: TagCategory) -> Self {
        match c {
            TagCategory::Function | TagCategory::Method => Self::Function,
            TagCategory::Class => Self::Class,
            TagCategory::Import => Self::Import,
            TagCategory::Variable | TagCategory::Constant | TagCategory::Other => Self::Symbol,
        }
    }
}

/// A node in an [`ExplorationTree`] (§3). `parent` is a weak back-reference
/// (location + identifier), never an ownership edge — it is reconstructed on
/// load by a post-order pass (§6, §9) and is skipped by serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub identifier: String,
    pub location: String,
    pub node_type: NodeType,
    pub depth: usize,
    pub children: Vec<TreeNode>,
    #[serde(skip)]
    pub parent: Option<(String, String)>,
    pub expanded: bool,
    pub pruned: bool,
    #[serde(default)]
    pub structural_info: BTreeMap<String, String>,
}

impl TreeNode {
    pub fn new_root(identifier: String, location: String, node_type: NodeType) -> Self {
        Self {
            identifier,
            location,
            node_type,
            depth: 0,
            children: Vec::new(),
            parent: None,
            expanded: false,
            pruned: false,
            structural_info: BTreeMap::new(),
        }
    }

    /// `(identifier, location)` pair used for cycle-safety ancestor checks
    /// (§4.10) and for the "same node" identity used everywhere else.
    pub fn key(&self) -> (&str, &str) {
        (&self.identifier, &self.location)
    }

    /// Re-derives `parent` back-references for this subtree via a post-order
    /// pass, matching §6's "parent links are not persisted; reconstructed on
    /// load" contract. Call this once after deserializing a tree.
    pub fn relink_parents(&mut self) {
        fn walk(node: &mut TreeNode, parent_key: Option<(String, String)>) {
            node.parent = parent_key;
            let key = (node.identifier.clone(), node.location.clone());
            for child in &mut node.children {
                walk(child, Some(key.clone()));
            }
        }
        let key = (self.identifier.clone(), self.location.clone());
        for child in &mut self.children {
            walk(child, Some(key.clone()));
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }

    pub fn max_depth(&self) -> usize {
        self.children.iter().map(TreeNode::max_depth).max().unwrap_or(self.depth).max(self.depth)
    }
}

/// A hierarchical exploration view rooted at an entrypoint (§3
/// "ExplorationTree"). Owned exclusively by its session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationTree {
    pub tree_id: String,
    pub root_entrypoint: String,
    pub max_depth: usize,
    pub max_nodes: usize,
    pub root: TreeNode,
    pub expanded_areas: Vec<String>,
    pub pruned_areas: Vec<String>,
    pub context_name: String,
    pub confidence: f64,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl ExplorationTree {
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }
}

/// A transient grouping of entrypoints (§3 "TreeCluster"). Produces at most
/// one [`ExplorationTree`]; never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeCluster {
    pub context_name: String,
    pub entrypoints: Vec<Entrypoint>,
    pub confidence: f64,
}

/// A persistent, externally-identified exploration state (§3
/// "ExplorationSession"). Serialized as a single document; see `session.rs`
/// for the on-disk schema (which additionally wraps this in a version +
/// unknown-field envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationSession {
    pub session_id: String,
    pub project_path: String,
    pub trees: BTreeMap<String, ExplorationTree>,
    pub current_focus: Option<String>,
    pub created_at_ms: u64,
    pub last_activity_ms: u64,
}

impl ExplorationSession {
    pub fn new(session_id: String, project_path: String, now_ms: u64) -> Self {
        Self {
            session_id,
            project_path,
            trees: BTreeMap::new(),
            current_focus: None,
            created_at_ms: now_ms,
            last_activity_ms: now_ms,
        }
    }
}

/// Regex-shaped constraint on session ids (§3, §8): `[A-Za-z0-9_]{1,64}`.
/// The core treats ids as opaque strings beyond this check; callers choose
/// whatever naming policy they like (§9 open question).
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
