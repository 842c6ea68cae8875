//! Hierarchical Exploration Tree Builder/Manager (C10, §4.10).
//!
//! `build` seeds a single-node tree at an entrypoint; `expand_area` locates
//! every node whose identifier or file path contains a given substring
//! (case-insensitive) and reveals each match's dependency-graph neighbors as
//! children (idempotent per area, cycle-safe, capped by
//! fanout/max_nodes/max_depth, a no-op on the whole tree if it would exceed
//! `max_nodes`); `prune_area` destructively removes every matching subtree
//! (collapsing to just the root if the root itself matches); `focus`
//! validates and names a node as the session's current view; `map` flattens
//! the visible (non-pruned) tree for rendering.

use crate::config::TreeConfig;
use crate::error::{EngineError, Result};
use crate::graph::DependencyGraph;
use crate::types::{Entrypoint, ExplorationTree, NodeType, Tag, TagKind, TreeNode};
use std::collections::{HashMap, HashSet};

/// Builds a fresh single-node tree rooted at `entrypoint` (§4.10 "Build").
pub fn build_tree(
    tree_id: String,
    entrypoint: &Entrypoint,
    context_name: String,
    confidence: f64,
    config: TreeConfig,
    now_ms: u64,
) -> ExplorationTree {
    let root = TreeNode::new_root(entrypoint.identifier.clone(), entrypoint.location.clone(), NodeType::Entrypoint);
    ExplorationTree {
        tree_id,
        root_entrypoint: entrypoint.identifier.clone(),
        max_depth: config.max_depth,
        max_nodes: config.max_nodes,
        root,
        expanded_areas: Vec::new(),
        pruned_areas: Vec::new(),
        context_name,
        confidence,
        created_at_ms: now_ms,
        updated_at_ms: now_ms,
    }
}

fn find_node_mut<'a>(node: &'a mut TreeNode, key: (&str, &str)) -> Option<&'a mut TreeNode> {
    if node.key() == key {
        return Some(node);
    }
    for child in &mut node.children {
        if let Some(found) = find_node_mut(child, key) {
            return Some(found);
        }
    }
    None
}

fn find_node<'a>(node: &'a TreeNode, key: (&str, &str)) -> Option<&'a TreeNode> {
    if node.key() == key {
        return Some(node);
    }
    node.children.iter().find_map(|child| find_node(child, key))
}

fn ancestor_keys(root: &TreeNode, target: (&str, &str)) -> Option<Vec<(String, String)>> {
    fn walk(node: &TreeNode, target: (&str, &str), path: &mut Vec<(String, String)>) -> bool {
        if node.key() == target {
            return true;
        }
        path.push((node.identifier.clone(), node.location.clone()));
        for child in &node.children {
            if walk(child, target, path) {
                return true;
            }
        }
        path.pop();
        false
    }
    let mut path = Vec::new();
    if walk(root, target, &mut path) {
        Some(path)
    } else {
        None
    }
}

/// Case-insensitive substring test over a node's identifier or file path
/// (the `location`'s portion before `:line`) — §4.10 "locates nodes whose
/// identifier or file path contains `area`".
fn node_matches_area(node: &TreeNode, area_lower: &str) -> bool {
    node.identifier.to_lowercase().contains(area_lower)
        || node.location.split(':').next().unwrap_or(&node.location).to_lowercase().contains(area_lower)
}

fn collect_matching_keys(node: &TreeNode, area_lower: &str, out: &mut Vec<(String, String)>) {
    if node_matches_area(node, area_lower) {
        out.push((node.identifier.clone(), node.location.clone()));
    }
    for child in &node.children {
        collect_matching_keys(child, area_lower, out);
    }
}

/// Candidate children for expanding a single node, computed without
/// mutating the tree so the caller can budget-check before committing.
fn gather_candidates(
    node: &TreeNode,
    ancestors: &[(String, String)],
    identifier: &str,
    location: &str,
    graph: &DependencyGraph,
    tags_by_file: &HashMap<String, Vec<&Tag>>,
    fanout: usize,
) -> Vec<TreeNode> {
    let file = location.split(':').next().unwrap_or(location);
    let mut ancestor_keyset: HashSet<(String, String)> = ancestors.iter().cloned().collect();
    ancestor_keyset.insert((identifier.to_string(), location.to_string()));

    let mut seen_targets: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();
    for edge in graph.edges_from(file) {
        if candidates.len() >= fanout {
            break;
        }
        if !seen_targets.insert(edge.to.clone()) {
            continue;
        }
        let Some(defs) = tags_by_file.get(&edge.to) else { continue };
        let Some(def_tag) = defs.iter().find(|t| t.kind == TagKind::Def) else { continue };
        let child_loc = format!("{}:{}", def_tag.file, def_tag.line);
        if ancestor_keyset.contains(&(def_tag.name.clone(), child_loc.clone())) {
            continue;
        }
        candidates.push(TreeNode {
            identifier: def_tag.name.clone(),
            location: child_loc,
            node_type: NodeType::from(def_tag.category),
            depth: node.depth + 1,
            children: Vec::new(),
            parent: Some((identifier.to_string(), location.to_string())),
            expanded: false,
            pruned: false,
            structural_info: Default::default(),
        });
    }
    candidates
}

/// Reveals dependency-graph neighbors as children for every node in `tree`
/// whose identifier or file path contains `area` (case-insensitive) —
/// §4.10 "Expand". Idempotent at the area level: re-expanding an
/// already-recorded area is a no-op. Fails with `EngineError::Capacity`,
/// leaving the tree completely unmodified, if the full expansion (summed
/// across every matching node) would exceed `tree.max_nodes` (§7
/// "CapacityError ... the operation is a no-op"). Fails with
/// `EngineError::NotFound` if nothing matches `area`.
pub fn expand_area(
    tree: &mut ExplorationTree,
    area: &str,
    graph: &DependencyGraph,
    tags_by_file: &HashMap<String, Vec<&Tag>>,
    fanout: usize,
    now_ms: u64,
) -> Result<usize> {
    if tree.expanded_areas.iter().any(|a| a == area) {
        return Ok(0);
    }

    let area_lower = area.to_lowercase();
    let mut matches = Vec::new();
    collect_matching_keys(&tree.root, &area_lower, &mut matches);
    if matches.is_empty() {
        return Err(EngineError::NotFound(format!("no node matches area {area:?}")));
    }

    let total_nodes = tree.root.node_count();
    let mut plan: Vec<(String, String, Vec<TreeNode>)> = Vec::new();
    let mut shallow: Vec<(String, String)> = Vec::new();
    let mut planned_total = 0usize;

    for (identifier, location) in &matches {
        let key = (identifier.as_str(), location.as_str());
        let node = find_node(&tree.root, key).expect("match came from this tree");
        if node.pruned || node.expanded {
            continue;
        }
        if node.depth + 1 > tree.max_depth {
            shallow.push((identifier.clone(), location.clone()));
            continue;
        }
        let ancestors = ancestor_keys(&tree.root, key).expect("match came from this tree");
        let candidates = gather_candidates(node, &ancestors, identifier, location, graph, tags_by_file, fanout);
        planned_total += candidates.len();
        plan.push((identifier.clone(), location.clone(), candidates));
    }

    if total_nodes + planned_total > tree.max_nodes {
        return Err(EngineError::Capacity(format!(
            "expanding area {area:?} would add {planned_total} node(s), exceeding max_nodes {}",
            tree.max_nodes
        )));
    }

    for (identifier, location) in shallow {
        let key = (identifier.as_str(), location.as_str());
        find_node_mut(&mut tree.root, key).unwrap().expanded = true;
    }

    let mut added = 0;
    for (identifier, location, candidates) in plan {
        let key = (identifier.as_str(), location.as_str());
        let node = find_node_mut(&mut tree.root, key).unwrap();
        added += candidates.len();
        node.children.extend(candidates);
        node.expanded = true;
    }

    tree.expanded_areas.push(area.to_string());
    tree.updated_at_ms = now_ms;
    Ok(added)
}

/// Removes the subtree rooted at every node in `tree` whose identifier or
/// file path contains `area` (case-insensitive) — §4.10 "Prune". A match
/// equal to the tree's root collapses the tree to just its root rather than
/// marking the root pruned (the root itself can never be pruned away).
/// Records `area` into `pruned_areas`. Returns whether anything was pruned.
pub fn prune_area(tree: &mut ExplorationTree, area: &str, now_ms: u64) -> bool {
    let area_lower = area.to_lowercase();
    let mut matches = Vec::new();
    collect_matching_keys(&tree.root, &area_lower, &mut matches);

    fn walk(node: &mut TreeNode, key: (&str, &str)) -> bool {
        if let Some(child) = node.children.iter_mut().find(|c| c.key() == key) {
            if child.pruned {
                return false;
            }
            child.children.clear();
            child.pruned = true;
            return true;
        }
        node.children.iter_mut().any(|c| walk(c, key))
    }

    let mut pruned_any = false;
    for (identifier, location) in matches {
        if tree.root.key() == (identifier.as_str(), location.as_str()) {
            if !tree.root.children.is_empty() {
                tree.root.children.clear();
                pruned_any = true;
            }
            continue;
        }
        if walk(&mut tree.root, (identifier.as_str(), location.as_str())) {
            pruned_any = true;
        }
    }

    if pruned_any {
        tree.pruned_areas.push(area.to_string());
        tree.updated_at_ms = now_ms;
    }
    pruned_any
}

/// Validates that `location`/`identifier` names a live (non-pruned) node in
/// `tree` and returns the canonical focus marker to store on the session
/// (§4.10 "Focus").
pub fn focus_path(tree: &ExplorationTree, location: &str, identifier: &str) -> Result<String> {
    let node = find_node(&tree.root, (identifier, location))
        .ok_or_else(|| EngineError::NotFound(format!("tree node {identifier}@{location} not found")))?;
    if node.pruned {
        return Err(EngineError::Conflict(format!("{identifier}@{location} has been pruned")));
    }
    Ok(format!("{}:{}@{}", tree.tree_id, identifier, location))
}

/// A single row of a flattened tree view (§4.10 "Map").
#[derive(Debug, Clone, PartialEq)]
pub struct MapRow {
    pub identifier: String,
    pub location: String,
    pub node_type: NodeType,
    pub depth: usize,
    pub expanded: bool,
    pub has_children: bool,
}

/// Flattens the tree in pre-order, skipping pruned nodes' subtrees (their
/// own row is kept, marked via the node still being present but childless —
/// pruning already cleared `children`, so this falls out naturally).
pub fn map_tree(tree: &ExplorationTree) -> Vec<MapRow> {
    let mut rows = Vec::new();
    fn walk(node: &TreeNode, rows: &mut Vec<MapRow>) {
        rows.push(MapRow {
            identifier: node.identifier.clone(),
            location: node.location.clone(),
            node_type: node.node_type,
            depth: node.depth,
            expanded: node.expanded,
            has_children: !node.children.is_empty(),
        });
        for child in &node.children {
            walk(child, rows);
        }
    }
    walk(&tree.root, &mut rows);
    rows
}
