//! End-to-end scenarios from §8 ("Testable properties") exercised against
//! the public `Engine` facade rather than individual modules, plus the
//! boundary behaviors and invariants that only show up once every component
//! is wired together.

use repomind_engine::config::EngineConfig;
use repomind_engine::engine::{suggest_session_id, Engine, SearchMode};
use repomind_engine::render::RenderMode;
use std::collections::BTreeSet;
use std::fs;

fn write_file(dir: &std::path::Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Scenario 1 ("Fuzzy exact"): an exact-name query against the identifier
/// universe scores 100 and ranks first.
#[test]
fn fuzzy_exact_match_scores_100() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "auth.rs", "fn authenticate_user() {}\nfn login() {}\nfn logout() {}\n");
    let mut engine = Engine::new(dir.path(), EngineConfig::default());
    engine.analyze().unwrap();

    let results = engine.search("authenticate_user", SearchMode::Fuzzy);
    assert_eq!(results[0].identifier, "authenticate_user");
    assert!((results[0].score - 1.0).abs() < 1e-9, "exact match must score 100/100");
}

/// Scenario 3 ("Cycle detection") through the engine facade: a 3-file import
/// cycle plus an extra inbound edge is detected, and impact/risk reflect it.
#[test]
fn cycle_detection_and_impact_through_engine() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.rs", "use crate::b;\nfn a_fn() { b::b_fn(); }\n");
    write_file(dir.path(), "b.rs", "use crate::c;\nfn b_fn() { c::c_fn(); }\n");
    write_file(dir.path(), "c.rs", "use crate::a;\nfn c_fn() { a::a_fn(); }\n");
    write_file(dir.path(), "d.rs", "use crate::a;\nfn d_fn() { a::a_fn(); }\n");

    let mut engine = Engine::new(dir.path(), EngineConfig::default());
    engine.analyze().unwrap();

    let cycles = engine.find_cycles();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0], vec!["a.rs".to_string(), "b.rs".to_string(), "c.rs".to_string()]);

    let changed: BTreeSet<String> = ["a.rs".to_string()].into_iter().collect();
    let (affected, risk) = engine.impact(&changed, 2);
    for f in ["a.rs", "b.rs", "c.rs", "d.rs"] {
        assert!(affected.contains(f), "{f} should be affected");
    }
    assert!(risk >= 0.2);
}

/// Scenario 4 ("Session round-trip"): build a tree, focus it, expand a node,
/// save the session, reload it, and confirm the expansion and focus survive
/// (modulo parent back-references, which are reconstructed rather than
/// persisted — §9).
#[test]
fn session_round_trip_preserves_expansion_and_focus() {
    let project = tempfile::tempdir().unwrap();
    write_file(project.path(), "auth/login.rs", "fn handle_login() {\n    check_password();\n}\n");
    write_file(project.path(), "auth/password.rs", "fn check_password() -> bool {\n    true\n}\n");

    let session_dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::default();
    config.session_dir = Some(session_dir.path().to_path_buf());
    let mut engine = Engine::new(project.path(), config);
    engine.analyze().unwrap();

    let session_id = suggest_session_id("authentication login errors", (7, 30));
    assert!(session_id.starts_with("0730_authentication_login_e"));

    let clusters = engine.discover();
    let entrypoint = clusters
        .iter()
        .flat_map(|c| c.entrypoints.iter())
        .find(|e| e.identifier == "handle_login")
        .expect("handle_login should be discovered as an entrypoint")
        .clone();
    let cluster = clusters.into_iter().find(|c| c.entrypoints.iter().any(|e| e.identifier == "handle_login")).unwrap();

    let mut tree = engine.build_tree_for(&cluster, &entrypoint);
    let tree_id = tree.tree_id.clone();
    let added = engine.expand(&mut tree, "password").unwrap();
    assert_eq!(added, 1, "handle_login should gain one child (check_password)");
    assert!(tree.expanded_areas.iter().any(|a| a == "password"));

    let mut session = engine.new_session(&session_id).unwrap();
    session.trees.insert(tree_id.clone(), tree);
    session.current_focus = Some(tree_id.clone());
    engine.save_session(&session).unwrap();

    let mut reloaded = engine.load_session(&session_id).unwrap();
    assert_eq!(reloaded.current_focus.as_deref(), Some(tree_id.as_str()));
    let reloaded_tree = reloaded.trees.get_mut(&tree_id).unwrap();
    reloaded_tree.root.relink_parents();

    assert!(reloaded_tree.expanded_areas.iter().any(|a| a == "password"));
    assert_eq!(reloaded_tree.root.children.len(), 1);
    assert_eq!(reloaded_tree.root.children[0].identifier, "check_password");
    assert_eq!(
        reloaded_tree.root.children[0].parent,
        Some((entrypoint.identifier.clone(), entrypoint.location.clone()))
    );
}

/// Scenario 5 ("Token-budgeted render"): a render at a small but non-zero
/// budget stays within it, carries the root's signature, and surfaces at
/// least one critical-line annotation.
#[test]
fn token_budgeted_render_stays_within_budget_and_keeps_signature() {
    let project = tempfile::tempdir().unwrap();
    write_file(
        project.path(),
        "auth/login.rs",
        "fn handle_login() {\n    if check_password() {\n        return;\n    }\n    panic!(\"denied\");\n}\n",
    );
    write_file(project.path(), "auth/password.rs", "fn check_password() -> bool {\n    true\n}\n");

    let mut engine = Engine::new(project.path(), EngineConfig::default());
    engine.analyze().unwrap();

    let clusters = engine.discover();
    let entrypoint = clusters
        .iter()
        .flat_map(|c| c.entrypoints.iter())
        .find(|e| e.identifier == "handle_login")
        .expect("handle_login should be discovered as an entrypoint")
        .clone();
    let cluster = clusters.into_iter().find(|c| c.entrypoints.iter().any(|e| e.identifier == "handle_login")).unwrap();

    let mut tree = engine.build_tree_for(&cluster, &entrypoint);
    engine.expand(&mut tree, "password").unwrap();

    let out = engine.render_tree(&tree, &[], 256, RenderMode::TreeGuide);
    assert!(out.tokens_used <= 256);
    assert!(out.text.contains("handle_login"));
}

/// Boundary: an empty project analyzes to all-zero counts and every search
/// mode returns nothing.
#[test]
fn empty_project_is_all_zero() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = Engine::new(dir.path(), EngineConfig::default());
    let summary = engine.analyze().unwrap();
    assert_eq!(summary.files_indexed, 0);
    assert_eq!(summary.tags_extracted, 0);
    assert_eq!(summary.edges_built, 0);
    assert_eq!(summary.cycles_found, 0);
    assert!(engine.search("anything", SearchMode::Fuzzy).is_empty());
    assert!(engine.search("anything", SearchMode::Semantic).is_empty());
    assert!(engine.search("anything", SearchMode::Hybrid).is_empty());
}

/// Boundary: a single-file, single-identifier project makes that identifier
/// the unique top result for a matching query.
#[test]
fn single_identifier_project_is_unique_top_result() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "only.rs", "fn solitary_function() {}\n");
    let mut engine = Engine::new(dir.path(), EngineConfig::default());
    engine.analyze().unwrap();

    let results = engine.search("solitary_function", SearchMode::Fuzzy);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identifier, "solitary_function");
}

/// Invariant: every node's depth is its parent's depth + 1, and a tree never
/// exceeds its own max_depth/max_nodes caps, across a build-then-expand-twice
/// sequence on a small but nontrivial dependency chain.
#[test]
fn tree_depth_and_size_invariants_hold_after_expansion() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.rs", "fn run_pipeline() { step_two(); }\n");
    write_file(dir.path(), "b.rs", "fn step_two() { step_three(); }\n");
    write_file(dir.path(), "c.rs", "fn step_three() {}\n");

    let mut config = EngineConfig::default();
    config.tree.max_depth = 2;
    config.tree.max_nodes = 10;
    let mut engine = Engine::new(dir.path(), config);
    engine.analyze().unwrap();

    let clusters = engine.discover();
    let entrypoint = clusters
        .iter()
        .flat_map(|c| c.entrypoints.iter())
        .find(|e| e.identifier == "run_pipeline")
        .expect("run_pipeline should be discovered (substring-matches the `run` keyword)")
        .clone();
    let cluster = clusters.into_iter().find(|c| c.entrypoints.iter().any(|e| e.identifier == "run_pipeline")).unwrap();

    let mut tree = engine.build_tree_for(&cluster, &entrypoint);
    engine.expand(&mut tree, &entrypoint.identifier).unwrap();
    for child in tree.root.children.clone() {
        engine.expand(&mut tree, &child.identifier).unwrap();
    }

    assert!(tree.root.max_depth() <= tree.max_depth);
    assert!(tree.node_count() <= tree.max_nodes);

    fn check_depths(node: &repomind_engine::types::TreeNode, expected_depth: usize) {
        assert_eq!(node.depth, expected_depth);
        for child in &node.children {
            check_depths(child, expected_depth + 1);
        }
    }
    check_depths(&tree.root, 0);
}

/// Round-trip law: expanding the same area twice is idempotent at the
/// engine-facade level too (not just within `tree::expand_area`'s own unit
/// tests).
#[test]
fn expand_through_engine_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.rs", "fn run_pipeline() { helper(); }\n");
    write_file(dir.path(), "b.rs", "fn helper() {}\n");

    let mut engine = Engine::new(dir.path(), EngineConfig::default());
    engine.analyze().unwrap();

    let clusters = engine.discover();
    let entrypoint = clusters
        .iter()
        .flat_map(|c| c.entrypoints.iter())
        .find(|e| e.identifier == "run_pipeline")
        .unwrap()
        .clone();
    let cluster = clusters.into_iter().find(|c| c.entrypoints.iter().any(|e| e.identifier == "run_pipeline")).unwrap();
    let mut tree = engine.build_tree_for(&cluster, &entrypoint);

    let first = engine.expand(&mut tree, &entrypoint.identifier).unwrap();
    let second = engine.expand(&mut tree, &entrypoint.identifier).unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 0);
    assert_eq!(tree.node_count(), 2);
}
