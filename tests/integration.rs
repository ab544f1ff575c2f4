//! Integration tests for the tree surgery pipeline.
//!
//! These tests exercise the full path a CLI run takes: reading bracketed
//! trees from real files, compiling script lines, and driving the
//! match-mutate-rematch loop over whole forests.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use treesurgeon::matcher::LabelMatcher;
use treesurgeon::pattern::SurgeryPattern;
use treesurgeon::tree::Tree;

/// Create a temporary directory with a unique name for each test.
fn temp_dir(test_name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("treesurgeon_integration_{test_name}"));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn label_matcher(name: &str, pattern: &str) -> LabelMatcher {
    LabelMatcher::new(name, Regex::new(pattern).unwrap())
}

/// Read a forest from disk and push it through a sequence of script lines.
fn surgery(path: &Path, scripts: &[&str], name: &str, pattern: &str) -> Vec<String> {
    let text = fs::read_to_string(path).unwrap();
    let mut trees = Tree::parse_forest(&text).unwrap();
    for script in scripts {
        let compiled = SurgeryPattern::compile(script).unwrap();
        trees = compiled.apply_to_many(trees, || label_matcher(name, pattern));
    }
    for tree in &trees {
        tree.validate().unwrap();
    }
    trees.iter().map(Tree::to_string).collect()
}

#[test]
fn prune_empty_elements_across_a_forest() {
    let dir = temp_dir("prune_forest");
    let file = write_file(
        &dir,
        "trees.mrg",
        "(S (NP (-NONE- *T*)) (VP sleeps))\n\
         (S (NP dogs) (VP (V bark) (NP (-NONE- *))))\n",
    );
    let out = surgery(&file, &["prune ed"], "ed", "^-NONE-$");
    assert_eq!(
        out,
        vec!["(S (VP sleeps))", "(S (NP dogs) (VP (V bark)))"]
    );
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn relabel_strips_function_tags_everywhere() {
    let dir = temp_dir("relabel_tags");
    let file = write_file(
        &dir,
        "trees.mrg",
        "(S (NP-SBJ dogs) (VP (V chase) (NP-OBJ cats)))\n",
    );
    let out = surgery(&file, &["relabel np /^(NP)-.+$/$1/"], "np", "^NP-");
    assert_eq!(out, vec!["(S (NP dogs) (VP (V chase) (NP cats)))"]);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn excise_collapses_unary_chains() {
    let dir = temp_dir("excise_unary");
    let file = write_file(&dir, "trees.mrg", "(S (X (NP (NN dog))))\n");
    let out = surgery(&file, &["excise x x"], "x", "^X$");
    assert_eq!(out, vec!["(S (NP (NN dog)))"]);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn insert_then_coindex_in_one_pass() {
    let dir = temp_dir("insert_coindex");
    let file = write_file(&dir, "trees.mrg", "(S (VP (VB sleep)))\n");
    let out = surgery(
        &file,
        &["[insert (NP=subj (-NONE- *)) $+ vp] [coindex subj vp]"],
        "vp",
        "^VP$",
    );
    assert_eq!(out, vec!["(S (NP-1 (-NONE- *)) (VP-1 (VB sleep)))"]);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn move_and_create_subtree_compose() {
    let dir = temp_dir("move_create");
    let file = write_file(&dir, "trees.mrg", "(S (DT0 the) (NN dog) (VBZ barks))\n");
    // First wrap the determiner in an NP, then move the noun in after it.
    let text = fs::read_to_string(&file).unwrap();
    let mut trees = Tree::parse_forest(&text).unwrap();
    // The relabel makes the match disappear, so the wrap runs exactly once.
    let wrap = SurgeryPattern::compile("[createSubtree NP dt0] [relabel dt0 DT]").unwrap();
    trees = wrap.apply_to_many(trees, || label_matcher("dt0", "^DT0$"));
    let pull = SurgeryPattern::compile("move nn >-1 np").unwrap();
    let mut moved = Vec::new();
    for tree in trees {
        let nn = tree
            .preorder()
            .into_iter()
            .find(|&id| tree.label(id) == "NN")
            .unwrap();
        let np = tree
            .preorder()
            .into_iter()
            .find(|&id| tree.label(id) == "NP")
            .unwrap();
        let mut matcher = treesurgeon::StaticMatcher::new()
            .with_node("nn", nn)
            .with_node("np", np);
        moved.push(pull.apply(tree, &mut matcher).unwrap().unwrap());
    }
    assert_eq!(
        moved[0].to_string(),
        "(S (NP (DT the) (NN dog)) (VBZ barks))"
    );
    moved[0].validate().unwrap();
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn adjoin_wraps_every_matching_verb_phrase() {
    let dir = temp_dir("adjoin_vps");
    let file = write_file(
        &dir,
        "trees.mrg",
        "(S (OLDVP eats))\n(S (OLDVP (V runs) (ADV far)))\n",
    );
    let out = surgery(
        &file,
        &["adjoin (VP (ADVP quickly) INNER@) vp"],
        "vp",
        "^OLDVP$",
    );
    assert_eq!(
        out,
        vec![
            "(S (VP (ADVP quickly) (INNER eats)))",
            "(S (VP (ADVP quickly) (INNER (V runs) (ADV far))))",
        ]
    );
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn delete_can_eliminate_whole_trees_from_a_forest() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "trees.mrg", "(JUNK x)\n(S (NP dogs))\n");
    let out = surgery(&file, &["delete junk"], "junk", "^JUNK$");
    assert_eq!(out, vec!["(S (NP dogs))"]);
}

#[test]
fn if_exists_skips_trees_without_the_optional_binding() {
    let dir = temp_dir("if_exists");
    let file = write_file(&dir, "trees.mrg", "(S (NP-SBJ-9 dogs) (VP bark))\n");
    let out = surgery(
        &file,
        &["[if exists ghost relabel np NEVER] [relabel np /^NP-SBJ-([0-9]+)$/NP-$1/]"],
        "np",
        "^NP-SBJ",
    );
    // The `ghost` body never ran; the unconditional relabel did.
    assert_eq!(out, vec!["(S (NP-9 dogs) (VP bark))"]);
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn replace_swaps_subtrees_with_literals() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "trees.mrg", "(S (FOO a b) (VP ok))\n");
    let out = surgery(
        &file,
        &["replace foo (BAR (X x)) (BAZ y)"],
        "foo",
        "^FOO$",
    );
    assert_eq!(out, vec!["(S (BAR (X x)) (BAZ y) (VP ok))"]);
}
