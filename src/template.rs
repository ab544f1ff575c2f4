//! Auxiliary (template) trees for insert/replace/adjoin/createSubtree.
//!
//! A template is parsed once at compile time from a tree literal and is
//! immutable from then on. A trailing unescaped `@` on a leaf label marks the
//! foot node; a trailing unescaped `=name` suffix on any label captures that
//! node under `name`. Both markers are stripped from the stored label; `\@`
//! and `\=` escape them.
//!
//! Every use of a template goes through [`AuxiliaryTree::graft`], which
//! deep-copies the template into the working arena and returns the copy's
//! root, foot, and name captures as one explicit result. The template itself
//! is never mutated, and the foot/captures of a graft always point into the
//! copy, never the original.

use std::collections::HashMap;
use std::fmt;

use crate::error::CompileError;
use crate::tree::{NodeId, Tree};

/// The reserved foot-marker character.
pub const FOOT_MARKER: char = '@';

/// The capture-name separator.
pub const NAME_SEPARATOR: char = '=';

#[derive(Debug, Clone)]
pub struct AuxiliaryTree {
    tree: Tree,
    foot: Option<NodeId>,
    names: Vec<(String, NodeId)>,
}

/// A fresh structural copy of a template, living in the destination arena.
#[derive(Debug)]
pub struct Grafted {
    /// Detached root of the copy.
    pub root: NodeId,
    /// The copy's own foot node, if the template had one.
    pub foot: Option<NodeId>,
    /// Capture names, each bound to a node of the copy.
    pub names: Vec<(String, NodeId)>,
}

impl AuxiliaryTree {
    /// Parse a tree literal and extract foot/name markers from its labels.
    pub fn parse(text: &str) -> Result<Self, CompileError> {
        Self::from_tree(Tree::parse(text)?)
    }

    /// Extract foot/name markers from an already parsed literal.
    pub fn from_tree(mut tree: Tree) -> Result<Self, CompileError> {
        let mut foot = None;
        let mut names = Vec::new();
        for id in tree.preorder() {
            let raw = tree.label(id).to_string();
            let (stem, name) = split_name_capture(&raw);
            let (stem, is_foot) = split_foot_marker(stem, tree.is_leaf(id));
            if let Some(name) = name {
                names.push((name, id));
            }
            if is_foot {
                if foot.is_some() {
                    return Err(CompileError::MultipleFootNodes);
                }
                foot = Some(id);
            }
            tree.set_label(id, unescape_markers(stem));
        }
        Ok(Self { tree, foot, names })
    }

    pub fn has_foot(&self) -> bool {
        self.foot.is_some()
    }

    /// The stored template tree, markers already stripped from its labels.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Adjoin-family templates must carry an explicit foot.
    pub fn require_foot(self, verb: &'static str) -> Result<Self, CompileError> {
        if self.foot.is_none() {
            return Err(CompileError::MissingFoot(verb));
        }
        Ok(self)
    }

    /// createSubtree rule: a footless template is accepted only when it is a
    /// single bare leaf, which then serves as its own foot.
    pub fn foot_or_leaf_root(mut self, verb: &'static str) -> Result<Self, CompileError> {
        if self.foot.is_none() {
            if !self.tree.is_leaf(self.tree.root()) {
                return Err(CompileError::MissingFoot(verb));
            }
            self.foot = Some(self.tree.root());
        }
        Ok(self)
    }

    /// Deep-copy the template into `dst`, re-deriving the foot pointer and the
    /// capture map against the copy.
    pub fn graft(&self, dst: &mut Tree) -> Grafted {
        let mut map: HashMap<NodeId, NodeId> = HashMap::new();
        let root = dst.import(&self.tree, self.tree.root(), &mut |from, to| {
            map.insert(from, to);
        });
        Grafted {
            root,
            foot: self.foot.map(|f| map[&f]),
            names: self
                .names
                .iter()
                .map(|(name, node)| (name.clone(), map[node]))
                .collect(),
        }
    }

    fn render_node(&self, id: NodeId, out: &mut String) {
        let mut label = escape_markers(self.tree.label(id));
        if self.foot == Some(id) {
            label.push(FOOT_MARKER);
        }
        if let Some((name, _)) = self.names.iter().find(|(_, node)| *node == id) {
            label.push(NAME_SEPARATOR);
            label.push_str(name);
        }
        if self.tree.is_leaf(id) {
            out.push_str(&label);
            return;
        }
        out.push('(');
        out.push_str(&label);
        for &child in self.tree.children(id) {
            out.push(' ');
            self.render_node(child, out);
        }
        out.push(')');
    }
}

impl fmt::Display for AuxiliaryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render_node(self.tree.root(), &mut out);
        write!(f, "{out}")
    }
}

/// Split a trailing unescaped `=name` capture off a raw label.
fn split_name_capture(raw: &str) -> (&str, Option<String>) {
    if let Some(at) = find_last_unescaped(raw, NAME_SEPARATOR) {
        let name = &raw[at + NAME_SEPARATOR.len_utf8()..];
        if !name.is_empty() && at > 0 {
            return (&raw[..at], Some(name.to_string()));
        }
    }
    (raw, None)
}

/// Strip a trailing unescaped `@` from a leaf label.
fn split_foot_marker(raw: &str, is_leaf: bool) -> (&str, bool) {
    if is_leaf && raw.len() > 1 && raw.ends_with(FOOT_MARKER) {
        let at = raw.len() - FOOT_MARKER.len_utf8();
        if find_last_unescaped(raw, FOOT_MARKER) == Some(at) {
            return (&raw[..at], true);
        }
    }
    (raw, false)
}

/// Byte index of the last occurrence of `marker` not preceded by an odd run
/// of backslashes.
fn find_last_unescaped(raw: &str, marker: char) -> Option<usize> {
    let bytes = raw.as_bytes();
    let marker = marker as u8;
    for i in (0..bytes.len()).rev() {
        if bytes[i] != marker {
            continue;
        }
        let backslashes = bytes[..i].iter().rev().take_while(|&&b| b == b'\\').count();
        if backslashes % 2 == 0 {
            return Some(i);
        }
    }
    None
}

/// Drop the backslash in front of escaped marker characters.
fn unescape_markers(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(&next) if next == FOOT_MARKER || next == NAME_SEPARATOR || next == '\\' => {
                    out.push(next);
                    chars.next();
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}

/// Re-escape marker characters for rendering a template back to literal text.
fn escape_markers(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if c == FOOT_MARKER || c == NAME_SEPARATOR || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_template_has_no_foot_or_names() {
        let aux = AuxiliaryTree::parse("(NP (DT the) (NN dog))").unwrap();
        assert!(!aux.has_foot());
        assert!(aux.names.is_empty());
    }

    #[test]
    fn foot_marker_on_leaf() {
        let aux = AuxiliaryTree::parse("(SBAR (IN that) S@)").unwrap();
        let foot = aux.foot.unwrap();
        assert_eq!(aux.tree.label(foot), "S");
        assert!(aux.tree.is_leaf(foot));
    }

    #[test]
    fn name_capture_on_any_node() {
        let aux = AuxiliaryTree::parse("(NP=np (DT the) (NN=head dog))").unwrap();
        assert_eq!(aux.names.len(), 2);
        assert_eq!(aux.names[0].0, "np");
        assert_eq!(aux.tree.label(aux.names[0].1), "NP");
        assert_eq!(aux.tree.label(aux.names[1].1), "NN");
    }

    #[test]
    fn foot_and_name_combined() {
        let aux = AuxiliaryTree::parse("(VP VB@=verb)").unwrap();
        let foot = aux.foot.unwrap();
        assert_eq!(aux.tree.label(foot), "VB");
        assert_eq!(aux.names, vec![("verb".to_string(), foot)]);
    }

    #[test]
    fn escaped_markers_stay_literal() {
        let aux = AuxiliaryTree::parse("(X a\\=b c\\@)").unwrap();
        assert!(!aux.has_foot());
        assert!(aux.names.is_empty());
        let kids = aux.tree.children(aux.tree.root()).to_vec();
        assert_eq!(aux.tree.label(kids[0]), "a=b");
        assert_eq!(aux.tree.label(kids[1]), "c@");
    }

    #[test]
    fn two_feet_rejected() {
        assert_eq!(
            AuxiliaryTree::parse("(X a@ b@)").unwrap_err(),
            CompileError::MultipleFootNodes
        );
    }

    #[test]
    fn require_foot_enforced() {
        let aux = AuxiliaryTree::parse("(X a b)").unwrap();
        assert_eq!(
            aux.require_foot("adjoin").unwrap_err(),
            CompileError::MissingFoot("adjoin")
        );
    }

    #[test]
    fn bare_leaf_becomes_its_own_foot() {
        let aux = AuxiliaryTree::parse("NP").unwrap();
        let aux = aux.foot_or_leaf_root("createSubtree").unwrap();
        assert_eq!(aux.foot, Some(aux.tree.root()));
    }

    #[test]
    fn footless_multi_node_subtree_template_rejected() {
        let aux = AuxiliaryTree::parse("(NP x)").unwrap();
        assert_eq!(
            aux.foot_or_leaf_root("createSubtree").unwrap_err(),
            CompileError::MissingFoot("createSubtree")
        );
    }

    #[test]
    fn graft_copies_are_shape_equal() {
        let aux = AuxiliaryTree::parse("(SBAR (IN that) S@=s)").unwrap();
        let mut dst = Tree::parse("(ROOT x)").unwrap();
        let first = aux.graft(&mut dst);
        let second = aux.graft(&mut dst);
        assert_eq!(dst.render(first.root), dst.render(second.root));
        assert_ne!(first.root, second.root);
    }

    #[test]
    fn graft_rebinds_foot_and_names_to_copy() {
        let aux = AuxiliaryTree::parse("(SBAR (IN that) S@=s)").unwrap();
        let mut dst = Tree::parse("(ROOT x)").unwrap();
        let grafted = aux.graft(&mut dst);
        let foot = grafted.foot.unwrap();
        assert_eq!(dst.label(foot), "S");
        assert_eq!(grafted.names, vec![("s".to_string(), foot)]);
        // The graft lives in dst, detached until an operation attaches it.
        assert_eq!(dst.parent(grafted.root), None);
        assert_eq!(dst.render(grafted.root), "(SBAR (IN that) S)");
    }

    #[test]
    fn display_roundtrips_markers() {
        let aux = AuxiliaryTree::parse("(SBAR (IN that) S@=s)").unwrap();
        let text = aux.to_string();
        let reparsed = AuxiliaryTree::parse(&text).unwrap();
        assert_eq!(reparsed.to_string(), text);
        assert!(reparsed.has_foot());
        assert_eq!(reparsed.names.len(), 1);
    }

    #[test]
    fn lone_marker_labels_are_not_markers() {
        // "@" as a whole label is a label, not a foot marker on an empty stem.
        let aux = AuxiliaryTree::parse("(X @)").unwrap();
        assert!(!aux.has_foot());
        // "=x" as a whole label has an empty stem; not a capture.
        let aux = AuxiliaryTree::parse("(X =x)").unwrap();
        assert!(aux.names.is_empty());
    }
}
