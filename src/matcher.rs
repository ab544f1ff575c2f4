//! The match-source boundary and per-application match state.
//!
//! The pattern matcher itself is an external collaborator: this crate only
//! consumes successive matches and name/variable bindings through the
//! [`Matcher`] trait. Two small implementations ship with the crate so the
//! binary and the tests have a real match source; neither is a structural
//! pattern language.

use std::collections::HashMap;

use regex::Regex;

use crate::coindex::Coindexer;
use crate::error::RuntimeError;
use crate::tree::{NodeId, Tree};

/// A source of successive matches over a tree.
///
/// `find` is handed the *current* tree on every call; after a mutating
/// operation the orchestrator re-queries with the new tree, since previous
/// match positions are invalid.
pub trait Matcher {
    /// Advance to the next match on `tree`. Returns false when exhausted.
    fn find(&mut self, tree: &Tree) -> bool;

    /// A node bound to `name` by the current match.
    fn node(&self, name: &str) -> Option<NodeId>;

    /// A string variable captured by the current match.
    fn variable(&self, name: &str) -> Option<&str>;
}

/// All mutable state for one top-level pattern application: the name binding
/// table (seeded by the matcher, extended by grafts), the coindexer, and a
/// handle back to the matcher for fallback lookups.
pub struct MatchContext<'a> {
    matcher: &'a dyn Matcher,
    bindings: HashMap<String, NodeId>,
    pub coindexer: Coindexer,
}

impl<'a> MatchContext<'a> {
    pub fn new(matcher: &'a dyn Matcher, coindexer: Coindexer) -> Self {
        Self {
            matcher,
            bindings: HashMap::new(),
            coindexer,
        }
    }

    /// Resolve a capture name: the local binding table first, then the
    /// matcher's own bindings.
    pub fn fetch(&self, name: &str) -> Result<NodeId, RuntimeError> {
        if let Some(&node) = self.bindings.get(name) {
            return Ok(node);
        }
        self.matcher
            .node(name)
            .ok_or_else(|| RuntimeError::UnboundName(name.to_string()))
    }

    /// Whether `name` would resolve (used by `if exists`).
    pub fn is_resolvable(&self, name: &str) -> bool {
        self.bindings.contains_key(name) || self.matcher.node(name).is_some()
    }

    /// Publish a binding produced by an auxiliary-tree graft.
    pub fn bind(&mut self, name: String, node: NodeId) {
        self.bindings.insert(name, node);
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.matcher.variable(name)
    }
}

/// Binds one name to the first preorder node whose label matches a regex.
///
/// Named capture groups of the regex are exposed as string variables of the
/// match. `find` always restarts from the root, so a script must make the
/// match disappear for the apply loop to terminate.
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    name: String,
    pattern: Regex,
    bound: Option<NodeId>,
    variables: HashMap<String, String>,
}

impl LabelMatcher {
    pub fn new(name: impl Into<String>, pattern: Regex) -> Self {
        Self {
            name: name.into(),
            pattern,
            bound: None,
            variables: HashMap::new(),
        }
    }
}

impl Matcher for LabelMatcher {
    fn find(&mut self, tree: &Tree) -> bool {
        self.bound = None;
        self.variables.clear();
        for id in tree.preorder() {
            let Some(caps) = self.pattern.captures(tree.label(id)) else {
                continue;
            };
            self.bound = Some(id);
            for group in self.pattern.capture_names().flatten() {
                if let Some(m) = caps.name(group) {
                    self.variables.insert(group.to_string(), m.as_str().to_string());
                }
            }
            return true;
        }
        false
    }

    fn node(&self, name: &str) -> Option<NodeId> {
        if name == self.name { self.bound } else { None }
    }

    fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }
}

/// A one-shot matcher with preset bindings, for embedding and tests: `find`
/// succeeds exactly once, with node ids the caller obtained from the tree it
/// is about to apply against.
#[derive(Debug, Clone, Default)]
pub struct StaticMatcher {
    nodes: HashMap<String, NodeId>,
    variables: HashMap<String, String>,
    fired: bool,
}

impl StaticMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, name: impl Into<String>, node: NodeId) -> Self {
        self.nodes.insert(name.into(), node);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

impl Matcher for StaticMatcher {
    fn find(&mut self, _tree: &Tree) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }

    fn node(&self, name: &str) -> Option<NodeId> {
        self.nodes.get(name).copied()
    }

    fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_matcher_binds_first_preorder_match() {
        let tree = Tree::parse("(S (NP -NONE-) (VP -NONE-))").unwrap();
        let mut matcher = LabelMatcher::new("ed", Regex::new("^-NONE-$").unwrap());
        assert!(matcher.find(&tree));
        let bound = matcher.node("ed").unwrap();
        assert_eq!(tree.label(bound), "-NONE-");
        // First preorder hit is the one under NP.
        let np = tree.children(tree.root())[0];
        assert_eq!(tree.parent(bound), Some(np));
    }

    #[test]
    fn label_matcher_misses() {
        let tree = Tree::parse("(S (NP a))").unwrap();
        let mut matcher = LabelMatcher::new("x", Regex::new("^ZZZ$").unwrap());
        assert!(!matcher.find(&tree));
        assert_eq!(matcher.node("x"), None);
    }

    #[test]
    fn label_matcher_exposes_named_groups_as_variables() {
        let tree = Tree::parse("(S (NP-SBJ a))").unwrap();
        let mut matcher = LabelMatcher::new("np", Regex::new("^NP-(?P<tag>[A-Z]+)$").unwrap());
        assert!(matcher.find(&tree));
        assert_eq!(matcher.variable("tag"), Some("SBJ"));
        assert_eq!(matcher.variable("other"), None);
    }

    #[test]
    fn static_matcher_fires_once() {
        let tree = Tree::parse("(S a)").unwrap();
        let mut matcher = StaticMatcher::new().with_node("root", tree.root());
        assert!(matcher.find(&tree));
        assert!(!matcher.find(&tree));
        assert_eq!(matcher.node("root"), Some(tree.root()));
    }

    #[test]
    fn context_prefers_local_bindings() {
        let tree = Tree::parse("(S (NP a))").unwrap();
        let np = tree.children(tree.root())[0];
        let matcher = StaticMatcher::new().with_node("n", tree.root());
        let mut ctx = MatchContext::new(&matcher, Coindexer::new());
        assert_eq!(ctx.fetch("n").unwrap(), tree.root());
        ctx.bind("n".to_string(), np);
        assert_eq!(ctx.fetch("n").unwrap(), np);
    }

    #[test]
    fn context_reports_unbound_names() {
        let matcher = StaticMatcher::new();
        let ctx = MatchContext::new(&matcher, Coindexer::new());
        assert_eq!(
            ctx.fetch("ghost").unwrap_err(),
            RuntimeError::UnboundName("ghost".to_string())
        );
        assert!(!ctx.is_resolvable("ghost"));
    }
}
