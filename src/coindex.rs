//! Fresh coreference indices, scoped to one pattern application.

use std::sync::LazyLock;

use regex::Regex;

use crate::tree::Tree;

/// Trailing `-<digits>` suffix on a non-empty label stem.
static INDEX_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+-([0-9]+)$").expect("static regex"));

/// Counter for coindexation suffixes. One per top-level application, never a
/// process-wide static; it travels inside the active match context.
#[derive(Debug, Clone, Default)]
pub struct Coindexer {
    last: u32,
}

impl Coindexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rescan the whole tree for the maximum existing index suffix so that
    /// `next_index` only ever hands out indices strictly greater than any
    /// already present. Malformed suffixes are ignored.
    pub fn seed_from(&mut self, tree: &Tree) {
        self.last = 0;
        for id in tree.preorder() {
            if let Some(caps) = INDEX_SUFFIX.captures(tree.label(id)) {
                if let Ok(n) = caps[1].parse::<u32>() {
                    self.last = self.last.max(n);
                }
            }
        }
    }

    pub fn next_index(&mut self) -> u32 {
        self.last += 1;
        self.last
    }
}
