//! A compiled surgery script plus the match-mutate-rematch driver.

use std::fmt;

use rayon::prelude::*;

use crate::coindex::Coindexer;
use crate::error::{CompileError, RuntimeError};
use crate::matcher::{MatchContext, Matcher};
use crate::op::Op;
use crate::script;
use crate::tree::Tree;

/// A compiled script, reusable across trees and matchers.
#[derive(Debug, Clone)]
pub struct SurgeryPattern {
    op: Op,
}

impl SurgeryPattern {
    pub fn compile(text: &str) -> Result<Self, CompileError> {
        Ok(Self {
            op: script::compile(text)?,
        })
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Apply the script exhaustively: find a match, run every operation
    /// against it, then re-match against the mutated tree until the matcher
    /// finds nothing. Returns `None` when an operation eliminated the whole
    /// tree.
    ///
    /// Termination is the script's responsibility: a script that never makes
    /// its own match disappear will loop.
    pub fn apply(
        &self,
        mut tree: Tree,
        matcher: &mut dyn Matcher,
    ) -> Result<Option<Tree>, RuntimeError> {
        while matcher.find(&tree) {
            // Fresh per-match state; the coindexer re-reads the current
            // labels so indices stay above anything already present.
            let mut coindexer = Coindexer::new();
            coindexer.seed_from(&tree);
            let mut ctx = MatchContext::new(&*matcher, coindexer);
            if self.op.evaluate(&mut tree, &mut ctx)?.is_none() {
                return Ok(None);
            }
        }
        Ok(Some(tree))
    }

    /// Apply across a batch in parallel, one fresh matcher per tree. A tree
    /// that fails at runtime is kept unmodified (with a warning); an
    /// eliminated tree is dropped from the output.
    pub fn apply_to_many<M, F>(&self, trees: Vec<Tree>, make_matcher: F) -> Vec<Tree>
    where
        M: Matcher,
        F: Fn() -> M + Sync,
    {
        trees
            .into_par_iter()
            .filter_map(|tree| {
                let mut matcher = make_matcher();
                match self.apply(tree.clone(), &mut matcher) {
                    Ok(result) => result,
                    Err(e) => {
                        eprintln!("warning: skipping tree after failed surgery: {e}");
                        Some(tree)
                    }
                }
            })
            .collect()
    }
}

impl fmt::Display for SurgeryPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)
    }
}
