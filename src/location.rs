//! Attachment points: a relation operator plus a reference node.

use std::fmt;

use crate::error::RuntimeError;
use crate::matcher::MatchContext;
use crate::op::Op;
use crate::tree::{NodeId, Tree};

/// How an insertion point relates to the reference node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// `>N`: the N-th child slot of the reference, counting from the left
    /// (1-based).
    NthChild(usize),
    /// `>-N`: the N-th child slot counting from the right (1-based), so
    /// `>-1` appends.
    NthChildFromRight(usize),
    /// `$+`: immediately before the reference, under its parent.
    Before,
    /// `$-`: immediately after the reference, under its parent.
    After,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::NthChild(n) => write!(f, ">{n}"),
            Relation::NthChildFromRight(n) => write!(f, ">-{n}"),
            Relation::Before => write!(f, "$+"),
            Relation::After => write!(f, "$-"),
        }
    }
}

/// A relation plus one operand that resolves to the reference node at apply
/// time.
#[derive(Debug, Clone)]
pub struct TreeLocation {
    pub relation: Relation,
    pub anchor: Box<Op>,
}

impl TreeLocation {
    pub fn new(relation: Relation, anchor: Op) -> Self {
        Self {
            relation,
            anchor: Box::new(anchor),
        }
    }

    /// Compute the (parent, child index) attachment point against the current
    /// tree. Index bounds are checked against the attachment parent's child
    /// list as it stands right now.
    pub fn resolve(
        &self,
        tree: &mut Tree,
        ctx: &mut MatchContext<'_>,
    ) -> Result<(NodeId, usize), RuntimeError> {
        let reference = self
            .anchor
            .evaluate(tree, ctx)?
            .ok_or(RuntimeError::MissingOperand { verb: "location" })?;
        match self.relation {
            Relation::NthChild(n) => {
                let len = tree.children(reference).len();
                // Positions are 1-based; 0 never came from the grammar but is
                // reachable through `Relation` directly.
                let index = n
                    .checked_sub(1)
                    .ok_or(RuntimeError::ChildIndexOutOfRange { index: 0, len })?;
                if index > len {
                    return Err(RuntimeError::ChildIndexOutOfRange { index, len });
                }
                Ok((reference, index))
            }
            Relation::NthChildFromRight(n) => {
                let len = tree.children(reference).len();
                let offset = n
                    .checked_sub(1)
                    .ok_or(RuntimeError::ChildIndexOutOfRange { index: 0, len })?;
                if offset > len {
                    return Err(RuntimeError::ChildIndexOutOfRange { index: offset, len });
                }
                Ok((reference, len - offset))
            }
            Relation::Before | Relation::After => {
                let parent = tree.parent(reference).ok_or(RuntimeError::AnchorIsRoot)?;
                let index = tree
                    .index_in_parent(reference)
                    .ok_or(RuntimeError::UnattachedNode { verb: "location" })?;
                match self.relation {
                    Relation::Before => Ok((parent, index)),
                    _ => Ok((parent, index + 1)),
                }
            }
        }
    }
}

impl fmt::Display for TreeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.relation, self.anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coindex::Coindexer;
    use crate::matcher::StaticMatcher;

    fn context(matcher: &StaticMatcher) -> MatchContext<'_> {
        MatchContext::new(matcher, Coindexer::new())
    }

    #[test]
    fn nth_child_from_left() {
        let mut tree = Tree::parse("(S a b c)").unwrap();
        let matcher = StaticMatcher::new().with_node("s", tree.root());
        let mut ctx = context(&matcher);
        let loc = TreeLocation::new(Relation::NthChild(2), Op::Fetch("s".to_string()));
        assert_eq!(loc.resolve(&mut tree, &mut ctx).unwrap(), (tree.root(), 1));
    }

    #[test]
    fn nth_child_from_left_may_append() {
        let mut tree = Tree::parse("(S a b)").unwrap();
        let matcher = StaticMatcher::new().with_node("s", tree.root());
        let mut ctx = context(&matcher);
        let loc = TreeLocation::new(Relation::NthChild(3), Op::Fetch("s".to_string()));
        assert_eq!(loc.resolve(&mut tree, &mut ctx).unwrap(), (tree.root(), 2));
        let loc = TreeLocation::new(Relation::NthChild(4), Op::Fetch("s".to_string()));
        assert!(matches!(
            loc.resolve(&mut tree, &mut ctx),
            Err(RuntimeError::ChildIndexOutOfRange { index: 3, len: 2 })
        ));
    }

    #[test]
    fn nth_child_from_right() {
        let mut tree = Tree::parse("(S a b c)").unwrap();
        let matcher = StaticMatcher::new().with_node("s", tree.root());
        let mut ctx = context(&matcher);
        // >-1 appends: the inserted node becomes the rightmost child.
        let loc = TreeLocation::new(Relation::NthChildFromRight(1), Op::Fetch("s".to_string()));
        assert_eq!(loc.resolve(&mut tree, &mut ctx).unwrap(), (tree.root(), 3));
        // >-4 prepends when there are three children.
        let loc = TreeLocation::new(Relation::NthChildFromRight(4), Op::Fetch("s".to_string()));
        assert_eq!(loc.resolve(&mut tree, &mut ctx).unwrap(), (tree.root(), 0));
    }

    #[test]
    fn position_zero_is_out_of_range_not_a_panic() {
        let mut tree = Tree::parse("(S a b)").unwrap();
        let matcher = StaticMatcher::new().with_node("s", tree.root());
        let mut ctx = context(&matcher);
        for relation in [Relation::NthChild(0), Relation::NthChildFromRight(0)] {
            let loc = TreeLocation::new(relation, Op::Fetch("s".to_string()));
            assert!(matches!(
                loc.resolve(&mut tree, &mut ctx),
                Err(RuntimeError::ChildIndexOutOfRange { index: 0, len: 2 })
            ));
        }
    }

    #[test]
    fn before_and_after_a_sibling() {
        let mut tree = Tree::parse("(S (NP a) (VP b))").unwrap();
        let vp = tree.children(tree.root())[1];
        let matcher = StaticMatcher::new().with_node("vp", vp);
        let mut ctx = context(&matcher);
        let before = TreeLocation::new(Relation::Before, Op::Fetch("vp".to_string()));
        assert_eq!(before.resolve(&mut tree, &mut ctx).unwrap(), (tree.root(), 1));
        let after = TreeLocation::new(Relation::After, Op::Fetch("vp".to_string()));
        assert_eq!(after.resolve(&mut tree, &mut ctx).unwrap(), (tree.root(), 2));
    }

    #[test]
    fn before_the_root_fails() {
        let mut tree = Tree::parse("(S a)").unwrap();
        let matcher = StaticMatcher::new().with_node("s", tree.root());
        let mut ctx = context(&matcher);
        let loc = TreeLocation::new(Relation::Before, Op::Fetch("s".to_string()));
        assert_eq!(
            loc.resolve(&mut tree, &mut ctx).unwrap_err(),
            RuntimeError::AnchorIsRoot
        );
    }

    #[test]
    fn unbound_anchor_fails() {
        let mut tree = Tree::parse("(S a)").unwrap();
        let matcher = StaticMatcher::new();
        let mut ctx = context(&matcher);
        let loc = TreeLocation::new(Relation::NthChild(1), Op::Fetch("ghost".to_string()));
        assert_eq!(
            loc.resolve(&mut tree, &mut ctx).unwrap_err(),
            RuntimeError::UnboundName("ghost".to_string())
        );
    }

    #[test]
    fn relation_display() {
        assert_eq!(Relation::NthChild(2).to_string(), ">2");
        assert_eq!(Relation::NthChildFromRight(1).to_string(), ">-1");
        assert_eq!(Relation::Before.to_string(), "$+");
        assert_eq!(Relation::After.to_string(), "$-");
    }
}
