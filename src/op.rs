//! The surgery operation AST and its evaluators.
//!
//! One variant per verb, evaluated by pattern matching rather than virtual
//! dispatch. Every evaluator receives the current working tree and the active
//! match context and returns either the denoted node (operand-position ops
//! like `Fetch`/`Hold`), the possibly-new root (mutating ops), or `None`,
//! meaning the whole working tree was eliminated and callers must stop
//! applying further operations.
//!
//! The evaluation order of each variant's operands is significant and fixed;
//! it is spelled out per variant below.

use std::fmt;

use regex::Regex;

use crate::error::RuntimeError;
use crate::location::TreeLocation;
use crate::matcher::MatchContext;
use crate::template::AuxiliaryTree;
use crate::tree::{NodeId, Tree};

/// One piece of a regex-relabel replacement, assembled left to right at apply
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacePiece {
    /// Literal text, passed through to `Regex::replace_all` (so `$1` group
    /// references keep working).
    Literal(String),
    /// `%{name}`: the matcher's captured string variable, with quote
    /// characters stripped.
    Variable(String),
    /// `={name}`: the captured node's label, with quote characters stripped.
    NodeLabel(String),
}

#[derive(Debug, Clone)]
pub enum Op {
    /// A node reference: the binding table first, then the matcher.
    Fetch(String),
    /// A tree literal in operand position; each evaluation grafts a fresh
    /// copy into the working arena and publishes its capture names.
    Hold(AuxiliaryTree),
    /// Remove each referenced node (left to right) from its parent.
    /// Referencing the root eliminates the tree.
    Delete(Vec<Op>),
    /// Like delete, then remove any ancestor left with zero children. The
    /// cascade stops at (and never removes) the root.
    Prune(Vec<Op>),
    /// Set the target's label to a literal.
    RelabelLit { target: Box<Op>, label: String },
    /// Rewrite the target's label with a regex. The raw pattern/replacement
    /// text is kept for rendering.
    RelabelRegex {
        target: Box<Op>,
        pattern: Regex,
        pattern_src: String,
        replacement_src: String,
        pieces: Vec<ReplacePiece>,
    },
    /// Remove the chain from `top` down to `bottom` (evaluated in that
    /// order), splicing `bottom`'s children into `top`'s former position.
    Excise { top: Box<Op>, bottom: Box<Op> },
    /// Evaluate the item, then resolve the location, then attach. Fetched
    /// nodes are deep-copied before insertion; grafted literals are already
    /// fresh.
    Insert { item: Box<Op>, location: TreeLocation },
    /// Evaluate the item, detach it, then resolve the location against the
    /// already-mutated tree, then attach. No root-elimination check: moving
    /// the root is assumed impossible by grammar construction, matching the
    /// original semantics.
    Move { item: Box<Op>, location: TreeLocation },
    /// Splice the replacements (left to right, each deep-copied) into the old
    /// node's position. Replacing the root takes exactly one replacement.
    Replace { old: Box<Op>, replacements: Vec<Op> },
    /// Nest the inclusive child span from `start` to `end` (same parent)
    /// under a fresh copy of the template, attached at the span's position.
    CreateSubtree {
        template: AuxiliaryTree,
        start: Box<Op>,
        end: Option<Box<Op>>,
    },
    /// Graft the template, move the target's children under its foot, and put
    /// the template's root where the target was.
    Adjoin {
        template: AuxiliaryTree,
        target: Box<Op>,
    },
    /// Like adjoin, but the target node itself is retained: it takes over the
    /// template root's children and the template root is discarded.
    AdjoinToHead {
        template: AuxiliaryTree,
        target: Box<Op>,
    },
    /// Splice the template (foot excluded) into the target's former position
    /// and re-insert the target where the foot was. A template whose foot is
    /// its root makes this a no-op.
    AdjoinToFoot {
        template: AuxiliaryTree,
        target: Box<Op>,
    },
    /// Draw one fresh index, then append `-<index>` to every referenced
    /// node's label (left to right).
    Coindex(Vec<Op>),
    /// Run the body only when `name` is (or, negated, is not) resolvable in
    /// the current match.
    IfExists {
        name: String,
        negated: bool,
        body: Vec<Op>,
    },
    /// A bracketed operation list, run in order under one compiled unit.
    Sequence(Vec<Op>),
}

/// Evaluate an operand that must denote a node.
fn expect_node(
    op: &Op,
    tree: &mut Tree,
    ctx: &mut MatchContext<'_>,
    verb: &'static str,
) -> Result<NodeId, RuntimeError> {
    op.evaluate(tree, ctx)?
        .ok_or(RuntimeError::MissingOperand { verb })
}

/// Evaluate an operand destined for insertion. Fetched nodes are deep-copied;
/// a grafted literal is already a fresh detached copy.
fn evaluate_insertable(
    op: &Op,
    tree: &mut Tree,
    ctx: &mut MatchContext<'_>,
    verb: &'static str,
) -> Result<NodeId, RuntimeError> {
    let node = expect_node(op, tree, ctx, verb)?;
    match op {
        Op::Fetch(_) => Ok(tree.copy_subtree(node)),
        _ => Ok(node),
    }
}

/// The source's regex-relabel substitutions strip quote characters from
/// variable and node text. That looks like an ad hoc workaround rather than
/// documented semantics, but it is preserved exactly here.
fn strip_quotes(text: &str) -> String {
    text.chars().filter(|&c| c != '\'' && c != '"').collect()
}

impl Op {
    pub fn evaluate(
        &self,
        tree: &mut Tree,
        ctx: &mut MatchContext<'_>,
    ) -> Result<Option<NodeId>, RuntimeError> {
        match self {
            Op::Fetch(name) => Ok(Some(ctx.fetch(name)?)),

            Op::Hold(template) => {
                let grafted = template.graft(tree);
                for (name, node) in grafted.names {
                    ctx.bind(name, node);
                }
                Ok(Some(grafted.root))
            }

            Op::Delete(targets) => {
                let mut eliminated = false;
                for target in targets {
                    let node = expect_node(target, tree, ctx, "delete")?;
                    if node == tree.root() {
                        eliminated = true;
                    } else {
                        tree.detach(node);
                    }
                }
                if eliminated { Ok(None) } else { Ok(Some(tree.root())) }
            }

            Op::Prune(targets) => {
                let mut eliminated = false;
                for target in targets {
                    let node = expect_node(target, tree, ctx, "prune")?;
                    if node == tree.root() {
                        eliminated = true;
                        continue;
                    }
                    let mut cursor = tree.parent(node);
                    tree.detach(node);
                    while let Some(ancestor) = cursor {
                        if ancestor == tree.root() || !tree.children(ancestor).is_empty() {
                            break;
                        }
                        cursor = tree.parent(ancestor);
                        tree.detach(ancestor);
                    }
                }
                if eliminated { Ok(None) } else { Ok(Some(tree.root())) }
            }

            Op::RelabelLit { target, label } => {
                let node = expect_node(target, tree, ctx, "relabel")?;
                tree.set_label(node, label.clone());
                Ok(Some(tree.root()))
            }

            Op::RelabelRegex {
                target,
                pattern,
                pieces,
                ..
            } => {
                let node = expect_node(target, tree, ctx, "relabel")?;
                let mut replacement = String::new();
                for piece in pieces {
                    match piece {
                        ReplacePiece::Literal(text) => replacement.push_str(text),
                        ReplacePiece::Variable(name) => {
                            let value = ctx
                                .variable(name)
                                .ok_or_else(|| RuntimeError::MissingVariable(name.clone()))?;
                            replacement.push_str(&strip_quotes(value));
                        }
                        ReplacePiece::NodeLabel(name) => {
                            let referenced = ctx.fetch(name)?;
                            replacement.push_str(&strip_quotes(tree.label(referenced)));
                        }
                    }
                }
                let new_label = pattern
                    .replace_all(tree.label(node), replacement.as_str())
                    .into_owned();
                tree.set_label(node, new_label);
                Ok(Some(tree.root()))
            }

            Op::Excise { top, bottom } => {
                let top_node = expect_node(top, tree, ctx, "excise")?;
                let bottom_node = expect_node(bottom, tree, ctx, "excise")?;
                if !tree.dominates(top_node, bottom_node) {
                    return Err(RuntimeError::NotDominated);
                }
                let kids = tree.children(bottom_node).to_vec();
                if top_node == tree.root() {
                    if kids.len() == 1 {
                        let child = kids[0];
                        tree.detach(child);
                        tree.set_root(child);
                        return Ok(Some(child));
                    }
                    return Ok(None);
                }
                let parent = tree
                    .parent(top_node)
                    .ok_or(RuntimeError::UnattachedNode { verb: "excise" })?;
                let mut at = tree
                    .index_in_parent(top_node)
                    .ok_or(RuntimeError::UnattachedNode { verb: "excise" })?;
                tree.detach(top_node);
                for kid in kids {
                    tree.detach(kid);
                    tree.attach(parent, at, kid);
                    at += 1;
                }
                Ok(Some(tree.root()))
            }

            Op::Insert { item, location } => {
                let node = evaluate_insertable(item, tree, ctx, "insert")?;
                let (parent, index) = location.resolve(tree, ctx)?;
                tree.attach(parent, index, node);
                Ok(Some(tree.root()))
            }

            Op::Move { item, location } => {
                let node = expect_node(item, tree, ctx, "move")?;
                tree.detach(node);
                let (parent, index) = location.resolve(tree, ctx)?;
                tree.attach(parent, index, node);
                Ok(Some(tree.root()))
            }

            Op::Replace { old, replacements } => {
                let old_node = expect_node(old, tree, ctx, "replace")?;
                if old_node == tree.root() {
                    if replacements.len() != 1 {
                        return Err(RuntimeError::MultipleRootReplacements(replacements.len()));
                    }
                    let node = evaluate_insertable(&replacements[0], tree, ctx, "replace")?;
                    tree.set_root(node);
                    return Ok(Some(node));
                }
                let parent = tree
                    .parent(old_node)
                    .ok_or(RuntimeError::UnattachedNode { verb: "replace" })?;
                let mut at = tree
                    .index_in_parent(old_node)
                    .ok_or(RuntimeError::UnattachedNode { verb: "replace" })?;
                tree.detach(old_node);
                for replacement in replacements {
                    let node = evaluate_insertable(replacement, tree, ctx, "replace")?;
                    tree.attach(parent, at, node);
                    at += 1;
                }
                Ok(Some(tree.root()))
            }

            Op::CreateSubtree {
                template,
                start,
                end,
            } => {
                let start_node = expect_node(start, tree, ctx, "createSubtree")?;
                let end_node = match end {
                    Some(end) => expect_node(end, tree, ctx, "createSubtree")?,
                    None => start_node,
                };
                let start_parent = tree.parent(start_node).ok_or(RuntimeError::UnattachedNode {
                    verb: "createSubtree",
                })?;
                let end_parent = tree.parent(end_node).ok_or(RuntimeError::UnattachedNode {
                    verb: "createSubtree",
                })?;
                if start_parent != end_parent {
                    return Err(RuntimeError::MismatchedParents);
                }
                let from = tree.index_in_parent(start_node).ok_or(
                    RuntimeError::UnattachedNode {
                        verb: "createSubtree",
                    },
                )?;
                let to = tree
                    .index_in_parent(end_node)
                    .ok_or(RuntimeError::UnattachedNode {
                        verb: "createSubtree",
                    })?;
                if to < from {
                    return Err(RuntimeError::InvertedSpan);
                }
                let grafted = template.graft(tree);
                for (name, node) in grafted.names {
                    ctx.bind(name, node);
                }
                let foot = grafted.foot.ok_or(RuntimeError::TemplateWithoutFoot {
                    verb: "createSubtree",
                })?;
                let span = tree.children(start_parent)[from..=to].to_vec();
                for &node in &span {
                    tree.detach(node);
                }
                for &node in &span {
                    let at = tree.children(foot).len();
                    tree.attach(foot, at, node);
                }
                tree.attach(start_parent, from, grafted.root);
                Ok(Some(tree.root()))
            }

            Op::Adjoin { template, target } => {
                let target_node = expect_node(target, tree, ctx, "adjoin")?;
                let grafted = template.graft(tree);
                for (name, node) in grafted.names {
                    ctx.bind(name, node);
                }
                let foot = grafted
                    .foot
                    .ok_or(RuntimeError::TemplateWithoutFoot { verb: "adjoin" })?;
                move_children(tree, target_node, foot);
                if target_node == tree.root() {
                    tree.set_root(grafted.root);
                } else {
                    let parent = tree
                        .parent(target_node)
                        .ok_or(RuntimeError::UnattachedNode { verb: "adjoin" })?;
                    let at = tree
                        .index_in_parent(target_node)
                        .ok_or(RuntimeError::UnattachedNode { verb: "adjoin" })?;
                    tree.detach(target_node);
                    tree.attach(parent, at, grafted.root);
                }
                Ok(Some(tree.root()))
            }

            Op::AdjoinToHead { template, target } => {
                let target_node = expect_node(target, tree, ctx, "adjoinToHead")?;
                let grafted = template.graft(tree);
                for (name, node) in grafted.names {
                    ctx.bind(name, node);
                }
                let foot = grafted.foot.ok_or(RuntimeError::TemplateWithoutFoot {
                    verb: "adjoinToHead",
                })?;
                move_children(tree, target_node, foot);
                move_children(tree, grafted.root, target_node);
                Ok(Some(tree.root()))
            }

            Op::AdjoinToFoot { template, target } => {
                let target_node = expect_node(target, tree, ctx, "adjoinToFoot")?;
                let grafted = template.graft(tree);
                for (name, node) in grafted.names {
                    ctx.bind(name, node);
                }
                let foot = grafted.foot.ok_or(RuntimeError::TemplateWithoutFoot {
                    verb: "adjoinToFoot",
                })?;
                if foot == grafted.root {
                    // Foot at the template root: nowhere to hang the target.
                    return Ok(Some(tree.root()));
                }
                let foot_parent = tree.parent(foot).ok_or(RuntimeError::UnattachedNode {
                    verb: "adjoinToFoot",
                })?;
                let foot_at = tree
                    .index_in_parent(foot)
                    .ok_or(RuntimeError::UnattachedNode {
                        verb: "adjoinToFoot",
                    })?;
                if target_node == tree.root() {
                    tree.set_root(grafted.root);
                } else {
                    let parent = tree.parent(target_node).ok_or(RuntimeError::UnattachedNode {
                        verb: "adjoinToFoot",
                    })?;
                    let at = tree
                        .index_in_parent(target_node)
                        .ok_or(RuntimeError::UnattachedNode {
                            verb: "adjoinToFoot",
                        })?;
                    tree.detach(target_node);
                    tree.attach(parent, at, grafted.root);
                }
                tree.detach(foot);
                tree.attach(foot_parent, foot_at, target_node);
                Ok(Some(tree.root()))
            }

            Op::Coindex(targets) => {
                // One fresh index per application of the whole operation,
                // shared by every operand.
                let index = ctx.coindexer.next_index();
                for target in targets {
                    let node = expect_node(target, tree, ctx, "coindex")?;
                    let label = format!("{}-{}", tree.label(node), index);
                    tree.set_label(node, label);
                }
                Ok(Some(tree.root()))
            }

            Op::IfExists {
                name,
                negated,
                body,
            } => {
                if ctx.is_resolvable(name) != *negated {
                    for op in body {
                        if op.evaluate(tree, ctx)?.is_none() {
                            return Ok(None);
                        }
                    }
                }
                Ok(Some(tree.root()))
            }

            Op::Sequence(ops) => {
                for op in ops {
                    if op.evaluate(tree, ctx)?.is_none() {
                        return Ok(None);
                    }
                }
                Ok(Some(tree.root()))
            }
        }
    }
}

/// Detach every child of `from` and append them, in order, under `to`.
fn move_children(tree: &mut Tree, from: NodeId, to: NodeId) {
    let kids = tree.children(from).to_vec();
    for kid in kids {
        tree.detach(kid);
        let at = tree.children(to).len();
        tree.attach(to, at, kid);
    }
}

/// Escape an atom for script rendering; falls back to quoting when the label
/// cannot survive as a bare token.
fn render_atom(label: &str) -> String {
    let needs_quotes = label.is_empty()
        || label.starts_with('/')
        || label
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '"' | '\\'));
    if !needs_quotes {
        return label.to_string();
    }
    let mut out = String::with_capacity(label.len() + 2);
    out.push('"');
    for c in label.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn render_refs(f: &mut fmt::Formatter<'_>, verb: &str, refs: &[Op]) -> fmt::Result {
    write!(f, "{verb}")?;
    for r in refs {
        write!(f, " {r}")?;
    }
    Ok(())
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Fetch(name) => write!(f, "{name}"),
            Op::Hold(template) => {
                let rendered = template.to_string();
                if !template.tree().is_leaf(template.tree().root()) {
                    return write!(f, "{rendered}");
                }
                // A bare leaf would read back as a node reference; quoting
                // keeps it a literal.
                write!(f, "\"")?;
                for c in rendered.chars() {
                    if c == '"' || c == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "\"")
            }
            Op::Delete(targets) => render_refs(f, "delete", targets),
            Op::Prune(targets) => render_refs(f, "prune", targets),
            Op::RelabelLit { target, label } => {
                write!(f, "relabel {target} {}", render_atom(label))
            }
            Op::RelabelRegex {
                target,
                pattern_src,
                replacement_src,
                ..
            } => write!(f, "relabel {target} /{pattern_src}/{replacement_src}/"),
            Op::Excise { top, bottom } => write!(f, "excise {top} {bottom}"),
            Op::Insert { item, location } => write!(f, "insert {item} {location}"),
            Op::Move { item, location } => write!(f, "move {item} {location}"),
            Op::Replace { old, replacements } => {
                write!(f, "replace {old}")?;
                for r in replacements {
                    write!(f, " {r}")?;
                }
                Ok(())
            }
            Op::CreateSubtree {
                template,
                start,
                end,
            } => {
                write!(f, "createSubtree {template} {start}")?;
                if let Some(end) = end {
                    write!(f, " {end}")?;
                }
                Ok(())
            }
            Op::Adjoin { template, target } => write!(f, "adjoin {template} {target}"),
            Op::AdjoinToHead { template, target } => {
                write!(f, "adjoinToHead {template} {target}")
            }
            Op::AdjoinToFoot { template, target } => {
                write!(f, "adjoinToFoot {template} {target}")
            }
            Op::Coindex(targets) => render_refs(f, "coindex", targets),
            Op::IfExists {
                name,
                negated,
                body,
            } => {
                let condition = if *negated { "if not exists" } else { "if exists" };
                write!(f, "{condition} {name}")?;
                if let [only] = body.as_slice() {
                    write!(f, " {only}")
                } else {
                    for op in body {
                        write!(f, " [{op}]")?;
                    }
                    Ok(())
                }
            }
            Op::Sequence(ops) => {
                let mut first = true;
                for op in ops {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "[{op}]")?;
                    first = false;
                }
                Ok(())
            }
        }
    }
}
