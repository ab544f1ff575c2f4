//! Arena-backed ordered trees with string labels.
//!
//! Nodes are addressed by stable `NodeId` indices into a `Vec` arena, with an
//! explicit parent back-reference maintained by the mutators. Detaching a
//! subtree leaves its nodes in the arena as garbage; their ids stay valid for
//! the lifetime of the tree, which is what lets surgery operations hold node
//! references across mutations.
//!
//! The single-ownership invariant: a node is either the root, detached, or
//! listed in exactly one parent's child list, and its parent back-pointer
//! agrees with that list.

use std::fmt;

use crate::error::CompileError;

/// Stable index of a node within one `Tree` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    label: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An ordered labeled tree. One arena, one root.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// A single-node tree.
    pub fn leaf(label: impl Into<String>) -> Self {
        Tree {
            nodes: vec![Node {
                label: label.into(),
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Make `id` the new root. The caller must have detached it first.
    pub fn set_root(&mut self, id: NodeId) {
        debug_assert!(self.nodes[id.0].parent.is_none(), "new root still attached");
        self.root = id;
    }

    pub fn label(&self, id: NodeId) -> &str {
        &self.nodes[id.0].label
    }

    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) {
        self.nodes[id.0].label = label.into();
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id.0].children.is_empty()
    }

    /// Position of `id` in its parent's child list.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.nodes[id.0].parent?;
        self.nodes[parent.0].children.iter().position(|&c| c == id)
    }

    /// Allocate a new detached node.
    pub fn alloc(&mut self, label: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            label: label.into(),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Insert a detached node into `parent`'s child list at `index`.
    ///
    /// Internal contract: `child` must be detached and `index` must be at most
    /// the current child count. Operation evaluators validate both before
    /// calling.
    pub fn attach(&mut self, parent: NodeId, index: usize, child: NodeId) {
        debug_assert!(self.nodes[child.0].parent.is_none(), "double-parenting");
        debug_assert!(index <= self.nodes[parent.0].children.len());
        self.nodes[parent.0].children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Remove `id` from its parent's child list. No-op on the root or on an
    /// already detached node. The subtree under `id` stays intact.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent else {
            return;
        };
        self.nodes[parent.0].children.retain(|&c| c != id);
        self.nodes[id.0].parent = None;
    }

    /// True if `top` is `bottom` or an ancestor of `bottom`.
    pub fn dominates(&self, top: NodeId, bottom: NodeId) -> bool {
        let mut cursor = Some(bottom);
        while let Some(node) = cursor {
            if node == top {
                return true;
            }
            cursor = self.nodes[node.0].parent;
        }
        false
    }

    /// Preorder traversal of the subtree rooted at `id`.
    pub fn preorder_from(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            for &child in self.nodes[node.0].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Preorder traversal from the root.
    pub fn preorder(&self) -> Vec<NodeId> {
        self.preorder_from(self.root)
    }

    /// Deep-copy the subtree at `src` within this arena. The copy is detached.
    pub fn copy_subtree(&mut self, src: NodeId) -> NodeId {
        let copy = self.alloc(self.nodes[src.0].label.clone());
        let kids: Vec<NodeId> = self.nodes[src.0].children.clone();
        for (i, kid) in kids.into_iter().enumerate() {
            let kid_copy = self.copy_subtree(kid);
            self.attach(copy, i, kid_copy);
        }
        copy
    }

    /// Deep-copy the subtree at `src_node` of another arena into this one.
    ///
    /// Returns the detached copy root and, via `remap`, the source→copy node
    /// mapping (used to re-derive foot and capture pointers against the copy).
    pub fn import(
        &mut self,
        src: &Tree,
        src_node: NodeId,
        remap: &mut impl FnMut(NodeId, NodeId),
    ) -> NodeId {
        let copy = self.alloc(src.nodes[src_node.0].label.clone());
        remap(src_node, copy);
        for (i, &kid) in src.nodes[src_node.0].children.iter().enumerate() {
            let kid_copy = self.import(src, kid, remap);
            self.attach(copy, i, kid_copy);
        }
        copy
    }

    /// Render the subtree at `id` in Penn bracket form.
    pub fn render(&self, id: NodeId) -> String {
        let node = &self.nodes[id.0];
        if node.children.is_empty() {
            return node.label.clone();
        }
        let mut out = String::new();
        out.push('(');
        out.push_str(&node.label);
        for &child in &node.children {
            out.push(' ');
            out.push_str(&self.render(child));
        }
        out.push(')');
        out
    }

    /// Labels of the reachable tree in preorder (test/debug helper).
    pub fn preorder_labels(&self) -> Vec<&str> {
        self.preorder().into_iter().map(|id| self.label(id)).collect()
    }

    /// Check the single-ownership invariant over the reachable tree.
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes[self.root.0].parent.is_some() {
            return Err("root has a parent".to_string());
        }
        let mut seen = vec![false; self.nodes.len()];
        for id in self.preorder() {
            if seen[id.0] {
                return Err(format!("node {} reachable twice", id.0));
            }
            seen[id.0] = true;
            for &child in self.children(id) {
                if self.nodes[child.0].parent != Some(id) {
                    return Err(format!(
                        "node {} lists child {} whose parent pointer disagrees",
                        id.0, child.0
                    ));
                }
            }
        }
        Ok(())
    }

    /// Parse one bracketed tree, rejecting trailing input.
    pub fn parse(text: &str) -> Result<Self, CompileError> {
        let mut reader = TreeReader::new(text);
        let tree = reader.read_tree()?;
        reader.skip_whitespace();
        if !reader.at_end() {
            return Err(CompileError::TrailingInput(reader.rest().to_string()));
        }
        Ok(tree)
    }

    /// Parse zero or more bracketed trees from treebank-style text.
    pub fn parse_forest(text: &str) -> Result<Vec<Self>, CompileError> {
        let mut reader = TreeReader::new(text);
        let mut trees = Vec::new();
        loop {
            reader.skip_whitespace();
            if reader.at_end() {
                return Ok(trees);
            }
            trees.push(reader.read_tree()?);
        }
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(self.root))
    }
}

/// Byte reader over bracketed tree text.
struct TreeReader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> TreeReader<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &str {
        std::str::from_utf8(&self.input[self.pos..]).unwrap_or("<non-utf8>")
    }

    fn skip_whitespace(&mut self) {
        while self
            .peek()
            .is_some_and(|b| b == b' ' || b == b'\t' || b == b'\n' || b == b'\r')
        {
            self.pos += 1;
        }
    }

    /// An atom runs until whitespace or a paren. Backslash escapes the next
    /// byte and is kept; marker unescaping happens at the template layer.
    fn read_atom(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | b'(' | b')' => break,
                b'\\' => {
                    self.pos += 1;
                    if self.peek().is_some() {
                        self.pos += 1;
                    }
                }
                _ => self.pos += 1,
            }
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn read_tree(&mut self) -> Result<Tree, CompileError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(CompileError::UnexpectedEnd),
            Some(b'(') => {
                let mut tree = Tree::leaf("");
                let root = self.read_node(&mut tree)?;
                tree.set_root(root);
                // Drop the placeholder by reusing node 0 when possible.
                Ok(tree)
            }
            Some(b')') => Err(CompileError::UnexpectedToken {
                expected: "tree",
                found: ")".to_string(),
            }),
            Some(_) => Ok(Tree::leaf(self.read_atom())),
        }
    }

    fn read_node(&mut self, tree: &mut Tree) -> Result<NodeId, CompileError> {
        // caller saw '('
        self.pos += 1;
        self.skip_whitespace();
        match self.peek() {
            None => return Err(CompileError::UnclosedTree),
            Some(b')') => return Err(CompileError::EmptyTree),
            _ => {}
        }
        let label = self.read_atom();
        if label.is_empty() {
            return Err(CompileError::UnexpectedToken {
                expected: "node label",
                found: self.rest().chars().take(8).collect(),
            });
        }
        let node = if tree.label(tree.root()).is_empty() && tree.children(tree.root()).is_empty() {
            // First node of a fresh tree: claim the placeholder root slot.
            let root = tree.root();
            tree.set_label(root, label);
            root
        } else {
            tree.alloc(label)
        };
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(CompileError::UnclosedTree),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(node);
                }
                Some(b'(') => {
                    let child = self.read_node(tree)?;
                    let at = tree.children(node).len();
                    tree.attach(node, at, child);
                }
                Some(_) => {
                    let child = tree.alloc(self.read_atom());
                    let at = tree.children(node).len();
                    tree.attach(node, at, child);
                }
            }
        }
    }
}
