//! Recursive descent parser over the script token stream.

use regex::Regex;

use crate::error::CompileError;
use crate::location::TreeLocation;
use crate::op::{Op, ReplacePiece};
use crate::script::lexer::Token;
use crate::template::AuxiliaryTree;
use crate::tree::{NodeId, Tree};

/// Parse a complete token stream into one operation. A stream beginning with
/// `[` is a sequence of bracketed operations; anything else is a single bare
/// operation. Leftover tokens are an error either way.
pub fn parse(tokens: Vec<Token>) -> Result<Op, CompileError> {
    let mut parser = Parser { tokens, pos: 0 };
    let op = if parser.peek() == Some(&Token::LBracket) {
        let mut ops = Vec::new();
        while parser.peek() == Some(&Token::LBracket) {
            parser.pos += 1;
            let op = parser.operation()?;
            parser.expect_rbracket()?;
            ops.push(op);
        }
        Op::Sequence(ops)
    } else {
        parser.operation()?
    };
    match parser.peek() {
        None => Ok(op),
        Some(extra) => Err(CompileError::TrailingInput(extra.describe())),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, CompileError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(CompileError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect_rbracket(&mut self) -> Result<(), CompileError> {
        match self.next()? {
            Token::RBracket => Ok(()),
            other => Err(CompileError::UnexpectedToken {
                expected: "']'",
                found: other.describe(),
            }),
        }
    }

    /// True at an operand-list boundary: end of input or a closing bracket.
    fn at_boundary(&self) -> bool {
        matches!(self.peek(), None | Some(Token::RBracket))
    }

    fn operation(&mut self) -> Result<Op, CompileError> {
        let verb = match self.next()? {
            Token::Atom(word) => word,
            other => {
                return Err(CompileError::UnexpectedToken {
                    expected: "a verb",
                    found: other.describe(),
                });
            }
        };
        match verb.as_str() {
            "delete" => Ok(Op::Delete(self.node_ref_list("delete")?)),
            "prune" => Ok(Op::Prune(self.node_ref_list("prune")?)),
            "relabel" => self.relabel(),
            "excise" => Ok(Op::Excise {
                top: Box::new(self.node_ref()?),
                bottom: Box::new(self.node_ref()?),
            }),
            "insert" => Ok(Op::Insert {
                item: Box::new(self.insertable()?),
                location: self.location()?,
            }),
            "move" => Ok(Op::Move {
                item: Box::new(self.node_ref()?),
                location: self.location()?,
            }),
            "replace" => self.replace(),
            "createSubtree" => self.create_subtree(),
            "adjoin" => {
                let template = self.template()?.require_foot("adjoin")?;
                Ok(Op::Adjoin {
                    template,
                    target: Box::new(self.node_ref()?),
                })
            }
            "adjoinH" | "adjoinToHead" => {
                let template = self.template()?.require_foot("adjoinToHead")?;
                Ok(Op::AdjoinToHead {
                    template,
                    target: Box::new(self.node_ref()?),
                })
            }
            "adjoinF" | "adjoinToFoot" => {
                let template = self.template()?.require_foot("adjoinToFoot")?;
                Ok(Op::AdjoinToFoot {
                    template,
                    target: Box::new(self.node_ref()?),
                })
            }
            "coindex" => Ok(Op::Coindex(self.node_ref_list("coindex")?)),
            "if" => self.if_exists(),
            _ => Err(CompileError::UnknownVerb(verb)),
        }
    }

    /// A bare name referencing the current match's bindings.
    fn node_ref(&mut self) -> Result<Op, CompileError> {
        match self.next()? {
            Token::Atom(name) => Ok(Op::Fetch(name)),
            other => Err(CompileError::UnexpectedToken {
                expected: "a node name",
                found: other.describe(),
            }),
        }
    }

    /// One or more node references, running to the end of the operation.
    fn node_ref_list(&mut self, verb: &'static str) -> Result<Vec<Op>, CompileError> {
        let mut refs = Vec::new();
        while !self.at_boundary() {
            refs.push(self.node_ref()?);
        }
        if refs.is_empty() {
            return Err(CompileError::WrongArity {
                verb,
                expected: "at least 1",
                found: 0,
            });
        }
        Ok(refs)
    }

    /// An operand that may be inserted: a node reference or a tree literal.
    /// Quoted words are single-leaf literals.
    fn insertable(&mut self) -> Result<Op, CompileError> {
        if self.peek() == Some(&Token::LParen) {
            return Ok(Op::Hold(self.template()?));
        }
        match self.next()? {
            Token::Atom(name) => Ok(Op::Fetch(name)),
            Token::Quoted(label) => Ok(Op::Hold(AuxiliaryTree::from_tree(Tree::leaf(label))?)),
            other => Err(CompileError::UnexpectedToken {
                expected: "a node name or tree literal",
                found: other.describe(),
            }),
        }
    }

    /// A tree literal operand: parenthesized, or a bare/quoted single leaf.
    fn template(&mut self) -> Result<AuxiliaryTree, CompileError> {
        match self.next()? {
            Token::LParen => {
                let tree = self.tree_body()?;
                AuxiliaryTree::from_tree(tree)
            }
            Token::Atom(label) | Token::Quoted(label) => {
                AuxiliaryTree::from_tree(Tree::leaf(label))
            }
            other => Err(CompileError::UnexpectedToken {
                expected: "a tree literal",
                found: other.describe(),
            }),
        }
    }

    /// The inside of a parenthesized tree literal; the `(` is already
    /// consumed.
    fn tree_body(&mut self) -> Result<Tree, CompileError> {
        let label = self.label_token()?;
        let mut tree = Tree::leaf(label);
        let root = tree.root();
        self.tree_children(&mut tree, root)?;
        Ok(tree)
    }

    fn tree_children(&mut self, tree: &mut Tree, parent: NodeId) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                None => return Err(CompileError::UnclosedTree),
                Some(Token::RParen) => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(Token::LParen) => {
                    self.pos += 1;
                    let label = self.label_token()?;
                    let child = tree.alloc(label);
                    let at = tree.children(parent).len();
                    tree.attach(parent, at, child);
                    self.tree_children(tree, child)?;
                }
                Some(_) => {
                    let label = self.label_token()?;
                    let child = tree.alloc(label);
                    let at = tree.children(parent).len();
                    tree.attach(parent, at, child);
                }
            }
        }
    }

    /// A tree-literal label. Relation-shaped words are legal labels here.
    fn label_token(&mut self) -> Result<String, CompileError> {
        match self.next()? {
            Token::Atom(label) | Token::Quoted(label) => {
                if label.is_empty() {
                    return Err(CompileError::EmptyTree);
                }
                Ok(label)
            }
            Token::Relation(relation) => Ok(relation.to_string()),
            other => Err(CompileError::UnexpectedToken {
                expected: "a tree label",
                found: other.describe(),
            }),
        }
    }

    fn location(&mut self) -> Result<TreeLocation, CompileError> {
        match self.next()? {
            Token::Relation(relation) => Ok(TreeLocation::new(relation, self.node_ref()?)),
            other => Err(CompileError::UnexpectedToken {
                expected: "a location relation (>N, >-N, $+, $-)",
                found: other.describe(),
            }),
        }
    }

    fn relabel(&mut self) -> Result<Op, CompileError> {
        let target = Box::new(self.node_ref()?);
        match self.next()? {
            Token::Atom(label) => Ok(Op::RelabelLit {
                target,
                label: unescape_backslashes(&label),
            }),
            Token::Quoted(label) => Ok(Op::RelabelLit { target, label }),
            Token::Regex {
                pattern,
                replacement,
            } => {
                let compiled = Regex::new(&pattern).map_err(|e| CompileError::BadRegex {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                let replacement_src = replacement.unwrap_or_default();
                Ok(Op::RelabelRegex {
                    target,
                    pattern: compiled,
                    pattern_src: pattern,
                    pieces: parse_replacement_pieces(&replacement_src),
                    replacement_src,
                })
            }
            other => Err(CompileError::UnexpectedToken {
                expected: "a new label or /regex/replacement/",
                found: other.describe(),
            }),
        }
    }

    fn replace(&mut self) -> Result<Op, CompileError> {
        let old = Box::new(self.node_ref()?);
        let mut replacements = Vec::new();
        while !self.at_boundary() {
            replacements.push(self.insertable()?);
        }
        if replacements.is_empty() {
            return Err(CompileError::WrongArity {
                verb: "replace",
                expected: "at least 2",
                found: 1,
            });
        }
        Ok(Op::Replace { old, replacements })
    }

    fn create_subtree(&mut self) -> Result<Op, CompileError> {
        let template = self.template()?.foot_or_leaf_root("createSubtree")?;
        let start = Box::new(self.node_ref()?);
        let end = if self.at_boundary() {
            None
        } else {
            Some(Box::new(self.node_ref()?))
        };
        Ok(Op::CreateSubtree {
            template,
            start,
            end,
        })
    }

    /// `if exists name <op>` / `if not exists name [op]...`
    fn if_exists(&mut self) -> Result<Op, CompileError> {
        let mut negated = false;
        let mut word = self.keyword()?;
        if word == "not" {
            negated = true;
            word = self.keyword()?;
        }
        if word != "exists" {
            return Err(CompileError::UnexpectedToken {
                expected: "`exists`",
                found: format!("'{word}'"),
            });
        }
        let name = match self.next()? {
            Token::Atom(name) => name,
            other => {
                return Err(CompileError::UnexpectedToken {
                    expected: "a node name",
                    found: other.describe(),
                });
            }
        };
        let mut body = Vec::new();
        if self.peek() == Some(&Token::LBracket) {
            while self.peek() == Some(&Token::LBracket) {
                self.pos += 1;
                body.push(self.operation()?);
                self.expect_rbracket()?;
            }
        } else {
            body.push(self.operation()?);
        }
        Ok(Op::IfExists {
            name,
            negated,
            body,
        })
    }

    fn keyword(&mut self) -> Result<String, CompileError> {
        match self.next()? {
            Token::Atom(word) => Ok(word),
            other => Err(CompileError::UnexpectedToken {
                expected: "`exists` or `not`",
                found: other.describe(),
            }),
        }
    }
}

/// Drop each escaping backslash, keeping the escaped character.
fn unescape_backslashes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split a relabel replacement into literal text, `%{var}` substitutions, and
/// `={node}` label substitutions. A backslash escapes the following character
/// into the literal text.
fn parse_replacement_pieces(src: &str) -> Vec<ReplacePiece> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                literal.push(next);
            } else {
                literal.push('\\');
            }
            continue;
        }
        if (c == '%' || c == '=') && chars.peek() == Some(&'{') {
            let mut lookahead = chars.clone();
            lookahead.next(); // '{'
            let mut name = String::new();
            let mut closed = false;
            for n in lookahead.by_ref() {
                if n == '}' {
                    closed = true;
                    break;
                }
                name.push(n);
            }
            if closed && !name.is_empty() {
                if !literal.is_empty() {
                    pieces.push(ReplacePiece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(if c == '%' {
                    ReplacePiece::Variable(name)
                } else {
                    ReplacePiece::NodeLabel(name)
                });
                chars = lookahead;
                continue;
            }
        }
        literal.push(c);
    }
    if !literal.is_empty() {
        pieces.push(ReplacePiece::Literal(literal));
    }
    pieces
}
