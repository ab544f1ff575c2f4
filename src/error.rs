//! Error types for script compilation and pattern application.
//!
//! `CompileError` is fatal to a `compile` call and is never recovered
//! internally. `RuntimeError` is fatal to the current `apply` call; the
//! working tree at the point of failure must be treated as invalid.

use std::fmt;

/// Malformed script syntax, unknown verb, or wrong operand arity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Ran out of tokens mid-operation.
    UnexpectedEnd,
    /// Token of the wrong kind at this position.
    UnexpectedToken { expected: &'static str, found: String },
    /// First token of an operation is not a known verb.
    UnknownVerb(String),
    /// A verb got the wrong number of operands.
    WrongArity {
        verb: &'static str,
        expected: &'static str,
        found: usize,
    },
    /// A `/regex/` token was never closed.
    UnclosedRegex,
    /// A quoted token was never closed.
    UnclosedString,
    /// A tree literal was missing a closing paren.
    UnclosedTree,
    /// `()` or an otherwise empty tree literal.
    EmptyTree,
    /// The regex crate rejected a relabel pattern.
    BadRegex { pattern: String, message: String },
    /// A tree literal marked more than one foot node.
    MultipleFootNodes,
    /// A multi-node subtree template with no foot marker.
    MissingFoot(&'static str),
    /// Tokens left over after a complete script.
    TrailingInput(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnexpectedEnd => write!(f, "unexpected end of script"),
            CompileError::UnexpectedToken { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            CompileError::UnknownVerb(verb) => write!(f, "unknown verb `{verb}`"),
            CompileError::WrongArity {
                verb,
                expected,
                found,
            } => write!(f, "`{verb}` takes {expected} operand(s), got {found}"),
            CompileError::UnclosedRegex => write!(f, "unclosed /regex/ token"),
            CompileError::UnclosedString => write!(f, "unclosed quoted token"),
            CompileError::UnclosedTree => write!(f, "unclosed tree literal"),
            CompileError::EmptyTree => write!(f, "empty tree literal"),
            CompileError::BadRegex { pattern, message } => {
                write!(f, "bad regex /{pattern}/: {message}")
            }
            CompileError::MultipleFootNodes => {
                write!(f, "tree literal marks more than one foot node")
            }
            CompileError::MissingFoot(verb) => {
                write!(f, "`{verb}` template has no foot node")
            }
            CompileError::TrailingInput(found) => {
                write!(f, "trailing input after script: {found}")
            }
        }
    }
}

impl std::error::Error for CompileError {}

/// Invariant violation discovered only during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A node reference resolved neither in the bindings nor in the matcher.
    UnboundName(String),
    /// A `%{var}` substitution named a variable the matcher never captured.
    MissingVariable(String),
    /// An operand evaluated to "tree eliminated" where a node was required.
    MissingOperand { verb: &'static str },
    /// A node that must be attached (non-root with a parent) was not.
    UnattachedNode { verb: &'static str },
    /// `$+`/`$-` resolved relative to the tree root, which has no parent.
    AnchorIsRoot,
    /// `>N`/`>-N` pointed past the reference node's child list.
    ChildIndexOutOfRange { index: usize, len: usize },
    /// `excise top bottom` where top does not dominate bottom.
    NotDominated,
    /// `createSubtree` start and end resolved to different parents.
    MismatchedParents,
    /// `createSubtree` end node sits to the left of the start node.
    InvertedSpan,
    /// `replace` on the tree root with more than one replacement.
    MultipleRootReplacements(usize),
    /// An adjoin-family template lost its foot (internal invariant).
    TemplateWithoutFoot { verb: &'static str },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::UnboundName(name) => write!(f, "no node bound to `{name}`"),
            RuntimeError::MissingVariable(name) => {
                write!(f, "no string variable captured for `{name}`")
            }
            RuntimeError::MissingOperand { verb } => {
                write!(f, "`{verb}` operand evaluated to an eliminated tree")
            }
            RuntimeError::UnattachedNode { verb } => {
                write!(f, "`{verb}` expected an attached non-root node")
            }
            RuntimeError::AnchorIsRoot => {
                write!(f, "$+/$- cannot attach relative to the tree root")
            }
            RuntimeError::ChildIndexOutOfRange { index, len } => {
                write!(f, "child index {index} out of range (have {len} children)")
            }
            RuntimeError::NotDominated => {
                write!(f, "excise: top node does not dominate bottom node")
            }
            RuntimeError::MismatchedParents => {
                write!(f, "createSubtree: start and end have different parents")
            }
            RuntimeError::InvertedSpan => {
                write!(f, "createSubtree: end node precedes start node")
            }
            RuntimeError::MultipleRootReplacements(n) => {
                write!(f, "replace: {n} replacements given for the tree root")
            }
            RuntimeError::TemplateWithoutFoot { verb } => {
                write!(f, "`{verb}` template has no foot node")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}
