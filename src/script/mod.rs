//! The surgery script front end: lexer and recursive descent parser.
//!
//! A script is one operation or a sequence of bracketed operations:
//!
//! ```text
//! delete ed
//! [relabel np /^NP-SBJ$/NP/] [insert (DT=dt the) >1 np]
//! ```
//!
//! Compilation produces an [`Op`] tree; all regexes and tree literals are
//! validated here, so applying a compiled script can only fail on unbound
//! names and structural conflicts.

mod lexer;
mod parser;

pub use lexer::{Token, lex};
pub use parser::parse;

use crate::error::CompileError;
use crate::op::Op;

/// Compile one script line into an operation.
pub fn compile(text: &str) -> Result<Op, CompileError> {
    parse(lex(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_rejects_garbage_after_op() {
        let err = compile("delete ed ] stray").unwrap_err();
        assert!(matches!(err, CompileError::TrailingInput(_)));
    }

    #[test]
    fn compiled_ops_render_back_to_equivalent_scripts() {
        for script in [
            "delete ed",
            "prune a b",
            "relabel np S",
            "excise top bot",
            "insert np >2 vp",
            "insert np $+ vp",
            "move np >-1 vp",
            "replace old new",
            "excise n n",
            "replace old \"NEW\"",
            "insert \"*\" >1 np",
            "relabel np \"a\\\\b\"",
            "coindex a b c",
            "adjoin (VP (ADVP quickly) VP@) vp",
            "adjoinToHead (VP (ADVP quickly) VP@) vp",
            "adjoinToFoot (VP (ADVP quickly) VP@) vp",
            "createSubtree NP dt nn",
            "if exists np delete np",
            "if not exists np [delete vp] [relabel s X]",
            "[delete ed] [insert np >2 vp]",
        ] {
            let rendered = compile(script).unwrap().to_string();
            // Rendering is itself compilable and stable from then on.
            let again = compile(&rendered).unwrap().to_string();
            assert_eq!(again, rendered, "script: {script}");
        }
    }

    #[test]
    fn rendered_quoted_literals_stay_literals() {
        // A single-leaf literal must render quoted; bare it would read back
        // as a node reference.
        let op = compile("replace old \"NEW\"").unwrap();
        let rendered = op.to_string();
        assert_eq!(rendered, "replace old \"NEW\"");
        let Op::Replace { replacements, .. } = compile(&rendered).unwrap() else {
            panic!("expected a replace op");
        };
        assert!(matches!(replacements[0], Op::Hold(_)));
    }

    #[test]
    fn rendered_labels_keep_their_backslashes() {
        let op = compile("relabel np \"a\\\\b\"").unwrap();
        let Op::RelabelLit { ref label, .. } = op else {
            panic!("expected a literal relabel");
        };
        assert_eq!(label, "a\\b");
        let Op::RelabelLit { label: again, .. } = compile(&op.to_string()).unwrap() else {
            panic!("expected a literal relabel");
        };
        assert_eq!(again, "a\\b");
    }
}
