//! Byte-level tokenizer for surgery scripts.

use crate::error::CompileError;
use crate::location::Relation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    LBracket,
    RBracket,
    LParen,
    RParen,
    /// A bare word: verb, node reference, or tree label. Backslash escapes
    /// are kept verbatim for the template parser to interpret.
    Atom(String),
    /// A double-quoted string, with `\"` and `\\` resolved.
    Quoted(String),
    /// `/pattern/` or `/pattern/replacement/`, with `\/` resolved.
    Regex {
        pattern: String,
        replacement: Option<String>,
    },
    /// A location relation: `>N`, `>-N`, `$+`, `$-`.
    Relation(Relation),
}

impl Token {
    /// Short rendering for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Atom(s) => format!("'{s}'"),
            Token::Quoted(s) => format!("\"{s}\""),
            Token::Regex { pattern, .. } => format!("/{pattern}/"),
            Token::Relation(r) => format!("'{r}'"),
        }
    }
}

pub fn lex(input: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if !b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    fn run(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(b) = self.peek() else { break };
            let token = match b {
                b'[' => {
                    self.pos += 1;
                    Token::LBracket
                }
                b']' => {
                    self.pos += 1;
                    Token::RBracket
                }
                b'(' => {
                    self.pos += 1;
                    Token::LParen
                }
                b')' => {
                    self.pos += 1;
                    Token::RParen
                }
                b'"' => self.read_quoted()?,
                b'/' => self.read_regex()?,
                _ => self.read_bare(),
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn read_quoted(&mut self) -> Result<Token, CompileError> {
        self.pos += 1; // opening quote
        let mut out = Vec::new();
        loop {
            match self.advance() {
                None => return Err(CompileError::UnclosedString),
                Some(b'"') => {
                    return Ok(Token::Quoted(String::from_utf8_lossy(&out).into_owned()));
                }
                Some(b'\\') => match self.advance() {
                    None => return Err(CompileError::UnclosedString),
                    Some(next @ (b'"' | b'\\')) => out.push(next),
                    Some(next) => {
                        out.push(b'\\');
                        out.push(next);
                    }
                },
                Some(b) => out.push(b),
            }
        }
    }

    /// Read to the next unescaped `/`, resolving `\/` and keeping every other
    /// backslash verbatim (regex escapes pass through to the engine).
    fn read_delimited(&mut self) -> Result<String, CompileError> {
        let mut out = Vec::new();
        loop {
            match self.advance() {
                None => return Err(CompileError::UnclosedRegex),
                Some(b'/') => return Ok(String::from_utf8_lossy(&out).into_owned()),
                Some(b'\\') => match self.advance() {
                    None => return Err(CompileError::UnclosedRegex),
                    Some(b'/') => out.push(b'/'),
                    Some(next) => {
                        out.push(b'\\');
                        out.push(next);
                    }
                },
                Some(b) => out.push(b),
            }
        }
    }

    fn read_regex(&mut self) -> Result<Token, CompileError> {
        self.pos += 1; // opening slash
        let pattern = self.read_delimited()?;
        // A replacement section continues the token without whitespace.
        let replacement = match self.peek() {
            Some(b) if !b.is_ascii_whitespace() && !matches!(b, b'(' | b')' | b'[' | b']') => {
                Some(self.read_delimited()?)
            }
            _ => None,
        };
        Ok(Token::Regex {
            pattern,
            replacement,
        })
    }

    fn read_bare(&mut self) -> Token {
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                _ if b.is_ascii_whitespace() => break,
                b'(' | b')' | b'[' | b']' | b'"' => break,
                b'\\' => {
                    // Keep the escape pair intact for downstream unescaping.
                    self.pos += 1;
                    if self.peek().is_some() {
                        self.pos += 1;
                    }
                }
                _ => self.pos += 1,
            }
        }
        classify_bare(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }
}

/// Bare tokens shaped like location relations become relation tokens;
/// everything else stays an atom.
fn classify_bare(word: String) -> Token {
    match word.as_str() {
        "$+" => return Token::Relation(Relation::Before),
        "$-" => return Token::Relation(Relation::After),
        _ => {}
    }
    if let Some(rest) = word.strip_prefix('>') {
        let (negative, digits) = match rest.strip_prefix('-') {
            Some(digits) => (true, digits),
            None => (false, rest),
        };
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = digits.parse::<usize>() {
                if n >= 1 {
                    return if negative {
                        Token::Relation(Relation::NthChildFromRight(n))
                    } else {
                        Token::Relation(Relation::NthChild(n))
                    };
                }
            }
        }
    }
    Token::Atom(word)
}
