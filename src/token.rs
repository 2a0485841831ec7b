use log::info;
use serde::Serialize;
use std::fmt;
use std::mem;

/// The token vocabulary consumed by the runtime.
///
/// Tokens are produced by an external scanner and ride along inside AST
/// nodes; the evaluator dispatches on operator kinds and uses the rest
/// purely for diagnostics. `STRING(String)` and `NUMBER(f64)` carry their
/// literal values. `EOF` marks the end of input.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Serialize)]
pub enum TokenType {
    /// '('
    LEFT_PAREN,

    /// ')'
    RIGHT_PAREN,

    /// '-'
    MINUS,

    /// '+'
    PLUS,

    /// '/'
    SLASH,

    /// '*'
    STAR,

    /// '!'
    BANG,

    /// '!='
    BANG_EQUAL,

    /// '='
    EQUAL,

    /// '=='
    EQUAL_EQUAL,

    /// '>'
    GREATER,

    /// '>='
    GREATER_EQUAL,

    /// '<'
    LESS,

    /// '<='
    LESS_EQUAL,

    /// A user‑defined identifier
    IDENTIFIER,

    /// A string literal (contents without quotes)
    STRING(String),

    /// A numeric literal
    NUMBER(f64),

    /// 'and'
    AND,

    /// 'or'
    OR,

    /// 'true'
    TRUE,

    /// 'false'
    FALSE,

    /// 'nil'
    NIL,

    /// 'return'
    RETURN,

    /// End‑of‑file marker
    EOF,
}

impl PartialEq for TokenType {
    /// Two TokenTypes are equal if they share the same variant
    /// (ignoring any inner data). Uses `mem::discriminant` to compare.
    fn eq(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

/// A token as delivered by the scanner, with the original lexeme and the
/// line number where it was found.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Token {
    /// The category of this token.
    pub token_type: TokenType,

    /// The exact substring from the source that produced this token.
    pub lexeme: String,

    /// 1‑based line number in the source.
    pub line: usize,
}

impl Token {
    /// Create a new Token with the given type, lexeme, and line.
    /// Also logs its creation at INFO level.
    pub fn new<S: Into<String>>(token_type: TokenType, lexeme: S, line: usize) -> Self {
        let lexeme: String = lexeme.into();

        info!(
            "Creating new token: type={:?}, lexeme={}, line={}",
            token_type, lexeme, line
        );

        Self {
            token_type,
            lexeme,
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexeme)
    }
}
