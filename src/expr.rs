use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use crate::token::Token;

/// A **literal constant** that appears directly in the source code.
///
/// These variants are the *terminal leaves* of the expression tree; the
/// parser copies (or converts) the value at parse‑time so the AST can
/// outlive the lexer's token buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    /// Integral lexemes such as `"3"` are still parsed as `3.0`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    /// The boolean constant `true`.
    True,

    /// The boolean constant `false`.
    False,

    /// The `nil` literal.
    Nil,
}

/// Stable identity of a variable occurrence, used as the key into the
/// resolver's distance map.
///
/// The external resolver records one distance per `Variable`/`Assign`
/// occurrence; ids are minted at node construction and survive AST clones,
/// so the same occurrence always maps to the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ExprId(usize);

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

impl ExprId {
    /// Mint a fresh id, distinct from every id handed out before.
    pub fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum Expr {
    // A literal constant: number, string, true, false, or nil
    Literal(LiteralValue),

    // Parenthesized grouped expression
    Grouping(Box<Expr>),

    // Prefix unary operator ('!' or '-') applied to an operand
    Unary(Token, Box<Expr>),

    // Infix binary operator: left, operator, right
    Binary(Box<Expr>, Token, Box<Expr>),

    // Short-circuiting 'and' / 'or': left, operator, right
    Logical(Box<Expr>, Token, Box<Expr>),

    // Variable access, keyed into the distance map by its ExprId
    Variable(ExprId, Token),

    // Assignment: name, value; keyed like Variable
    Assign(ExprId, Token, Box<Expr>),

    // Function call: callee, closing-paren token (for diagnostics), arguments
    Call(Box<Expr>, Token, Vec<Expr>),
}

impl Expr {
    /// Build a variable reference with a fresh identity.
    pub fn variable(name: Token) -> Self {
        Expr::Variable(ExprId::fresh(), name)
    }

    /// Build an assignment with a fresh identity.
    pub fn assign(name: Token, value: Expr) -> Self {
        Expr::Assign(ExprId::fresh(), name, Box::new(value))
    }
}
