//! Centralised runtime error hierarchy.
//!
//! Every user-facing failure the evaluator can produce is a variant of
//! [`RuntimeError`]; each carries the token it occurred at so hosts receive
//! `(token, message)` pairs with line and lexeme intact. Internal
//! resolver/evaluator inconsistencies are *not* represented here — they are
//! bugs, not program errors, and abort the run instead.
//!
//! The module **does not** print diagnostics itself; reporting is the job of
//! a host-supplied [`ErrorSink`].

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use log::info;
use thiserror::Error;

use crate::token::Token;

/// Canonical runtime error type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// A `get`/`assign` without a resolved distance exhausted the scope
    /// chain.
    #[error("Undefined variable '{}'. [line {}]", .name.lexeme, .name.line)]
    UndefinedVariable {
        /// The offending identifier token.
        name: Token,
    },

    /// An operator was applied to operand(s) of the wrong runtime kind.
    #[error("{} [line {}]", .message, .operator.line)]
    TypeMismatch {
        /// The operator token that rejected its operands.
        operator: Token,

        /// Human‑readable description, e.g. "Operands must be numbers."
        message: String,
    },

    /// A call supplied the wrong number of arguments.
    #[error("Expected {} arguments but got {}. [line {}]", .expected, .got, .paren.line)]
    ArityMismatch {
        /// The closing-paren token of the call site.
        paren: Token,
        expected: usize,
        got: usize,
    },

    /// The call target was not a callable value.
    #[error("Can only call functions. [line {}]", .paren.line)]
    NotCallable { paren: Token },

    /// A host-provided native function reported a failure.
    #[error("{} [line {}]", .message, .paren.line)]
    NativeCall { paren: Token, message: String },

    /// Wrapper around `std::io::Error` (transparent). Enables `?` on the
    /// program output stream.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RuntimeError {
    /// Helper constructor for scope-chain misses.
    pub fn undefined_variable(name: &Token) -> Self {
        info!(
            "Creating UndefinedVariable error: lexeme={}, line={}",
            name.lexeme, name.line
        );

        RuntimeError::UndefinedVariable { name: name.clone() }
    }

    /// Helper constructor for operand-kind failures.
    pub fn type_mismatch<S: Into<String>>(operator: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating TypeMismatch error: line={}, msg={}",
            operator.line, message
        );

        RuntimeError::TypeMismatch {
            operator: operator.clone(),
            message,
        }
    }

    /// The token this error occurred at, if any.
    pub fn token(&self) -> Option<&Token> {
        match self {
            RuntimeError::UndefinedVariable { name } => Some(name),
            RuntimeError::TypeMismatch { operator, .. } => Some(operator),
            RuntimeError::ArityMismatch { paren, .. } => Some(paren),
            RuntimeError::NotCallable { paren } => Some(paren),
            RuntimeError::NativeCall { paren, .. } => Some(paren),
            RuntimeError::Io(_) => None,
        }
    }
}

/// Host-supplied destination for runtime error reports.
///
/// The interpreter calls this once per failing top-level statement and then
/// carries on with the next statement; the sink decides what reporting looks
/// like (stderr, a diagnostics buffer, a test collector).
pub trait ErrorSink {
    fn runtime_error(&mut self, error: &RuntimeError);
}

/// Shared, interior-mutable handle to an [`ErrorSink`].
pub type SharedErrorSink = Rc<RefCell<dyn ErrorSink>>;
