//! Error types and handling for the exp-lambda crate.
//!
//! Every failure the crate can report, from lexing a sub-expression to
//! compiling a predicate, is a variant of [`ExprError`].

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = core::result::Result<T, ExprError>;

/// Error type for expression parsing, evaluation and predicate compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// Lexing or parsing failure located in the source text.
    ///
    /// `offset` is a character offset relative to the text that was handed to
    /// the parser. When the text was a segment of a larger argument list the
    /// splitter rebases the offset so it stays meaningful to the caller.
    #[error("{message} (at offset {offset}, length {length})")]
    Positioned {
        message: String,
        offset: usize,
        length: usize,
    },

    /// No resolver produced a value for a free variable reference.
    #[error("variable '{name}' could not be resolved")]
    UnresolvedVariable { name: String },

    /// No resolver produced a value for a function call.
    #[error("function '{name}' could not be resolved")]
    UnresolvedFunction { name: String },

    /// Operand types not accepted by an operator during evaluation.
    #[error("operator '{op}' cannot be applied to {left} and {right}")]
    TypeMismatch {
        op: String,
        left: &'static str,
        right: &'static str,
    },

    /// `build_predicate` was called without a parsed expression.
    #[error("a parsed expression is required")]
    MissingExpression,

    /// The static operand type has no lowering for this operator.
    #[error("{op} operator not supported for {ty}")]
    UnsupportedOperator { op: String, ty: String },

    /// The operator exists in the grammar but has no predicate lowering.
    #[error("operator '{op}' is not implemented")]
    NotImplemented { op: String },

    /// An operator symbol outside the closed operator table.
    #[error("unknown operator '{op}'")]
    UnknownOperator { op: String },

    /// The compiled expression does not produce a boolean.
    #[error("expression of type {ty} cannot be used as a predicate")]
    NotAPredicate { ty: &'static str },

    /// The binder returned nothing for a free reference.
    #[error("no binding for reference '{name}'")]
    UnboundReference { name: String },
}

impl ExprError {
    /// Creates a positioned error.
    pub fn positioned(message: impl Into<String>, offset: usize, length: usize) -> Self {
        ExprError::Positioned {
            message: message.into(),
            offset,
            length,
        }
    }

    /// Moves a positioned error `by` characters to the right.
    ///
    /// Every other kind is returned unchanged.
    pub fn shifted(self, by: usize) -> Self {
        match self {
            ExprError::Positioned {
                message,
                offset,
                length,
            } => ExprError::Positioned {
                message,
                offset: offset + by,
                length,
            },
            other => other,
        }
    }

    /// Returns `(offset, length)` for positioned errors.
    pub fn span(&self) -> Option<(usize, usize)> {
        match self {
            ExprError::Positioned { offset, length, .. } => Some((*offset, *length)),
            _ => None,
        }
    }
}
