//! Type definitions for the expression parser, evaluator and compiler.
//!
//! This module contains the abstract syntax tree, the closed operator sets and
//! the token kinds produced by the lexer.

use core::fmt;

use crate::array::ArrayExpression;
use crate::error::{ExprError, Result};
use crate::value::Value;

/// Prefix operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// `+`, identity.
    Plus,
    /// `-`, arithmetic negation.
    Negate,
    /// `!`, logical or bitwise negation.
    Not,
    /// `~`, same semantics as `!`.
    Complement,
}

impl UnaryOp {
    pub fn from_symbol(symbol: &str) -> Result<Self> {
        match symbol {
            "+" => Ok(UnaryOp::Plus),
            "-" => Ok(UnaryOp::Negate),
            "!" => Ok(UnaryOp::Not),
            "~" => Ok(UnaryOp::Complement),
            _ => Err(ExprError::UnknownOperator {
                op: symbol.to_string(),
            }),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
            UnaryOp::Complement => "~",
        }
    }
}

/// Infix operators.
///
/// Aliases (`=`/`==`, `<>`/`!=`, `and`/`&&`, `or`/`||`) collapse into one
/// variant each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shr,
    Shl,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    Eq,
    Ne,
    /// `&`, evaluates both operands.
    BitAnd,
    /// `|`, evaluates both operands.
    BitOr,
    Xor,
    /// `and` / `&&`, short-circuits.
    And,
    /// `or` / `||`, short-circuits.
    Or,
}

impl BinaryOp {
    /// Maps an operator symbol or keyword to its variant.
    ///
    /// Keywords are matched case-insensitively whatever the configured
    /// [`CaseSensitivity`](crate::CaseSensitivity).
    pub fn from_symbol(symbol: &str) -> Result<Self> {
        let op = match symbol {
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            ">>" => BinaryOp::Shr,
            "<<" => BinaryOp::Shl,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "==" | "=" => BinaryOp::Eq,
            "<>" | "!=" => BinaryOp::Ne,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::Xor,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            kw if kw.eq_ignore_ascii_case("like") => BinaryOp::Like,
            kw if kw.eq_ignore_ascii_case("and") => BinaryOp::And,
            kw if kw.eq_ignore_ascii_case("or") => BinaryOp::Or,
            _ => {
                return Err(ExprError::UnknownOperator {
                    op: symbol.to_string(),
                });
            }
        };
        Ok(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shr => ">>",
            BinaryOp::Shl => "<<",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Like => "like",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::Xor => "^",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    /// Binding power used by the parser. Higher binds tighter.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::BitOr => 3,
            BinaryOp::Xor => 4,
            BinaryOp::BitAnd => 5,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Like => 6,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 7,
            BinaryOp::Shl | BinaryOp::Shr => 8,
            BinaryOp::Add | BinaryOp::Sub => 9,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 10,
        }
    }
}

/// Abstract Syntax Tree node.
///
/// Nodes are never mutated once built; evaluation and compilation only walk
/// them.
#[derive(Clone, Debug)]
pub enum Node {
    /// A number, string or boolean literal, or a folded constant.
    Literal(Value),

    /// A free variable reference, resolved by the registered resolvers.
    Reference(String),

    /// A prefix operation.
    Unary { op: UnaryOp, operand: Box<Node> },

    /// An infix operation.
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },

    /// An array literal `[a, b, ...]`, split and evaluated on demand.
    Array(ArrayExpression),

    /// A call to a registered user function.
    Call { name: String, args: ArrayExpression },
}

impl Node {
    pub fn literal(value: impl Into<Value>) -> Self {
        Node::Literal(value.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Node::Reference(name.into())
    }

    /// Builds a unary node from an operator symbol.
    pub fn unary(symbol: &str, operand: Node) -> Result<Self> {
        Ok(Node::Unary {
            op: UnaryOp::from_symbol(symbol)?,
            operand: Box::new(operand),
        })
    }

    /// Builds a binary node from an operator symbol or keyword.
    pub fn binary(symbol: &str, left: Node, right: Node) -> Result<Self> {
        Ok(Node::Binary {
            op: BinaryOp::from_symbol(symbol)?,
            left: Box::new(left),
            right: Box::new(right),
        })
    }
}

/// Polish (prefix) rendering, mostly for diagnostics and tests.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal(Value::Str(s)) => write!(f, "'{}'", s),
            Node::Literal(v) => write!(f, "{}", v),
            Node::Reference(name) => f.write_str(name),
            Node::Unary { op, operand } => write!(f, "({} {})", op.symbol(), operand),
            Node::Binary { op, left, right } => {
                write!(f, "({} {} {})", op.symbol(), left, right)
            }
            Node::Array(_) => f.write_str("[ArrayExpr]"),
            Node::Call { name, .. } => write!(f, "{}([ArrayExpr])", name),
        }
    }
}

/// Classifies the kind of token produced during lexical analysis.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// A numerical literal.
    Number,

    /// A quoted string literal.
    Str,

    /// A name: variable, constant, function, keyword operator or boolean.
    Identifier,

    /// A symbolic operator such as `+`, `<=` or `&&`.
    Operator,

    /// `(` or `[`.
    Open,

    /// `)` or `]`.
    Close,

    /// `,`.
    Separator,
}
