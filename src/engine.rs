//! Pratt parser turning expression text into a [`Node`] tree.

use std::sync::Arc;

use crate::array::ArrayExpression;
use crate::context::{CaseSensitivity, EvalContext, Scope};
use crate::error::{ExprError, Result};
use crate::lexer::{Lexer, Token};
use crate::types::{BinaryOp, Node, TokenKind, UnaryOp};
use crate::value::Value;

const MAX_RECURSION_DEPTH: usize = 256;
/// Array literals and calls are evaluated recursively, one scope per level.
const MAX_GROUP_DEPTH: usize = 64;

struct PrattParser<'a> {
    lexer: Lexer<'a>,
    current: Option<Token>,
    scope: &'a Scope,
    recursion_depth: usize,
}

impl<'a> PrattParser<'a> {
    fn new(input: &'a str, scope: &'a Scope) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            scope,
            recursion_depth: scope.depth,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    fn next(&mut self) -> Result<Option<Token>> {
        let tok = self.current.take();
        self.current = self.lexer.next_token()?;
        Ok(tok)
    }

    fn end_of_input(&self, expected: &str) -> ExprError {
        ExprError::positioned(
            format!("Expected {} but found end of expression", expected),
            self.lexer.position(),
            0,
        )
    }

    fn unexpected(tok: &Token) -> ExprError {
        ExprError::positioned(
            format!("Unexpected token '{}'", tok.text),
            tok.position,
            tok.length,
        )
    }

    // Operators are symbols, or keywords lexed as identifiers.
    fn peek_binary_op(&self) -> Option<BinaryOp> {
        let tok = self.peek()?;
        match tok.kind {
            TokenKind::Operator | TokenKind::Identifier => BinaryOp::from_symbol(&tok.text).ok(),
            _ => None,
        }
    }

    fn parse_expr(&mut self, min_precedence: u8) -> Result<Node> {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            let position = self.peek().map(|t| t.position).unwrap_or(0);
            return Err(ExprError::positioned(
                format!(
                    "Expression too complex: exceeded maximum nesting depth of {}",
                    MAX_RECURSION_DEPTH
                ),
                position,
                0,
            ));
        }

        let mut lhs = self.parse_prefix()?;

        while let Some(op) = self.peek_binary_op() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.next()?;
            if self.peek().is_none() {
                return Err(self.end_of_input("an operand"));
            }
            // All binary operators are left-associative.
            let rhs = self.parse_expr(precedence + 1)?;
            lhs = Node::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }

        self.recursion_depth -= 1;
        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Node> {
        let prefix = match self.peek() {
            Some(tok) if tok.kind == TokenKind::Operator => UnaryOp::from_symbol(&tok.text).ok(),
            _ => None,
        };
        let Some(op) = prefix else {
            return self.parse_primary();
        };

        self.next()?;
        if self.peek().is_none() {
            return Err(self.end_of_input(&format!("an operand after '{}'", op.symbol())));
        }
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            return Err(ExprError::positioned(
                "Expression too complex: too many prefix operators",
                self.lexer.position(),
                0,
            ));
        }
        let operand = self.parse_prefix()?;
        self.recursion_depth -= 1;
        Ok(Node::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let opens_array = self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Open && t.text == "[");
        if opens_array {
            // Leave the array contents unread for the raw capture.
            let open = self.current.take().ok_or_else(|| self.end_of_input("'['"))?;
            return Ok(Node::Array(self.take_group('[', &open)?));
        }

        let Some(tok) = self.next()? else {
            return Err(self.end_of_input("an expression"));
        };

        match tok.kind {
            TokenKind::Number => Ok(Node::Literal(Value::Number(tok.value.unwrap_or(0.0)))),
            TokenKind::Str => Ok(Node::Literal(Value::Str(tok.text))),
            TokenKind::Identifier => self.parse_identifier(tok),
            TokenKind::Open if tok.text == "(" => {
                let expr = self.parse_expr(0)?;
                match self.next()? {
                    Some(close) if close.text == ")" => Ok(expr),
                    Some(other) => Err(ExprError::positioned(
                        format!(
                            "Expected ')' but found '{}' (opening at offset {})",
                            other.text, tok.position
                        ),
                        other.position,
                        other.length,
                    )),
                    None => Err(ExprError::positioned("Unmatched '('", tok.position, 1)),
                }
            }
            _ => Err(Self::unexpected(&tok)),
        }
    }

    fn parse_identifier(&mut self, tok: Token) -> Result<Node> {
        let name = tok.text.as_str();
        if name.eq_ignore_ascii_case("true") {
            return Ok(Node::Literal(Value::Bool(true)));
        }
        if name.eq_ignore_ascii_case("false") {
            return Ok(Node::Literal(Value::Bool(false)));
        }

        let scope: &'a Scope = self.scope;
        let mode = scope.case_sensitivity;
        let context = scope.context.as_ref();

        let opens_call = self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Open && t.text == "(");
        if opens_call && context.has_function(name, mode) {
            // The '(' is the lookahead token; its contents are still unread.
            let open = self.current.take().ok_or_else(|| self.end_of_input("'('"))?;
            let args = self.take_group('(', &open)?;
            return Ok(Node::Call {
                name: tok.text,
                args,
            });
        }
        if let Some(value) = context.constant(name, mode) {
            return Ok(Node::Literal(value.clone()));
        }
        if context.has_variable(name, mode) {
            return Ok(Node::Reference(tok.text));
        }

        let what = if context.has_function(name, mode) {
            format!("Function '{}' must be followed by '('", name)
        } else {
            format!("Unknown identifier '{}'", name)
        };
        Err(ExprError::positioned(what, tok.position, tok.length))
    }

    /// Captures the raw text of an array literal or argument list. The
    /// opening delimiter has been consumed and nothing after it lexed.
    fn take_group(&mut self, open: char, open_tok: &Token) -> Result<ArrayExpression> {
        if self.scope.depth >= MAX_GROUP_DEPTH {
            return Err(ExprError::positioned(
                format!(
                    "Expression too complex: exceeded maximum of {} nested arrays or calls",
                    MAX_GROUP_DEPTH
                ),
                open_tok.position,
                1,
            ));
        }
        let group = self.lexer.take_group(open, open_tok.position)?;
        self.current = self.lexer.next_token()?;
        Ok(ArrayExpression::new(group.text, group.position))
    }

    fn parse(&mut self) -> Result<Node> {
        // Enclosing groups count against the same budget as parentheses.
        self.recursion_depth = self.scope.depth;
        let expr = self.parse_expr(0)?;

        // Check for unexpected trailing tokens
        if let Some(tok) = self.peek() {
            return Err(Self::unexpected(tok));
        }
        Ok(expr)
    }
}

/// Parses `input`, resolving identifiers against the registry of `scope`.
///
/// Array literals and function call arguments are captured as raw text and
/// only split when the tree is evaluated.
pub fn parse_in_scope(input: &str, scope: &Scope) -> Result<Node> {
    let mut parser = PrattParser::new(input, scope)?;
    parser.parse()
}

/// Parses `input` against a registry without any resolvers.
pub fn parse_expression(
    input: &str,
    context: Arc<EvalContext>,
    case_sensitivity: CaseSensitivity,
) -> Result<Node> {
    parse_in_scope(input, &Scope::new(context, case_sensitivity, Default::default()))
}
