//! Tree-walking evaluation of parsed expressions.

use crate::Real;
use crate::context::Scope;
use crate::error::{ExprError, Result};
use crate::types::{BinaryOp, Node, UnaryOp};
use crate::value::Value;

/// Evaluates `node` against `scope`.
///
/// Free references and function calls are handed to the scope's resolvers;
/// array literals and call arguments are split and evaluated in `scope`.
/// `correlation_id` is passed unchanged to every resolver and nested
/// evaluation.
pub fn evaluate(node: &Node, scope: &Scope, correlation_id: Option<i64>) -> Result<Value> {
    match node {
        Node::Literal(value) => Ok(value.clone()),
        Node::Reference(name) => scope
            .resolvers
            .variable(name, correlation_id)
            .ok_or_else(|| ExprError::UnresolvedVariable { name: name.clone() }),
        Node::Unary { op, operand } => {
            let value = evaluate(operand, scope, correlation_id)?;
            unary(*op, value)
        }
        Node::Binary {
            op: op @ (BinaryOp::And | BinaryOp::Or),
            left,
            right,
        } => {
            let lhs = evaluate(left, scope, correlation_id)?;
            let Value::Bool(l) = lhs else {
                return Err(mismatch(*op, &lhs, &Value::Bool(false)));
            };
            // Short-circuit: the right side is only evaluated when needed.
            if (*op == BinaryOp::And && !l) || (*op == BinaryOp::Or && l) {
                return Ok(Value::Bool(l));
            }
            match evaluate(right, scope, correlation_id)? {
                Value::Bool(r) => Ok(Value::Bool(r)),
                other => Err(mismatch(*op, &lhs, &other)),
            }
        }
        Node::Binary { op, left, right } => {
            let lhs = evaluate(left, scope, correlation_id)?;
            let rhs = evaluate(right, scope, correlation_id)?;
            binary(*op, lhs, rhs)
        }
        Node::Array(items) => Ok(Value::Array(items.evaluate(scope, correlation_id)?)),
        Node::Call { name, args } => {
            let args = args.evaluate(scope, correlation_id)?;
            scope
                .resolvers
                .function(name, &args, correlation_id)
                .ok_or_else(|| ExprError::UnresolvedFunction { name: name.clone() })
        }
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> ExprError {
    ExprError::TypeMismatch {
        op: op.symbol().to_string(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

/// Integral part used by bitwise operators and shifts.
fn integral(n: Real) -> i64 {
    n.trunc() as i64
}

/// Applies a prefix operator.
pub fn unary(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Plus, v) => Ok(v),
        (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Not | UnaryOp::Complement, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Not | UnaryOp::Complement, Value::Number(n)) => {
            Ok(Value::Number(!integral(n) as Real))
        }
        (op, v) => Err(ExprError::UnsupportedOperator {
            op: op.symbol().to_string(),
            ty: v.type_name().to_string(),
        }),
    }
}

/// Applies an infix operator to two already evaluated operands.
///
/// `and`/`or` evaluate eagerly here; [`evaluate`] short-circuits them before
/// getting this far.
pub fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    use BinaryOp::*;
    use Value::{Array, Bool, Number, Str};

    let result = match (op, &lhs, &rhs) {
        (Add, Str(_), _) | (Add, _, Str(_)) => Str(format!("{}{}", lhs, rhs)),
        (Add | Sub | Mul | Div | Rem, Array(l), Array(r)) if l.len() == r.len() => {
            let items = l
                .iter()
                .zip(r.iter())
                .map(|(a, b)| binary(op, a.clone(), b.clone()))
                .collect::<Result<Vec<_>>>()?;
            Array(items)
        }
        (Add, Number(l), Number(r)) => Number(l + r),
        (Sub, Number(l), Number(r)) => Number(l - r),
        (Mul, Number(l), Number(r)) => Number(l * r),
        (Div, Number(l), Number(r)) => Number(l / r),
        (Rem, Number(l), Number(r)) => Number(l % r),
        (Shl, Number(l), Number(r)) => {
            Number(integral(*l).wrapping_shl((integral(*r) & 63) as u32) as Real)
        }
        (Shr, Number(l), Number(r)) => {
            Number(integral(*l).wrapping_shr((integral(*r) & 63) as u32) as Real)
        }
        (Lt, Number(l), Number(r)) => Bool(l < r),
        (Le, Number(l), Number(r)) => Bool(l <= r),
        (Gt, Number(l), Number(r)) => Bool(l > r),
        (Ge, Number(l), Number(r)) => Bool(l >= r),
        (Lt, Str(l), Str(r)) => Bool(l < r),
        (Le, Str(l), Str(r)) => Bool(l <= r),
        (Gt, Str(l), Str(r)) => Bool(l > r),
        (Ge, Str(l), Str(r)) => Bool(l >= r),
        (Like, Str(l), Str(r)) => Bool(l.contains(r.as_str())),
        (Eq, _, _) => Bool(lhs == rhs),
        (Ne, _, _) => Bool(lhs != rhs),
        (BitAnd | And, Bool(l), Bool(r)) => Bool(*l && *r),
        (BitOr | Or, Bool(l), Bool(r)) => Bool(*l || *r),
        (Xor, Bool(l), Bool(r)) => Bool(l ^ r),
        (BitAnd, Number(l), Number(r)) => Number((integral(*l) & integral(*r)) as Real),
        (BitOr, Number(l), Number(r)) => Number((integral(*l) | integral(*r)) as Real),
        (Xor, Number(l), Number(r)) => Number((integral(*l) ^ integral(*r)) as Real),
        _ => return Err(mismatch(op, &lhs, &rhs)),
    };
    Ok(result)
}
