#![doc = r#"
# exp-lambda

An embeddable expression runtime: parse infix expressions over numbers,
strings, booleans and arrays, evaluate them against host supplied resolvers,
or compile them into typed predicates over host records.

## Overview

Expressions are plain text such as `5 * x + x`, `[v1, 15, 'un ']` or
`name like 'oh' and age >= 18`. Identifiers must be declared up front in a
registry: constants are folded into the tree while parsing, variables and
functions are answered at evaluation time by [`Resolver`]s.

Key features:
- Operators from `or` (lowest) up to `* / %`, with `and`, `or` and `like`
  accepted in any letter case
- Array literals and function arguments split on top level commas only, so
  nested brackets, parentheses and quoted strings are kept whole
- Positioned errors: every parse error carries the character offset of the
  fault in the outermost expression, even when it sits inside an array
- A correlation id threaded unchanged into every resolver call
- Per category case sensitivity through [`CaseSensitivity`]
- Compilation into reusable, thread safe [`Predicate`]s

## Quick Start

```rust
use exp_lambda::{ExpressionEval, Value};

let mut expr = ExpressionEval::new("5 * x + y - z");
expr.add_constant("x", 8).add_constant("y", 2).add_constant("z", 3);
assert_eq!(expr.evaluate(None).unwrap(), Value::from(39));
```

## Resolving Variables and Functions

```rust
use exp_lambda::{ExpressionEval, Value};

let mut expr = ExpressionEval::new("Upper(word) + ' ' + [1, 2]");
expr.add_variable("word").add_function("Upper");
expr.on_variable(|name, _| (name == "word").then(|| Value::from("passe")));
expr.on_function(|name, args, _| match (name, args) {
    ("Upper", [Value::Str(s)]) => Some(Value::Str(s.to_uppercase())),
    _ => None,
});
assert_eq!(expr.evaluate(None).unwrap(), Value::from("PASSE [1, 2]"));
```

## Predicates

See [`build_predicate`] for compiling an expression into a typed test over
host records.
"#]

pub mod array;
pub mod context;
pub mod engine;
pub mod error;
pub mod eval;
pub mod expression;
pub mod lexer;
pub mod nesting;
pub mod predicate;
pub mod resolver;
pub mod types;
pub mod value;

#[cfg(test)]
pub mod test_utils;

pub use array::{ArrayExpression, SEPARATOR, SubEvaluator, split};
pub use context::{CaseSensitivity, EvalContext, Scope};
pub use engine::{parse_expression, parse_in_scope};
pub use error::{ExprError, Result};
pub use eval::evaluate;
pub use expression::ExpressionEval;
pub use predicate::{Native, NativeType, Param, Parsed, Predicate, build_predicate};
pub use resolver::{FunctionFn, Resolver, Resolvers, VariableFn};
pub use types::{BinaryOp, Node, UnaryOp};
pub use value::Value;

/// Numeric type of the runtime.
pub type Real = f64;

pub mod constants {
    use super::Real;

    pub const TEST_PRECISION: Real = 1e-10;
}

/// Utility macro to check if two floating point values are approximately equal
/// within a specified epsilon.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($left, $right, $crate::constants::TEST_PRECISION)
    };
    ($left:expr, $right:expr, $epsilon:expr $(,)?) => {{
        let left_val: $crate::Real = $left;
        let right_val: $crate::Real = $right;
        let eps: $crate::Real = $epsilon;
        assert!(
            (left_val - right_val).abs() < eps,
            "assertion failed: `(left ≈ right)` (left: `{}`, right: `{}`, epsilon: `{}`)",
            left_val,
            right_val,
            eps
        );
    }};
}
