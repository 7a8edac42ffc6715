//! Splitting of comma-separated argument lists.
//!
//! Array literals and function call arguments are kept as raw text by the
//! parser. At evaluation time the text is cut at its top-level commas and
//! every segment is parsed and evaluated by a fresh evaluator that inherits
//! the parent's registry, case sensitivity and resolvers.

use tracing::trace;

use crate::context::Scope;
use crate::engine::parse_in_scope;
use crate::error::Result;
use crate::eval::evaluate;
use crate::nesting::NestingTracker;
use crate::value::Value;

/// Separates arguments at the top level.
pub const SEPARATOR: char = ',';

/// Evaluates one segment of an argument list.
pub trait SubEvaluator {
    fn evaluate_segment(&self, segment: &str, correlation_id: Option<i64>) -> Result<Value>;
}

/// A scope evaluates a segment by parsing it with a new parser bound to the
/// same registry, case sensitivity and resolvers.
impl SubEvaluator for Scope {
    fn evaluate_segment(&self, segment: &str, correlation_id: Option<i64>) -> Result<Value> {
        let node = parse_in_scope(segment, self)?;
        evaluate(&node, self, correlation_id)
    }
}

/// Splits `raw` at its top-level commas and evaluates each segment in order.
///
/// `None` and the empty string yield no values. Otherwise the trailing
/// segment is always evaluated, so text without commas yields exactly one
/// value. Commas inside brackets, parentheses or quoted literals do not split.
///
/// A positioned error from a segment is re-raised with its offset made
/// relative to the start of `raw`. Any other error propagates unchanged.
/// Segments evaluated before a failure are not rolled back.
pub fn split<E>(raw: Option<&str>, correlation_id: Option<i64>, evaluator: &E) -> Result<Vec<Value>>
where
    E: SubEvaluator + ?Sized,
{
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Ok(Vec::new()),
    };

    let mut tracker = NestingTracker::new();
    let mut values = Vec::new();
    // Byte index for slicing, character index for error offsets.
    let mut start_byte = 0;
    let mut start_char = 0;

    for (char_idx, (byte_idx, c)) in raw.char_indices().enumerate() {
        tracker.advance(c);
        if c == SEPARATOR && tracker.is_top_level() {
            let segment = &raw[start_byte..byte_idx];
            values.push(evaluate_segment(evaluator, segment, start_char, correlation_id)?);
            start_byte = byte_idx + c.len_utf8();
            start_char = char_idx + 1;
        }
    }
    let segment = &raw[start_byte..];
    values.push(evaluate_segment(evaluator, segment, start_char, correlation_id)?);

    Ok(values)
}

fn evaluate_segment<E>(
    evaluator: &E,
    segment: &str,
    start: usize,
    correlation_id: Option<i64>,
) -> Result<Value>
where
    E: SubEvaluator + ?Sized,
{
    trace!(segment, start, ?correlation_id, "evaluating argument segment");
    evaluator
        .evaluate_segment(segment, correlation_id)
        .map_err(|e| e.shifted(start))
}

/// An unevaluated argument list: the text between `[` and `]` of an array
/// literal, or between the parentheses of a function call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayExpression {
    expression: String,
    offset: usize,
}

impl ArrayExpression {
    /// `offset` is where `expression` starts inside the enclosing text.
    pub fn new(expression: impl Into<String>, offset: usize) -> Self {
        Self {
            expression: expression.into(),
            offset,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Evaluates every element in a scope nested one level below `scope`.
    /// Positioned errors are reported relative to the enclosing text.
    pub fn evaluate(&self, scope: &Scope, correlation_id: Option<i64>) -> Result<Vec<Value>> {
        split(Some(&self.expression), correlation_id, &scope.nested())
            .map_err(|e| e.shifted(self.offset))
    }
}
