//! The expression facade: text, registry and resolvers in one place.

use std::sync::Arc;

use tracing::debug;

use crate::context::{CaseSensitivity, EvalContext, Scope};
use crate::engine::parse_in_scope;
use crate::error::Result;
use crate::eval::evaluate;
use crate::resolver::{FunctionFn, Resolver, Resolvers, VariableFn};
use crate::types::Node;
use crate::value::Value;

/// An expression together with everything needed to evaluate it.
///
/// # Example
///
/// ```
/// use exp_lambda::{ExpressionEval, Value};
///
/// let mut eval = ExpressionEval::new("5 * x + x");
/// eval.add_variable("x");
/// eval.on_variable(|name, _| (name == "x").then(|| Value::from(8)));
/// assert_eq!(eval.evaluate(None).unwrap(), Value::from(48));
/// ```
#[derive(Clone, Debug)]
pub struct ExpressionEval {
    expression: String,
    context: EvalContext,
    case_sensitivity: CaseSensitivity,
    resolvers: Resolvers,
}

impl ExpressionEval {
    pub fn new(expression: impl Into<String>) -> Self {
        Self::with_case_sensitivity(expression, CaseSensitivity::default())
    }

    pub fn with_case_sensitivity(expression: impl Into<String>, mode: CaseSensitivity) -> Self {
        Self {
            expression: expression.into(),
            context: EvalContext::new(),
            case_sensitivity: mode,
            resolvers: Resolvers::new(),
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case_sensitivity
    }

    /// Declares a variable whose value comes from the resolvers.
    pub fn add_variable(&mut self, name: impl Into<String>) -> &mut Self {
        self.context.add_variable(name);
        self
    }

    /// Declares a constant folded into the tree at parse time.
    pub fn add_constant(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.context.add_constant(name, value);
        self
    }

    /// Declares a function whose result comes from the resolvers.
    pub fn add_function(&mut self, name: impl Into<String>) -> &mut Self {
        self.context.add_function(name);
        self
    }

    pub fn add_resolver(&mut self, resolver: Arc<dyn Resolver>) -> &mut Self {
        self.resolvers.push(resolver);
        self
    }

    /// Registers a closure resolving variables.
    pub fn on_variable<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&str, Option<i64>) -> Option<Value> + Send + Sync + 'static,
    {
        self.add_resolver(Arc::new(VariableFn(f)))
    }

    /// Registers a closure resolving function calls.
    pub fn on_function<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&str, &[Value], Option<i64>) -> Option<Value> + Send + Sync + 'static,
    {
        self.add_resolver(Arc::new(FunctionFn(f)))
    }

    /// Snapshot of the registry, mode and resolvers as they are now.
    pub fn scope(&self) -> Scope {
        Scope::new(
            Arc::new(self.context.clone()),
            self.case_sensitivity,
            self.resolvers.clone(),
        )
    }

    pub fn parse(&self) -> Result<Node> {
        parse_in_scope(&self.expression, &self.scope())
    }

    /// Parses and evaluates the expression.
    pub fn evaluate(&self, correlation_id: Option<i64>) -> Result<Value> {
        let scope = self.scope();
        let node = parse_in_scope(&self.expression, &scope)?;
        debug!(
            expression = %self.expression,
            resolvers = self.resolvers.len(),
            ?correlation_id,
            "evaluating"
        );
        evaluate(&node, &scope, correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExprError;
    use std::sync::Mutex;

    #[test]
    fn test_constants() {
        let mut eval = ExpressionEval::new("5 * x + y - z");
        eval.add_constant("x", 8).add_constant("y", 2).add_constant("z", 3);
        assert_eq!(eval.evaluate(None).unwrap(), Value::from(39));
    }

    #[test]
    fn test_constants_not_sensitive() {
        let mut eval = ExpressionEval::with_case_sensitivity("5 * x + Y - Z", CaseSensitivity::NONE);
        eval.add_constant("x", 8).add_constant("y", 2).add_constant("z", 3);
        assert_eq!(eval.evaluate(None).unwrap(), Value::from(39));
    }

    #[test]
    fn test_constants_sensitive() {
        let mut eval =
            ExpressionEval::with_case_sensitivity("5 * xx + xX - Xx", CaseSensitivity::USER_CONSTANTS);
        eval.add_constant("xx", 8).add_constant("xX", 2).add_constant("Xx", 3);
        assert_eq!(eval.evaluate(None).unwrap(), Value::from(39));
    }

    #[test]
    fn test_correlation_id_reaches_nested_resolvers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut eval = ExpressionEval::new("[v, [v]]");
        eval.add_variable("v").on_variable(move |_, id| {
            sink.lock().unwrap().push(id);
            Some(Value::from(1))
        });
        eval.evaluate(Some(42)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Some(42), Some(42)]);
    }

    #[test]
    fn test_parse_error_is_positioned() {
        let mut eval = ExpressionEval::new("x + ");
        eval.add_variable("x");
        assert_eq!(eval.parse().unwrap_err().span(), Some((4, 0)));
        assert!(matches!(eval.evaluate(None), Err(ExprError::Positioned { .. })));
    }
}
