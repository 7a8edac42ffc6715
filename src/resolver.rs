//! Extension callbacks that resolve free variables and function calls.
//!
//! Resolvers are the capability object handed to every evaluator, including
//! the fresh evaluators the splitter builds for each argument segment.

use std::sync::Arc;

use tracing::debug;

use crate::value::Value;

/// Resolves free variable references and user function calls.
///
/// Both methods default to "not handled".
pub trait Resolver: Send + Sync {
    fn resolve_variable(&self, _name: &str, _correlation_id: Option<i64>) -> Option<Value> {
        None
    }

    fn resolve_function(
        &self,
        _name: &str,
        _args: &[Value],
        _correlation_id: Option<i64>,
    ) -> Option<Value> {
        None
    }
}

/// Adapts a closure into a variable-only resolver.
pub struct VariableFn<F>(pub F);

impl<F> Resolver for VariableFn<F>
where
    F: Fn(&str, Option<i64>) -> Option<Value> + Send + Sync,
{
    fn resolve_variable(&self, name: &str, correlation_id: Option<i64>) -> Option<Value> {
        (self.0)(name, correlation_id)
    }
}

/// Adapts a closure into a function-only resolver.
pub struct FunctionFn<F>(pub F);

impl<F> Resolver for FunctionFn<F>
where
    F: Fn(&str, &[Value], Option<i64>) -> Option<Value> + Send + Sync,
{
    fn resolve_function(
        &self,
        name: &str,
        args: &[Value],
        correlation_id: Option<i64>,
    ) -> Option<Value> {
        (self.0)(name, args, correlation_id)
    }
}

/// Ordered list of registered resolvers.
///
/// Cloning shares the resolvers; it never copies them.
#[derive(Clone, Default)]
pub struct Resolvers {
    entries: Vec<Arc<dyn Resolver>>,
}

impl Resolvers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resolver: Arc<dyn Resolver>) {
        self.entries.push(resolver);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Asks every resolver, in registration order. The last answer wins.
    pub fn variable(&self, name: &str, correlation_id: Option<i64>) -> Option<Value> {
        let mut result = None;
        for resolver in &self.entries {
            if let Some(value) = resolver.resolve_variable(name, correlation_id) {
                result = Some(value);
            }
        }
        if result.is_none() {
            debug!(name, ?correlation_id, "variable left unresolved");
        }
        result
    }

    /// Asks every resolver, in registration order. The last answer wins.
    pub fn function(
        &self,
        name: &str,
        args: &[Value],
        correlation_id: Option<i64>,
    ) -> Option<Value> {
        let mut result = None;
        for resolver in &self.entries {
            if let Some(value) = resolver.resolve_function(name, args, correlation_id) {
                result = Some(value);
            }
        }
        if result.is_none() {
            debug!(name, ?correlation_id, "function left unresolved");
        }
        result
    }
}

impl core::fmt::Debug for Resolvers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Resolvers")
            .field("len", &self.len())
            .finish()
    }
}
