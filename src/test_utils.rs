//! Shared helpers for unit tests.

#![cfg(test)]

use std::sync::Arc;

use crate::context::{CaseSensitivity, EvalContext, Scope};
use crate::resolver::{Resolvers, VariableFn};
use crate::value::Value;

/// Initialize tracing for a test, honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// A scope declaring `vars` as variables, each resolved to its paired value.
pub fn scope_with(vars: &[(&str, Value)]) -> Scope {
    let mut ctx = EvalContext::new();
    let owned: Vec<(String, Value)> = vars
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();
    for (name, _) in &owned {
        ctx.add_variable(name.clone());
    }
    let mut resolvers = Resolvers::new();
    resolvers.push(Arc::new(VariableFn(move |name: &str, _: Option<i64>| {
        owned.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
    })));
    Scope::new(Arc::new(ctx), CaseSensitivity::NONE, resolvers)
}
