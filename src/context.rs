//! Registry of user-declared names and the scope threaded through evaluation.

use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::resolver::Resolvers;
use crate::value::Value;

bitflags! {
    /// Which categories of user-registered names are matched case-sensitively.
    ///
    /// Operator keywords (`and`, `or`, `like`) and `true`/`false` are language
    /// syntax and are always matched case-insensitively.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CaseSensitivity: u8 {
        const USER_CONSTANTS = 1;
        const USER_VARIABLES = 1 << 1;
        const USER_FUNCTIONS = 1 << 2;
        const ALL = Self::USER_CONSTANTS.bits()
            | Self::USER_VARIABLES.bits()
            | Self::USER_FUNCTIONS.bits();
    }
}

impl CaseSensitivity {
    /// Every name is matched case-insensitively.
    pub const NONE: Self = Self::empty();
}

impl Default for CaseSensitivity {
    fn default() -> Self {
        Self::NONE
    }
}

fn names_match(declared: &str, written: &str, sensitive: bool) -> bool {
    if sensitive {
        declared == written
    } else {
        declared.eq_ignore_ascii_case(written)
    }
}

/// Variables, constants and functions an expression may refer to.
///
/// Variables and functions are declarations only: their values come from the
/// registered resolvers at evaluation time. Constants carry their value and are
/// folded into the tree while parsing.
#[derive(Clone, Debug, Default)]
pub struct EvalContext {
    variables: Vec<String>,
    constants: Vec<(String, Value)>,
    functions: Vec<String>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: impl Into<String>) {
        self.variables.push(name.into());
    }

    /// Adds a constant, replacing any constant with exactly the same name.
    pub fn add_constant(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.constants.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.constants.push((name, value)),
        }
    }

    pub fn add_function(&mut self, name: impl Into<String>) {
        self.functions.push(name.into());
    }

    /// Looks up a constant. An exact match always wins over a case-folded one.
    pub fn constant(&self, name: &str, mode: CaseSensitivity) -> Option<&Value> {
        let sensitive = mode.contains(CaseSensitivity::USER_CONSTANTS);
        self.constants
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| {
                self.constants
                    .iter()
                    .find(|(n, _)| names_match(n, name, sensitive))
            })
            .map(|(_, v)| v)
    }

    pub fn has_variable(&self, name: &str, mode: CaseSensitivity) -> bool {
        let sensitive = mode.contains(CaseSensitivity::USER_VARIABLES);
        self.variables
            .iter()
            .any(|v| names_match(v, name, sensitive))
    }

    pub fn has_function(&self, name: &str, mode: CaseSensitivity) -> bool {
        let sensitive = mode.contains(CaseSensitivity::USER_FUNCTIONS);
        self.functions
            .iter()
            .any(|f| names_match(f, name, sensitive))
    }
}

/// Everything a nested evaluator inherits from its parent.
///
/// The registry and resolvers are shared, never copied, so a scope is cheap to
/// clone into every array literal and function call the parser produces.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    pub context: Arc<EvalContext>,
    pub case_sensitivity: CaseSensitivity,
    pub resolvers: Resolvers,
    /// Array literals and calls enclosing the text evaluated in this scope.
    pub depth: usize,
}

impl Scope {
    pub fn new(context: Arc<EvalContext>, case_sensitivity: CaseSensitivity, resolvers: Resolvers) -> Self {
        Self {
            context,
            case_sensitivity,
            resolvers,
            depth: 0,
        }
    }

    /// The scope of the segments of an array literal or call evaluated in
    /// this scope.
    pub fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_case_insensitive_by_default() {
        let mut ctx = EvalContext::new();
        ctx.add_constant("y", 2);
        assert_eq!(ctx.constant("Y", CaseSensitivity::NONE), Some(&Value::from(2)));
        assert_eq!(ctx.constant("Y", CaseSensitivity::USER_CONSTANTS), None);
    }

    #[test]
    fn test_constants_case_sensitive() {
        let mut ctx = EvalContext::new();
        ctx.add_constant("xx", 8);
        ctx.add_constant("xX", 2);
        ctx.add_constant("Xx", 3);
        let mode = CaseSensitivity::USER_CONSTANTS;
        assert_eq!(ctx.constant("xx", mode), Some(&Value::from(8)));
        assert_eq!(ctx.constant("xX", mode), Some(&Value::from(2)));
        assert_eq!(ctx.constant("Xx", mode), Some(&Value::from(3)));
        assert_eq!(ctx.constant("XX", mode), None);
        // Exact spelling is preferred even when folding.
        assert_eq!(ctx.constant("xX", CaseSensitivity::NONE), Some(&Value::from(2)));
    }

    #[test]
    fn test_user_constants_mode_keeps_variables_insensitive() {
        let mut ctx = EvalContext::new();
        ctx.add_variable("PRM.Attribut.TEST2");
        ctx.add_function("Upper");
        let mode = CaseSensitivity::USER_CONSTANTS;
        assert!(ctx.has_variable("prm.attribut.test2", mode));
        assert!(ctx.has_function("upper", mode));
        assert!(!ctx.has_variable("prm.attribut.test2", CaseSensitivity::ALL));
        assert!(!ctx.has_function("upper", CaseSensitivity::ALL));
    }

    #[test]
    fn test_nested_scope_shares_registry() {
        let mut ctx = EvalContext::new();
        ctx.add_variable("v");
        let scope = Scope::new(Arc::new(ctx), CaseSensitivity::ALL, Resolvers::new());
        let inner = scope.nested().nested();
        assert_eq!(inner.depth, 2);
        assert_eq!(inner.case_sensitivity, CaseSensitivity::ALL);
        assert!(Arc::ptr_eq(&inner.context, &scope.context));
    }

    #[test]
    fn test_redefining_constant_replaces_value() {
        let mut ctx = EvalContext::new();
        ctx.add_constant("x", 1);
        ctx.add_constant("x", 5);
        assert_eq!(ctx.constant("x", CaseSensitivity::ALL), Some(&Value::from(5)));
    }
}
