//! Compilation of parsed expressions into typed predicates.
//!
//! A tree is lowered once into a tree of closures over `&T`. Every closure
//! carries a static type, and operators are resolved against those types at
//! compile time, so the resulting [`Predicate`] can be run against any number
//! of inputs without parsing or type checks.
//!
//! ```
//! use exp_lambda::{ExpressionEval, Native, Param, build_predicate};
//!
//! struct Person {
//!     name: String,
//!     age: f64,
//! }
//!
//! fn bind(p: &Param<Person>, name: &str) -> Option<Native<Person>> {
//!     match name {
//!         "name" => Some(p.string(|s| s.name.clone())),
//!         "age" => Some(p.number(|s| s.age)),
//!         _ => None,
//!     }
//! }
//!
//! let mut expr = ExpressionEval::new("name like 'oh' and age >= 18");
//! expr.add_variable("name").add_variable("age");
//! let adult_john = build_predicate(Some(&expr), bind).unwrap();
//!
//! let john = Person { name: "John".into(), age: 30.0 };
//! let mary = Person { name: "Mary".into(), age: 30.0 };
//! assert!(adult_john.test(&john));
//! assert!(!adult_john.test(&mary));
//! ```

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::Real;
use crate::context::Scope;
use crate::error::{ExprError, Result};
use crate::eval::evaluate;
use crate::expression::ExpressionEval;
use crate::types::{BinaryOp, Node, UnaryOp};
use crate::value::Value;

type Getter<T, R> = Arc<dyn Fn(&T) -> R + Send + Sync>;

/// Static type of a lowered expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeType {
    Number,
    Str,
    Bool,
    Array,
}

impl NativeType {
    pub fn name(self) -> &'static str {
        match self {
            NativeType::Number => "number",
            NativeType::Str => "string",
            NativeType::Bool => "boolean",
            NativeType::Array => "array",
        }
    }
}

/// A statically typed expression over an input of type `T`.
pub enum Native<T> {
    Number(Getter<T, Real>),
    Str(Getter<T, String>),
    Bool(Getter<T, bool>),
    Array(Getter<T, Vec<Value>>),
}

impl<T> Clone for Native<T> {
    fn clone(&self) -> Self {
        match self {
            Native::Number(f) => Native::Number(Arc::clone(f)),
            Native::Str(f) => Native::Str(Arc::clone(f)),
            Native::Bool(f) => Native::Bool(Arc::clone(f)),
            Native::Array(f) => Native::Array(Arc::clone(f)),
        }
    }
}

impl<T: 'static> Native<T> {
    pub fn ty(&self) -> NativeType {
        match self {
            Native::Number(_) => NativeType::Number,
            Native::Str(_) => NativeType::Str,
            Native::Bool(_) => NativeType::Bool,
            Native::Array(_) => NativeType::Array,
        }
    }

    /// Wraps a value that does not depend on the input.
    pub fn constant(value: Value) -> Self {
        match value {
            Value::Number(n) => Native::Number(Arc::new(move |_| n)),
            Value::Bool(b) => Native::Bool(Arc::new(move |_| b)),
            Value::Str(s) => Native::Str(Arc::new(move |_| s.clone())),
            Value::Array(items) => Native::Array(Arc::new(move |_| items.clone())),
        }
    }

    /// Runs the expression and wraps its result.
    pub fn evaluate(&self, input: &T) -> Value {
        match self {
            Native::Number(f) => Value::Number(f(input)),
            Native::Str(f) => Value::Str(f(input)),
            Native::Bool(f) => Value::Bool(f(input)),
            Native::Array(f) => Value::Array(f(input)),
        }
    }

    /// Textual form used by string concatenation.
    fn into_text(self) -> Getter<T, String> {
        match self {
            Native::Str(f) => f,
            other => Arc::new(move |t| other.evaluate(t).to_string()),
        }
    }
}

/// Placeholder for the input of a predicate, handed to the binder.
///
/// Its helpers build member accesses on `T` with the right static type.
pub struct Param<T> {
    name: &'static str,
    _input: PhantomData<fn(&T)>,
}

impl<T: 'static> Param<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            _input: PhantomData,
        }
    }

    /// Name of the placeholder, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn number<F>(&self, f: F) -> Native<T>
    where
        F: Fn(&T) -> Real + Send + Sync + 'static,
    {
        Native::Number(Arc::new(f))
    }

    pub fn string<F>(&self, f: F) -> Native<T>
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Native::Str(Arc::new(f))
    }

    pub fn boolean<F>(&self, f: F) -> Native<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Native::Bool(Arc::new(f))
    }

    pub fn array<F>(&self, f: F) -> Native<T>
    where
        F: Fn(&T) -> Vec<Value> + Send + Sync + 'static,
    {
        Native::Array(Arc::new(f))
    }
}

/// A compiled boolean test over `T`.
pub struct Predicate<T> {
    test: Getter<T, bool>,
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            test: Arc::clone(&self.test),
        }
    }
}

impl<T> Predicate<T> {
    pub fn test(&self, input: &T) -> bool {
        (self.test)(input)
    }

    /// The predicate as a closure for [`Iterator::filter`].
    pub fn matches(&self) -> impl Fn(&&T) -> bool + '_ {
        move |item: &&T| self.test(item)
    }

    /// Keeps the items of `items` the predicate accepts.
    pub fn filter<'a>(&'a self, items: &'a [T]) -> impl Iterator<Item = &'a T> + 'a {
        items.iter().filter(self.matches())
    }
}

/// Anything a predicate can be compiled from.
pub trait Parsed {
    /// The root of the parsed tree.
    fn parsed(&self) -> Result<Cow<'_, Node>>;

    /// Scope used for the parts of the tree that are evaluated while
    /// compiling: array literals and function calls.
    fn scope(&self) -> Scope {
        Scope::default()
    }
}

impl Parsed for Node {
    fn parsed(&self) -> Result<Cow<'_, Node>> {
        Ok(Cow::Borrowed(self))
    }
}

impl Parsed for ExpressionEval {
    fn parsed(&self) -> Result<Cow<'_, Node>> {
        self.parse().map(Cow::Owned)
    }

    fn scope(&self) -> Scope {
        ExpressionEval::scope(self)
    }
}

/// Compiles `expr` into a predicate over `T`.
///
/// Free references are handed to `bind` together with the input placeholder;
/// whatever it returns is used as is. Array literals and function calls cannot
/// depend on the input and are evaluated once, here.
///
/// Fails with [`ExprError::MissingExpression`] before doing anything else when
/// `expr` is `None`.
pub fn build_predicate<T, S, B>(expr: Option<&S>, bind: B) -> Result<Predicate<T>>
where
    T: 'static,
    S: Parsed + ?Sized,
    B: Fn(&Param<T>, &str) -> Option<Native<T>>,
{
    let expr = expr.ok_or(ExprError::MissingExpression)?;
    let root = expr.parsed()?;
    let compiler = Compiler {
        param: Param::new("s"),
        bind: &bind,
        scope: expr.scope(),
    };

    debug!(tree = %root, "compiling predicate");
    match compiler.lower(&root)? {
        Native::Bool(test) => Ok(Predicate { test }),
        other => Err(ExprError::NotAPredicate {
            ty: other.ty().name(),
        }),
    }
}

struct Compiler<'b, T, B> {
    param: Param<T>,
    bind: &'b B,
    scope: Scope,
}

impl<T, B> Compiler<'_, T, B>
where
    T: 'static,
    B: Fn(&Param<T>, &str) -> Option<Native<T>>,
{
    fn lower(&self, node: &Node) -> Result<Native<T>> {
        match node {
            Node::Reference(name) => (self.bind)(&self.param, name)
                .ok_or_else(|| ExprError::UnboundReference { name: name.clone() }),
            Node::Literal(value) => Ok(Native::constant(value.clone())),
            Node::Array(_) | Node::Call { .. } => {
                Ok(Native::constant(evaluate(node, &self.scope, None)?))
            }
            Node::Unary { op, operand } => lower_unary(*op, self.lower(operand)?),
            Node::Binary { op, left, right } => {
                let lhs = self.lower(left)?;
                let rhs = self.lower(right)?;
                lower_binary(*op, lhs, rhs)
            }
        }
    }
}

fn unsupported(op: &str, ty: impl Into<String>) -> ExprError {
    ExprError::UnsupportedOperator {
        op: op.to_string(),
        ty: ty.into(),
    }
}

fn integral(n: Real) -> i64 {
    n.trunc() as i64
}

fn lower_unary<T: 'static>(op: UnaryOp, operand: Native<T>) -> Result<Native<T>> {
    let lowered = match (op, operand) {
        (UnaryOp::Plus, operand) => operand,
        (UnaryOp::Negate, Native::Number(f)) => Native::Number(Arc::new(move |t| -f(t))),
        (UnaryOp::Not | UnaryOp::Complement, Native::Bool(f)) => {
            Native::Bool(Arc::new(move |t| !f(t)))
        }
        (UnaryOp::Not | UnaryOp::Complement, Native::Number(f)) => {
            Native::Number(Arc::new(move |t| !integral(f(t)) as Real))
        }
        (op, operand) => return Err(unsupported(op.symbol(), operand.ty().name())),
    };
    Ok(lowered)
}

fn numeric<T: 'static>(
    lhs: Getter<T, Real>,
    rhs: Getter<T, Real>,
    f: fn(Real, Real) -> Real,
) -> Native<T> {
    Native::Number(Arc::new(move |t| f(lhs(t), rhs(t))))
}

fn compare<T: 'static, V: PartialOrd + 'static>(
    lhs: Getter<T, V>,
    rhs: Getter<T, V>,
    f: fn(&V, &V) -> bool,
) -> Native<T> {
    Native::Bool(Arc::new(move |t| f(&lhs(t), &rhs(t))))
}

fn equality<T: 'static>(op: BinaryOp, lhs: Native<T>, rhs: Native<T>) -> Result<Native<T>> {
    let equal: Getter<T, bool> = match (lhs, rhs) {
        (Native::Number(l), Native::Number(r)) => Arc::new(move |t| l(t) == r(t)),
        (Native::Str(l), Native::Str(r)) => Arc::new(move |t| l(t) == r(t)),
        (Native::Bool(l), Native::Bool(r)) => Arc::new(move |t| l(t) == r(t)),
        (Native::Array(l), Native::Array(r)) => Arc::new(move |t| l(t) == r(t)),
        (l, r) => {
            return Err(unsupported(
                op.symbol(),
                format!("{} and {}", l.ty().name(), r.ty().name()),
            ));
        }
    };
    Ok(match op {
        BinaryOp::Ne => Native::Bool(Arc::new(move |t| !equal(t))),
        _ => Native::Bool(equal),
    })
}

fn lower_binary<T: 'static>(op: BinaryOp, lhs: Native<T>, rhs: Native<T>) -> Result<Native<T>> {
    use BinaryOp::*;

    let lowered = match (op, lhs, rhs) {
        (Xor, _, _) => {
            return Err(ExprError::NotImplemented {
                op: op.symbol().to_string(),
            });
        }
        (Add, l, r) if l.ty() == NativeType::Str || r.ty() == NativeType::Str => {
            let (l, r) = (l.into_text(), r.into_text());
            Native::Str(Arc::new(move |t| {
                let mut text = l(t);
                text.push_str(&r(t));
                text
            }))
        }
        (Add, Native::Number(l), Native::Number(r)) => numeric(l, r, |a, b| a + b),
        (Sub, Native::Number(l), Native::Number(r)) => numeric(l, r, |a, b| a - b),
        (Mul, Native::Number(l), Native::Number(r)) => numeric(l, r, |a, b| a * b),
        (Div, Native::Number(l), Native::Number(r)) => numeric(l, r, |a, b| a / b),
        (Rem, Native::Number(l), Native::Number(r)) => numeric(l, r, |a, b| a % b),
        (Shr, Native::Number(l), Native::Number(r)) => numeric(l, r, |a, b| {
            integral(a).wrapping_shr((integral(b) & 63) as u32) as Real
        }),
        (Shl, Native::Number(l), Native::Number(r)) => numeric(l, r, |a, b| {
            integral(a).wrapping_shl((integral(b) & 63) as u32) as Real
        }),
        (Lt, Native::Number(l), Native::Number(r)) => compare(l, r, |a, b| a < b),
        (Le, Native::Number(l), Native::Number(r)) => compare(l, r, |a, b| a <= b),
        (Gt, Native::Number(l), Native::Number(r)) => compare(l, r, |a, b| a > b),
        (Ge, Native::Number(l), Native::Number(r)) => compare(l, r, |a, b| a >= b),
        (Lt, Native::Str(l), Native::Str(r)) => compare(l, r, |a, b| a < b),
        (Le, Native::Str(l), Native::Str(r)) => compare(l, r, |a, b| a <= b),
        (Gt, Native::Str(l), Native::Str(r)) => compare(l, r, |a, b| a > b),
        (Ge, Native::Str(l), Native::Str(r)) => compare(l, r, |a, b| a >= b),
        (Like, Native::Str(l), Native::Str(r)) => {
            Native::Bool(Arc::new(move |t| l(t).contains(r(t).as_str())))
        }
        (Eq | Ne, l, r) => return equality(op, l, r),
        // `&` and `|` evaluate both sides.
        (BitAnd, Native::Bool(l), Native::Bool(r)) => Native::Bool(Arc::new(move |t| {
            let (a, b) = (l(t), r(t));
            a & b
        })),
        (BitOr, Native::Bool(l), Native::Bool(r)) => Native::Bool(Arc::new(move |t| {
            let (a, b) = (l(t), r(t));
            a | b
        })),
        (BitAnd, Native::Number(l), Native::Number(r)) => {
            numeric(l, r, |a, b| (integral(a) & integral(b)) as Real)
        }
        (BitOr, Native::Number(l), Native::Number(r)) => {
            numeric(l, r, |a, b| (integral(a) | integral(b)) as Real)
        }
        (And, Native::Bool(l), Native::Bool(r)) => Native::Bool(Arc::new(move |t| l(t) && r(t))),
        (Or, Native::Bool(l), Native::Bool(r)) => Native::Bool(Arc::new(move |t| l(t) || r(t))),
        (op, l, r) => {
            let ty = if l.ty() == r.ty() {
                l.ty().name().to_string()
            } else {
                format!("{} and {}", l.ty().name(), r.ty().name())
            };
            return Err(unsupported(op.symbol(), ty));
        }
    };
    Ok(lowered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Person {
        name: String,
        age: Real,
        active: bool,
    }

    fn person(name: &str, age: Real, active: bool) -> Person {
        Person {
            name: name.to_string(),
            age,
            active,
        }
    }

    fn bind(p: &Param<Person>, name: &str) -> Option<Native<Person>> {
        match name {
            "name" => Some(p.string(|s| s.name.clone())),
            "age" => Some(p.number(|s| s.age)),
            "active" => Some(p.boolean(|s| s.active)),
            _ => None,
        }
    }

    fn compile(node: Node) -> Result<Predicate<Person>> {
        build_predicate(Some(&node), bind)
    }

    fn bin(op: &str, l: Node, r: Node) -> Node {
        Node::binary(op, l, r).unwrap()
    }

    fn reference(name: &str) -> Node {
        Node::reference(name)
    }

    #[test]
    fn test_like_is_substring_containment() {
        let pred = compile(bin("like", reference("name"), Node::literal("oh"))).unwrap();
        assert!(pred.test(&person("John", 30.0, true)));
        assert!(!pred.test(&person("Mary", 30.0, true)));
    }

    #[test]
    fn test_like_rejects_non_strings() {
        let err = compile(bin("like", reference("age"), Node::literal("3"))).err().unwrap();
        assert_eq!(
            err,
            ExprError::UnsupportedOperator {
                op: "like".to_string(),
                ty: "number and string".to_string()
            }
        );
    }

    #[test]
    fn test_plus_with_string_concatenates() {
        let concat = bin(
            "==",
            bin("+", reference("name"), reference("age")),
            Node::literal("John30"),
        );
        assert!(compile(concat).unwrap().test(&person("John", 30.0, true)));

        let sum = bin("==", bin("+", reference("age"), Node::literal(1)), Node::literal(31));
        assert!(compile(sum).unwrap().test(&person("John", 30.0, true)));
    }

    #[test]
    fn test_arithmetic_and_comparisons() {
        let node = bin(
            "and",
            bin(">=", bin("*", reference("age"), Node::literal(2)), Node::literal(60)),
            bin("<", bin("%", reference("age"), Node::literal(7)), Node::literal(3)),
        );
        let pred = compile(node).unwrap();
        assert!(pred.test(&person("a", 30.0, true)));
        assert!(!pred.test(&person("a", 29.0, true)));
        assert!(!pred.test(&person("a", 33.0, true)));
    }

    #[test]
    fn test_unary_operators() {
        let not_active = Node::unary("!", reference("active")).unwrap();
        let pred = compile(not_active).unwrap();
        assert!(pred.test(&person("a", 1.0, false)));

        let tilde = Node::unary("~", reference("active")).unwrap();
        assert!(!compile(tilde).unwrap().test(&person("a", 1.0, true)));

        let neg = bin("<", Node::unary("-", reference("age")).unwrap(), Node::literal(0));
        assert!(compile(neg).unwrap().test(&person("a", 1.0, true)));

        let plus = Node::unary("+", reference("active")).unwrap();
        assert!(compile(plus).unwrap().test(&person("a", 1.0, true)));

        let bad = Node::unary("-", reference("name")).unwrap();
        assert!(matches!(
            compile(bad).err().unwrap(),
            ExprError::UnsupportedOperator { .. }
        ));
    }

    #[test]
    fn test_and_or_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let counted = move |p: &Param<Person>, name: &str| match name {
            "probe" => {
                let counter = Arc::clone(&counter);
                Some(p.boolean(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                }))
            }
            _ => bind(p, name),
        };

        let and = bin("&&", reference("active"), reference("probe"));
        let pred = build_predicate(Some(&and), counted.clone()).unwrap();
        assert!(!pred.test(&person("a", 1.0, false)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(pred.test(&person("a", 1.0, true)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let or = bin("OR", reference("active"), reference("probe"));
        let pred = build_predicate(Some(&or), counted.clone()).unwrap();
        assert!(pred.test(&person("a", 1.0, true)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // `&` is not short-circuiting.
        let eager = bin("&", reference("active"), reference("probe"));
        let pred = build_predicate(Some(&eager), counted).unwrap();
        assert!(!pred.test(&person("a", 1.0, false)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_expression() {
        let bound = AtomicUsize::new(0);
        let err = build_predicate::<Person, Node, _>(None, |_, _| {
            bound.fetch_add(1, Ordering::SeqCst);
            None
        })
        .err()
        .unwrap();
        assert_eq!(err, ExprError::MissingExpression);
        assert_eq!(bound.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_xor_is_not_implemented() {
        let node = bin("^", reference("active"), Node::literal(true));
        assert_eq!(
            compile(node).err().unwrap(),
            ExprError::NotImplemented {
                op: "^".to_string()
            }
        );
    }

    #[test]
    fn test_root_must_be_boolean() {
        let node = bin("+", reference("age"), Node::literal(1));
        assert_eq!(
            compile(node).err().unwrap(),
            ExprError::NotAPredicate { ty: "number" }
        );
    }

    #[test]
    fn test_unbound_reference() {
        assert_eq!(
            compile(reference("email")).err().unwrap(),
            ExprError::UnboundReference {
                name: "email".to_string()
            }
        );
    }

    #[test]
    fn test_equality_requires_matching_types() {
        let node = bin("<>", reference("age"), Node::literal("30"));
        assert_eq!(
            compile(node).err().unwrap(),
            ExprError::UnsupportedOperator {
                op: "!=".to_string(),
                ty: "number and string".to_string()
            }
        );
        let node = bin("<>", reference("name"), Node::literal("Bob"));
        assert!(compile(node).unwrap().test(&person("John", 1.0, true)));
    }

    #[test]
    fn test_predicate_is_reusable_across_threads() {
        let pred = compile(bin(">", reference("age"), Node::literal(18))).unwrap();
        let people = vec![person("a", 10.0, true), person("b", 20.0, true), person("c", 30.0, true)];
        let handle = {
            let pred = pred.clone();
            std::thread::spawn(move || pred.test(&person("d", 40.0, true)))
        };
        let adults: Vec<_> = pred.filter(&people).map(|p| p.name.as_str()).collect();
        assert_eq!(adults, vec!["b", "c"]);
        assert!(handle.join().unwrap());
    }
}
