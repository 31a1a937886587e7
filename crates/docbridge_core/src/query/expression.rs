//! Declarative query expressions.

use crate::model::Value;
use std::fmt;
use std::sync::Arc;

/// Comparison operator in a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Structural equality.
    Eq,
    /// Structural inequality.
    Ne,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

/// Sort direction for an ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first; nulls first.
    Asc,
    /// Largest first; nulls last.
    Desc,
}

/// A host-supplied constant thunk.
///
/// The front-end marks sub-expressions that do not reference the entity as
/// safe to pre-evaluate; they run exactly once, before translation, never
/// per document.
#[derive(Clone)]
pub struct ComputedExpr(Arc<dyn Fn() -> Value + Send + Sync>);

impl ComputedExpr {
    pub(crate) fn evaluate(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for ComputedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComputedExpr(..)")
    }
}

/// A node in a query expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A reference to an entity property by name.
    Property(String),
    /// A constant value.
    Literal(Value),
    /// A host-evaluated constant, resolved once before translation.
    Computed(ComputedExpr),
    /// A binary comparison.
    Compare {
        /// The operator.
        op: CompareOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Logical conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Logical disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// Logical negation.
    Not(Box<Expr>),
}

impl Expr {
    /// A property reference.
    #[must_use]
    pub fn prop(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    /// A constant of any value.
    #[must_use]
    pub fn value(value: Value) -> Self {
        Self::Literal(value)
    }

    /// A text constant.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Literal(Value::Text(text.into()))
    }

    /// An integer constant.
    #[must_use]
    pub fn int(n: i64) -> Self {
        Self::Literal(Value::Int(n))
    }

    /// A float constant.
    #[must_use]
    pub fn float(n: f64) -> Self {
        Self::Literal(Value::Float(n))
    }

    /// A byte-sequence constant.
    #[must_use]
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Literal(Value::Bytes(bytes.into()))
    }

    /// A host-evaluated constant thunk.
    #[must_use]
    pub fn computed(thunk: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self::Computed(ComputedExpr(Arc::new(thunk)))
    }

    fn compare(self, op: CompareOp, rhs: Self) -> Self {
        Self::Compare {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    /// `self == rhs`.
    #[must_use]
    pub fn eq(self, rhs: Self) -> Self {
        self.compare(CompareOp::Eq, rhs)
    }

    /// `self != rhs`.
    #[must_use]
    pub fn ne(self, rhs: Self) -> Self {
        self.compare(CompareOp::Ne, rhs)
    }

    /// `self < rhs`.
    #[must_use]
    pub fn lt(self, rhs: Self) -> Self {
        self.compare(CompareOp::Lt, rhs)
    }

    /// `self <= rhs`.
    #[must_use]
    pub fn le(self, rhs: Self) -> Self {
        self.compare(CompareOp::Le, rhs)
    }

    /// `self > rhs`.
    #[must_use]
    pub fn gt(self, rhs: Self) -> Self {
        self.compare(CompareOp::Gt, rhs)
    }

    /// `self >= rhs`.
    #[must_use]
    pub fn ge(self, rhs: Self) -> Self {
        self.compare(CompareOp::Ge, rhs)
    }

    /// `self AND rhs`.
    #[must_use]
    pub fn and(self, rhs: Self) -> Self {
        Self::And(Box::new(self), Box::new(rhs))
    }

    /// `self OR rhs`.
    #[must_use]
    pub fn or(self, rhs: Self) -> Self {
        Self::Or(Box::new(self), Box::new(rhs))
    }

    /// `NOT self`.
    #[must_use]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Replaces every `Computed` node with the literal it evaluates to.
    pub(crate) fn resolve_computed(self) -> Self {
        match self {
            Self::Computed(thunk) => Self::Literal(thunk.evaluate()),
            Self::Compare { op, lhs, rhs } => Self::Compare {
                op,
                lhs: Box::new(lhs.resolve_computed()),
                rhs: Box::new(rhs.resolve_computed()),
            },
            Self::And(a, b) => Self::And(
                Box::new(a.resolve_computed()),
                Box::new(b.resolve_computed()),
            ),
            Self::Or(a, b) => Self::Or(
                Box::new(a.resolve_computed()),
                Box::new(b.resolve_computed()),
            ),
            Self::Not(inner) => Self::Not(Box::new(inner.resolve_computed())),
            other @ (Self::Property(_) | Self::Literal(_)) => other,
        }
    }
}

/// A declarative query: an optional filter, ordering keys, an optional
/// projection, and an optional result-count limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub(crate) filter: Option<Expr>,
    pub(crate) order: Vec<(String, Direction)>,
    pub(crate) projection: Option<Vec<String>>,
    pub(crate) limit: Option<usize>,
}

impl Query {
    /// An unfiltered query returning every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter predicate. Multiple calls conjoin.
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Appends an ordering key. Earlier keys take precedence.
    #[must_use]
    pub fn order_by(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.order.push((property.into(), direction));
        self
    }

    /// Restricts results to the named properties; everything else
    /// materializes at its default.
    #[must_use]
    pub fn project<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    /// Caps the number of results. Applied after all predicates.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_calls_conjoin() {
        let q = Query::new()
            .filter(Expr::prop("A").eq(Expr::int(1)))
            .filter(Expr::prop("B").eq(Expr::int(2)));
        assert!(matches!(q.filter, Some(Expr::And(_, _))));
    }

    #[test]
    fn computed_resolves_to_literal_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let expr = Expr::prop("Age").lt(Expr::computed(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::Int(30)
        }));

        let resolved = expr.resolve_computed();
        match resolved {
            Expr::Compare { rhs, .. } => {
                assert!(matches!(*rhs, Expr::Literal(Value::Int(30))));
            }
            other => panic!("unexpected shape {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
