//! Declarative queries: expression trees, conservative translation, and
//! lazy execution.

mod execute;
mod expression;
mod translate;

pub use execute::QueryResults;
pub use expression::{CompareOp, ComputedExpr, Direction, Expr, Query};
pub use translate::QueryPlan;

pub(crate) use translate::translate;
