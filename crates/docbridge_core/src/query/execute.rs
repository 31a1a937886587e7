//! Query execution against a table scan.

use crate::error::{BridgeError, BridgeResult};
use crate::mapping::TypeMappingRegistry;
use crate::materializer::Materializer;
use crate::model::{Entity, Value};
use crate::query::expression::{CompareOp, Direction, Expr};
use crate::query::translate::{op_matches, QueryPlan};
use crate::table::TableScan;
use std::cmp::Ordering;
use std::sync::Arc;

/// The lazy result sequence of one query execution.
///
/// Single-pass and non-restartable: each row is pulled from the underlying
/// snapshot scan on demand, filtered, materialized, and checked against the
/// residual predicate. The iterator may be abandoned at any point without
/// side effects. Queries with ordering keys are an exception to laziness —
/// they collect and sort their rows up front.
pub struct QueryResults {
    inner: Inner,
}

enum Inner {
    Lazy(LazyResults),
    Sorted(std::vec::IntoIter<Entity>),
}

impl QueryResults {
    pub(crate) fn new(
        scan: TableScan,
        materializer: Arc<Materializer>,
        registry: Arc<TypeMappingRegistry>,
        plan: QueryPlan,
    ) -> BridgeResult<Self> {
        let mut lazy = LazyResults {
            scan,
            materializer,
            registry,
            plan,
            yielded: 0,
            done: false,
        };

        if lazy.plan.order.is_empty() {
            return Ok(Self {
                inner: Inner::Lazy(lazy),
            });
        }

        // Ordering forces the full result set into memory before the first
        // row can be yielded. Limit and projection apply after the sort.
        let limit = lazy.plan.limit.take();
        let projection = lazy.plan.projection.take();

        let mut rows = Vec::new();
        for row in &mut lazy {
            rows.push(row?);
        }
        sort_rows(&mut rows, &lazy.plan.order, &lazy.registry);
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        if let Some(indexes) = &projection {
            rows = rows.into_iter().map(|e| project(&e, indexes)).collect();
        }
        Ok(Self {
            inner: Inner::Sorted(rows.into_iter()),
        })
    }
}

impl Iterator for QueryResults {
    type Item = BridgeResult<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Lazy(lazy) => lazy.next(),
            Inner::Sorted(rows) => rows.next().map(Ok),
        }
    }
}

struct LazyResults {
    scan: TableScan,
    materializer: Arc<Materializer>,
    registry: Arc<TypeMappingRegistry>,
    plan: QueryPlan,
    yielded: usize,
    done: bool,
}

impl LazyResults {
    fn fail(&mut self, err: BridgeError) -> Option<BridgeResult<Entity>> {
        self.done = true;
        Some(Err(err))
    }
}

impl Iterator for LazyResults {
    type Item = BridgeResult<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.plan.limit.is_some_and(|limit| self.yielded >= limit) {
            self.done = true;
            return None;
        }

        loop {
            let doc = match self.scan.next()? {
                Ok(doc) => doc,
                Err(err) => return self.fail(err),
            };
            if let Some(predicate) = &self.plan.pushdown {
                if !predicate.eval(&doc) {
                    continue;
                }
            }
            let entity = match self.materializer.materialize(&doc) {
                Ok(entity) => entity,
                Err(err) => return self.fail(err),
            };
            if let Some(residual) = &self.plan.residual {
                match eval_bool(residual, &entity, &self.registry) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(err) => return self.fail(err),
                }
            }

            self.yielded += 1;
            let entity = match &self.plan.projection {
                Some(indexes) => project(&entity, indexes),
                None => entity,
            };
            return Some(Ok(entity));
        }
    }
}

/// Evaluates a residual predicate against a materialized entity.
pub(crate) fn eval_bool(
    expr: &Expr,
    entity: &Entity,
    registry: &TypeMappingRegistry,
) -> BridgeResult<bool> {
    match expr {
        Expr::And(a, b) => Ok(eval_bool(a, entity, registry)? && eval_bool(b, entity, registry)?),
        Expr::Or(a, b) => Ok(eval_bool(a, entity, registry)? || eval_bool(b, entity, registry)?),
        Expr::Not(inner) => Ok(!eval_bool(inner, entity, registry)?),
        Expr::Compare { op, lhs, rhs } => {
            let a = eval_value(lhs, entity)?;
            let b = eval_value(rhs, entity)?;
            Ok(compare_values(*op, &a, &b, registry))
        }
        other => match eval_value(other, entity)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            _ => Err(BridgeError::invalid_operation(
                "predicate did not evaluate to a boolean",
            )),
        },
    }
}

fn eval_value(expr: &Expr, entity: &Entity) -> BridgeResult<Value> {
    match expr {
        Expr::Property(name) => entity.get(name).cloned().ok_or_else(|| {
            BridgeError::invalid_operation(format!(
                "entity type {} has no property {name}",
                entity.entity_type().name()
            ))
        }),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Computed(thunk) => Ok(thunk.evaluate()),
        _ => Err(BridgeError::invalid_operation(
            "boolean expression used as a value",
        )),
    }
}

/// Comparison with the mapping registry's semantics: nulls equal only nulls,
/// values of different kinds never satisfy any operator.
fn compare_values(op: CompareOp, a: &Value, b: &Value, registry: &TypeMappingRegistry) -> bool {
    let ord = if a.is_null() && b.is_null() {
        Some(Ordering::Equal)
    } else if a.is_null() || b.is_null() {
        None
    } else {
        registry.compare(a, b)
    };
    match ord {
        Some(ord) => op_matches(op, ord),
        None => false,
    }
}

fn sort_rows(rows: &mut [Entity], keys: &[(String, Direction)], registry: &TypeMappingRegistry) {
    rows.sort_by(|a, b| {
        for (name, direction) in keys {
            let ord = order_compare(a.get(name), b.get(name), registry);
            let ord = match direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Total order for sorting: nulls first, incomparable pairs tie.
fn order_compare(a: Option<&Value>, b: Option<&Value>, registry: &TypeMappingRegistry) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => registry.compare(a, b).unwrap_or(Ordering::Equal),
    }
}

fn project(entity: &Entity, indexes: &[usize]) -> Entity {
    let mut projected = Entity::new(Arc::clone(entity.entity_type()));
    for &idx in indexes {
        projected.set_at(idx, entity.value_at(idx).clone());
    }
    projected
}
