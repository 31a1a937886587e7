//! Conservative predicate pushdown.
//!
//! Translation walks a query's expression tree and classifies each node as
//! store-evaluable or residual. Store-evaluable nodes become a document
//! predicate checked against raw documents before materialization; everything
//! else is kept as a residual entity predicate evaluated after it. When in
//! doubt a node goes to the residual stage, never to an approximated
//! pushdown.

use crate::error::{BridgeError, BridgeResult};
use crate::mapping::TypeMappingRegistry;
use crate::model::{EntityType, ValueKind};
use crate::query::expression::{CompareOp, Direction, Expr, Query};
use docbridge_value::{Datum, Document};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::trace;

/// The translated form of one query execution.
#[derive(Debug)]
pub struct QueryPlan {
    pub(crate) pushdown: Option<DocPredicate>,
    pub(crate) residual: Option<Expr>,
    pub(crate) order: Vec<(String, Direction)>,
    pub(crate) projection: Option<Vec<usize>>,
    pub(crate) limit: Option<usize>,
}

impl QueryPlan {
    /// Returns true if part of the filter was pushed down to documents.
    #[must_use]
    pub fn has_pushdown(&self) -> bool {
        self.pushdown.is_some()
    }

    /// Returns true if part of the filter must run against materialized
    /// entities.
    #[must_use]
    pub fn has_residual(&self) -> bool {
        self.residual.is_some()
    }

    /// Returns the ordering keys.
    #[must_use]
    pub fn order(&self) -> &[(String, Direction)] {
        &self.order
    }

    /// Returns the result-count limit, if any.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// A store-evaluable predicate over raw documents.
#[derive(Debug)]
pub(crate) enum DocPredicate {
    Compare {
        property: String,
        op: CompareOp,
        datum: Datum,
    },
    And(Vec<DocPredicate>),
    Or(Vec<DocPredicate>),
    Not(Box<DocPredicate>),
}

impl DocPredicate {
    pub(crate) fn eval(&self, doc: &Document) -> bool {
        match self {
            Self::Compare {
                property,
                op,
                datum,
            } => {
                let stored = doc.get(property).unwrap_or(&Datum::Null);
                match datum_compare(stored, datum) {
                    Some(ord) => op_matches(*op, ord),
                    None => false,
                }
            }
            Self::And(parts) => parts.iter().all(|p| p.eval(doc)),
            Self::Or(parts) => parts.iter().any(|p| p.eval(doc)),
            Self::Not(inner) => !inner.eval(doc),
        }
    }
}

/// Compares two stored datums with the same semantics the residual stage
/// uses: nulls compare equal only to nulls, datums of different kinds do not
/// compare at all.
fn datum_compare(a: &Datum, b: &Datum) -> Option<Ordering> {
    if a.is_null() && b.is_null() {
        return Some(Ordering::Equal);
    }
    if a.is_null() || b.is_null() {
        return None;
    }
    if std::mem::discriminant(a) != std::mem::discriminant(b) {
        return None;
    }
    Some(a.cmp_canonical(b))
}

pub(crate) fn op_matches(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Ge => ord != Ordering::Less,
    }
}

/// Translates a query against an entity type into an execution plan.
///
/// # Errors
///
/// Fails if the filter, ordering, or projection references a property the
/// entity type does not declare. Unsupported predicate shapes never fail:
/// they degrade to residual evaluation.
pub(crate) fn translate(
    entity_type: &Arc<EntityType>,
    query: Query,
    registry: &TypeMappingRegistry,
) -> BridgeResult<QueryPlan> {
    // Host-supplied constant thunks run once, before any classification.
    let filter = query.filter.map(Expr::resolve_computed);

    if let Some(expr) = &filter {
        validate(entity_type, expr)?;
    }
    for (name, _) in &query.order {
        require_property(entity_type, name)?;
    }
    let projection = query
        .projection
        .map(|names| {
            names
                .iter()
                .map(|name| require_property(entity_type, name))
                .collect::<BridgeResult<Vec<_>>>()
        })
        .transpose()?;

    let (pushdown, residual) = match filter {
        Some(expr) => split(entity_type, registry, expr)?,
        None => (None, None),
    };

    trace!(
        entity_type = entity_type.name(),
        pushed = pushdown.is_some(),
        residual = residual.is_some(),
        "translated query"
    );

    Ok(QueryPlan {
        pushdown,
        residual,
        order: query.order,
        projection,
        limit: query.limit,
    })
}

fn require_property(entity_type: &EntityType, name: &str) -> BridgeResult<usize> {
    entity_type
        .property(name)
        .map(|(idx, _)| idx)
        .ok_or_else(|| {
            BridgeError::invalid_operation(format!(
                "query references unknown property {name} of {}",
                entity_type.name()
            ))
        })
}

fn validate(entity_type: &EntityType, expr: &Expr) -> BridgeResult<()> {
    match expr {
        Expr::Property(name) => require_property(entity_type, name).map(|_| ()),
        Expr::Literal(_) | Expr::Computed(_) => Ok(()),
        Expr::Compare { lhs, rhs, .. } => {
            validate(entity_type, lhs)?;
            validate(entity_type, rhs)
        }
        Expr::And(a, b) | Expr::Or(a, b) => {
            validate(entity_type, a)?;
            validate(entity_type, b)
        }
        Expr::Not(inner) => validate(entity_type, inner),
    }
}

/// Splits a filter into a pushed-down document predicate and a residual
/// entity predicate. Conjunctions split per conjunct; any other subtree is
/// pushed only when it is evaluable in full.
fn split(
    entity_type: &EntityType,
    registry: &TypeMappingRegistry,
    expr: Expr,
) -> BridgeResult<(Option<DocPredicate>, Option<Expr>)> {
    if let Expr::And(a, b) = expr {
        let (push_a, res_a) = split(entity_type, registry, *a)?;
        let (push_b, res_b) = split(entity_type, registry, *b)?;
        let pushdown = match (push_a, push_b) {
            (Some(pa), Some(pb)) => Some(DocPredicate::And(vec![pa, pb])),
            (Some(p), None) | (None, Some(p)) => Some(p),
            (None, None) => None,
        };
        let residual = match (res_a, res_b) {
            (Some(ra), Some(rb)) => Some(ra.and(rb)),
            (Some(r), None) | (None, Some(r)) => Some(r),
            (None, None) => None,
        };
        return Ok((pushdown, residual));
    }

    match to_predicate(entity_type, registry, &expr)? {
        Some(predicate) => Ok((Some(predicate), None)),
        None => Ok((None, Some(expr))),
    }
}

/// Converts a whole subtree to a document predicate, or returns `None` if
/// any part of it must stay residual.
fn to_predicate(
    entity_type: &EntityType,
    registry: &TypeMappingRegistry,
    expr: &Expr,
) -> BridgeResult<Option<DocPredicate>> {
    match expr {
        Expr::Compare { op, lhs, rhs } => to_comparison(entity_type, registry, *op, lhs, rhs),
        Expr::And(a, b) => Ok(both(
            to_predicate(entity_type, registry, a)?,
            to_predicate(entity_type, registry, b)?,
        )
        .map(|(pa, pb)| DocPredicate::And(vec![pa, pb]))),
        Expr::Or(a, b) => Ok(both(
            to_predicate(entity_type, registry, a)?,
            to_predicate(entity_type, registry, b)?,
        )
        .map(|(pa, pb)| DocPredicate::Or(vec![pa, pb]))),
        Expr::Not(inner) => Ok(to_predicate(entity_type, registry, inner)?
            .map(|p| DocPredicate::Not(Box::new(p)))),
        // Bare property references and constants are residual.
        Expr::Property(_) | Expr::Literal(_) | Expr::Computed(_) => Ok(None),
    }
}

fn both<T>(a: Option<T>, b: Option<T>) -> Option<(T, T)> {
    Some((a?, b?))
}

fn to_comparison(
    entity_type: &EntityType,
    registry: &TypeMappingRegistry,
    op: CompareOp,
    lhs: &Expr,
    rhs: &Expr,
) -> BridgeResult<Option<DocPredicate>> {
    let (property, literal, op) = match (lhs, rhs) {
        (Expr::Property(name), Expr::Literal(value)) => (name, value, op),
        (Expr::Literal(value), Expr::Property(name)) => (name, value, flip(op)),
        _ => return Ok(None),
    };

    let Some(kind) = literal.kind() else {
        // Null literals and kindless values stay residual.
        return Ok(None);
    };
    // Distinct kinds can share a storage representation (Uuid is stored as
    // Bytes), so a raw-datum comparison could match where the mapping layer
    // says cross-kind pairs never do. Push only when the literal's kind is
    // the property's declared kind; mismatches stay residual.
    let Some((_, declared)) = entity_type.property(property) else {
        return Ok(None);
    };
    if declared.kind() != &kind {
        return Ok(None);
    }
    if !pushable(op, &kind) {
        return Ok(None);
    }

    let datum = registry.find_mapping(&kind)?.to_datum(literal)?;
    Ok(Some(DocPredicate::Compare {
        property: property.clone(),
        op,
        datum,
    }))
}

fn flip(op: CompareOp) -> CompareOp {
    match op {
        CompareOp::Lt => CompareOp::Gt,
        CompareOp::Le => CompareOp::Ge,
        CompareOp::Gt => CompareOp::Lt,
        CompareOp::Ge => CompareOp::Le,
        CompareOp::Eq | CompareOp::Ne => op,
    }
}

/// Whether an operator on a literal of this kind is safe to evaluate on
/// stored datums.
///
/// Equality agrees between the stored and the mapped representation for all
/// scalar kinds. Range operators are pushed only for kinds whose canonical
/// byte ordering matches the mapping's ordering; canonical text and byte
/// ordering is length-first, so those ranges stay residual.
fn pushable(op: CompareOp, kind: &ValueKind) -> bool {
    match op {
        CompareOp::Eq | CompareOp::Ne => matches!(
            kind,
            ValueKind::Bool
                | ValueKind::Int
                | ValueKind::Float
                | ValueKind::Text
                | ValueKind::Bytes
                | ValueKind::Uuid
        ),
        _ => matches!(kind, ValueKind::Bool | ValueKind::Int | ValueKind::Float),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    fn person() -> Arc<EntityType> {
        EntityType::builder("Person")
            .key_property("Id", ValueKind::Int)
            .property("Name", ValueKind::Text)
            .nullable_property("Tags", ValueKind::Bytes)
            .build()
            .unwrap()
    }

    fn registry() -> TypeMappingRegistry {
        TypeMappingRegistry::new()
    }

    fn plan(query: Query) -> QueryPlan {
        translate(&person(), query, &registry()).unwrap()
    }

    #[test]
    fn scalar_equality_is_pushed_down() {
        let p = plan(Query::new().filter(Expr::prop("Name").eq(Expr::text("Ann"))));
        assert!(p.has_pushdown());
        assert!(!p.has_residual());
    }

    #[test]
    fn int_range_is_pushed_down() {
        let p = plan(Query::new().filter(Expr::prop("Id").lt(Expr::int(10))));
        assert!(p.has_pushdown());
        assert!(!p.has_residual());
    }

    #[test]
    fn text_range_stays_residual() {
        let p = plan(Query::new().filter(Expr::prop("Name").lt(Expr::text("M"))));
        assert!(!p.has_pushdown());
        assert!(p.has_residual());
    }

    #[test]
    fn conjunction_splits_per_conjunct() {
        let p = plan(Query::new().filter(
            Expr::prop("Id")
                .lt(Expr::int(10))
                .and(Expr::prop("Name").lt(Expr::text("M"))),
        ));
        assert!(p.has_pushdown());
        assert!(p.has_residual());
    }

    #[test]
    fn disjunction_pushes_only_in_full() {
        let evaluable = plan(Query::new().filter(
            Expr::prop("Id")
                .eq(Expr::int(1))
                .or(Expr::prop("Id").eq(Expr::int(2))),
        ));
        assert!(evaluable.has_pushdown());
        assert!(!evaluable.has_residual());

        let mixed = plan(Query::new().filter(
            Expr::prop("Id")
                .eq(Expr::int(1))
                .or(Expr::prop("Name").lt(Expr::text("M"))),
        ));
        assert!(!mixed.has_pushdown());
        assert!(mixed.has_residual());
    }

    #[test]
    fn literal_kind_must_match_declared_kind() {
        let session = EntityType::builder("Session")
            .key_property("Id", ValueKind::Int)
            .property("Token", ValueKind::Uuid)
            .build()
            .unwrap();
        let reg = registry();

        // Uuid is stored as Bytes; a bytes literal against a uuid property
        // must not be compared on raw datums.
        let id = uuid::Uuid::new_v4();
        let as_bytes = Query::new().filter(
            Expr::prop("Token").eq(Expr::value(Value::Bytes(id.as_bytes().to_vec()))),
        );
        let p = translate(&session, as_bytes, &reg).unwrap();
        assert!(!p.has_pushdown());
        assert!(p.has_residual());

        // A uuid literal against the same property is safe to push.
        let as_uuid =
            Query::new().filter(Expr::prop("Token").eq(Expr::value(Value::Uuid(id))));
        let p = translate(&session, as_uuid, &reg).unwrap();
        assert!(p.has_pushdown());
        assert!(!p.has_residual());
    }

    #[test]
    fn mismatched_literal_kind_stays_residual() {
        let p = plan(Query::new().filter(Expr::prop("Id").eq(Expr::text("1"))));
        assert!(!p.has_pushdown());
        assert!(p.has_residual());
    }

    #[test]
    fn null_literal_stays_residual() {
        let p = plan(Query::new().filter(Expr::prop("Tags").eq(Expr::value(Value::Null))));
        assert!(!p.has_pushdown());
        assert!(p.has_residual());
    }

    #[test]
    fn unknown_property_is_rejected() {
        let result = translate(
            &person(),
            Query::new().filter(Expr::prop("Nope").eq(Expr::int(1))),
            &registry(),
        );
        assert!(matches!(result, Err(BridgeError::InvalidOperation { .. })));
    }

    #[test]
    fn flipped_operands_normalize() {
        let p = plan(Query::new().filter(Expr::int(10).gt(Expr::prop("Id"))));
        match p.pushdown {
            Some(DocPredicate::Compare { op, .. }) => assert_eq!(op, CompareOp::Lt),
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[test]
    fn pushdown_matches_documents() {
        let predicate = DocPredicate::Compare {
            property: "Id".into(),
            op: CompareOp::Lt,
            datum: Datum::Int(10),
        };

        let mut hit = Document::new();
        hit.set("Id", Datum::Int(5));
        let mut miss = Document::new();
        miss.set("Id", Datum::Int(15));
        let empty = Document::new();

        assert!(predicate.eval(&hit));
        assert!(!predicate.eval(&miss));
        // An absent field never satisfies a comparison.
        assert!(!predicate.eval(&empty));
    }

    #[test]
    fn mismatched_stored_kind_never_matches() {
        let predicate = DocPredicate::Compare {
            property: "Id".into(),
            op: CompareOp::Ne,
            datum: Datum::Int(10),
        };
        let mut doc = Document::new();
        doc.set("Id", Datum::Text("ten".into()));
        assert!(!predicate.eval(&doc));
    }
}
