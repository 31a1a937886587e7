//! Dynamic storage value type.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A dynamic storage value.
///
/// `Datum` is the representation a document field holds once a domain value
/// has been mapped for storage. The store compares datums structurally — two
/// byte sequences with equal contents are equal datums even when the domain
/// objects they came from were distinct allocations.
///
/// Floats are ordered by [`f64::total_cmp`] so datum ordering stays total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Datum {
    /// Null / absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Array of datums.
    Array(Vec<Datum>),
}

impl Datum {
    /// Returns a stable rank for the datum's variant, used to order datums
    /// of different variants deterministically.
    fn variant_rank(&self) -> u8 {
        match self {
            Datum::Null => 0,
            Datum::Bool(_) => 1,
            Datum::Int(_) => 2,
            Datum::Float(_) => 3,
            Datum::Text(_) => 4,
            Datum::Bytes(_) => 5,
            Datum::Array(_) => 6,
        }
    }

    /// Compares two datums in canonical order.
    ///
    /// The ordering is total and deterministic: variants are ranked first,
    /// then contents are compared length-first and element-wise, mirroring
    /// bytewise comparison of a canonical encoding. This is the ordering the
    /// bridge uses for key comparison and pushed-down range predicates.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        let rank = self.variant_rank().cmp(&other.variant_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Datum::Null, Datum::Null) => Ordering::Equal,
            (Datum::Bool(a), Datum::Bool(b)) => a.cmp(b),
            (Datum::Int(a), Datum::Int(b)) => a.cmp(b),
            (Datum::Float(a), Datum::Float(b)) => a.total_cmp(b),
            (Datum::Text(a), Datum::Text(b)) => match a.len().cmp(&b.len()) {
                Ordering::Equal => a.cmp(b),
                ord => ord,
            },
            (Datum::Bytes(a), Datum::Bytes(b)) => match a.len().cmp(&b.len()) {
                Ordering::Equal => a.cmp(b),
                ord => ord,
            },
            (Datum::Array(a), Datum::Array(b)) => match a.len().cmp(&b.len()) {
                Ordering::Equal => {
                    for (av, bv) in a.iter().zip(b.iter()) {
                        let ord = av.cmp_canonical(bv);
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                }
                ord => ord,
            },
            // Unreachable: variant ranks already matched above.
            _ => Ordering::Equal,
        }
    }

    /// Returns true if this datum is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_canonical(other) == Ordering::Equal
    }
}

impl Eq for Datum {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_buffers_with_equal_contents_are_equal() {
        let a = Datum::Bytes(vec![1, 2, 3]);
        let b = Datum::Bytes([1, 2, 3].to_vec());
        assert_eq!(a, b);
    }

    #[test]
    fn differing_element_makes_bytes_unequal() {
        let a = Datum::Bytes(vec![1, 2, 3]);
        let b = Datum::Bytes(vec![1, 2, 4]);
        assert_ne!(a, b);
    }

    #[test]
    fn bytes_order_length_first() {
        let short = Datum::Bytes(vec![9, 9]);
        let long = Datum::Bytes(vec![1, 1, 1]);
        assert_eq!(short.cmp_canonical(&long), Ordering::Less);
    }

    #[test]
    fn text_order_length_first() {
        let short = Datum::Text("zz".into());
        let long = Datum::Text("aaa".into());
        assert_eq!(short.cmp_canonical(&long), Ordering::Less);
    }

    #[test]
    fn arrays_compare_element_wise() {
        let a = Datum::Array(vec![Datum::Int(1), Datum::Int(2)]);
        let b = Datum::Array(vec![Datum::Int(1), Datum::Int(3)]);
        assert_eq!(a.cmp_canonical(&b), Ordering::Less);
        assert_ne!(a, b);
    }

    #[test]
    fn null_sorts_before_everything() {
        assert_eq!(Datum::Null.cmp_canonical(&Datum::Bool(false)), Ordering::Less);
        assert_eq!(Datum::Null.cmp_canonical(&Datum::Int(i64::MIN)), Ordering::Less);
    }

    #[test]
    fn float_ordering_is_total() {
        let nan = Datum::Float(f64::NAN);
        assert_eq!(nan.cmp_canonical(&nan), Ordering::Equal);
        assert_eq!(
            Datum::Float(-1.5).cmp_canonical(&Datum::Float(2.0)),
            Ordering::Less
        );
    }

    #[test]
    fn negative_ints_sort_below_positive() {
        assert_eq!(
            Datum::Int(-5).cmp_canonical(&Datum::Int(3)),
            Ordering::Less
        );
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_datum() -> impl Strategy<Value = Datum> {
        let leaf = prop_oneof![
            Just(Datum::Null),
            any::<bool>().prop_map(Datum::Bool),
            any::<i64>().prop_map(Datum::Int),
            any::<f64>().prop_map(Datum::Float),
            ".{0,16}".prop_map(Datum::Text),
            proptest::collection::vec(any::<u8>(), 0..16).prop_map(Datum::Bytes),
        ];
        leaf.prop_recursive(2, 16, 4, |inner| {
            proptest::collection::vec(inner, 0..4).prop_map(Datum::Array)
        })
    }

    proptest! {
        #[test]
        fn ordering_is_reflexive(a in arb_datum()) {
            prop_assert_eq!(a.cmp_canonical(&a), Ordering::Equal);
        }

        #[test]
        fn ordering_is_antisymmetric(a in arb_datum(), b in arb_datum()) {
            let ab = a.cmp_canonical(&b);
            let ba = b.cmp_canonical(&a);
            prop_assert_eq!(ab, ba.reverse());
        }

        #[test]
        fn equality_matches_ordering(a in arb_datum(), b in arb_datum()) {
            prop_assert_eq!(a == b, a.cmp_canonical(&b) == Ordering::Equal);
        }
    }
}
