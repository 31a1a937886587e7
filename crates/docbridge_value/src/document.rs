//! Document representation and store-boundary encoding.

use crate::datum::Datum;
use crate::error::{ValueError, ValueResult};
use serde::{Deserialize, Serialize};

/// An ordered mapping from field name to stored value.
///
/// One document represents one entity instance in the store. Fields are kept
/// sorted by name so that equal documents always encode to equal bytes — the
/// store compares encoded representations, so encoding must be canonical.
///
/// A document is owned exclusively by the table that holds it; the bridge
/// never aliases one across transactions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<(String, Datum)>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a document from field pairs.
    ///
    /// Pairs are sorted by field name. Returns an error if a name repeats.
    pub fn from_fields(mut fields: Vec<(String, Datum)>) -> ValueResult<Self> {
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        for pair in fields.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(ValueError::duplicate_field(pair[0].0.clone()));
            }
        }
        Ok(Self { fields })
    }

    /// Sets a field, replacing any existing value under the same name.
    pub fn set(&mut self, name: impl Into<String>, datum: Datum) {
        let name = name.into();
        match self.fields.binary_search_by(|(n, _)| n.as_str().cmp(&name)) {
            Ok(pos) => self.fields[pos].1 = datum,
            Err(pos) => self.fields.insert(pos, (name, datum)),
        }
    }

    /// Gets a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.fields
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|pos| &self.fields[pos].1)
    }

    /// Removes a field by name, returning its value if present.
    pub fn remove(&mut self, name: &str) -> Option<Datum> {
        self.fields
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|pos| self.fields.remove(pos).1)
    }

    /// Returns true if the document has a field with the given name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Merges another document's fields into this one.
    ///
    /// Fields present in `changes` replace fields of the same name here;
    /// fields absent from `changes` are untouched. This is the update
    /// semantics for partial (changed-properties-only) writes.
    pub fn merge(&mut self, changes: &Document) {
        for (name, datum) in &changes.fields {
            self.set(name.clone(), datum.clone());
        }
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Datum)> {
        self.fields.iter().map(|(n, d)| (n.as_str(), d))
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the document has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encodes the document to bytes for the store boundary.
    pub fn encode(&self) -> ValueResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| ValueError::encoding_failed(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes a document from store bytes.
    pub fn decode(bytes: &[u8]) -> ValueResult<Self> {
        ciborium::from_reader(bytes).map_err(|e: ciborium::de::Error<std::io::Error>| {
            ValueError::decoding_failed(e.to_string())
        })
    }
}

/// Encodes a sequence of datums as key bytes.
///
/// Key bytes are compared by the store for lookup only; they must be
/// deterministic and injective, which the canonical document encoding of the
/// datum sequence guarantees.
pub(crate) fn encode_datums(datums: &[Datum]) -> ValueResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(datums, &mut buf)
        .map_err(|e| ValueError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

impl Datum {
    /// Encodes a slice of datums into deterministic key bytes.
    pub fn encode_key(datums: &[Datum]) -> ValueResult<Vec<u8>> {
        encode_datums(datums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(fields: Vec<(&str, Datum)>) -> Document {
        Document::from_fields(
            fields
                .into_iter()
                .map(|(n, d)| (n.to_string(), d))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn fields_are_kept_sorted() {
        let d = doc(vec![("b", Datum::Int(2)), ("a", Datum::Int(1))]);
        let names: Vec<_> = d.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_field_rejected() {
        let result = Document::from_fields(vec![
            ("x".to_string(), Datum::Int(1)),
            ("x".to_string(), Datum::Int(2)),
        ]);
        assert!(matches!(result, Err(ValueError::DuplicateField { .. })));
    }

    #[test]
    fn set_replaces_existing() {
        let mut d = doc(vec![("a", Datum::Int(1))]);
        d.set("a", Datum::Int(9));
        assert_eq!(d.get("a"), Some(&Datum::Int(9)));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn get_missing_returns_none() {
        let d = doc(vec![("a", Datum::Int(1))]);
        assert!(d.get("zzz").is_none());
    }

    #[test]
    fn merge_replaces_only_named_fields() {
        let mut base = doc(vec![
            ("name", Datum::Text("Ann".into())),
            ("tags", Datum::Bytes(vec![1, 2])),
        ]);
        let changes = doc(vec![("tags", Datum::Bytes(vec![1, 2, 3]))]);
        base.merge(&changes);

        assert_eq!(base.get("name"), Some(&Datum::Text("Ann".into())));
        assert_eq!(base.get("tags"), Some(&Datum::Bytes(vec![1, 2, 3])));
    }

    #[test]
    fn encode_decode_round_trip() {
        let d = doc(vec![
            ("id", Datum::Int(1)),
            ("name", Datum::Text("Ann".into())),
            ("tags", Datum::Bytes(vec![1, 2])),
            ("score", Datum::Float(0.5)),
            ("flags", Datum::Array(vec![Datum::Bool(true), Datum::Null])),
        ]);
        let bytes = d.encode().unwrap();
        let decoded = Document::decode(&bytes).unwrap();
        assert_eq!(d, decoded);
    }

    #[test]
    fn equal_documents_encode_to_equal_bytes() {
        let a = doc(vec![("x", Datum::Int(1)), ("y", Datum::Int(2))]);
        let b = doc(vec![("y", Datum::Int(2)), ("x", Datum::Int(1))]);
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
    }

    #[test]
    fn key_bytes_are_deterministic() {
        let k1 = Datum::encode_key(&[Datum::Int(1), Datum::Text("a".into())]).unwrap();
        let k2 = Datum::encode_key(&[Datum::Int(1), Datum::Text("a".into())]).unwrap();
        let k3 = Datum::encode_key(&[Datum::Int(2), Datum::Text("a".into())]).unwrap();
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn decode_garbage_fails() {
        assert!(Document::decode(&[0xff, 0x00, 0x13]).is_err());
    }
}
