//! Equality matching of opaque filters against documents.

use std::collections::HashMap;

use bson::{Bson, DateTime, Document, oid::ObjectId};

/// Type-erased, comparable view of BSON values.
///
/// Wraps BSON values for filter evaluation, normalizing all numeric widths
/// to f64 so an `Int32` document value matches an `Int64` filter value.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// Identity value
    ObjectId(ObjectId),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(f64::from(*value)),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(array) => {
                Comparable::Array(array.iter().map(Comparable::from).collect())
            }
            Bson::Document(document) => Comparable::Map(
                document
                    .iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
            _ => Comparable::Null, // other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

/// True when every key in `filter` exists in `document` with an equal value.
/// An empty filter matches every document.
pub fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| {
        document
            .get(key)
            .is_some_and(|actual| Comparable::from(actual) == Comparable::from(expected))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches(&doc! { "name": "John" }, &doc! {}));
    }

    #[test]
    fn equality_over_all_pairs() {
        let document = doc! { "name": "John", "age": 41 };
        assert!(matches(&document, &doc! { "name": "John" }));
        assert!(matches(&document, &doc! { "name": "John", "age": 41 }));
        assert!(!matches(&document, &doc! { "name": "Jane" }));
        assert!(!matches(&document, &doc! { "missing": 1 }));
    }

    #[test]
    fn numeric_widths_are_normalized() {
        let document = doc! { "age": Bson::Int32(41) };
        assert!(matches(&document, &doc! { "age": Bson::Int64(41) }));
        assert!(matches(&document, &doc! { "age": Bson::Double(41.0) }));
    }

    #[test]
    fn identities_compare_by_value() {
        let id = ObjectId::new();
        let document = doc! { "_id": id };
        assert!(matches(&document, &doc! { "_id": id }));
        assert!(!matches(&document, &doc! { "_id": ObjectId::new() }));
    }
}
