//! Filter evaluation and ordering for in-memory documents.
//!
//! Filters are store-native documents: `{field: value}` pairs are equalities and
//! `{field: {$op: value}}` pairs apply an operator. Field names may be dotted paths into
//! embedded documents. A field holding an array matches a value when any element does.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docmodel_core::{
    error::{ModelError, ModelResult},
    query::{SortDirection, SortSpec},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Number(f64),
    String(&'a str),
    Map(HashMap<&'a str, Comparable<'a>>),
    Array(Vec<Comparable<'a>>),
    ObjectId(ObjectId),
    Bool(bool),
    DateTime(DateTime),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the store's cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Total order used for sorting: values of different types order by type.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => match (self, other) {
                (Comparable::Array(a), Comparable::Array(b)) => a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| x.sort_cmp(y))
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or_else(|| a.len().cmp(&b.len())),
                _ => self.partial_cmp(other).unwrap_or(Ordering::Equal),
            },
            ordering => ordering,
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
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path such as `address.city` or `tags.0` inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(doc) => doc.get(segment)?,
            Bson::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Whether the document satisfies every clause of `filter`. An empty filter matches.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Backend`] for an unknown operator or a malformed clause.
    pub fn evaluate(&self, filter: &Document) -> ModelResult<bool> {
        for (key, value) in filter {
            let matched = match key.as_str() {
                "$and" => self.all(clauses(key, value)?)?,
                "$or" => self.any(clauses(key, value)?)?,
                "$nor" => !self.any(clauses(key, value)?)?,
                op if op.starts_with('$') => return Err(unsupported(op)),
                path => self.evaluate_field(path, value)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> ModelResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn all(&self, filters: Vec<&Document>) -> ModelResult<bool> {
        for filter in filters {
            if !self.evaluate(filter)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any(&self, filters: Vec<&Document>) -> ModelResult<bool> {
        for filter in filters {
            if self.evaluate(filter)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn evaluate_field(&self, path: &str, condition: &Bson) -> ModelResult<bool> {
        let field_value = lookup(self.document, path);

        match condition {
            Bson::Document(ops) if is_operator_document(ops) => {
                for (op, operand) in ops {
                    if !apply_operator(field_value, op, operand)? {
                        return Ok(false);
                    }
                }

                Ok(true)
            }
            value => Ok(equals(field_value, value)),
        }
    }
}

fn is_operator_document(document: &Document) -> bool {
    document
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

fn clauses<'f>(op: &str, value: &'f Bson) -> ModelResult<Vec<&'f Document>> {
    let Bson::Array(items) = value else {
        return Err(ModelError::Backend(format!("{op} expects an array")));
    };

    items
        .iter()
        .map(|item| match item {
            Bson::Document(doc) => Ok(doc),
            _ => Err(ModelError::Backend(format!("{op} expects an array of documents"))),
        })
        .collect()
}

fn unsupported(op: &str) -> ModelError {
    ModelError::Backend(format!("unsupported operator {op}"))
}

/// Equality as the store defines it: a missing field equals `null`, and an array field equals
/// a value when the whole array or any of its elements equals it.
fn equals(field_value: Option<&Bson>, value: &Bson) -> bool {
    let expected = Comparable::from(value);

    match field_value {
        None => expected == Comparable::Null,
        Some(actual) => {
            let actual = Comparable::from(actual);
            if actual == expected {
                return true;
            }

            match actual {
                Comparable::Array(items) => items.iter().any(|item| item == &expected),
                _ => false,
            }
        }
    }
}

fn compare(field_value: Option<&Bson>, operand: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let Some(actual) = field_value else {
        return false;
    };
    let expected = Comparable::from(operand);

    match Comparable::from(actual) {
        Comparable::Array(items) => items
            .iter()
            .filter_map(|item| item.partial_cmp(&expected))
            .any(accept),
        actual => actual
            .partial_cmp(&expected)
            .is_some_and(accept),
    }
}

fn apply_operator(field_value: Option<&Bson>, op: &str, operand: &Bson) -> ModelResult<bool> {
    Ok(match op {
        "$eq" => equals(field_value, operand),
        "$ne" => !equals(field_value, operand),
        "$gt" => compare(field_value, operand, Ordering::is_gt),
        "$gte" => compare(field_value, operand, Ordering::is_ge),
        "$lt" => compare(field_value, operand, Ordering::is_lt),
        "$lte" => compare(field_value, operand, Ordering::is_le),
        "$in" | "$nin" => {
            let Bson::Array(candidates) = operand else {
                return Err(ModelError::Backend(format!("{op} expects an array")));
            };
            let found = candidates
                .iter()
                .any(|candidate| equals(field_value, candidate));

            if op == "$in" { found } else { !found }
        }
        "$exists" => {
            let should_exist = match operand {
                Bson::Boolean(value) => *value,
                Bson::Int32(value) => *value != 0,
                Bson::Int64(value) => *value != 0,
                _ => true,
            };

            field_value.is_some() == should_exist
        }
        other => return Err(unsupported(other)),
    })
}

/// Orders two documents by a sort specification. Missing fields sort as `null`.
pub(crate) fn compare_documents(a: &Document, b: &Document, sort: &SortSpec) -> Ordering {
    static NULL: Bson = Bson::Null;

    for key in sort.iter() {
        let left = Comparable::from(lookup(a, &key.field).unwrap_or(&NULL));
        let right = Comparable::from(lookup(b, &key.field).unwrap_or(&NULL));

        let ordering = match key.direction {
            SortDirection::Asc => left.sort_cmp(&right),
            SortDirection::Desc => right.sort_cmp(&left),
        };

        if ordering.is_ne() {
            return ordering;
        }
    }

    Ordering::Equal
}

/// Reads a `{field: 1 | -1}` document into a sort specification.
pub(crate) fn sort_spec(keys: &Document) -> ModelResult<SortSpec> {
    let mut sort = SortSpec::new();

    for (field, direction) in keys {
        let direction = match direction {
            Bson::Int32(1) | Bson::Int64(1) => SortDirection::Asc,
            Bson::Int32(-1) | Bson::Int64(-1) => SortDirection::Desc,
            Bson::Double(d) if *d == 1.0 => SortDirection::Asc,
            Bson::Double(d) if *d == -1.0 => SortDirection::Desc,
            other => {
                return Err(ModelError::Backend(format!(
                    "invalid sort direction {other} for {field}"
                )));
            }
        };
        sort.push(field.as_str(), direction);
    }

    Ok(sort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(document: &Document, filter: Document) -> bool {
        DocumentEvaluator::new(document).evaluate(&filter).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(matches(&doc! { "name": "Ann" }, doc! {}));
        assert!(matches(&doc! {}, doc! {}));
    }

    #[test]
    fn test_equality_conjunction() {
        let ann = doc! { "name": "Ann", "age": 30 };

        assert!(matches(&ann, doc! { "name": "Ann", "age": 30 }));
        assert!(matches(&ann, doc! { "age": 30.0 }));
        assert!(!matches(&ann, doc! { "name": "Ann", "age": 31 }));
        assert!(!matches(&ann, doc! { "city": "Oslo" }));
    }

    #[test]
    fn test_missing_field_equals_null() {
        let ann = doc! { "name": "Ann" };

        assert!(matches(&ann, doc! { "city": Bson::Null }));
        assert!(!matches(&ann, doc! { "name": Bson::Null }));
    }

    #[test]
    fn test_dotted_paths() {
        let ann = doc! { "address": { "city": "Oslo", "zip": "0150" }, "tags": ["a", "b"] };

        assert!(matches(&ann, doc! { "address.city": "Oslo" }));
        assert!(!matches(&ann, doc! { "address.city": "Bergen" }));
        assert!(matches(&ann, doc! { "tags.1": "b" }));
    }

    #[test]
    fn test_array_membership() {
        let ann = doc! { "tags": ["red", "blue"] };

        assert!(matches(&ann, doc! { "tags": "blue" }));
        assert!(matches(&ann, doc! { "tags": ["red", "blue"] }));
        assert!(!matches(&ann, doc! { "tags": "green" }));
    }

    #[test]
    fn test_comparison_operators() {
        let ann = doc! { "age": 30, "scores": [3, 9] };

        assert!(matches(&ann, doc! { "age": { "$gt": 18 } }));
        assert!(matches(&ann, doc! { "age": { "$gte": 30, "$lt": 31 } }));
        assert!(!matches(&ann, doc! { "age": { "$lte": 29 } }));
        assert!(!matches(&ann, doc! { "age": { "$gt": "20" } }));
        assert!(matches(&ann, doc! { "scores": { "$gt": 8 } }));
        assert!(!matches(&ann, doc! { "missing": { "$lt": 100 } }));
    }

    #[test]
    fn test_set_and_existence_operators() {
        let ann = doc! { "name": "Ann", "age": 30 };

        assert!(matches(&ann, doc! { "name": { "$in": ["Bob", "Ann"] } }));
        assert!(matches(&ann, doc! { "name": { "$nin": ["Bob"] } }));
        assert!(matches(&ann, doc! { "name": { "$ne": "Bob" } }));
        assert!(matches(&ann, doc! { "city": { "$exists": false } }));
        assert!(!matches(&ann, doc! { "age": { "$exists": false } }));
    }

    #[test]
    fn test_logical_operators() {
        let ann = doc! { "name": "Ann", "age": 30 };

        assert!(matches(&ann, doc! { "$or": [{ "name": "Bob" }, { "age": 30 }] }));
        assert!(!matches(&ann, doc! { "$and": [{ "name": "Ann" }, { "age": 31 }] }));
        assert!(matches(&ann, doc! { "$nor": [{ "name": "Bob" }] }));
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        let ann = doc! { "name": "Ann" };

        assert!(DocumentEvaluator::new(&ann).evaluate(&doc! { "name": { "$regex": "A" } }).is_err());
        assert!(DocumentEvaluator::new(&ann).evaluate(&doc! { "$where": "true" }).is_err());
    }

    #[test]
    fn test_compare_documents_multi_key() {
        let mut sort = SortSpec::new();
        sort.push("age", SortDirection::Desc);
        sort.push("name", SortDirection::Asc);

        let mut people = vec![
            doc! { "name": "Cid", "age": 30 },
            doc! { "name": "Ann", "age": 30 },
            doc! { "name": "Bob", "age": 40 },
            doc! { "name": "Dan" },
        ];
        people.sort_by(|a, b| compare_documents(a, b, &sort));

        let names = people
            .iter()
            .map(|d| d.get_str("name").unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Bob", "Ann", "Cid", "Dan"]);
    }

    #[test]
    fn test_cross_type_order() {
        let null = Bson::Null;
        let number = Bson::Int32(5);
        let string = Bson::String("a".to_string());

        assert_eq!(Comparable::from(&null).sort_cmp(&Comparable::from(&number)), Ordering::Less);
        assert_eq!(Comparable::from(&string).sort_cmp(&Comparable::from(&number)), Ordering::Greater);
    }

    #[test]
    fn test_sort_spec_from_document() {
        let sort = sort_spec(&doc! { "age": -1, "name": 1 }).unwrap();
        assert_eq!(sort.get("age"), Some(SortDirection::Desc));
        assert_eq!(sort.get("name"), Some(SortDirection::Asc));

        assert!(sort_spec(&doc! { "age": 2 }).is_err());
    }
}
