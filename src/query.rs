//! Filter, sort and pagination options understood by a [`DocumentStore`].
//!
//! Matching follows the usual document-store conventions: when the field of
//! a document holds an array, `Eq`, `In` and `Regex` match if any element
//! matches. Numbers compare numerically and strings lexicographically; values
//! of different kinds never satisfy a range.
//!
//! [`DocumentStore`]: crate::store::DocumentStore

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

use crate::Document;

#[derive(Debug, Clone)]
pub enum Filter {
    /// Matches every document.
    All,
    Eq(String, Value),
    In(String, Vec<Value>),
    Range {
        field: String,
        gte: Option<Value>,
        lte: Option<Value>,
    },
    Regex(String, Regex),
    Exists(String),
    Missing(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Filter::In(field.into(), values)
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Filter::Exists(field.into())
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Filter::Missing(field.into())
    }

    /// Conjunction of `self` and `other`, flattening nested `And`s.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), f) => {
                a.push(f);
                Filter::And(a)
            }
            (f, Filter::And(mut b)) => {
                b.insert(0, f);
                Filter::And(b)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, expected) => {
                doc.get(field).is_some_and(|v| any_element(v, |e| same_value(e, expected)))
            }
            Filter::In(field, candidates) => doc
                .get(field)
                .is_some_and(|v| any_element(v, |e| candidates.iter().any(|c| same_value(e, c)))),
            Filter::Range { field, gte, lte } => doc.get(field).is_some_and(|v| {
                let above = gte
                    .as_ref()
                    .map_or(true, |lo| compare(v, lo).is_some_and(|o| o != Ordering::Less));
                let below = lte
                    .as_ref()
                    .map_or(true, |hi| compare(v, hi).is_some_and(|o| o != Ordering::Greater));
                above && below
            }),
            Filter::Regex(field, re) => doc.get(field).is_some_and(|v| {
                any_element(v, |e| match e {
                    Value::String(s) => re.is_match(s),
                    _ => false,
                })
            }),
            Filter::Exists(field) => doc.get(field).is_some_and(|v| !v.is_null()),
            Filter::Missing(field) => doc.get(field).map_or(true, Value::is_null),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

fn any_element(value: &Value, pred: impl Fn(&Value) -> bool) -> bool {
    match value {
        Value::Array(items) => pred(value) || items.iter().any(&pred),
        other => pred(other),
    }
}

/// Equality that treats `1000` and `1000.0` as the same number.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Orders two values of the same kind. `None` when they are not comparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Documents missing the field sort last regardless of direction.
    pub fn cmp(&self, a: &Document, b: &Document) -> Ordering {
        match (a.get(&self.field), b.get(&self.field)) {
            (Some(x), Some(y)) => match compare(x, y) {
                Some(o) if self.descending => o.reverse(),
                Some(o) => o,
                None => Ordering::Equal,
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Options for [`DocumentStore::find`](crate::store::DocumentStore::find).
///
/// Applied in order: filter, sort, skip, limit.
#[derive(Debug, Clone)]
pub struct FindOptions {
    pub filter: Filter,
    pub sort: Option<Sort>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            filter: Filter::All,
            sort: None,
            skip: 0,
            limit: None,
        }
    }
}

impl FindOptions {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Runs the options over documents given in insertion order.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut matched: Vec<Document> =
            docs.into_iter().filter(|d| self.filter.matches(d)).collect();
        if let Some(sort) = &self.sort {
            // stable: ties keep insertion order
            matched.sort_by(|a, b| sort.cmp(a, b));
        }
        let skipped = matched.into_iter().skip(self.skip as usize);
        match self.limit {
            Some(limit) => skipped.take(limit as usize).collect(),
            None => skipped.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn eq_matches_array_elements() {
        let item = doc(json!({"tags": ["TAG1", "TAG2"]}));
        assert!(Filter::eq("tags", "TAG2").matches(&item));
        assert!(!Filter::eq("tags", "TAG3").matches(&item));
        assert!(Filter::is_in("tags", vec![json!("X"), json!("TAG1")]).matches(&item));
    }

    #[test]
    fn range_is_inclusive_and_kind_sensitive() {
        let ev = doc(json!({"event_timestamp": 20}));
        let range = |gte: Option<Value>, lte: Option<Value>| Filter::Range {
            field: "event_timestamp".into(),
            gte,
            lte,
        };
        assert!(range(Some(json!(20)), Some(json!(20))).matches(&ev));
        assert!(range(Some(json!(10)), None).matches(&ev));
        assert!(!range(None, Some(json!(19.5))).matches(&ev));
        assert!(!range(Some(json!("10")), None).matches(&ev));
    }

    #[test]
    fn missing_treats_null_as_absent() {
        assert!(Filter::missing("__deleted").matches(&doc(json!({"a": 1}))));
        assert!(Filter::missing("__deleted").matches(&doc(json!({"__deleted": null}))));
        assert!(!Filter::missing("__deleted").matches(&doc(json!({"__deleted": true}))));
    }

    #[test]
    fn and_flattens() {
        let f = Filter::All
            .and(Filter::exists("a"))
            .and(Filter::exists("b"));
        match f {
            Filter::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn apply_sorts_before_paginating() {
        let docs = [10, 30, 20].map(|ts| doc(json!({"event_timestamp": ts})));
        let opts = FindOptions::default()
            .sort(Sort::descending("event_timestamp"))
            .skip(1)
            .limit(1);
        let out = opts.apply(docs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["event_timestamp"], json!(20));
    }
}
