use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::Regex;

use crate::compare::{compare_values, type_rank, values_equal};
use crate::path::get_path_values;

/// A recursive filter expression tree.
///
/// Owns field names and values so the expression can outlive the filter
/// document it was parsed from.
#[derive(Debug, Clone)]
pub enum Expression {
    // Logical
    And(Vec<Expression>),
    Or(Vec<Expression>),
    // Comparison
    Eq(String, Bson),
    Ne(String, Bson),
    Gt(String, Bson),
    Gte(String, Bson),
    Lt(String, Bson),
    Lte(String, Bson),
    // Membership
    In(String, Vec<Bson>),
    Nin(String, Vec<Bson>),
    // Pattern
    Regex(String, Regex),
    // Existence
    Exists(String, bool),
}

impl Expression {
    /// An expression that matches every document.
    pub fn always() -> Self {
        Expression::And(Vec::new())
    }

    /// Evaluate whether a document matches this expression.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Expression::And(children) => children.iter().all(|c| c.matches(doc)),
            Expression::Or(children) => children.iter().any(|c| c.matches(doc)),
            Expression::Eq(field, val) => field_eq(doc, field, val),
            Expression::Ne(field, val) => !field_eq(doc, field, val),
            Expression::In(field, vals) => vals.iter().any(|v| field_eq(doc, field, v)),
            Expression::Nin(field, vals) => !vals.iter().any(|v| field_eq(doc, field, v)),
            Expression::Gt(field, val) => field_cmp(doc, field, val, |o| o == Ordering::Greater),
            Expression::Gte(field, val) => field_cmp(doc, field, val, |o| o != Ordering::Less),
            Expression::Lt(field, val) => field_cmp(doc, field, val, |o| o == Ordering::Less),
            Expression::Lte(field, val) => field_cmp(doc, field, val, |o| o != Ordering::Greater),
            Expression::Regex(field, re) => get_path_values(doc, field)
                .into_iter()
                .any(|v| matches!(v, Bson::String(s) if re.is_match(s))),
            // $exists checks physical presence; a null value still exists
            Expression::Exists(field, expected) => {
                !get_path_values(doc, field).is_empty() == *expected
            }
        }
    }
}

/// `$eq: null` matches both missing fields and explicit nulls.
fn field_eq(doc: &Document, field: &str, val: &Bson) -> bool {
    let values = get_path_values(doc, field);
    if matches!(val, Bson::Null) {
        return values.is_empty() || values.iter().any(|v| matches!(v, Bson::Null));
    }
    values.into_iter().any(|v| values_equal(v, val))
}

/// Range comparisons only match values of the same canonical type.
fn field_cmp(doc: &Document, field: &str, val: &Bson, predicate: fn(Ordering) -> bool) -> bool {
    let rank = type_rank(Some(val));
    get_path_values(doc, field)
        .into_iter()
        .filter(|v| type_rank(Some(*v)) == rank)
        .any(|v| predicate(compare_values(Some(v), Some(val))))
}
