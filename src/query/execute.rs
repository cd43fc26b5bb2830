//! In-memory query execution: filter, then stable multi-key sort.

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::QueryError;

use super::operators::{compare_values, get_field_value, matches_filter};
use super::types::{Query, SortDirection, SortEntry};

/// Compare two rows by a cascading sort specification.
pub fn compare_rows(a: &Value, b: &Value, sort: &[SortEntry]) -> Ordering {
    for entry in sort {
        let va = get_field_value(a, &entry.field).unwrap_or(&Value::Null);
        let vb = get_field_value(b, &entry.field).unwrap_or(&Value::Null);
        let cmp = match entry.direction {
            SortDirection::Asc => compare_values(va, vb),
            SortDirection::Desc => compare_values(va, vb).reverse(),
        };
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}

/// Stable sort; rows with equal keys keep their relative order.
pub fn sort_rows(rows: &mut [Value], sort: &[SortEntry]) {
    if !sort.is_empty() {
        rows.sort_by(|a, b| compare_rows(a, b, sort));
    }
}

/// Filter and sort `rows` according to `query`.
pub fn execute_query(rows: Vec<Value>, query: &Query) -> Result<Vec<Value>, QueryError> {
    let mut matched = match &query.filter {
        Some(filter) => {
            let mut kept = Vec::with_capacity(rows.len());
            for row in rows {
                if matches_filter(&row, filter)? {
                    kept.push(row);
                }
            }
            kept
        }
        None => rows,
    };
    sort_rows(&mut matched, &query.sort_entries());
    Ok(matched)
}
