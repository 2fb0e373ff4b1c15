//! Order-sensitive comparison of result sets.

use crate::model::Row;
use serde_json::Value;

/// First difference between two result sets.
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    RowCount { actual: usize, expected: usize },
    Row { index: usize, actual: Row, expected: Row },
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mismatch::RowCount { actual, expected } => {
                write!(f, "expected {} rows, got {}", expected, actual)
            }
            Mismatch::Row {
                index,
                actual,
                expected,
            } => write!(
                f,
                "row {} differs: expected {}, got {}",
                index + 1,
                Value::Object(expected.clone()),
                Value::Object(actual.clone())
            ),
        }
    }
}

pub fn compare(actual: &[Row], expected: &[Row]) -> bool {
    diff(actual, expected).is_none()
}

pub fn diff(actual: &[Row], expected: &[Row]) -> Option<Mismatch> {
    if actual.len() != expected.len() {
        return Some(Mismatch::RowCount {
            actual: actual.len(),
            expected: expected.len(),
        });
    }
    actual
        .iter()
        .zip(expected)
        .position(|(a, e)| !rows_equal(a, e))
        .map(|index| Mismatch::Row {
            index,
            actual: actual[index].clone(),
            expected: expected[index].clone(),
        })
}

fn rows_equal(a: &Row, e: &Row) -> bool {
    a.len() == e.len()
        && a
            .iter()
            .all(|(k, v)| e.get(k).is_some_and(|ev| values_equal(v, ev)))
}

/// Numbers compare by value so `1` and `1.0` agree; everything else
/// structurally.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => x == y,
            },
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => rows_equal(x, y),
        _ => a == b,
    }
}
