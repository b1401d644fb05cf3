//! Query clause types (WHERE, ORDER BY, LIMIT, OFFSET).
//!
//! Clauses are plain data handed to a [`Backend`](crate::Backend); the
//! in-memory backend evaluates them directly against rows.

use postfetch_core::{Row, Value};
use std::cmp::Ordering;

/// A single filter condition on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    column: String,
    op: FilterOp,
}

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// `column = value`
    Eq(Value),
    /// `column IN (values...)`
    In(Vec<Value>),
}

impl Filter {
    /// `column = value`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq(value.into()),
        }
    }

    /// `column IN (values...)`.
    pub fn is_in(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::In(values),
        }
    }

    /// The filtered column.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// The comparison.
    pub fn op(&self) -> &FilterOp {
        &self.op
    }

    /// Evaluate against a row. A missing column or NULL never matches.
    pub fn matches(&self, row: &Row) -> bool {
        let Some(value) = row.get_by_name(&self.column) else {
            return false;
        };
        match &self.op {
            FilterOp::Eq(expected) => value.key_eq(expected),
            FilterOp::In(candidates) => candidates.iter().any(|c| value.key_eq(c)),
        }
    }
}

/// ORDER BY clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    column: String,
    direction: OrderDirection,
    nulls: Option<NullsOrder>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// NULLS FIRST/LAST ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

impl OrderBy {
    /// Create an ascending order by clause.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Asc,
            nulls: None,
        }
    }

    /// Create a descending order by clause.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Desc,
            nulls: None,
        }
    }

    /// Set NULLS FIRST.
    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    /// Set NULLS LAST.
    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// The ordered column.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// The sort direction.
    pub fn direction(&self) -> OrderDirection {
        self.direction
    }

    /// The reversed ordering, used by `last()`.
    pub fn reversed(&self) -> Self {
        Self {
            column: self.column.clone(),
            direction: match self.direction {
                OrderDirection::Asc => OrderDirection::Desc,
                OrderDirection::Desc => OrderDirection::Asc,
            },
            nulls: self.nulls.map(|n| match n {
                NullsOrder::First => NullsOrder::Last,
                NullsOrder::Last => NullsOrder::First,
            }),
        }
    }

    /// Compare two rows by this clause.
    ///
    /// Without an explicit NULLS clause, NULL sorts first ascending and last
    /// descending.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let left = a.get_by_name(&self.column).unwrap_or(&Value::Null);
        let right = b.get_by_name(&self.column).unwrap_or(&Value::Null);
        match (left.is_null(), right.is_null(), self.nulls) {
            (true, true, _) => Ordering::Equal,
            (true, false, Some(NullsOrder::First)) | (false, true, Some(NullsOrder::Last)) => {
                Ordering::Less
            }
            (true, false, Some(NullsOrder::Last)) | (false, true, Some(NullsOrder::First)) => {
                Ordering::Greater
            }
            _ => {
                let ord = compare_values(left, right);
                match self.direction {
                    OrderDirection::Asc => ord,
                    OrderDirection::Desc => ord.reverse(),
                }
            }
        }
    }
}

/// Total order over values for in-memory sorting.
///
/// NULL sorts before everything; numbers compare numerically across widths;
/// otherwise values of different kinds order by kind.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => kind_rank(a).cmp(&kind_rank(b)),
        },
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::BigInt(_) | Value::Double(_) => 2,
        Value::Text(_) => 3,
        Value::Bytes(_) => 4,
        Value::Json(_) => 5,
    }
}

/// LIMIT clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(pub u64);

/// OFFSET clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset(pub u64);
