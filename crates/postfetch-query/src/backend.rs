//! The storage seam: what a query asks of the backend that runs it.

use crate::clause::{Filter, Limit, Offset, OrderBy};
use postfetch_core::{FieldInfo, JoinPlan, Model, RelationshipInfo, Result, Row, Value};

/// One SELECT, described as data.
///
/// With an empty `projection` the backend returns the model's own columns in
/// field order followed by the joined columns of `join_plan`, named
/// `{relation}__{column}` (nested: `{relation}__{nested}__{column}`). With a
/// non-empty projection it returns exactly those columns, in that order, and
/// joins nothing.
#[derive(Debug, Clone)]
pub struct SelectRequest {
    /// Table to read.
    pub table: &'static str,
    /// The queried model's fields.
    pub fields: &'static [FieldInfo],
    /// The queried model's relationships, used to resolve `join_plan`.
    pub relationships: &'static [RelationshipInfo],
    /// Conditions on the model's own columns, ANDed together.
    pub filters: Vec<Filter>,
    /// Sort keys, most significant first.
    pub order_by: Vec<OrderBy>,
    /// Rows to skip.
    pub offset: Option<Offset>,
    /// Maximum rows to return.
    pub limit: Option<Limit>,
    /// Columns to return instead of full rows.
    pub projection: Vec<String>,
    /// Relations to join.
    pub join_plan: JoinPlan,
}

impl SelectRequest {
    /// A request for every row of `M`'s table.
    pub fn for_model<M: Model>() -> Self {
        Self {
            table: M::TABLE_NAME,
            fields: M::fields(),
            relationships: M::RELATIONSHIPS,
            filters: Vec::new(),
            order_by: Vec::new(),
            offset: None,
            limit: None,
            projection: Vec::new(),
            join_plan: JoinPlan::new(),
        }
    }
}

/// A store that can run selects and inserts.
///
/// Implementations perform their own I/O synchronously; nothing here is
/// cached, so every `select` call is one query.
pub trait Backend {
    /// Run a select and return raw rows in result order.
    fn select(&self, request: &SelectRequest) -> Result<Vec<Row>>;

    /// Insert one row and return its primary key value.
    ///
    /// A NULL `primary_key` column is replaced by a generated integer key.
    fn insert(
        &self,
        table: &'static str,
        primary_key: &'static str,
        values: Vec<(&'static str, Value)>,
    ) -> Result<Value>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn select(&self, request: &SelectRequest) -> Result<Vec<Row>> {
        (**self).select(request)
    }

    fn insert(
        &self,
        table: &'static str,
        primary_key: &'static str,
        values: Vec<(&'static str, Value)>,
    ) -> Result<Value> {
        (**self).insert(table, primary_key, values)
    }
}
