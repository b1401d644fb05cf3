//! Post-fetch hooks and the four result shapes they apply to.

use crate::error::{Error, RowShapeError};
use crate::{Model, Result, Value};
use indexmap::IndexMap;

/// A projected row keyed by field name, in projection order.
pub type ValueMap = IndexMap<String, Value>;

/// Transformations a model applies to its own query results.
///
/// Every hook runs exactly once per row, after the row is materialized and
/// before the result is cached. Undeclared hooks pass the data through.
/// A hook that fails aborts the whole fetch; nothing is cached.
pub trait PostFetch: Model {
    /// Called with each fully materialized entity; the returned entity
    /// replaces it.
    fn post_fetch_hook(model: Self) -> Result<Self> {
        Ok(model)
    }

    /// Called with each mapping row of a `values(...)` query, together with
    /// the projection's field names in order.
    #[allow(unused_variables)]
    fn post_fetch_values_hook(values: ValueMap, fields: &[String]) -> Result<ValueMap> {
        Ok(values)
    }

    /// Called with each tuple row of a `values_list(...)` query.
    #[allow(unused_variables)]
    fn post_fetch_values_list_hook(values: Vec<Value>, fields: &[String]) -> Result<Vec<Value>> {
        Ok(values)
    }

    /// Called with each scalar of a flat `values_list(...)` query.
    #[allow(unused_variables)]
    fn post_fetch_values_list_flat_hook(value: Value, field: &str) -> Result<Value> {
        Ok(value)
    }
}

/// One row of a query result, in one of the four shapes.
///
/// A result set never mixes shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<M> {
    /// A full entity.
    Model(M),
    /// Field name to value.
    Values(ValueMap),
    /// Values in projection order.
    ValuesList(Vec<Value>),
    /// A single scalar.
    Flat(Value),
}

impl<M> Fetched<M> {
    /// Short name of the shape, used in logs and errors.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Fetched::Model(_) => "entity",
            Fetched::Values(_) => "values",
            Fetched::ValuesList(_) => "values_list",
            Fetched::Flat(_) => "flat",
        }
    }

    /// Borrow the entity, if this is an entity row.
    pub fn as_model(&self) -> Option<&M> {
        match self {
            Fetched::Model(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow the mapping, if this is a mapping row.
    pub fn as_values(&self) -> Option<&ValueMap> {
        match self {
            Fetched::Values(v) => Some(v),
            _ => None,
        }
    }
}

impl<M: Model> Fetched<M> {
    /// Take the entity out, failing on any other shape.
    pub fn into_model(self) -> Result<M> {
        match self {
            Fetched::Model(m) => Ok(m),
            other => Err(shape_error::<M>("entity", other.shape_name())),
        }
    }

    /// Take the mapping out, failing on any other shape.
    pub fn into_values(self) -> Result<ValueMap> {
        match self {
            Fetched::Values(v) => Ok(v),
            other => Err(shape_error::<M>("values", other.shape_name())),
        }
    }

    /// Take the tuple out, failing on any other shape.
    pub fn into_values_list(self) -> Result<Vec<Value>> {
        match self {
            Fetched::ValuesList(v) => Ok(v),
            other => Err(shape_error::<M>("values_list", other.shape_name())),
        }
    }

    /// Take the scalar out, failing on any other shape.
    pub fn into_flat(self) -> Result<Value> {
        match self {
            Fetched::Flat(v) => Ok(v),
            other => Err(shape_error::<M>("flat", other.shape_name())),
        }
    }
}

fn shape_error<M: Model>(expected: &'static str, actual: &str) -> Error {
    Error::UnsupportedRowShape(RowShapeError {
        table: M::TABLE_NAME,
        expected,
        actual: format!("{actual} row"),
    })
}
