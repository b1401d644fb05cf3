//! Lazily evaluated queries with a result cache.

use crate::backend::{Backend, SelectRequest};
use crate::clause::{Filter, Limit, Offset, OrderBy};
use crate::config::QueryConfig;
use crate::database::Database;
use crate::eager::SelectRelated;
use crate::interceptor::{QueryExecutor, RawRow, ResultInterceptor, ResultShape};
use crate::prefetch::{Prefetch, PrefetchLookup, prefetch_related_objects};
use postfetch_core::field::column_names;
use postfetch_core::{
    Error, Fetched, JoinPlan, QueryErrorKind, Result, RowShapeError, Value, ValueMap,
    hydrate_joined,
};
use std::fmt;

/// Upper bound on rows fetched by `get()` to tell "one" from "several".
const MAX_GET_RESULTS: u64 = 21;

/// A query on `M`, evaluated on first use and cached afterwards.
///
/// Builder methods consume the query and discard any cached result, so a
/// cached result always belongs to the query as it was configured.
///
/// # Example
///
/// ```ignore
/// let mut objects = db
///     .query::<Object>()
///     .select_related(["thing"])
///     .prefetch_related(["parents"]);
///
/// for object in objects.models()? {
///     // `object.thing` and `object.parents` are loaded and transformed
/// }
/// ```
pub struct QuerySet<'db, M: Prefetch, B: Backend> {
    db: &'db Database<B>,
    filters: Vec<Filter>,
    order_by: Vec<OrderBy>,
    offset: Option<Offset>,
    limit: Option<Limit>,
    select_related: SelectRelated,
    prefetch: Vec<PrefetchLookup>,
    prefetch_done: bool,
    shape: ResultShape,
    projection: Vec<String>,
    result_cache: Option<Vec<Fetched<M>>>,
}

impl<'db, M: Prefetch, B: Backend> QuerySet<'db, M, B> {
    /// A query for every row of `M`.
    pub fn new(db: &'db Database<B>) -> Self {
        Self {
            db,
            filters: Vec::new(),
            order_by: Vec::new(),
            offset: None,
            limit: None,
            select_related: SelectRelated::None,
            prefetch: Vec::new(),
            prefetch_done: false,
            shape: ResultShape::Models,
            projection: Vec::new(),
            result_cache: None,
        }
    }

    fn reconfigured(mut self) -> Self {
        self.result_cache = None;
        self.prefetch_done = false;
        self
    }

    /// Add a filter condition.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self.reconfigured()
    }

    /// Add `column = value`.
    #[must_use]
    pub fn filter_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    /// Add `column IN (values...)`.
    #[must_use]
    pub fn filter_in(self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.filter(Filter::is_in(column, values))
    }

    /// Add a sort key.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self.reconfigured()
    }

    /// Return at most `n` rows.
    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(Limit(n));
        self.reconfigured()
    }

    /// Skip the first `n` rows.
    #[must_use]
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(Offset(n));
        self.reconfigured()
    }

    /// Eagerly join these relation paths (`"obj"`, `"obj.thing"`).
    #[must_use]
    pub fn select_related<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_related = std::mem::take(&mut self.select_related).with_paths(paths);
        self.reconfigured()
    }

    /// Eagerly join every single-valued relation, one level deep.
    #[must_use]
    pub fn select_related_all(mut self) -> Self {
        self.select_related = SelectRelated::All;
        self.reconfigured()
    }

    /// Batch-prefetch these collection paths (`"objs"`, `"objs.parents"`)
    /// after the query is cached.
    #[must_use]
    pub fn prefetch_related<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.prefetch_lookups(PrefetchLookup::from_paths(paths))
    }

    /// Batch-prefetch already parsed lookups.
    #[must_use]
    pub fn prefetch_lookups(mut self, lookups: Vec<PrefetchLookup>) -> Self {
        self.prefetch.extend(lookups);
        self.reconfigured()
    }

    /// Return mappings of field name to value. No fields means every column.
    #[must_use]
    pub fn values(self, fields: &[&str]) -> Self {
        self.projected(ResultShape::Values, fields)
    }

    /// Return value tuples in field order. No fields means every column.
    #[must_use]
    pub fn values_list(self, fields: &[&str]) -> Self {
        self.projected(ResultShape::ValuesList, fields)
    }

    /// Return the single field's value per row.
    #[must_use]
    pub fn values_list_flat(self, field: &str) -> Self {
        self.projected(ResultShape::Flat, &[field])
    }

    fn projected(mut self, shape: ResultShape, fields: &[&str]) -> Self {
        self.shape = shape;
        self.projection = fields.iter().map(|f| (*f).to_string()).collect();
        self.reconfigured()
    }

    /// Evaluate the query (once) and borrow the transformed rows.
    pub fn fetch_all(&mut self) -> Result<&[Fetched<M>]> {
        ResultInterceptor::fetch_and_transform(self)
    }

    /// Evaluate the query and borrow the entities.
    pub fn models(&mut self) -> Result<Vec<&M>> {
        let shape = self.shape;
        self.fetch_all()?
            .iter()
            .map(|row| {
                row.as_model()
                    .ok_or_else(|| shape_mismatch::<M>("entity", shape.name()))
            })
            .collect()
    }

    /// Iterate over the transformed rows.
    pub fn iter(&mut self) -> Result<std::slice::Iter<'_, Fetched<M>>> {
        Ok(self.fetch_all()?.iter())
    }

    /// Number of rows in the evaluated result.
    pub fn count(&mut self) -> Result<usize> {
        Ok(self.fetch_all()?.len())
    }

    /// Evaluate and take ownership of the transformed rows.
    pub fn into_rows(mut self) -> Result<Vec<Fetched<M>>> {
        self.fetch_all()?;
        Ok(self.result_cache.take().unwrap_or_default())
    }

    /// Evaluate and take ownership of the entities.
    pub fn all(self) -> Result<Vec<M>> {
        self.into_rows()?
            .into_iter()
            .map(Fetched::into_model)
            .collect()
    }

    /// Evaluate and take ownership of the mapping rows.
    pub fn into_values(self) -> Result<Vec<ValueMap>> {
        self.into_rows()?
            .into_iter()
            .map(Fetched::into_values)
            .collect()
    }

    /// Evaluate and take ownership of the tuple rows.
    pub fn into_values_list(self) -> Result<Vec<Vec<Value>>> {
        self.into_rows()?
            .into_iter()
            .map(Fetched::into_values_list)
            .collect()
    }

    /// Evaluate and take ownership of the scalars.
    pub fn into_flat(self) -> Result<Vec<Value>> {
        self.into_rows()?
            .into_iter()
            .map(Fetched::into_flat)
            .collect()
    }

    /// The first row by the query's ordering (primary key if unordered).
    pub fn first_row(self) -> Result<Option<Fetched<M>>> {
        let query = if self.order_by.is_empty() {
            let pk = primary_key_column::<M>();
            self.order_by(OrderBy::asc(pk))
        } else {
            self
        };
        Ok(query.limit(1).into_rows()?.into_iter().next())
    }

    /// The last row by the query's ordering (primary key if unordered).
    pub fn last_row(mut self) -> Result<Option<Fetched<M>>> {
        let reversed: Vec<OrderBy> = if self.order_by.is_empty() {
            vec![OrderBy::desc(primary_key_column::<M>())]
        } else {
            self.order_by.iter().map(OrderBy::reversed).collect()
        };
        self.order_by = reversed;
        Ok(self.limit(1).into_rows()?.into_iter().next())
    }

    /// Exactly one row: `NotFound` for none, `MultipleRows` for several.
    pub fn get_row(self) -> Result<Fetched<M>> {
        let mut rows = self.limit(MAX_GET_RESULTS).into_rows()?;
        match rows.len() {
            0 => Err(Error::query(
                QueryErrorKind::NotFound,
                M::TABLE_NAME,
                "matching query does not exist",
            )),
            1 => Ok(rows.remove(0)),
            n => Err(Error::query(
                QueryErrorKind::MultipleRows,
                M::TABLE_NAME,
                format!(
                    "get() returned more than one row -- it returned {}",
                    if u64::try_from(n).is_ok_and(|n| n >= MAX_GET_RESULTS) {
                        format!("more than {}", MAX_GET_RESULTS - 1)
                    } else {
                        n.to_string()
                    }
                ),
            )),
        }
    }

    /// The first entity (see [`QuerySet::first_row`]).
    pub fn first(self) -> Result<Option<M>> {
        self.first_row()?.map(Fetched::into_model).transpose()
    }

    /// The last entity (see [`QuerySet::last_row`]).
    pub fn last(self) -> Result<Option<M>> {
        self.last_row()?.map(Fetched::into_model).transpose()
    }

    /// Exactly one entity (see [`QuerySet::get_row`]).
    pub fn get(self) -> Result<M> {
        self.get_row()?.into_model()
    }

    fn build_request(&self, plan: &JoinPlan) -> SelectRequest {
        let mut request = SelectRequest::for_model::<M>();
        request.filters.clone_from(&self.filters);
        request.order_by.clone_from(&self.order_by);
        request.offset = self.offset;
        request.limit = self.limit;
        if self.shape == ResultShape::Models {
            request.join_plan = plan.clone();
        } else {
            request.projection = QueryExecutor::<M>::field_names(self);
        }
        request
    }
}

fn primary_key_column<M: Prefetch>() -> &'static str {
    M::PRIMARY_KEY.first().copied().unwrap_or("id")
}

fn shape_mismatch<M: Prefetch>(expected: &'static str, actual: &str) -> Error {
    Error::UnsupportedRowShape(RowShapeError {
        table: M::TABLE_NAME,
        expected,
        actual: format!("{actual} rows"),
    })
}

impl<M: Prefetch, B: Backend> QueryExecutor<M> for QuerySet<'_, M, B> {
    fn select_related(&self) -> &SelectRelated {
        &self.select_related
    }

    fn query_config(&self) -> &QueryConfig {
        self.db.config()
    }

    fn result_shape(&self) -> ResultShape {
        self.shape
    }

    fn field_names(&self) -> Vec<String> {
        if self.projection.is_empty() {
            column_names(M::fields())
        } else {
            self.projection.clone()
        }
    }

    fn produce_rows(&mut self, plan: &JoinPlan) -> Result<Vec<RawRow<M>>> {
        let request = self.build_request(plan);
        let rows = self.db.backend().select(&request)?;
        if self.shape != ResultShape::Models {
            return Ok(rows.into_iter().map(RawRow::Record).collect());
        }
        rows.iter()
            .map(|row| {
                let mut model = M::from_row(row)?;
                hydrate_joined(&mut model, row, &request.join_plan)?;
                Ok(RawRow::Model(model))
            })
            .collect()
    }

    fn result_cache(&self) -> Option<&[Fetched<M>]> {
        self.result_cache.as_deref()
    }

    fn store_result_cache(&mut self, rows: Vec<Fetched<M>>) {
        self.result_cache = Some(rows);
    }

    fn prefetch_pending(&self) -> bool {
        !self.prefetch.is_empty() && !self.prefetch_done
    }

    fn resolve_prefetch(&mut self) -> Result<()> {
        if self.shape != ResultShape::Models {
            tracing::debug!(
                table = M::TABLE_NAME,
                shape = self.shape.name(),
                "Skipping prefetch for projected rows"
            );
            self.prefetch_done = true;
            return Ok(());
        }
        let Some(rows) = self.result_cache.take() else {
            return Ok(());
        };
        let mut models = Vec::with_capacity(rows.len());
        for row in rows {
            match row {
                Fetched::Model(model) => models.push(model),
                other => {
                    self.result_cache = None;
                    return Err(shape_mismatch::<M>("entity", other.shape_name()));
                }
            }
        }
        let outcome = prefetch_related_objects(self.db, &mut models, &self.prefetch);
        self.result_cache = Some(models.into_iter().map(Fetched::Model).collect());
        outcome?;
        self.prefetch_done = true;
        Ok(())
    }
}

impl<M: Prefetch, B: Backend> fmt::Debug for QuerySet<'_, M, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySet")
            .field("table", &M::TABLE_NAME)
            .field("filters", &self.filters)
            .field("order_by", &self.order_by)
            .field("limit", &self.limit)
            .field("select_related", &self.select_related)
            .field("prefetch", &self.prefetch)
            .field("shape", &self.shape)
            .field("cached", &self.result_cache.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}
