//! The result interceptor.
//!
//! Sits at the point where a query's raw rows become its cached result:
//! every row passes through the model's post-fetch hooks exactly once,
//! before the cache is populated, and batch prefetch runs only afterwards.

use crate::config::QueryConfig;
use crate::eager::{SelectRelated, derive_join_plan};
use postfetch_core::{
    Error, Fetched, HookDispatcher, JoinPlan, PostFetch, Result, Row, RowShapeError, ValueMap,
};

/// The shape every row of a query takes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultShape {
    /// Full entities.
    #[default]
    Models,
    /// Field-name to value mappings.
    Values,
    /// Value tuples in projection order.
    ValuesList,
    /// One scalar per row.
    Flat,
}

impl ResultShape {
    /// Short name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            ResultShape::Models => "entity",
            ResultShape::Values => "values",
            ResultShape::ValuesList => "values_list",
            ResultShape::Flat => "flat",
        }
    }
}

/// A raw row as materialized by the executor, before classification.
#[derive(Debug)]
pub enum RawRow<M> {
    /// An entity, with its joined relations already filled in.
    Model(M),
    /// A projected backend row.
    Record(Row),
}

/// What the interceptor needs from the query object it wraps.
///
/// The executor owns the result cache and the prefetch state; the
/// interceptor only decides when they are touched.
pub trait QueryExecutor<M: PostFetch> {
    /// The query's eager-join configuration.
    fn select_related(&self) -> &SelectRelated;

    /// Settings governing plan derivation.
    fn query_config(&self) -> &QueryConfig;

    /// The shape of every row this query yields.
    fn result_shape(&self) -> ResultShape;

    /// Field names of the projection, in order.
    fn field_names(&self) -> Vec<String>;

    /// Run the underlying fetch. Entities come back with every relation in
    /// `plan` already joined.
    fn produce_rows(&mut self, plan: &JoinPlan) -> Result<Vec<RawRow<M>>>;

    /// The cached result, if the query has been evaluated.
    fn result_cache(&self) -> Option<&[Fetched<M>]>;

    /// Populate the result cache.
    fn store_result_cache(&mut self, rows: Vec<Fetched<M>>);

    /// Whether batch prefetch lookups remain to be resolved.
    fn prefetch_pending(&self) -> bool;

    /// Resolve batch prefetch lookups against the cached result.
    fn resolve_prefetch(&mut self) -> Result<()>;
}

/// Wraps a [`QueryExecutor`] and applies post-fetch hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultInterceptor;

impl ResultInterceptor {
    /// Evaluate the query once and return its transformed rows.
    ///
    /// A second call finds the cache populated and returns the same rows
    /// without fetching again. If any row fails to classify or any hook fails,
    /// the error is returned and the cache stays unset.
    #[tracing::instrument(level = "debug", skip(executor), fields(shape = executor.result_shape().name()))]
    pub fn fetch_and_transform<M, E>(executor: &mut E) -> Result<&[Fetched<M>]>
    where
        M: PostFetch,
        E: QueryExecutor<M>,
    {
        if executor.result_cache().is_none() {
            let plan = derive_join_plan::<M>(executor.select_related(), executor.query_config())?;
            let shape = executor.result_shape();
            let fields = executor.field_names();
            let raw = executor.produce_rows(&plan)?;
            let count = raw.len();

            let transformed = raw
                .into_iter()
                .map(|row| {
                    let row = classify::<M>(row, shape)?;
                    HookDispatcher::dispatch_row(row, &fields, &plan)
                })
                .collect::<Result<Vec<_>>>()?;

            tracing::debug!(
                table = M::TABLE_NAME,
                rows = count,
                joined = plan.len(),
                "Post-fetch hooks applied"
            );
            executor.store_result_cache(transformed);
        }

        if executor.prefetch_pending() {
            executor.resolve_prefetch()?;
        }

        executor.result_cache().ok_or_else(|| {
            Error::Custom(format!(
                "result cache for '{}' was not populated",
                M::TABLE_NAME
            ))
        })
    }
}

fn classify<M: PostFetch>(row: RawRow<M>, shape: ResultShape) -> Result<Fetched<M>> {
    match (row, shape) {
        (RawRow::Model(model), ResultShape::Models) => Ok(Fetched::Model(model)),
        (RawRow::Record(row), ResultShape::Values) => Ok(Fetched::Values(
            row.iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect::<ValueMap>(),
        )),
        (RawRow::Record(row), ResultShape::ValuesList) => {
            Ok(Fetched::ValuesList(row.into_values()))
        }
        (RawRow::Record(row), ResultShape::Flat) if row.len() == 1 => {
            Ok(Fetched::Flat(row.into_values().remove(0)))
        }
        (RawRow::Record(row), shape) => Err(unsupported::<M>(
            shape,
            format!("a record with {} columns", row.len()),
        )),
        (RawRow::Model(_), shape) => Err(unsupported::<M>(shape, "an entity".to_string())),
    }
}

fn unsupported<M: PostFetch>(shape: ResultShape, actual: String) -> Error {
    Error::UnsupportedRowShape(RowShapeError {
        table: M::TABLE_NAME,
        expected: shape.name(),
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use postfetch_core::{FieldInfo, Model, Value};

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: i64,
        label: Option<String>,
    }

    impl Model for Item {
        const TABLE_NAME: &'static str = "items";
        const PRIMARY_KEY: &'static [&'static str] = &["id"];

        fn fields() -> &'static [FieldInfo] {
            static FIELDS: &[FieldInfo] = &[
                FieldInfo::new("id", "id").primary_key(true),
                FieldInfo::new("label", "label").nullable(true),
            ];
            FIELDS
        }

        fn to_row(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("id", Value::from(self.id)),
                ("label", Value::from(self.label.clone())),
            ]
        }

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                id: row.get_named("id")?,
                label: row.get_named("label")?,
            })
        }

        fn primary_key_value(&self) -> Vec<Value> {
            vec![Value::from(self.id)]
        }

        fn is_new(&self) -> bool {
            false
        }
    }

    impl PostFetch for Item {
        fn post_fetch_hook(model: Self) -> Result<Self> {
            if model.id < 0 {
                return Err(Error::Custom("negative id".to_string()));
            }
            Ok(Item {
                id: model.id,
                label: None,
            })
        }

        fn post_fetch_values_list_flat_hook(value: Value, field: &str) -> Result<Value> {
            Ok(Value::Text(format!("{field}:{}", value.as_i64().unwrap_or_default())))
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum Raw {
        Item(i64),
        IdRecord,
        WideRecord,
    }

    impl Raw {
        fn build(self) -> RawRow<Item> {
            match self {
                Raw::Item(id) => RawRow::Model(Item {
                    id,
                    label: Some("raw".to_string()),
                }),
                Raw::IdRecord => {
                    RawRow::Record(Row::new(vec!["id".to_string()], vec![Value::BigInt(7)]))
                }
                Raw::WideRecord => RawRow::Record(Row::new(
                    vec!["id".to_string(), "label".to_string()],
                    vec![Value::BigInt(7), Value::Null],
                )),
            }
        }
    }

    /// Hands out a fixed set of raw rows and counts fetches.
    struct StubExecutor {
        shape: ResultShape,
        rows: Vec<Raw>,
        select_related: SelectRelated,
        config: QueryConfig,
        cache: Option<Vec<Fetched<Item>>>,
        fetches: usize,
        prefetch_pending: bool,
        prefetch_runs: usize,
    }

    impl StubExecutor {
        fn new(shape: ResultShape, rows: Vec<Raw>) -> Self {
            Self {
                shape,
                rows,
                select_related: SelectRelated::None,
                config: QueryConfig::default(),
                cache: None,
                fetches: 0,
                prefetch_pending: false,
                prefetch_runs: 0,
            }
        }
    }

    impl QueryExecutor<Item> for StubExecutor {
        fn select_related(&self) -> &SelectRelated {
            &self.select_related
        }

        fn query_config(&self) -> &QueryConfig {
            &self.config
        }

        fn result_shape(&self) -> ResultShape {
            self.shape
        }

        fn field_names(&self) -> Vec<String> {
            vec!["id".to_string()]
        }

        fn produce_rows(&mut self, _plan: &JoinPlan) -> Result<Vec<RawRow<Item>>> {
            self.fetches += 1;
            Ok(self.rows.iter().map(|raw| raw.build()).collect())
        }

        fn result_cache(&self) -> Option<&[Fetched<Item>]> {
            self.cache.as_deref()
        }

        fn store_result_cache(&mut self, rows: Vec<Fetched<Item>>) {
            self.cache = Some(rows);
        }

        fn prefetch_pending(&self) -> bool {
            self.prefetch_pending
        }

        fn resolve_prefetch(&mut self) -> Result<()> {
            assert!(self.cache.is_some(), "prefetch ran before the cache was set");
            self.prefetch_runs += 1;
            self.prefetch_pending = false;
            Ok(())
        }
    }

    #[test]
    fn transforms_and_caches_once() {
        let mut exec = StubExecutor::new(ResultShape::Models, vec![Raw::Item(2), Raw::Item(1)]);
        let first = ResultInterceptor::fetch_and_transform(&mut exec).unwrap().as_ptr();
        let rows = ResultInterceptor::fetch_and_transform(&mut exec).unwrap();
        assert_eq!(rows.as_ptr(), first);
        assert_eq!(exec.fetches, 1);

        let ids: Vec<i64> = exec
            .cache
            .as_deref()
            .unwrap()
            .iter()
            .filter_map(|r| r.as_model().map(|m| m.id))
            .collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(exec.cache.as_deref().unwrap().iter().all(|r| r
            .as_model()
            .is_some_and(|m| m.label.is_none())));
    }

    #[test]
    fn empty_result_caches_empty() {
        let mut exec = StubExecutor::new(ResultShape::Models, vec![]);
        assert!(ResultInterceptor::fetch_and_transform(&mut exec).unwrap().is_empty());
        assert_eq!(exec.cache.as_ref().map(Vec::len), Some(0));
    }

    #[test]
    fn hook_failure_leaves_cache_unset() {
        let mut exec = StubExecutor::new(ResultShape::Models, vec![Raw::Item(1), Raw::Item(-1)]);
        exec.prefetch_pending = true;
        let err = ResultInterceptor::fetch_and_transform(&mut exec).unwrap_err();
        assert_eq!(err.to_string(), "negative id");
        assert!(exec.cache.is_none());
        assert_eq!(exec.prefetch_runs, 0);
    }

    #[test]
    fn prefetch_runs_after_cache_and_only_once() {
        let mut exec = StubExecutor::new(ResultShape::Models, vec![Raw::Item(1)]);
        exec.prefetch_pending = true;
        ResultInterceptor::fetch_and_transform(&mut exec).unwrap();
        ResultInterceptor::fetch_and_transform(&mut exec).unwrap();
        assert_eq!(exec.prefetch_runs, 1);
    }

    #[test]
    fn prefetch_runs_even_when_cache_already_set() {
        let mut exec = StubExecutor::new(ResultShape::Models, vec![Raw::Item(1)]);
        ResultInterceptor::fetch_and_transform(&mut exec).unwrap();
        exec.prefetch_pending = true;
        ResultInterceptor::fetch_and_transform(&mut exec).unwrap();
        assert_eq!(exec.fetches, 1);
        assert_eq!(exec.prefetch_runs, 1);
    }

    #[test]
    fn flat_rows_use_the_single_field_name() {
        let mut exec = StubExecutor::new(ResultShape::Flat, vec![Raw::IdRecord]);
        let rows = ResultInterceptor::fetch_and_transform(&mut exec).unwrap();
        assert_eq!(rows, &[Fetched::Flat(Value::from("id:7"))]);
    }

    #[test]
    fn values_rows_keep_column_names() {
        let mut exec = StubExecutor::new(ResultShape::Values, vec![Raw::WideRecord]);
        let rows = ResultInterceptor::fetch_and_transform(&mut exec).unwrap();
        let map = rows[0].as_values().unwrap();
        assert_eq!(map.get("id"), Some(&Value::BigInt(7)));
        assert_eq!(map.get("label"), Some(&Value::Null));
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "label"]);
    }

    #[test]
    fn mismatched_rows_are_unsupported() {
        let mut flat = StubExecutor::new(ResultShape::Flat, vec![Raw::WideRecord]);
        let err = ResultInterceptor::fetch_and_transform(&mut flat).unwrap_err();
        assert!(err.is_unsupported_row_shape());
        assert!(flat.cache.is_none());

        let mut models = StubExecutor::new(ResultShape::Models, vec![Raw::IdRecord]);
        assert!(
            ResultInterceptor::fetch_and_transform(&mut models)
                .unwrap_err()
                .is_unsupported_row_shape()
        );

        let mut values = StubExecutor::new(ResultShape::ValuesList, vec![Raw::Item(1)]);
        assert!(
            ResultInterceptor::fetch_and_transform(&mut values)
                .unwrap_err()
                .is_unsupported_row_shape()
        );
    }
}
