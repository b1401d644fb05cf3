//! An in-memory backend.
//!
//! Tables are created on first insert. Joins are emulated as LEFT JOINs
//! along the request's join plan, producing the same prefixed column layout
//! a SQL backend would (`obj__id`, `obj__thing__name`).

use crate::backend::{Backend, SelectRequest};
use postfetch_core::{
    ColumnInfo, Error, FieldInfo, JOIN_SEPARATOR, JoinPlan, QueryError, QueryErrorKind,
    RelationshipInfo, Result, Row, Value, find_relationship,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Row>,
    next_id: i64,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<&'static str, Table>,
    log: Vec<&'static str>,
}

/// A thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    selects: AtomicUsize,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of selects executed so far.
    pub fn queries_executed(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    /// Tables read by each select, in execution order.
    pub fn query_log(&self) -> Vec<&'static str> {
        self.lock().map(|s| s.log.clone()).unwrap_or_default()
    }

    /// Reset the select counter and log.
    pub fn reset_query_count(&self) {
        self.selects.store(0, Ordering::SeqCst);
        if let Ok(mut state) = self.lock() {
            state.log.clear();
        }
    }

    /// Number of rows stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.lock()
            .ok()
            .and_then(|s| s.tables.get(table).map(|t| t.rows.len()))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| {
            Error::Query(QueryError {
                kind: QueryErrorKind::Database,
                table: None,
                message: "memory backend lock poisoned".to_string(),
                source: None,
            })
        })
    }
}

impl Backend for MemoryBackend {
    #[tracing::instrument(level = "trace", skip(self, request), fields(table = request.table))]
    fn select(&self, request: &SelectRequest) -> Result<Vec<Row>> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock()?;
        state.log.push(request.table);

        let mut matched: Vec<&Row> = state
            .tables
            .get(request.table)
            .map(|t| t.rows.iter().collect())
            .unwrap_or_default();
        matched.retain(|row| request.filters.iter().all(|f| f.matches(row)));
        if !request.order_by.is_empty() {
            matched.sort_by(|a, b| {
                request
                    .order_by
                    .iter()
                    .map(|o| o.compare(a, b))
                    .find(|ord| ord.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        let skip = request
            .offset
            .map_or(0, |o| usize::try_from(o.0).unwrap_or(usize::MAX));
        let take = request
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l.0).unwrap_or(usize::MAX));
        let matched: Vec<&Row> = matched.into_iter().skip(skip).take(take).collect();

        let rows: Vec<Row> = if request.projection.is_empty() {
            let mut names = Vec::new();
            joined_column_names(
                request.fields,
                request.relationships,
                &request.join_plan,
                "",
                &mut names,
            );
            let columns = Arc::new(ColumnInfo::new(names));
            matched
                .into_iter()
                .map(|row| {
                    let mut values = Vec::with_capacity(columns.len());
                    joined_values(
                        &state.tables,
                        request.fields,
                        request.relationships,
                        &request.join_plan,
                        Some(row),
                        &mut values,
                    );
                    Row::with_columns(Arc::clone(&columns), values)
                })
                .collect()
        } else {
            for column in &request.projection {
                if !request.fields.iter().any(|f| f.column_name == column) {
                    return Err(Error::query(
                        QueryErrorKind::InvalidField,
                        request.table,
                        format!("Cannot resolve keyword '{column}' into field"),
                    ));
                }
            }
            let columns = Arc::new(ColumnInfo::new(request.projection.clone()));
            matched
                .into_iter()
                .map(|row| {
                    let values = request
                        .projection
                        .iter()
                        .map(|c| row.get_by_name(c).cloned().unwrap_or(Value::Null))
                        .collect();
                    Row::with_columns(Arc::clone(&columns), values)
                })
                .collect()
        };
        tracing::trace!(rows = rows.len(), "Memory select finished");
        Ok(rows)
    }

    fn insert(
        &self,
        table: &'static str,
        primary_key: &'static str,
        values: Vec<(&'static str, Value)>,
    ) -> Result<Value> {
        let mut state = self.lock()?;
        let table_state = state.tables.entry(table).or_default();

        let mut names = Vec::with_capacity(values.len() + 1);
        let mut row_values = Vec::with_capacity(values.len() + 1);
        let mut pk = None;
        for (name, value) in values {
            if name == primary_key {
                pk = Some(value.clone());
            }
            names.push(name.to_string());
            row_values.push(value);
        }

        let pk = match pk {
            Some(value) if !value.is_null() => {
                if table_state
                    .rows
                    .iter()
                    .any(|r| r.get_by_name(primary_key).is_some_and(|v| v.key_eq(&value)))
                {
                    return Err(Error::query(
                        QueryErrorKind::Database,
                        table,
                        format!("UNIQUE constraint failed: {table}.{primary_key}"),
                    ));
                }
                if let Some(id) = value.as_i64() {
                    table_state.next_id = table_state.next_id.max(id);
                }
                value
            }
            _ => {
                table_state.next_id += 1;
                let id = Value::BigInt(table_state.next_id);
                match names.iter().position(|n| n == primary_key) {
                    Some(idx) => row_values[idx] = id.clone(),
                    None => {
                        names.push(primary_key.to_string());
                        row_values.push(id.clone());
                    }
                }
                id
            }
        };

        table_state.rows.push(Row::new(names, row_values));
        tracing::trace!(table, pk = ?pk, "Inserted row");
        Ok(pk)
    }
}

fn prefixed(prefix: &str, column: &str) -> String {
    if prefix.is_empty() {
        column.to_string()
    } else {
        format!("{prefix}{JOIN_SEPARATOR}{column}")
    }
}

fn joined_column_names(
    fields: &[FieldInfo],
    relationships: &[RelationshipInfo],
    plan: &JoinPlan,
    prefix: &str,
    out: &mut Vec<String>,
) {
    out.extend(fields.iter().map(|f| prefixed(prefix, f.column_name)));
    for (name, nested) in plan.iter() {
        let Some(rel) = find_relationship(relationships, name) else {
            continue;
        };
        joined_column_names(
            rel.related_fields(),
            rel.related_relationships(),
            nested,
            &prefixed(prefix, name),
            out,
        );
    }
}

/// Append the values for one model (and its joins) to `out`. `row` is `None`
/// on a LEFT JOIN miss, which yields NULLs all the way down.
fn joined_values(
    tables: &HashMap<&'static str, Table>,
    fields: &[FieldInfo],
    relationships: &[RelationshipInfo],
    plan: &JoinPlan,
    row: Option<&Row>,
    out: &mut Vec<Value>,
) {
    out.extend(fields.iter().map(|f| {
        row.and_then(|r| r.get_by_name(f.column_name))
            .cloned()
            .unwrap_or(Value::Null)
    }));
    for (name, nested) in plan.iter() {
        let Some(rel) = find_relationship(relationships, name) else {
            continue;
        };
        let related = row.and_then(|r| lookup_related(tables, rel, r));
        joined_values(
            tables,
            rel.related_fields(),
            rel.related_relationships(),
            nested,
            related,
            out,
        );
    }
}

fn lookup_related<'a>(
    tables: &'a HashMap<&'static str, Table>,
    rel: &RelationshipInfo,
    row: &Row,
) -> Option<&'a Row> {
    let fk = row.get_by_name(rel.local_key?)?;
    let pk_column = rel.related_primary_key();
    tables
        .get(rel.related_table)?
        .rows
        .iter()
        .find(|r| r.get_by_name(pk_column).is_some_and(|v| v.key_eq(fk)))
}
