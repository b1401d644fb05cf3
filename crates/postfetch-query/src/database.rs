//! The database handle queries are created from.

use crate::backend::Backend;
use crate::config::QueryConfig;
use crate::prefetch::Prefetch;
use crate::queryset::QuerySet;
use postfetch_core::{CollectionLoader, LazyLoader, Model, Result, Value};

/// A backend plus the settings every query on it uses.
#[derive(Debug)]
pub struct Database<B: Backend> {
    backend: B,
    config: QueryConfig,
}

impl<B: Backend> Database<B> {
    /// Wrap a backend with default settings.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: QueryConfig::default(),
        }
    }

    /// Wrap a backend with custom settings.
    pub fn with_config(backend: B, config: QueryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The query settings.
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Start a query on `M`.
    pub fn query<M: Prefetch>(&self) -> QuerySet<'_, M, B> {
        QuerySet::new(self)
    }

    /// Insert `model` and return its primary key.
    ///
    /// A null primary key is assigned by the backend.
    #[tracing::instrument(level = "debug", skip(self, model), fields(table = M::TABLE_NAME))]
    pub fn save<M: Model>(&self, model: &M) -> Result<Value> {
        let primary_key = M::PRIMARY_KEY.first().copied().unwrap_or("id");
        let pk = self
            .backend
            .insert(M::TABLE_NAME, primary_key, model.to_row())?;
        tracing::debug!(pk = ?pk, "Saved model");
        Ok(pk)
    }
}

impl<B: Backend, M: Prefetch> LazyLoader<M> for Database<B> {
    fn load_one(&self, pk: &Value) -> Result<Option<M>> {
        let primary_key = M::PRIMARY_KEY.first().copied().unwrap_or("id");
        let mut rows = self.query::<M>().filter_eq(primary_key, pk.clone()).all()?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }
}

impl<B: Backend, M: Prefetch> CollectionLoader<M> for Database<B> {
    fn load_many(&self, fk_column: &'static str, parent_pk: &Value) -> Result<Vec<M>> {
        self.query::<M>().filter_eq(fk_column, parent_pk.clone()).all()
    }
}
