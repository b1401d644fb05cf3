//! Query execution for postfetch.
//!
//! `postfetch-query` is the **host side** of post-fetch transformation. It
//! owns everything that produces raw rows and caches results:
//!
//! - **QuerySet**: a lazily evaluated query with a result cache, filters,
//!   ordering, projections and eager/batch relation loading.
//! - **ResultInterceptor**: wraps the point where a `QuerySet` populates its
//!   cache and routes every row through the model's hooks exactly once.
//! - **Backend**: the storage seam, with an in-memory implementation.
//!
//! The hook traits and the join plan live in `postfetch-core`; most users
//! access both through the `postfetch` facade crate.

pub mod backend;
pub mod clause;
pub mod config;
pub mod database;
pub mod eager;
pub mod interceptor;
pub mod memory;
pub mod prefetch;
pub mod queryset;

pub use backend::{Backend, SelectRequest};
pub use clause::{Filter, FilterOp, Limit, NullsOrder, Offset, OrderBy, OrderDirection};
pub use config::{DEFAULT_MAX_JOIN_DEPTH, QueryConfig};
pub use database::Database;
pub use eager::{SelectRelated, derive_join_plan};
pub use interceptor::{QueryExecutor, RawRow, ResultInterceptor, ResultShape};
pub use memory::MemoryBackend;
pub use prefetch::{
    Prefetch, PrefetchLookup, prefetch_many, prefetch_related_objects, unknown_prefetch,
};
pub use queryset::QuerySet;
