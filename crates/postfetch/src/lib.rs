//! postfetch - post-fetch hooks for query results.
//!
//! Models declare transformations that run on their own query results right
//! after rows are materialized and before the query caches them:
//!
//! - an entity hook for full model rows
//! - a values hook for `values(...)` mappings
//! - a values-list hook for `values_list(...)` tuples
//! - a flat hook for `values_list_flat(...)` scalars
//!
//! Hooks also reach eagerly joined relations (`select_related`) along the
//! query's join plan, and batch-prefetched collections (`prefetch_related`)
//! through the follow-up query that loads them.
//!
//! # Quick Start
//!
//! ```ignore
//! use postfetch::prelude::*;
//!
//! impl PostFetch for Thing {
//!     fn post_fetch_hook(mut thing: Self) -> Result<Self> {
//!         thing.email = None;
//!         Ok(thing)
//!     }
//! }
//! impl Prefetch for Thing {}
//!
//! let db = Database::new(MemoryBackend::new());
//! db.save(&Thing::new("foo", 12, "foo@bar.com"))?;
//!
//! let thing = db.query::<Thing>().first()?.unwrap();
//! assert!(thing.email.is_none());
//! ```

// Re-export all public types from sub-crates
pub use postfetch_core::{
    // Relations
    CollectionLoader,
    ColumnInfo,
    // Core types
    Error,
    // Hooks
    Fetched,
    FieldInfo,
    FromValue,
    HookDispatcher,
    JoinPlan,
    JoinedRelation,
    LazyLoader,
    Model,
    PostFetch,
    QueryErrorKind,
    Related,
    RelatedMany,
    RelationshipInfo,
    RelationshipKind,
    Result,
    Row,
    RowShapeError,
    Value,
    ValueMap,
    hydrate_joined,
};

pub use postfetch_query::{
    Backend, Database, Filter, Limit, MemoryBackend, Offset, OrderBy, Prefetch, PrefetchLookup,
    QueryConfig, QueryExecutor, QuerySet, RawRow, ResultInterceptor, ResultShape, SelectRelated,
    SelectRequest, derive_join_plan, prefetch_many, unknown_prefetch,
};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use postfetch::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Storage
        Backend,
        Database,
        Error,
        Fetched,
        FieldInfo,
        // Queries
        Filter,
        JoinedRelation,
        MemoryBackend,
        // Model traits and types
        Model,
        OrderBy,
        PostFetch,
        Prefetch,
        PrefetchLookup,
        QueryConfig,
        QuerySet,
        Related,
        RelatedMany,
        RelationshipInfo,
        RelationshipKind,
        Result,
        Row,
        Value,
        ValueMap,
        prefetch_many,
        unknown_prefetch,
    };
}
