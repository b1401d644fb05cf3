//! Core types and traits for postfetch.
//!
//! This crate provides the model-side half of post-fetch transformation:
//!
//! - `Model` trait for ORM-style struct mapping, with relationship metadata
//! - `PostFetch` hooks, one per result shape, defaulted to pass-through
//! - `JoinPlan`, the tree of eagerly joined relations for one query
//! - `HookDispatcher`, which routes classified rows to the hooks
//! - `Related` / `RelatedMany` relation slots and their lazy loaders

pub mod dispatch;
pub mod error;
pub mod field;
pub mod hooks;
pub mod model;
pub mod plan;
pub mod relationship;
pub mod row;
pub mod value;

pub use dispatch::HookDispatcher;
pub use error::{
    ConfigError, Error, QueryError, QueryErrorKind, Result, RowShapeError, TypeError,
};
pub use field::FieldInfo;
pub use hooks::{Fetched, PostFetch, ValueMap};
pub use model::Model;
pub use plan::{JoinPlan, PATH_SEPARATOR};
pub use relationship::{
    CollectionLoader, JoinedRelation, LazyLoader, Related, RelatedMany, RelationshipInfo,
    RelationshipKind, find_relationship, hydrate_joined,
};
pub use row::{ColumnInfo, FromValue, JOIN_SEPARATOR, Row};
pub use value::Value;
