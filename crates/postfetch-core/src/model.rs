//! Model trait for ORM-style struct mapping.
//!
//! The `Model` trait defines the contract for structs that can be mapped to
//! database tables: static field and relationship metadata, conversion to and
//! from rows, and access to the relation slots a join filled in.

use crate::Result;
use crate::field::FieldInfo;
use crate::relationship::{JoinedRelation, RelationshipInfo};
use crate::row::Row;
use crate::value::Value;

/// Trait for types that can be mapped to database tables.
///
/// # Example
///
/// ```ignore
/// use postfetch_core::{FieldInfo, Model, Related, Row, Value};
///
/// struct Object {
///     id: Option<i64>,
///     identifier: Option<i32>,
///     thing: Related<Thing>,
/// }
///
/// impl Model for Object {
///     const TABLE_NAME: &'static str = "objects";
///     const PRIMARY_KEY: &'static [&'static str] = &["id"];
///     const RELATIONSHIPS: &'static [RelationshipInfo] = &[
///         RelationshipInfo::new("thing", "things", RelationshipKind::ManyToOne)
///             .local_key("thing_id")
///             .related::<Thing>(),
///     ];
///
///     // fields(), to_row(), from_row(), ...
///
///     fn joined_mut(&mut self, name: &str) -> Option<&mut dyn JoinedRelation> {
///         match name {
///             "thing" => Some(&mut self.thing),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Model: Sized + Send + Sync {
    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The primary key column name(s).
    const PRIMARY_KEY: &'static [&'static str];

    /// Relationship metadata for this model.
    ///
    /// Models with no relationships can rely on the default empty slice.
    const RELATIONSHIPS: &'static [RelationshipInfo] = &[];

    /// Get field metadata for all columns.
    fn fields() -> &'static [FieldInfo];

    /// Convert this model instance to a row of values.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Construct a model instance from a database row.
    ///
    /// Only the model's own columns are read here; joined relations are
    /// filled in afterwards through [`Model::joined_mut`].
    fn from_row(row: &Row) -> Result<Self>;

    /// Get the value of the primary key field(s).
    fn primary_key_value(&self) -> Vec<Value>;

    /// Check if this is a new record (primary key is None/default).
    fn is_new(&self) -> bool;

    /// Access the single-valued relation slot named `name`.
    ///
    /// This is plain field access: it must never fetch anything. Returning
    /// `None` means the model has no joinable relation by that name.
    #[allow(unused_variables)]
    fn joined_mut(&mut self, name: &str) -> Option<&mut dyn JoinedRelation> {
        None
    }
}
