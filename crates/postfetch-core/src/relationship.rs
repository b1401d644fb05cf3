//! Relationship metadata and relation slots.
//!
//! Relationships are declared as static metadata on each `Model`. The query
//! layer uses that metadata to emulate joins and to batch-prefetch
//! collections; the slot types (`Related`, `RelatedMany`) hold whatever a
//! join, a prefetch or a lazy load produced.

use crate::dispatch::HookDispatcher;
use crate::field::FieldInfo;
use crate::hooks::PostFetch;
use crate::plan::JoinPlan;
use crate::row::Row;
use crate::{Model, Result, Value};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

/// The type of relationship between two models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelationshipKind {
    /// One-to-one: `Thing` has one `Profile`.
    OneToOne,
    /// Many-to-one: many `Object`s belong to one `Thing`.
    #[default]
    ManyToOne,
    /// One-to-many: one `Thing` has many `Object`s.
    OneToMany,
}

impl RelationshipKind {
    /// Whether the relation points at zero-or-one row and can be joined.
    pub const fn is_single_valued(self) -> bool {
        matches!(self, RelationshipKind::OneToOne | RelationshipKind::ManyToOne)
    }
}

/// Metadata about a relationship between models.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipInfo {
    /// Name of the relationship field.
    pub name: &'static str,

    /// The related model's table name.
    pub related_table: &'static str,

    /// Kind of relationship.
    pub kind: RelationshipKind,

    /// Local foreign key column (for ManyToOne / OneToOne).
    /// e.g., `"thing_id"` on `Object`.
    pub local_key: Option<&'static str>,

    /// Remote foreign key column (for OneToMany).
    /// e.g., `"thing_id"` on `Object` when accessed from `Thing`.
    pub remote_key: Option<&'static str>,

    /// Function pointer returning the related model's fields metadata.
    pub related_fields_fn: fn() -> &'static [FieldInfo],

    /// Function pointer returning the related model's own relationships,
    /// so joins can be followed more than one level deep.
    pub related_relationships_fn: fn() -> &'static [RelationshipInfo],
}

impl PartialEq for RelationshipInfo {
    fn eq(&self, other: &Self) -> bool {
        // Function pointers are not part of a relationship's identity.
        self.name == other.name
            && self.related_table == other.related_table
            && self.kind == other.kind
            && self.local_key == other.local_key
            && self.remote_key == other.remote_key
    }
}

impl Eq for RelationshipInfo {}

fn empty_related_fields() -> &'static [FieldInfo] {
    &[]
}

fn empty_related_relationships() -> &'static [RelationshipInfo] {
    &[]
}

fn relationships_of<T: Model>() -> &'static [RelationshipInfo] {
    T::RELATIONSHIPS
}

impl RelationshipInfo {
    /// Create a new relationship with required fields.
    #[must_use]
    pub const fn new(
        name: &'static str,
        related_table: &'static str,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            name,
            related_table,
            kind,
            local_key: None,
            remote_key: None,
            related_fields_fn: empty_related_fields,
            related_relationships_fn: empty_related_relationships,
        }
    }

    /// Point this relationship at the related model's metadata.
    #[must_use]
    pub const fn related<T: Model>(mut self) -> Self {
        self.related_fields_fn = T::fields;
        self.related_relationships_fn = relationships_of::<T>;
        self
    }

    /// Set the local foreign key column (ManyToOne / OneToOne).
    #[must_use]
    pub const fn local_key(mut self, key: &'static str) -> Self {
        self.local_key = Some(key);
        self
    }

    /// Set the remote foreign key column (OneToMany).
    #[must_use]
    pub const fn remote_key(mut self, key: &'static str) -> Self {
        self.remote_key = Some(key);
        self
    }

    /// The related model's fields.
    pub fn related_fields(&self) -> &'static [FieldInfo] {
        (self.related_fields_fn)()
    }

    /// The related model's relationships.
    pub fn related_relationships(&self) -> &'static [RelationshipInfo] {
        (self.related_relationships_fn)()
    }

    /// The related model's primary key column, defaulting to `"id"`.
    pub fn related_primary_key(&self) -> &'static str {
        self.related_fields()
            .iter()
            .find(|f| f.primary_key)
            .map_or("id", |f| f.column_name)
    }
}

/// Find a relationship by field name in a relationship list.
pub fn find_relationship<'a>(
    relationships: &'a [RelationshipInfo],
    name: &str,
) -> Option<&'a RelationshipInfo> {
    relationships.iter().find(|r| r.name == name)
}

/// A relation slot that a join can fill and post-fetch hooks can rewrite.
///
/// Object safe so a model can hand out slots by relation name while the
/// related type stays behind the trait.
pub trait JoinedRelation {
    /// Fill the slot from the joined columns of one raw row.
    ///
    /// `row` holds only this relation's columns (prefix already stripped);
    /// `plan` describes the joins nested below this relation.
    fn hydrate_joined(&mut self, row: &Row, plan: &JoinPlan) -> Result<()>;

    /// Run the related type's entity hook on the loaded object and write the
    /// result back, then descend along `plan`.
    ///
    /// An unloaded or null slot is left alone; nothing is fetched.
    fn apply_post_fetch(&mut self, plan: &JoinPlan) -> Result<()>;

    /// Whether the slot currently holds an object.
    fn is_present(&self) -> bool;
}

/// Fill every joined relation of `model` named in `plan` from `row`.
pub fn hydrate_joined<M: Model>(model: &mut M, row: &Row, plan: &JoinPlan) -> Result<()> {
    for (name, nested) in plan.iter() {
        match model.joined_mut(name) {
            Some(slot) => slot.hydrate_joined(&row.subset_by_prefix(name), nested)?,
            None => tracing::trace!(
                table = M::TABLE_NAME,
                relation = name,
                "No joined slot for relation; skipping hydration"
            ),
        }
    }
    Ok(())
}

/// Loads a single related object by primary key.
///
/// Implemented by the query layer, which runs the load through its result
/// interceptor so the related type's hooks apply.
pub trait LazyLoader<M: Model> {
    /// Load an object by primary key.
    fn load_one(&self, pk: &Value) -> Result<Option<M>>;
}

/// Loads the members of a one-to-many collection.
pub trait CollectionLoader<M: Model> {
    /// Load every `M` whose `fk_column` equals `parent_pk`.
    fn load_many(&self, fk_column: &'static str, parent_pk: &Value) -> Result<Vec<M>>;
}

/// A related single object (many-to-one or one-to-one).
///
/// This wrapper can be in one of three states:
/// - **Empty**: no relationship (`fk_value` is None)
/// - **Unloaded**: has FK value but not fetched yet (`fk_value` is Some, `loaded` unset)
/// - **Loaded**: the object has been joined or fetched (`loaded` set, possibly to null)
pub struct Related<T: Model> {
    fk_value: Option<Value>,
    loaded: OnceLock<Option<T>>,
}

impl<T: Model> Related<T> {
    /// Create an empty relationship (null FK, not loaded).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            fk_value: None,
            loaded: OnceLock::new(),
        }
    }

    /// Create from a foreign key value (not yet loaded).
    #[must_use]
    pub fn from_fk(fk: impl Into<Value>) -> Self {
        Self {
            fk_value: Some(fk.into()),
            loaded: OnceLock::new(),
        }
    }

    /// Create from a nullable foreign key column.
    #[must_use]
    pub fn from_fk_opt<V: Into<Value>>(fk: Option<V>) -> Self {
        match fk {
            Some(fk) => Self::from_fk(fk),
            None => Self::empty(),
        }
    }

    /// Create with an already-loaded object.
    #[must_use]
    pub fn loaded(obj: T) -> Self {
        Self {
            fk_value: None,
            loaded: OnceLock::from(Some(obj)),
        }
    }

    /// Get the loaded object (None if not loaded or loaded as null).
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.loaded.get().and_then(|o| o.as_ref())
    }

    /// Check if the relationship has been loaded (including loaded-null).
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Check if the relationship is empty (null FK).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fk_value.is_none()
    }

    /// Get the foreign key value (if present).
    #[must_use]
    pub fn fk(&self) -> Option<&Value> {
        self.fk_value.as_ref()
    }

    /// Replace whatever is loaded with `obj`.
    pub fn replace(&mut self, obj: Option<T>) {
        self.loaded = OnceLock::from(obj);
    }

    /// Return the loaded object, fetching it through `loader` on first use.
    ///
    /// An empty relationship resolves to `None` without touching the loader.
    pub fn load(&self, loader: &impl LazyLoader<T>) -> Result<Option<&T>> {
        if !self.is_loaded() {
            let obj = match &self.fk_value {
                Some(fk) => loader.load_one(fk)?,
                None => None,
            };
            // A concurrent set cannot happen with &self on one thread; the
            // first value wins either way.
            let _ = self.loaded.set(obj);
        }
        Ok(self.get())
    }
}

impl<T: PostFetch> JoinedRelation for Related<T> {
    fn hydrate_joined(&mut self, row: &Row, plan: &JoinPlan) -> Result<()> {
        let pk = T::PRIMARY_KEY.first().copied().unwrap_or("id");
        let missing = row.get_by_name(pk).is_none_or(Value::is_null);
        if missing {
            self.replace(None);
            return Ok(());
        }
        let mut obj = T::from_row(row)?;
        hydrate_joined(&mut obj, row, plan)?;
        self.replace(Some(obj));
        Ok(())
    }

    fn apply_post_fetch(&mut self, plan: &JoinPlan) -> Result<()> {
        let Some(slot) = self.loaded.get_mut() else {
            return Ok(());
        };
        let Some(obj) = slot.take() else {
            return Ok(());
        };
        let mut obj = T::post_fetch_hook(obj)?;
        if !plan.is_empty() {
            HookDispatcher::apply_entity_hooks(&mut obj, plan)?;
        }
        *slot = Some(obj);
        Ok(())
    }

    fn is_present(&self) -> bool {
        self.get().is_some()
    }
}

impl<T: Model> Default for Related<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Model + Clone> Clone for Related<T> {
    fn clone(&self) -> Self {
        let cloned = Self {
            fk_value: self.fk_value.clone(),
            loaded: OnceLock::new(),
        };

        if let Some(value) = self.loaded.get() {
            let _ = cloned.loaded.set(value.clone());
        }

        cloned
    }
}

impl<T: Model + fmt::Debug> fmt::Debug for Related<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_loaded() {
            "loaded"
        } else if self.is_empty() {
            "empty"
        } else {
            "unloaded"
        };

        f.debug_struct("Related")
            .field("state", &state)
            .field("fk_value", &self.fk_value)
            .field("loaded", &self.get())
            .finish()
    }
}

impl<T> Serialize for Related<T>
where
    T: Model + Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.loaded.get() {
            Some(Some(obj)) => obj.serialize(serializer),
            Some(None) | None => serializer.serialize_none(),
        }
    }
}

/// A collection of related objects (one-to-many).
///
/// The collection is filled by batch-prefetch after the owning query has
/// been cached, or loaded on first traversal through [`RelatedMany::load`].
pub struct RelatedMany<T: Model> {
    /// The loaded objects (if fetched).
    loaded: OnceLock<Vec<T>>,
    /// Foreign key column on the related model.
    fk_column: &'static str,
    /// Parent's primary key value.
    parent_pk: Option<Value>,
}

impl<T: Model> RelatedMany<T> {
    /// Create a new unloaded RelatedMany with the FK column name.
    #[must_use]
    pub fn new(fk_column: &'static str) -> Self {
        Self {
            loaded: OnceLock::new(),
            fk_column,
            parent_pk: None,
        }
    }

    /// Create with a parent primary key for loading.
    #[must_use]
    pub fn with_parent_pk(fk_column: &'static str, pk: impl Into<Value>) -> Self {
        Self {
            loaded: OnceLock::new(),
            fk_column,
            parent_pk: Some(pk.into()),
        }
    }

    /// Check if the collection has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Get the loaded objects as a slice (None if not loaded).
    #[must_use]
    pub fn get(&self) -> Option<&[T]> {
        self.loaded.get().map(Vec::as_slice)
    }

    /// Get the number of loaded items (0 if not loaded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaded.get().map_or(0, Vec::len)
    }

    /// Check if the collection is empty (true if not loaded or loaded empty).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaded.get().is_none_or(Vec::is_empty)
    }

    /// Replace whatever is loaded with `objects`.
    pub fn replace_loaded(&mut self, objects: Vec<T>) {
        self.loaded = OnceLock::from(objects);
    }

    /// Iterate over the loaded items.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.loaded.get().map_or([].iter(), |v| v.iter())
    }

    /// Get the FK column name.
    #[must_use]
    pub fn fk_column(&self) -> &'static str {
        self.fk_column
    }

    /// Get the parent PK value (if set).
    #[must_use]
    pub fn parent_pk(&self) -> Option<&Value> {
        self.parent_pk.as_ref()
    }

    /// Set the parent PK value.
    pub fn set_parent_pk(&mut self, pk: impl Into<Value>) {
        self.parent_pk = Some(pk.into());
    }

    /// Return the collection, loading it through `loader` on first traversal.
    ///
    /// A collection without a parent key (an unsaved parent) loads as empty.
    pub fn load(&self, loader: &impl CollectionLoader<T>) -> Result<&[T]> {
        if !self.is_loaded() {
            let objects = match &self.parent_pk {
                Some(pk) => loader.load_many(self.fk_column, pk)?,
                None => Vec::new(),
            };
            let _ = self.loaded.set(objects);
        }
        Ok(self.get().unwrap_or(&[]))
    }
}

impl<T: Model> Default for RelatedMany<T> {
    fn default() -> Self {
        Self::new("")
    }
}

impl<T: Model + Clone> Clone for RelatedMany<T> {
    fn clone(&self) -> Self {
        let cloned = Self {
            loaded: OnceLock::new(),
            fk_column: self.fk_column,
            parent_pk: self.parent_pk.clone(),
        };

        if let Some(vec) = self.loaded.get() {
            let _ = cloned.loaded.set(vec.clone());
        }

        cloned
    }
}

impl<T: Model + fmt::Debug> fmt::Debug for RelatedMany<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelatedMany")
            .field("loaded", &self.loaded.get())
            .field("fk_column", &self.fk_column)
            .field("parent_pk", &self.parent_pk)
            .finish()
    }
}

impl<T> Serialize for RelatedMany<T>
where
    T: Model + Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.loaded.get() {
            Some(vec) => vec.serialize(serializer),
            None => Vec::<T>::new().serialize(serializer),
        }
    }
}

impl<'a, T: Model> IntoIterator for &'a RelatedMany<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.loaded.get().map_or([].iter(), |v| v.iter())
    }
}
