//! Batch prefetch of one-to-many relations.
//!
//! After a parent query has cached its transformed rows, each prefetch
//! lookup runs one follow-up query for all parents at once. That query goes
//! through its own [`QuerySet`](crate::QuerySet), so the related model's
//! hooks run there, and nested lookups resolve one level further down.

use crate::backend::Backend;
use crate::database::Database;
use postfetch_core::{
    Error, JoinPlan, Model, PostFetch, QueryErrorKind, RelatedMany, Result, Value,
};

/// One prefetch lookup and the lookups nested below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchLookup {
    name: String,
    nested: Vec<PrefetchLookup>,
}

impl PrefetchLookup {
    /// A lookup with nothing nested.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nested: Vec::new(),
        }
    }

    /// Parse dotted paths (`"objs"`, `"objs.parents"`) into lookups, merging
    /// shared prefixes.
    pub fn from_paths<I, S>(paths: I) -> Vec<PrefetchLookup>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_tree(&JoinPlan::from_paths(paths))
    }

    fn from_tree(tree: &JoinPlan) -> Vec<PrefetchLookup> {
        tree.iter()
            .map(|(name, nested)| PrefetchLookup {
                name: name.to_string(),
                nested: Self::from_tree(nested),
            })
            .collect()
    }

    /// Relation name on the parent model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lookups to resolve on the prefetched children.
    pub fn nested(&self) -> &[PrefetchLookup] {
        &self.nested
    }
}

/// Models whose collections can be batch-prefetched.
///
/// Implementations match on the lookup name and hand the matching
/// collection to [`prefetch_many`]. The default knows no relations.
pub trait Prefetch: PostFetch {
    /// Fill the collection named by `lookup` on every parent.
    #[allow(unused_variables)]
    fn prefetch_related<B: Backend>(
        db: &Database<B>,
        parents: &mut [Self],
        lookup: &PrefetchLookup,
    ) -> Result<()> {
        Err(unknown_prefetch::<Self>(lookup))
    }
}

/// The error for a lookup naming no prefetchable relation on `M`.
pub fn unknown_prefetch<M: Model>(lookup: &PrefetchLookup) -> Error {
    Error::query(
        QueryErrorKind::InvalidField,
        M::TABLE_NAME,
        format!(
            "Cannot find '{}' on {} object, '{}' is an invalid parameter to prefetch_related()",
            lookup.name(),
            M::TABLE_NAME,
            lookup.name()
        ),
    )
}

/// Resolve every lookup against `parents`, in order.
#[tracing::instrument(level = "debug", skip_all, fields(table = M::TABLE_NAME, parents = parents.len()))]
pub fn prefetch_related_objects<M: Prefetch, B: Backend>(
    db: &Database<B>,
    parents: &mut [M],
    lookups: &[PrefetchLookup],
) -> Result<()> {
    if parents.is_empty() {
        return Ok(());
    }
    for lookup in lookups {
        M::prefetch_related(db, parents, lookup)?;
    }
    Ok(())
}

/// Prefetch a one-to-many collection for every parent with one query.
///
/// Children are fetched with `fk_column IN (parent keys)`, transformed by
/// their own hooks, prefetched further along `lookup.nested()`, and then
/// distributed to their parents in result order.
pub fn prefetch_many<P, C, B, F>(
    db: &Database<B>,
    parents: &mut [P],
    lookup: &PrefetchLookup,
    mut slot: F,
) -> Result<()>
where
    P: Model,
    C: Prefetch,
    B: Backend,
    F: FnMut(&mut P) -> &mut RelatedMany<C>,
{
    let Some(first) = parents.first_mut() else {
        return Ok(());
    };
    let fk_column = slot(first).fk_column();

    let keys: Vec<Option<Value>> = parents
        .iter()
        .map(|p| {
            p.primary_key_value()
                .into_iter()
                .next()
                .filter(|v| !v.is_null())
        })
        .collect();
    let mut distinct: Vec<Value> = Vec::new();
    for key in keys.iter().flatten() {
        if !distinct.iter().any(|k| k.key_eq(key)) {
            distinct.push(key.clone());
        }
    }

    let children = if distinct.is_empty() {
        Vec::new()
    } else {
        db.query::<C>()
            .filter_in(fk_column, distinct)
            .prefetch_lookups(lookup.nested().to_vec())
            .all()?
    };
    tracing::debug!(
        relation = lookup.name(),
        children = children.len(),
        "Prefetched related collection"
    );

    let mut buckets: Vec<Vec<C>> = parents.iter().map(|_| Vec::new()).collect();
    for child in children {
        let fk = child
            .to_row()
            .into_iter()
            .find_map(|(name, value)| (name == fk_column).then_some(value))
            .unwrap_or(Value::Null);
        let owner = keys
            .iter()
            .position(|k| k.as_ref().is_some_and(|k| k.key_eq(&fk)));
        if let Some(idx) = owner {
            buckets[idx].push(child);
        }
    }

    for ((parent, bucket), key) in parents.iter_mut().zip(buckets).zip(keys) {
        let collection = slot(parent);
        if let Some(key) = key {
            collection.set_parent_pk(key);
        }
        collection.replace_loaded(bucket);
    }
    Ok(())
}
