//! Routing classified rows to the model's post-fetch hooks.

use crate::hooks::{Fetched, PostFetch};
use crate::plan::JoinPlan;
use crate::{Model, Result};

/// Applies post-fetch hooks to classified rows.
///
/// Stateless; reads the join plan and never fetches.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookDispatcher;

impl HookDispatcher {
    /// Transform one row according to its shape.
    ///
    /// Entity rows go through the entity hook and then through
    /// [`HookDispatcher::apply_entity_hooks`] along `plan`. Mapping, tuple and
    /// scalar rows are replaced wholesale by their hook's return value.
    pub fn dispatch_row<M: PostFetch>(
        row: Fetched<M>,
        fields: &[String],
        plan: &JoinPlan,
    ) -> Result<Fetched<M>> {
        match row {
            Fetched::Model(model) => {
                let mut model = M::post_fetch_hook(model)?;
                Self::apply_entity_hooks(&mut model, plan)?;
                Ok(Fetched::Model(model))
            }
            Fetched::Values(values) => M::post_fetch_values_hook(values, fields).map(Fetched::Values),
            Fetched::ValuesList(values) => {
                M::post_fetch_values_list_hook(values, fields).map(Fetched::ValuesList)
            }
            Fetched::Flat(value) => {
                let field = fields.first().map_or("", String::as_str);
                M::post_fetch_values_list_flat_hook(value, field).map(Fetched::Flat)
            }
        }
    }

    /// Run entity hooks on every joined relation of `entity` named in `plan`,
    /// writing the results back and descending into nested plans.
    ///
    /// Relations outside the plan are untouched. A null or unloaded relation
    /// is skipped without invoking any hook.
    pub fn apply_entity_hooks<M: Model>(entity: &mut M, plan: &JoinPlan) -> Result<()> {
        for (name, nested) in plan.iter() {
            let Some(slot) = entity.joined_mut(name) else {
                tracing::warn!(
                    table = M::TABLE_NAME,
                    relation = name,
                    "Join plan names a relation the model does not expose"
                );
                continue;
            };
            if !slot.is_present() {
                tracing::trace!(
                    table = M::TABLE_NAME,
                    relation = name,
                    "Skipping absent relation"
                );
                continue;
            }
            tracing::trace!(table = M::TABLE_NAME, relation = name, "Applying relation hook");
            slot.apply_post_fetch(nested)?;
        }
        Ok(())
    }
}
