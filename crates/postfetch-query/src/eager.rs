//! Eager-join configuration and join plan derivation.
//!
//! `select_related` relations arrive joined in the same raw result. This
//! module turns a query's eager-join configuration into the [`JoinPlan`]
//! used both by the backend (which columns to join) and by the hook
//! dispatcher (which related entities to transform).

use crate::config::QueryConfig;
use postfetch_core::{
    Error, JoinPlan, Model, QueryErrorKind, RelationshipInfo, Result, find_relationship,
};

/// A query's eager-join configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectRelated {
    /// No eager joins.
    #[default]
    None,
    /// Join every single-valued relation of the queried model, one level
    /// deep. Deeper levels need an explicit path or a follow-up query.
    All,
    /// Join exactly these dotted paths (`"obj"`, `"obj.thing"`).
    Paths(Vec<String>),
}

impl SelectRelated {
    /// Add explicit paths. Explicit paths replace a previous `All`.
    #[must_use]
    pub fn with_paths<I, S>(self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut existing = match self {
            SelectRelated::Paths(existing) => existing,
            SelectRelated::None | SelectRelated::All => Vec::new(),
        };
        existing.extend(paths.into_iter().map(Into::into));
        SelectRelated::Paths(existing)
    }

    /// Whether anything is joined.
    pub fn is_none(&self) -> bool {
        match self {
            SelectRelated::None => true,
            SelectRelated::All => false,
            SelectRelated::Paths(paths) => paths.iter().all(|p| p.trim().is_empty()),
        }
    }
}

/// Derive the join plan for a query on `M`.
///
/// `All` expands to every single-valued relation declared on `M`, one level.
/// Explicit paths are checked against the declared relationships: unknown or
/// multi-valued names are an `InvalidField` error when
/// `config.strict_select_related` is set and are dropped otherwise.
#[tracing::instrument(level = "debug", skip(config), fields(table = M::TABLE_NAME))]
pub fn derive_join_plan<M: Model>(
    select_related: &SelectRelated,
    config: &QueryConfig,
) -> Result<JoinPlan> {
    let plan = match select_related {
        SelectRelated::None => JoinPlan::new(),
        SelectRelated::All => {
            let mut plan = JoinPlan::new();
            for rel in M::RELATIONSHIPS.iter().filter(|r| r.kind.is_single_valued()) {
                plan.insert_path(&[rel.name]);
            }
            plan
        }
        SelectRelated::Paths(paths) => {
            let requested = JoinPlan::from_paths(paths);
            if requested.depth() > config.max_join_depth {
                return Err(Error::config(format!(
                    "select_related on '{}' joins {} levels deep; the limit is {}",
                    M::TABLE_NAME,
                    requested.depth(),
                    config.max_join_depth
                )));
            }
            checked_plan(
                M::TABLE_NAME,
                M::RELATIONSHIPS,
                &requested,
                config.strict_select_related,
            )?
        }
    };
    tracing::debug!(relations = plan.len(), depth = plan.depth(), "Derived join plan");
    Ok(plan)
}

fn checked_plan(
    table: &'static str,
    relationships: &'static [RelationshipInfo],
    requested: &JoinPlan,
    strict: bool,
) -> Result<JoinPlan> {
    let mut plan = JoinPlan::new();
    for (name, nested) in requested.iter() {
        let rel = find_relationship(relationships, name).filter(|r| r.kind.is_single_valued());
        let Some(rel) = rel else {
            if strict {
                return Err(invalid_relation(table, relationships, name));
            }
            tracing::warn!(table, relation = name, "Ignoring unknown select_related name");
            continue;
        };
        let child = checked_plan(rel.related_table, rel.related_relationships(), nested, strict)?;
        plan.insert(rel.name, child);
    }
    Ok(plan)
}

fn invalid_relation(
    table: &'static str,
    relationships: &[RelationshipInfo],
    name: &str,
) -> Error {
    let choices: Vec<&str> = relationships
        .iter()
        .filter(|r| r.kind.is_single_valued())
        .map(|r| r.name)
        .collect();
    let choices = if choices.is_empty() {
        "(none)".to_string()
    } else {
        choices.join(", ")
    };
    Error::query(
        QueryErrorKind::InvalidField,
        table,
        format!("Invalid field name given in select_related: '{name}'. Choices are: {choices}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use postfetch_core::{FieldInfo, RelationshipKind, Row, Value};

    struct Country;
    struct City;
    struct Team;

    macro_rules! stub_model {
        ($ty:ty, $table:literal, $rels:expr) => {
            impl Model for $ty {
                const TABLE_NAME: &'static str = $table;
                const PRIMARY_KEY: &'static [&'static str] = &["id"];
                const RELATIONSHIPS: &'static [RelationshipInfo] = $rels;

                fn fields() -> &'static [FieldInfo] {
                    static FIELDS: &[FieldInfo] = &[FieldInfo::new("id", "id").primary_key(true)];
                    FIELDS
                }

                fn to_row(&self) -> Vec<(&'static str, Value)> {
                    vec![]
                }

                fn from_row(_row: &Row) -> Result<Self> {
                    Err(Error::Custom("not used".to_string()))
                }

                fn primary_key_value(&self) -> Vec<Value> {
                    vec![]
                }

                fn is_new(&self) -> bool {
                    true
                }
            }
        };
    }

    stub_model!(Country, "countries", &[]);
    stub_model!(
        City,
        "cities",
        &[
            RelationshipInfo::new("country", "countries", RelationshipKind::ManyToOne)
                .local_key("country_id")
                .related::<Country>()
        ]
    );
    stub_model!(
        Team,
        "teams",
        &[
            RelationshipInfo::new("city", "cities", RelationshipKind::ManyToOne)
                .local_key("city_id")
                .related::<City>(),
            RelationshipInfo::new("rival", "teams", RelationshipKind::OneToOne)
                .local_key("rival_id")
                .related::<Team>(),
            RelationshipInfo::new("players", "players", RelationshipKind::OneToMany)
                .remote_key("team_id"),
        ]
    );

    #[test]
    fn none_gives_empty_plan() {
        let plan = derive_join_plan::<Team>(&SelectRelated::None, &QueryConfig::default()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn all_expands_single_valued_one_level() {
        let plan = derive_join_plan::<Team>(&SelectRelated::All, &QueryConfig::default()).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.child("city").is_some_and(JoinPlan::is_empty));
        assert!(plan.child("rival").is_some());
        assert!(plan.child("players").is_none());
        assert_eq!(plan.depth(), 1);
    }

    #[test]
    fn nested_paths_follow_related_metadata() {
        let select = SelectRelated::None.with_paths(["city.country", "rival.city"]);
        let plan = derive_join_plan::<Team>(&select, &QueryConfig::default()).unwrap();
        assert_eq!(
            plan.paths(),
            vec!["city.country".to_string(), "rival.city".to_string()]
        );
    }

    #[test]
    fn unknown_name_rejected_when_strict() {
        let select = SelectRelated::None.with_paths(["city.mayor"]);
        let err = derive_join_plan::<Team>(&select, &QueryConfig::default()).unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::InvalidField));
        assert!(err.to_string().contains("'mayor'"));
        assert!(err.to_string().contains("Choices are: country"));
    }

    #[test]
    fn multi_valued_relation_rejected() {
        let select = SelectRelated::None.with_paths(["players"]);
        let err = derive_join_plan::<Team>(&select, &QueryConfig::default()).unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::InvalidField));
    }

    #[test]
    fn unknown_name_dropped_when_lenient() {
        let select = SelectRelated::None.with_paths(["city", "bogus"]);
        let config = QueryConfig::new().strict_select_related(false);
        let plan = derive_join_plan::<Team>(&select, &config).unwrap();
        assert_eq!(plan.paths(), vec!["city".to_string()]);
    }

    #[test]
    fn depth_limit_enforced() {
        let select = SelectRelated::None.with_paths(["rival.rival.rival"]);
        let config = QueryConfig::new().max_join_depth(2);
        let err = derive_join_plan::<Team>(&select, &config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn explicit_paths_replace_all() {
        let select = SelectRelated::All.with_paths(["city"]);
        assert_eq!(select, SelectRelated::Paths(vec!["city".to_string()]));
        assert!(SelectRelated::Paths(vec![" ".to_string()]).is_none());
        assert!(!SelectRelated::All.is_none());
    }
}
