//! Join plans: the tree of relations a query eagerly joins.

use std::collections::BTreeMap;

/// Separator between relation names in a dotted path (`obj.thing`).
pub const PATH_SEPARATOR: char = '.';

/// A tree of joined relation names.
///
/// Each key is a single-valued relation name on the current model; its value
/// is the plan for the related model. An empty plan means "no joins".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinPlan {
    children: BTreeMap<String, JoinPlan>,
}

impl JoinPlan {
    /// Create an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a plan from dotted paths (`"obj"`, `"obj.thing"`).
    ///
    /// Empty segments are ignored, so `"obj..thing"` is the same as
    /// `"obj.thing"`.
    #[must_use]
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut plan = Self::new();
        for path in paths {
            let segments: Vec<&str> = path
                .as_ref()
                .split(PATH_SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            plan.insert_path(&segments);
        }
        plan
    }

    /// Insert one path, creating intermediate nodes as needed.
    pub fn insert_path(&mut self, segments: &[&str]) {
        let Some((head, rest)) = segments.split_first() else {
            return;
        };
        self.children
            .entry((*head).to_string())
            .or_default()
            .insert_path(rest);
    }

    /// Insert a relation with an existing sub-plan, merging if present.
    pub fn insert(&mut self, name: impl Into<String>, plan: JoinPlan) {
        let node = self.children.entry(name.into()).or_default();
        for (child, sub) in plan.children {
            node.insert(child, sub);
        }
    }

    /// Whether the plan joins nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of relations joined at this level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// The sub-plan for a relation at this level.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&JoinPlan> {
        self.children.get(name)
    }

    /// Iterate over `(relation, sub-plan)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &JoinPlan)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Length of the longest path in the plan.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.children
            .values()
            .map(|c| 1 + c.depth())
            .max()
            .unwrap_or(0)
    }

    /// Every root-to-leaf path, joined with `.`.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (name, child) in &self.children {
            if child.is_empty() {
                out.push(name.clone());
            } else {
                for rest in child.paths() {
                    out.push(format!("{name}{PATH_SEPARATOR}{rest}"));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_paths_merges_prefixes() {
        let plan = JoinPlan::from_paths(["obj", "obj.thing", "owner"]);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.child("obj").map(JoinPlan::len), Some(1));
        assert!(plan.child("owner").is_some_and(JoinPlan::is_empty));
        assert_eq!(plan.depth(), 2);
    }

    #[test]
    fn test_empty_segments_ignored() {
        let plan = JoinPlan::from_paths(["obj..thing", "", "."]);
        assert_eq!(plan.paths(), vec!["obj.thing".to_string()]);
    }

    #[test]
    fn test_insert_merges_subplans() {
        let mut plan = JoinPlan::from_paths(["obj.thing"]);
        plan.insert("obj", JoinPlan::from_paths(["owner"]));
        let obj = plan.child("obj").unwrap();
        assert!(obj.child("thing").is_some());
        assert!(obj.child("owner").is_some());
    }

    #[test]
    fn test_empty_plan() {
        let plan = JoinPlan::new();
        assert!(plan.is_empty());
        assert_eq!(plan.depth(), 0);
        assert!(plan.paths().is_empty());
    }

    mod property {
        use super::*;
        use proptest::prelude::*;

        fn path() -> impl Strategy<Value = Vec<String>> {
            prop::collection::vec("[a-c]{1,2}", 1..4)
        }

        proptest! {
            #[test]
            fn depth_is_longest_inserted_path(paths in prop::collection::vec(path(), 0..6)) {
                let dotted: Vec<String> = paths.iter().map(|p| p.join(".")).collect();
                let plan = JoinPlan::from_paths(&dotted);
                let longest = paths.iter().map(Vec::len).max().unwrap_or(0);
                prop_assert_eq!(plan.depth(), longest);
            }

            #[test]
            fn paths_round_trip_through_plan(paths in prop::collection::vec(path(), 0..6)) {
                let dotted: Vec<String> = paths.iter().map(|p| p.join(".")).collect();
                let plan = JoinPlan::from_paths(&dotted);
                prop_assert_eq!(JoinPlan::from_paths(plan.paths()), plan);
            }
        }
    }
}
