//! Query configuration.

use postfetch_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default limit on how many relations deep `select_related` may join.
pub const DEFAULT_MAX_JOIN_DEPTH: usize = 8;

/// Settings applied to every query a [`Database`](crate::Database) creates.
///
/// Deserializable so it can sit in an application's config file; missing
/// keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Longest `select_related` path accepted, in relations.
    pub max_join_depth: usize,
    /// Reject unknown or multi-valued relation names in `select_related`
    /// instead of ignoring them.
    pub strict_select_related: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_join_depth: DEFAULT_MAX_JOIN_DEPTH,
            strict_select_related: true,
        }
    }
}

impl QueryConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum join depth.
    pub fn max_join_depth(mut self, depth: usize) -> Self {
        self.max_join_depth = depth;
        self
    }

    /// Set strict relation-name checking.
    pub fn strict_select_related(mut self, strict: bool) -> Self {
        self.strict_select_related = strict;
        self
    }

    /// Check the settings are usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_join_depth == 0 {
            return Err(Error::config("max_join_depth must be at least 1"));
        }
        Ok(())
    }
}
