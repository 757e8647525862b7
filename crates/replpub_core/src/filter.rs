//! Table name filtering.
//!
//! Decides which user tables are replicated. The publisher only depends on
//! [`TableFilter`]; [`TableMatcher`] is the default implementation built
//! from the configured include/exclude patterns.

use crate::error::{PublisherError, PublisherResult};
use regex::{Regex, RegexBuilder};

/// Answers whether a table is subject to replication.
pub trait TableFilter: Send + Sync {
    /// Returns true if `table_name` should be replicated.
    fn matches(&self, table_name: &str) -> bool;
}

/// Include/exclude regular expression matcher.
///
/// Patterns must match the whole table name and ignore case. An empty
/// include pattern accepts every table; the exclude pattern wins over the
/// include pattern.
#[derive(Debug, Clone)]
pub struct TableMatcher {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl TableMatcher {
    /// Compiles a matcher. Empty patterns are ignored.
    pub fn new(include: &str, exclude: &str) -> PublisherResult<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Creates a matcher accepting every table.
    #[must_use]
    pub fn accept_all() -> Self {
        Self {
            include: None,
            exclude: None,
        }
    }
}

impl TableFilter for TableMatcher {
    fn matches(&self, table_name: &str) -> bool {
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(table_name) {
                return false;
            }
        }
        self.include
            .as_ref()
            .map_or(true, |include| include.is_match(table_name))
    }
}

fn compile(pattern: &str) -> PublisherResult<Option<Regex>> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Ok(None);
    }

    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| {
            PublisherError::invalid_operation(format!("invalid table filter '{pattern}': {e}"))
        })
}
