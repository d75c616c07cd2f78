//! Structured query descriptor
//!
//! [`SelectCtrl`] is the harness's one query API. Scenarios build it; the
//! access layer lowers it to dialect SQL or to a search-engine request body.
//! WHERE preserves insertion order (an [`IndexMap`]) so the lowered form is
//! deterministic for a given program; the round-trip tests depend on that.
//!
//! Grammar carried inside the string values:
//! - predicate terms: bare value (equality), `ne(v)`, `lt(v)`, `le(v)`,
//!   `gt(v)`, `ge(v)`, `like(s)`, `hlike(s)`, `tlike(s)`, `isnull()`,
//!   `notnull()`
//! - order terms: `asc(col)`, `desc(col)`, `nearest(col;L2;[v0,v1,…])`
//!
//! Parsing of those strings is the access layer's job; this type only holds
//! them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Result-window control
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Maximum rows to return; 0 = backend default
    pub limit: i64,
    /// Rows to skip
    pub offset: i64,
}

/// Structured SELECT descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectCtrl {
    /// Projected fields; empty = `*`. The single field `COUNT(0)` routes
    /// search backends to `_count` instead of `_search`.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Field → predicate terms, AND-conjoined across fields
    #[serde(default, rename = "where")]
    pub where_: IndexMap<String, Vec<String>>,
    /// Order terms, applied in sequence
    #[serde(default)]
    pub order: Vec<String>,
    /// Result window
    #[serde(default)]
    pub page: Page,
    /// Fold integer/time/enum predicates into intervals and detect empty
    /// intersections before touching the backend
    #[serde(default)]
    pub optimize_conditions: bool,
}

impl SelectCtrl {
    /// Empty control (selects `*` with no predicates)
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field list
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Add predicate terms for one field
    pub fn filter<S: Into<String>>(mut self, field: &str, terms: Vec<S>) -> Self {
        self.where_
            .entry(field.to_string())
            .or_default()
            .extend(terms.into_iter().map(Into::into));
        self
    }

    /// Builder-style order terms
    pub fn with_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = order.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style page
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.page.limit = limit;
        self
    }

    /// Whether this control is a bare count (`COUNT(0)` as the only field)
    pub fn is_count(&self) -> bool {
        self.fields.len() == 1 && self.fields[0].eq_ignore_ascii_case("count(0)")
    }
}
