//! Result-set container returned by session reads

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Column-named rowset.
///
/// Also serves as the "empty rows" sentinel: search-backend selects return
/// `Rows::empty()` both when the predicate optimizer proves an empty
/// intersection and when the backend answers 404 for the target index.
/// Callers cannot distinguish the two cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rows {
    /// Column names, in projection order
    pub columns: Vec<String>,
    /// Row values, aligned with `columns`
    pub rows: Vec<Vec<Value>>,
}

impl Rows {
    /// Empty rowset with no columns
    pub fn empty() -> Self {
        Rows::default()
    }

    /// Rowset with the given column headers and no rows yet
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rows {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the rowset holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First value of the first row, the common shape of COUNT results
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|r| r.first())
    }

    /// Value at (row, named column)
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_of_count_result() {
        let mut rows = Rows::with_columns(["count"]);
        rows.rows.push(vec![Value::I64(42)]);
        assert_eq!(rows.scalar(), Some(&Value::I64(42)));
        assert_eq!(Rows::empty().scalar(), None);
    }

    #[test]
    fn value_by_column_name() {
        let mut rows = Rows::with_columns(["id", "name"]);
        rows.rows.push(vec![Value::I64(1), Value::from("alpha")]);
        assert_eq!(rows.value(0, "name"), Some(&Value::from("alpha")));
        assert_eq!(rows.value(0, "nope"), None);
        assert_eq!(rows.value(1, "id"), None);
    }
}
