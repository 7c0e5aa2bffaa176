//! Row representation for statement results.

use std::sync::Arc;

use dbkit_types::{FromValue, TypeError, Value};

/// Result of running a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column metadata, empty for statements that return no rows.
    pub columns: Arc<[Column]>,
    /// Returned rows.
    pub rows: Vec<Row>,
    /// Rows changed by the statement.
    pub rows_affected: u64,
}

impl QueryResult {
    /// Result of a statement that returns no rows.
    #[must_use]
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// Build a result set from column names and row values.
    ///
    /// Each row must have one value per column; rows are not padded.
    #[must_use]
    pub fn with_rows(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        let columns: Arc<[Column]> = columns.into();
        let rows = rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect();
        Self {
            columns,
            rows,
            rows_affected: 0,
        }
    }

    /// Check if no rows were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A row from a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[Column]>,
    values: Vec<Value>,
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column index.
    pub index: usize,
    /// SQL type name.
    pub type_name: String,
    /// Whether the column is nullable.
    pub nullable: bool,
}

impl Column {
    /// Create column metadata.
    pub fn new(name: impl Into<String>, index: usize, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index,
            type_name: type_name.into(),
            nullable: true,
        }
    }
}

impl Row {
    /// Create a new row from shared columns and values.
    #[must_use]
    pub fn new(columns: Arc<[Column]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Get a value by column index.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, TypeError> {
        self.values
            .get(index)
            .ok_or_else(|| TypeError::TypeMismatch {
                expected: "valid column index",
                actual: format!("index {index} out of bounds"),
            })
            .and_then(T::from_value)
    }

    /// Get a value by column name (case-insensitive).
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T, TypeError> {
        let index = self.position(name).ok_or_else(|| TypeError::TypeMismatch {
            expected: "valid column name",
            actual: format!("column '{name}' not found"),
        })?;

        self.get(index)
    }

    /// Try to get a value by column index, returning None if NULL or not found.
    pub fn try_get<T: FromValue>(&self, index: usize) -> Option<T> {
        self.values
            .get(index)
            .and_then(|v| T::from_value_nullable(v).ok().flatten())
    }

    /// Get the raw value by column name.
    #[must_use]
    pub fn get_raw_by_name(&self, name: &str) -> Option<&Value> {
        self.position(name).and_then(|i| self.values.get(i))
    }

    /// Get the number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the column metadata.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Iterate over (column, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Column, &Value)> {
        self.columns.iter().zip(self.values.iter())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
