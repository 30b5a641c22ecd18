//! In-memory tables with named columns and nullable text cells.
//!
//! Every stage works on whole tables: extraction produces them, joins combine
//! them and the sinks persist them. Cells are kept as text so a table read back
//! from CSV is identical to the one that was written.

use thiserror::Error;

/// A single cell. `None` is an empty / null value.
pub type Cell = Option<String>;

/// One row of cells, always as wide as the table's column list.
pub type Row = Vec<Cell>;

/// Errors raised by table operations.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Column mismatch: expected [{expected}], found [{found}]")]
    ColumnMismatch { expected: String, found: String },
}

/// A named-column table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Create an empty table with the given column names.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create an empty table from static column names.
    pub fn with_columns(columns: &[&str]) -> Self {
        Self::new(columns.iter().map(|c| c.to_string()).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of a column by name, or an error naming the column.
    pub fn require_column(&self, name: &str) -> Result<usize, TableError> {
        self.column_index(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Append a row, padding missing trailing cells with nulls and dropping
    /// cells beyond the table width.
    pub fn push_row(&mut self, mut row: Row) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    /// Cell text at `(row, column)`, `None` when null or out of range.
    pub fn get(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    /// Cell text at `row` in the named column.
    pub fn get_by_name(&self, row: usize, column: &str) -> Option<&str> {
        self.column_index(column).and_then(|c| self.get(row, c))
    }

    /// Overwrite one cell.
    pub fn set(&mut self, row: usize, column: usize, value: Cell) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value;
        }
    }

    /// Remove rows by index. Indices may be unsorted; duplicates are ignored.
    pub fn remove_rows(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }
        let mut drop = vec![false; self.rows.len()];
        for &i in indices {
            if let Some(flag) = drop.get_mut(i) {
                *flag = true;
            }
        }
        let mut idx = 0;
        self.rows.retain(|_| {
            let keep = !drop[idx];
            idx += 1;
            keep
        });
    }

    /// Append all rows of `other`, which must have identical columns.
    pub fn append(&mut self, other: Table) -> Result<(), TableError> {
        if other.columns != self.columns {
            return Err(TableError::ColumnMismatch {
                expected: self.columns.join(","),
                found: other.columns.join(","),
            });
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Iterate over the values of one column.
    pub fn column_values(&self, column: usize) -> impl Iterator<Item = Option<&str>> {
        self.rows
            .iter()
            .map(move |r| r.get(column).and_then(|c| c.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(s: &str) -> Cell {
        Some(s.to_string())
    }

    #[test]
    fn test_push_row_pads_and_truncates() {
        let mut table = Table::with_columns(&["a", "b", "c"]);
        table.push_row(vec![cell("1")]);
        table.push_row(vec![cell("1"), cell("2"), cell("3"), cell("4")]);

        assert_eq!(table.rows()[0], vec![cell("1"), None, None]);
        assert_eq!(table.rows()[1].len(), 3);
    }

    #[test]
    fn test_set_and_get_by_name() {
        let mut table = Table::with_columns(&["a", "b"]);
        table.push_row(vec![cell("1"), cell("2")]);

        table.set(0, 1, cell("3"));
        table.set(5, 0, cell("ignored"));
        assert_eq!(table.get_by_name(0, "b"), Some("3"));
        assert_eq!(table.get_by_name(0, "missing"), None);
        assert!(matches!(
            table.require_column("missing"),
            Err(TableError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_remove_rows_keeps_order() {
        let mut table = Table::with_columns(&["a"]);
        for v in ["1", "2", "3", "4"] {
            table.push_row(vec![cell(v)]);
        }
        table.remove_rows(&[2, 0, 2]);
        let values: Vec<_> = table.column_values(0).collect();
        assert_eq!(values, vec![Some("2"), Some("4")]);
    }

    #[test]
    fn test_append_requires_same_columns() {
        let mut a = Table::with_columns(&["x"]);
        let b = Table::with_columns(&["y"]);
        assert!(matches!(
            a.append(b),
            Err(TableError::ColumnMismatch { .. })
        ));
    }
}
