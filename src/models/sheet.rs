//! Raw cell grid of one normalized worksheet.

use super::Cell;

/// A value-only worksheet: rows of cells at their absolute positions.
///
/// Rows may be ragged in memory; reads past the end of a row return `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    /// File name the grid was read from (used for provenance).
    pub name: String,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Build a sheet from string literals; empty strings become nulls.
    pub fn from_strs(name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|r| {
                r.iter()
                    .map(|v| (!v.is_empty()).then(|| v.to_string()))
                    .collect()
            })
            .collect();
        Self::new(name, rows)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Widest row length.
    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    pub fn row(&self, idx: usize) -> &[Cell] {
        self.rows.get(idx).map(|r| r.as_slice()).unwrap_or(&[])
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Cell text, treating whitespace-only cells as empty.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.row(row)
            .get(col)
            .and_then(|c| c.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    /// Number of non-empty cells in a row.
    pub fn non_empty_count(&self, row: usize) -> usize {
        self.row(row)
            .iter()
            .filter(|c| c.as_deref().is_some_and(|s| !s.trim().is_empty()))
            .count()
    }

    pub fn is_blank_row(&self, row: usize) -> bool {
        self.non_empty_count(row) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_access_and_counts() {
        let sheet = Sheet::from_strs("t.csv", &[&["a", "", " "], &[], &["x", "y", "z"]]);
        assert_eq!(sheet.height(), 3);
        assert_eq!(sheet.width(), 3);
        assert_eq!(sheet.cell(0, 0), Some("a"));
        assert_eq!(sheet.cell(0, 2), None);
        assert_eq!(sheet.cell(5, 5), None);
        assert_eq!(sheet.non_empty_count(0), 1);
        assert!(sheet.is_blank_row(1));
        assert_eq!(sheet.non_empty_count(2), 3);
    }
}
