//! Continuation rows in Main Board listing reports.
//!
//! A listing may span up to three physical rows marked `(a)`, `(b)` and `(c)`
//! in the offer-location column, with the stock code only on the `(a)` row.
//! Keys are inherited by position, not by content.

use crate::models::Table;

pub const MARKER_A: &str = "(a)";
pub const MARKER_B: &str = "(b)";
pub const MARKER_C: &str = "(c)";

fn marker(table: &Table, row: usize, marker_col: usize) -> Option<&str> {
    table.get(row, marker_col).map(str::trim)
}

fn key_is_empty(table: &Table, row: usize, key_col: usize) -> bool {
    table.get(row, key_col).map_or(true, |k| k.trim().is_empty())
}

/// Fill empty keys of `(b)`/`(c)` rows from the preceding `(a)` row.
///
/// - a `(b)` row inherits from row `i-1` when that row is `(a)`;
/// - a `(c)` row inherits from row `i-2` when `i-1` is `(b)` and `i-2` is `(a)`.
///
/// Rows with their own key are left untouched. Returns the number of keys filled.
pub fn resolve_continuations(table: &mut Table, key_col: usize, marker_col: usize) -> usize {
    let mut resolved = 0;

    for i in 0..table.len() {
        if !key_is_empty(table, i, key_col) {
            continue;
        }
        let source = match marker(table, i, marker_col) {
            Some(MARKER_B) if i >= 1 && marker(table, i - 1, marker_col) == Some(MARKER_A) => {
                Some(i - 1)
            }
            Some(MARKER_C)
                if i >= 2
                    && marker(table, i - 1, marker_col) == Some(MARKER_B)
                    && marker(table, i - 2, marker_col) == Some(MARKER_A) =>
            {
                Some(i - 2)
            }
            _ => None,
        };

        if let Some(src) = source {
            let key = table.get(src, key_col).map(str::to_string);
            if key.is_some() {
                table.set(i, key_col, key);
                resolved += 1;
            }
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, Option<&str>)]) -> Table {
        let mut t = Table::with_columns(&["offer_location", "stock_code"]);
        for (m, k) in rows {
            t.push_row(vec![Some(m.to_string()), k.map(str::to_string)]);
        }
        t
    }

    fn keys(t: &Table) -> Vec<Option<&str>> {
        t.column_values(1).collect()
    }

    #[test]
    fn test_abc_inherits_key() {
        let mut t = table(&[("(a)", Some("5")), ("(b)", None), ("(c)", None)]);
        assert_eq!(resolve_continuations(&mut t, 1, 0), 2);
        assert_eq!(keys(&t), vec![Some("5"), Some("5"), Some("5")]);
    }

    #[test]
    fn test_c_without_b_is_not_resolved() {
        let mut t = table(&[("(a)", Some("5")), ("(c)", None)]);
        assert_eq!(resolve_continuations(&mut t, 1, 0), 0);
        assert_eq!(keys(&t), vec![Some("5"), None]);
    }

    #[test]
    fn test_own_key_kept() {
        let mut t = table(&[("(a)", Some("5")), ("(b)", Some("6"))]);
        resolve_continuations(&mut t, 1, 0);
        assert_eq!(keys(&t), vec![Some("5"), Some("6")]);
    }

    #[test]
    fn test_b_after_unmarked_row() {
        let mut t = table(&[("", Some("5")), ("(b)", None)]);
        assert_eq!(resolve_continuations(&mut t, 1, 0), 0);
    }
}
