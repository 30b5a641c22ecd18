//! Keyed joins between record tables.
//!
//! Keys are compared after coercion, so `700` and `700.0` meet. The right
//! table is indexed by key with the first occurrence winning, which bounds the
//! output to one row per left row.

use std::collections::HashMap;

use crate::bronze::key::coerce_key;
use crate::models::{Table, TableError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Only left rows with a matching right row.
    Inner,
    /// Every left row; unmatched rows get null right columns.
    Left,
}

/// Row accounting for one join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub left_rows: usize,
    pub rows: usize,
    /// Left rows absent from the output.
    pub excluded: usize,
    /// Left rows whose key has no right-side match.
    pub unmatched: usize,
    /// Left rows whose key could not be coerced.
    pub unparseable: usize,
    /// Right rows shadowed by an earlier row with the same key.
    pub duplicate_ref_keys: usize,
}

fn key_index(table: &Table, key_col: usize) -> (HashMap<u64, usize>, usize) {
    let mut index = HashMap::with_capacity(table.len());
    let mut duplicates = 0;
    for row in 0..table.len() {
        if let Ok(key) = coerce_key(table.get(row, key_col)) {
            if index.contains_key(&key) {
                duplicates += 1;
            } else {
                index.insert(key, row);
            }
        }
    }
    (index, duplicates)
}

/// Join `right` onto `left` on the `key` column.
///
/// Output columns are the left columns followed by the right columns other
/// than the key. A right column whose name already exists gets `suffix`
/// appended.
pub fn join(
    left: &Table,
    right: &Table,
    key: &str,
    kind: JoinKind,
    suffix: &str,
) -> Result<(Table, JoinReport), TableError> {
    let left_key = left.require_column(key)?;
    let right_key = right.require_column(key)?;

    let right_cols: Vec<usize> = (0..right.width()).filter(|&c| c != right_key).collect();
    let mut columns = left.columns().to_vec();
    for &c in &right_cols {
        let name = &right.columns()[c];
        if columns.contains(name) {
            columns.push(format!("{}{}", name, suffix));
        } else {
            columns.push(name.clone());
        }
    }

    let (index, duplicate_ref_keys) = key_index(right, right_key);
    if duplicate_ref_keys > 0 {
        tracing::warn!("{} duplicate reference keys ignored in join on {}", duplicate_ref_keys, key);
    }

    let mut out = Table::new(columns);
    let mut report = JoinReport {
        left_rows: left.len(),
        duplicate_ref_keys,
        ..JoinReport::default()
    };

    for (i, row) in left.rows().iter().enumerate() {
        let matched = match coerce_key(left.get(i, left_key)) {
            Ok(k) => {
                let hit = index.get(&k).copied();
                if hit.is_none() {
                    report.unmatched += 1;
                }
                hit.map(|r| (k, r))
            }
            Err(reason) => {
                tracing::debug!("Join key at row {} unusable: {}", i, reason);
                report.unparseable += 1;
                None
            }
        };

        let mut new_row = row.clone();
        match matched {
            Some((k, r)) => {
                new_row[left_key] = Some(k.to_string());
                new_row.extend(right_cols.iter().map(|&c| right.rows()[r][c].clone()));
            }
            None if kind == JoinKind::Left => {
                new_row.resize(new_row.len() + right_cols.len(), None);
            }
            None => continue,
        }
        out.push_row(new_row);
    }

    report.rows = out.len();
    report.excluded = report.left_rows - report.rows;
    Ok((out, report))
}

/// Inner join; see [`join`].
pub fn inner_join(left: &Table, right: &Table, key: &str, suffix: &str) -> Result<(Table, JoinReport), TableError> {
    join(left, right, key, JoinKind::Inner, suffix)
}

/// Left join; see [`join`].
pub fn left_join(left: &Table, right: &Table, key: &str, suffix: &str) -> Result<(Table, JoinReport), TableError> {
    join(left, right, key, JoinKind::Left, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;

    fn cells(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|v| (!v.is_empty()).then(|| v.to_string())).collect()
    }

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::with_columns(columns);
        for row in rows {
            t.push_row(cells(row));
        }
        t
    }

    #[test]
    fn test_inner_join_excludes_unmatched() {
        let listings = table(&["stock_code", "company"], &[&["1", "A"], &["2", "B"], &["3", "C"]]);
        let registry = table(&["stock_code", "isin_code"], &[&["2", "X2"], &["3", "X3"], &["4", "X4"]]);

        let (out, report) = inner_join(&listings, &registry, "stock_code", "_isino").unwrap();
        let keys: Vec<_> = out.column_values(0).flatten().collect();
        assert_eq!(keys, vec!["2", "3"]);
        assert_eq!(out.get_by_name(1, "isin_code"), Some("X3"));
        assert_eq!(report.excluded, 1);
        assert_eq!(report.unmatched, 1);
        assert_eq!(report.rows, 2);
    }

    #[test]
    fn test_collisions_are_suffixed_and_key_shared() {
        let listings = table(&["source_file", "stock_code", "company"], &[&["Main_2010.csv", "700.0", "Tencent"]]);
        let registry = table(
            &["source_file", "company", "stock_code"],
            &[&["isino.csv", "TENCENT HOLDINGS", "700"]],
        );

        let (out, _) = inner_join(&listings, &registry, "stock_code", "_isino").unwrap();
        assert_eq!(
            out.columns(),
            &["source_file", "stock_code", "company", "source_file_isino", "company_isino"].map(String::from)
        );
        assert_eq!(out.get_by_name(0, "stock_code"), Some("700"));
        assert_eq!(out.get_by_name(0, "company_isino"), Some("TENCENT HOLDINGS"));
    }

    #[test]
    fn test_first_reference_row_wins() {
        let listings = table(&["stock_code"], &[&["5"]]);
        let registry = table(&["stock_code", "isin_code"], &[&["5", "FIRST"], &["5", "SECOND"]]);

        let (out, report) = inner_join(&listings, &registry, "stock_code", "_isino").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.get_by_name(0, "isin_code"), Some("FIRST"));
        assert_eq!(report.duplicate_ref_keys, 1);
    }

    #[test]
    fn test_unparseable_left_keys_are_excluded() {
        let listings = table(&["stock_code"], &[&["abc"], &[""], &["5"]]);
        let registry = table(&["stock_code", "isin_code"], &[&["5", "X5"]]);

        let (out, report) = inner_join(&listings, &registry, "stock_code", "_isino").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(report.unparseable, 2);
        assert_eq!(report.excluded, 2);
    }

    #[test]
    fn test_left_join_keeps_every_row() {
        let listings = table(&["stock_code", "company"], &[&["1", "A"], &["2", "B"]]);
        let names = table(&["stock_code", "hkex_co_name"], &[&["2", "BEE"]]);

        let (out, report) = left_join(&listings, &names, "stock_code", "_secstkorder").unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.get_by_name(0, "hkex_co_name"), None);
        assert_eq!(out.get_by_name(1, "hkex_co_name"), Some("BEE"));
        assert_eq!(report.excluded, 0);
        assert_eq!(report.unmatched, 1);
    }

    #[test]
    fn test_missing_key_column() {
        let a = Table::with_columns(&["x"]);
        let b = Table::with_columns(&["stock_code"]);
        assert!(matches!(
            inner_join(&a, &b, "stock_code", "_isino"),
            Err(TableError::MissingColumn(_))
        ));
    }
}
