//! ISIN registry extraction (`isino`, `isinsehk`) and security-name enrichment
//! (`secstkorder`).

use crate::models::{Sheet, Table, TableError, ISIN_COLUMNS, SEC_NAME_COLUMNS};
use crate::silver::join::left_join;

use super::cell::{collapse_whitespace, normalize_cell};
use super::key::{apply_key_coercion, RejectedRow};
use super::layout::{find_header, is_column_empty, scan, BlankRows, LayoutError, LayoutRules};
use super::Extraction;

/// ISIN tables: header of at least three cells, region ends at the first row
/// whose first column is empty.
pub const ISIN_RULES: LayoutRules = LayoutRules {
    min_header_cells: 3,
    header_terms: &[],
    blank_rows: BlankRows::Stop,
    stop_on_empty_column: Some(0),
    terminal_markers: &[],
};

pub const SEC_NAME_RULES: LayoutRules = LayoutRules {
    min_header_cells: 2,
    ..ISIN_RULES
};

/// Number of positional value columns in an ISIN table.
const ISIN_VALUE_COLUMNS: usize = 6;

/// Extract an ISIN table starting the scan at `start`.
fn extract_isin_from(sheet: &Sheet, start: usize) -> Result<Extraction, LayoutError> {
    let region = scan(sheet, start, &ISIN_RULES)?;
    let company_col = 1;
    let key_col = 3;

    // Registry columns minus the trailing enrichment column.
    let mut table = Table::with_columns(&ISIN_COLUMNS[..ISIN_COLUMNS.len() - 1]);
    for &row in &region.data_rows {
        let mut out = Vec::with_capacity(ISIN_VALUE_COLUMNS + 1);
        out.push(Some(sheet.name.clone()));
        for col in 0..ISIN_VALUE_COLUMNS {
            out.push(normalize_cell(sheet.row(row).get(col).and_then(|c| c.as_deref())));
        }
        if let Some(company) = out[company_col].as_deref() {
            out[company_col] = Some(collapse_whitespace(company));
        }
        table.push_row(out);
    }

    let rejected = apply_key_coercion(&mut table, key_col, &sheet.name);
    Ok(Extraction { table, rejected })
}

/// Extract the `isino` registry table.
pub fn extract_isino(sheet: &Sheet) -> Result<Extraction, LayoutError> {
    extract_isin_from(sheet, 0)
}

/// Extract the `isinsehk` registry table.
///
/// The workbook opens with an unrelated table; scanning restarts after the
/// first empty-first-column row that follows the first header.
pub fn extract_isinsehk(sheet: &Sheet) -> Result<Extraction, LayoutError> {
    let first_header = find_header(sheet, 0, &ISIN_RULES)?;
    let gap = (first_header + 1..sheet.height())
        .find(|&row| is_column_empty(sheet, row, 0))
        .ok_or_else(|| LayoutError::RegionNotFound {
            sheet: sheet.name.clone(),
            detail: "could not find the end of the first table".to_string(),
        })?;
    extract_isin_from(sheet, gap + 1)
}

/// Extract `stock_code, hkex_co_name` from the security list.
pub fn extract_security_names(sheet: &Sheet) -> Result<Extraction, LayoutError> {
    let region = scan(sheet, 0, &SEC_NAME_RULES)?;
    let mut table = Table::with_columns(SEC_NAME_COLUMNS);
    for &row in &region.data_rows {
        table.push_row(
            (0..SEC_NAME_COLUMNS.len())
                .map(|col| normalize_cell(sheet.row(row).get(col).and_then(|c| c.as_deref())))
                .collect(),
        );
    }
    let rejected = apply_key_coercion(&mut table, 0, &sheet.name);
    Ok(Extraction { table, rejected })
}

/// Combine `isino` and `isinsehk` rows and left-join security names on
/// `stock_code`. The first name listed for a code wins.
pub fn build_registry(
    isino: Extraction,
    isinsehk: Extraction,
    names: &Table,
) -> Result<(Table, Vec<RejectedRow>), TableError> {
    let mut combined = isino.table;
    combined.append(isinsehk.table)?;

    let (registry, report) = left_join(&combined, names, "stock_code", "_secstkorder")?;
    tracing::debug!(
        "Security names matched {} of {} registry rows",
        report.rows - report.unmatched - report.unparseable,
        report.rows
    );

    let mut rejected = isino.rejected;
    rejected.extend(isinsehk.rejected);
    Ok((registry, rejected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isino_sheet() -> Sheet {
        Sheet::from_strs(
            "isino.csv",
            &[
                &["ISINs assigned by other numbering agencies"],
                &["Name", "ISIN", "Stock Code", "Type", "Place", "Agency"],
                &["ALPHA   HOLDINGS\nLTD", "KYG000000001", "700", "ORD", "KY", "ANNA"],
                &["BETA LTD", "BMG000000002", "5", "ORD", "BM", "ANNA"],
                &["\"\"", "XX", "abc", "", "", ""],
                &[],
                &["National numbering agencies"],
            ],
        )
    }

    #[test]
    fn test_isino_positional_columns() {
        let extraction = extract_isino(&isino_sheet()).unwrap();
        let table = &extraction.table;
        assert_eq!(table.len(), 2);
        assert_eq!(table.get_by_name(0, "company"), Some("ALPHA HOLDINGS LTD"));
        assert_eq!(table.get_by_name(0, "isin_code"), Some("KYG000000001"));
        assert_eq!(table.get_by_name(1, "national_agency"), Some("ANNA"));
        assert_eq!(extraction.rejected.len(), 1);
    }

    #[test]
    fn test_isinsehk_skips_first_table() {
        let sheet = Sheet::from_strs(
            "isinsehk.csv",
            &[
                &["Summary", "Count", "Note"],
                &["Equity", "10", "x"],
                &[],
                &["Name", "ISIN", "Stock Code"],
                &["GAMMA", "HK0000000003", "3"],
            ],
        );
        let extraction = extract_isinsehk(&sheet).unwrap();
        assert_eq!(extraction.table.len(), 1);
        assert_eq!(extraction.table.get_by_name(0, "stock_code"), Some("3"));
        // Missing trailing columns are padded with nulls.
        assert_eq!(extraction.table.get_by_name(0, "national_agency"), None);
    }

    #[test]
    fn test_registry_left_join_first_name() {
        let isino = extract_isino(&isino_sheet()).unwrap();
        let empty = Extraction {
            table: Table::with_columns(&ISIN_COLUMNS[..ISIN_COLUMNS.len() - 1]),
            rejected: Vec::new(),
        };
        let names = extract_security_names(&Sheet::from_strs(
            "secstkorder.csv",
            &[
                &["Stock Code", "Name"],
                &["700", "ALPHA"],
                &["700", "ALPHA DUP"],
                &[],
            ],
        ))
        .unwrap();

        let (registry, rejected) = build_registry(isino, empty, &names.table).unwrap();
        assert_eq!(registry.columns().len(), ISIN_COLUMNS.len());
        assert_eq!(registry.get_by_name(0, "hkex_co_name"), Some("ALPHA"));
        assert_eq!(registry.get_by_name(1, "hkex_co_name"), None);
        assert_eq!(rejected.len(), 1);
    }
}
