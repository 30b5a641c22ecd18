//! Main Board and GEM new-listing report extraction.

use crate::models::{Sheet, Table, GEM_COLUMNS, MAIN_COLUMNS};

use super::cell::normalize_cell;
use super::continuation::resolve_continuations;
use super::key::apply_key_coercion;
use super::layout::{header_columns, scan, BlankRows, LayoutError, LayoutRules};
use super::Extraction;

/// Main Board: header mentions both "company" and "code".
pub const MAIN_RULES: LayoutRules = LayoutRules {
    min_header_cells: 3,
    header_terms: &["company", "code"],
    blank_rows: BlankRows::Skip,
    stop_on_empty_column: None,
    terminal_markers: &["total", "remarks"],
};

pub const GEM_RULES: LayoutRules = LayoutRules {
    min_header_cells: 3,
    header_terms: &[],
    blank_rows: BlankRows::Skip,
    stop_on_empty_column: None,
    terminal_markers: &["total"],
};

/// Build a table from the data rows, reading only the non-empty header columns
/// and mapping them positionally onto `columns` (after `source_file`).
fn collect_rows(sheet: &Sheet, rules: &LayoutRules, columns: &[&str]) -> Result<Table, LayoutError> {
    let region = scan(sheet, 0, rules)?;
    let value_cols: Vec<usize> = header_columns(sheet, region.header_row)
        .into_iter()
        .take(columns.len() - 1)
        .collect();

    let mut table = Table::with_columns(columns);
    for &row in &region.data_rows {
        let mut out = Vec::with_capacity(columns.len());
        out.push(Some(sheet.name.clone()));
        for &col in &value_cols {
            out.push(normalize_cell(sheet.row(row).get(col).and_then(|c| c.as_deref())));
        }
        if out.iter().skip(1).all(Option::is_none) {
            continue;
        }
        table.push_row(out);
    }

    tracing::debug!(
        "{}: header at row {}, {} data rows",
        sheet.name,
        region.header_row,
        table.len()
    );
    Ok(table)
}

/// Extract one Main Board report.
///
/// Continuation rows are resolved before key coercion so `(b)`/`(c)` rows
/// carry the stock code of their `(a)` row.
pub fn extract_main(sheet: &Sheet) -> Result<Extraction, LayoutError> {
    let mut table = collect_rows(sheet, &MAIN_RULES, MAIN_COLUMNS)?;
    let key_col = 2;
    let marker_col = MAIN_COLUMNS.len() - 1;

    let resolved = resolve_continuations(&mut table, key_col, marker_col);
    if resolved > 0 {
        tracing::debug!("{}: resolved {} continuation rows", sheet.name, resolved);
    }

    let rejected = apply_key_coercion(&mut table, key_col, &sheet.name);
    Ok(Extraction { table, rejected })
}

/// Extract one GEM report. Rows with an empty second value column are dropped
/// before key coercion.
pub fn extract_gem(sheet: &Sheet) -> Result<Extraction, LayoutError> {
    let mut table = collect_rows(sheet, &GEM_RULES, GEM_COLUMNS)?;
    let key_col = 2;

    let empty_second: Vec<usize> = (0..table.len())
        .filter(|&row| table.get(row, 2).is_none())
        .collect();
    if !empty_second.is_empty() {
        tracing::debug!(
            "{}: dropping {} rows with empty second column",
            sheet.name,
            empty_second.len()
        );
        table.remove_rows(&empty_second);
    }

    let rejected = apply_key_coercion(&mut table, key_col, &sheet.name);
    Ok(Extraction { table, rejected })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_sheet() -> Sheet {
        Sheet::from_strs(
            "Main_2010.csv",
            &[
                &["New Listing Report 2010"],
                &[],
                &[
                    "", "Date of Listing", "Stock Code", "Company Name", "Offer Price",
                    "Subscription", "Funds Raised", "Shares", "Market Cap", "Industry",
                    "Place of Inc", "Method", "Sponsors", "Accountant", "", "Location",
                ],
                &[
                    "", "2010-01-04", "700", "Alpha\nHoldings", "1.5", "10", "100", "1000",
                    "2000", "Tech", "Cayman", "Offer", "S1", "A1", "", "(a)",
                ],
                &["", "", "", "", "", "", "20", "", "", "", "", "", "", "", "", "(b)"],
                &["", "", "", "", "", "", "5", "", "", "", "", "", "", "", "", "(c)"],
                &[],
                &["", "2010-02-01", "1234", "Beta", "", "", "50"],
                &["", "Total", "", "", "", "", "175"],
                &["", "2010-12-01", "999", "After total"],
            ],
        )
    }

    #[test]
    fn test_main_extraction_resolves_and_bounds() {
        let extraction = extract_main(&main_sheet()).unwrap();
        let table = &extraction.table;

        assert_eq!(table.columns().len(), MAIN_COLUMNS.len());
        assert_eq!(table.len(), 4);
        let codes: Vec<_> = table.column_values(2).collect();
        assert_eq!(codes, vec![Some("700"), Some("700"), Some("700"), Some("1234")]);
        assert_eq!(table.get_by_name(0, "company"), Some("Alpha Holdings"));
        assert_eq!(table.get_by_name(0, "source_file"), Some("Main_2010.csv"));
        assert_eq!(table.get_by_name(1, "offer_location"), Some("(b)"));
        assert_eq!(table.get_by_name(3, "offer_location"), None);
        assert!(extraction.rejected.is_empty());
    }

    #[test]
    fn test_main_requires_company_code_header() {
        let sheet = Sheet::from_strs("Main_1999.csv", &[&["a", "b", "c"], &["1", "2", "3"]]);
        assert!(extract_main(&sheet).is_err());
    }

    #[test]
    fn test_gem_filters_empty_second_column_and_rejects_keys() {
        let sheet = Sheet::from_strs(
            "GEM_2005.csv",
            &[
                &["GEM New Listings"],
                &["Date", "Code", "Company", "Price"],
                &["", "(HK$)", "", ""],
                &["2005-01-03", "8001", "Alpha", "0.5"],
                &["note", "", "", ""],
                &["2005-02-03", "8002.5", "Beta", "0.6"],
                &["total", "", "", ""],
            ],
        );
        let extraction = extract_gem(&sheet).unwrap();
        assert_eq!(extraction.table.len(), 1);
        assert_eq!(extraction.table.get_by_name(0, "stock_code"), Some("8001"));
        assert_eq!(extraction.table.get_by_name(0, "offer_price"), Some("0.5"));
        // "(HK$)" and "8002.5" are rejected by key coercion
        assert_eq!(extraction.rejected.len(), 2);
    }
}
