//! Descriptive lookup tables embedded in the `isino` workbook.

use crate::models::{Sheet, Table, NATIONAL_AGENCY_COLUMNS, STOCK_TYPE_COLUMNS};

use super::cell::normalize_cell;
use super::isin::ISIN_RULES;
use super::layout::{scan, LayoutError};

/// Cell holding the stock-type legend (row 17 of the sheet).
const STOCK_TYPE_ROW: usize = 16;

/// Parse a legend such as `Stock type (ORD - Ordinary shares; PRF – Preference)`.
pub fn parse_stock_types(text: &str) -> Vec<(String, String)> {
    let text = text.trim();
    let inner = match (text.find('('), text.rfind(')')) {
        (Some(start), Some(end)) if end > start => &text[start + 1..end],
        _ => text,
    };
    let inner = inner.replace(" – ", " - ");

    inner
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| entry.split_once(" - "))
        .map(|(code, desc)| (code.trim().to_string(), desc.trim().to_string()))
        .collect()
}

/// Extract stock types from the fixed legend cell, falling back to the first
/// cell of column 0 that parses.
pub fn extract_stock_types(sheet: &Sheet) -> Result<Table, LayoutError> {
    let mut entries = sheet
        .cell(STOCK_TYPE_ROW, 0)
        .map(parse_stock_types)
        .unwrap_or_default();

    if entries.is_empty() {
        tracing::debug!(
            "{}: no stock types at row {}, searching first column",
            sheet.name,
            STOCK_TYPE_ROW + 1
        );
        entries = (0..sheet.height())
            .filter_map(|row| sheet.cell(row, 0))
            .map(parse_stock_types)
            .find(|parsed| !parsed.is_empty())
            .unwrap_or_default();
    }

    if entries.is_empty() {
        return Err(LayoutError::RegionNotFound {
            sheet: sheet.name.clone(),
            detail: "stock type legend not found".to_string(),
        });
    }

    let mut table = Table::with_columns(STOCK_TYPE_COLUMNS);
    for (code, desc) in entries {
        table.push_row(vec![Some(code), Some(desc)]);
    }
    Ok(table)
}

/// Extract the national numbering agency table that follows the ISIN table.
///
/// After the ISIN table's terminating row, blank rows are skipped, then a title
/// row and a header row. Two columns are read until the second is empty.
pub fn extract_national_agencies(sheet: &Sheet) -> Result<Table, LayoutError> {
    let region = scan(sheet, 0, &ISIN_RULES)?;
    let end = region.end_row.ok_or_else(|| LayoutError::RegionNotFound {
        sheet: sheet.name.clone(),
        detail: "no blank row after the ISIN table".to_string(),
    })?;

    let mut pos = end + 1;
    while pos < sheet.height() && sheet.is_blank_row(pos) {
        pos += 1;
    }
    let data_start = pos + 2;
    if data_start >= sheet.height() {
        return Err(LayoutError::RegionNotFound {
            sheet: sheet.name.clone(),
            detail: "national agency table not found".to_string(),
        });
    }

    let mut table = Table::with_columns(NATIONAL_AGENCY_COLUMNS);
    for row in data_start..sheet.height() {
        let cells = sheet.row(row);
        let desc = normalize_cell(cells.get(1).and_then(|c| c.as_deref()));
        if desc.is_none() {
            break;
        }
        let agency = normalize_cell(cells.first().and_then(|c| c.as_deref()));
        table.push_row(vec![agency, desc]);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stock_types() {
        let parsed = parse_stock_types(
            "Stock Type (ORD - Ordinary Shares; PRF – Preference Shares; ; BAD; WRT - Warrants (Derivative))",
        );
        assert_eq!(
            parsed,
            vec![
                ("ORD".to_string(), "Ordinary Shares".to_string()),
                ("PRF".to_string(), "Preference Shares".to_string()),
                ("WRT".to_string(), "Warrants (Derivative)".to_string()),
            ]
        );
    }

    fn legend_sheet(legend_row: usize) -> Sheet {
        let mut rows: Vec<Vec<&str>> = vec![vec![]; 20];
        rows[legend_row] = vec!["Type (ORD - Ordinary; PRF - Preference)"];
        let refs: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
        Sheet::from_strs("isino.csv", &refs)
    }

    #[test]
    fn test_stock_types_fixed_cell_and_fallback() {
        let fixed = extract_stock_types(&legend_sheet(16)).unwrap();
        assert_eq!(fixed.len(), 2);
        let moved = extract_stock_types(&legend_sheet(18)).unwrap();
        assert_eq!(moved.get(1, 0), Some("PRF"));
        assert!(extract_stock_types(&Sheet::from_strs("e.csv", &[&["none"]])).is_err());
    }

    #[test]
    fn test_national_agencies_after_isin_table() {
        let sheet = Sheet::from_strs(
            "isino.csv",
            &[
                &["Name", "ISIN", "Code"],
                &["A", "KY1", "1"],
                &[],
                &[],
                &["National Numbering Agencies"],
                &["Agency", "Description"],
                &["ANNA", "Association of National Numbering Agencies"],
                &["CUSIP", "CUSIP Global\nServices"],
                &["Footnote"],
            ],
        );
        let table = extract_national_agencies(&sheet).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, 1), Some("CUSIP Global Services"));
    }
}
