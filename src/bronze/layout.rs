//! Data-region detection over a raw sheet.
//!
//! The scan is a small state machine. It starts in `SeekingHeader`, enters
//! `InData` on the first row accepted by the header predicate, and moves to
//! `Done` on the first row matching a stop predicate. Each predicate is a plain
//! function so layout policies can be tested on their own.

use thiserror::Error;

use crate::models::Sheet;

/// Errors raised when a sheet does not match the expected layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("{sheet}: no header row with at least {min_cells} non-empty cells")]
    HeaderNotFound { sheet: String, min_cells: usize },

    #[error("{sheet}: {detail}")]
    RegionNotFound { sheet: String, detail: String },
}

/// Scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    SeekingHeader,
    InData,
    Done,
}

/// What to do with a fully blank row inside the data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankRows {
    Skip,
    Stop,
}

/// Layout policy for one sheet category.
#[derive(Debug, Clone, Copy)]
pub struct LayoutRules {
    /// Minimum non-empty cells for a row to count as the header.
    pub min_header_cells: usize,
    /// Words that must all appear (case-insensitive) in the header row text.
    pub header_terms: &'static [&'static str],
    pub blank_rows: BlankRows,
    /// Absolute column whose emptiness ends the region.
    pub stop_on_empty_column: Option<usize>,
    /// Lower-case markers that end the region when found in a row's first cell.
    pub terminal_markers: &'static [&'static str],
}

/// Located header and data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub header_row: usize,
    pub data_rows: Vec<usize>,
    /// Row that ended the region, if the sheet did not simply run out.
    pub end_row: Option<usize>,
}

/// Header predicate: enough non-empty cells, and all required terms present.
pub fn is_header_row(sheet: &Sheet, row: usize, rules: &LayoutRules) -> bool {
    if sheet.non_empty_count(row) < rules.min_header_cells {
        return false;
    }
    if rules.header_terms.is_empty() {
        return true;
    }
    let text = sheet
        .row(row)
        .iter()
        .filter_map(|c| c.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    rules.header_terms.iter().all(|term| text.contains(term))
}

/// Terminal predicate: the trimmed cell at `col` equals a marker, ignoring
/// case and trailing punctuation (`Total:` matches, `Total Energy Ltd` does
/// not).
pub fn is_terminal_row(sheet: &Sheet, row: usize, col: usize, markers: &[&str]) -> bool {
    let Some(cell) = sheet.cell(row, col) else {
        return false;
    };
    let text = cell
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim_end()
        .to_lowercase();
    markers.iter().any(|m| text == *m)
}

/// Stop predicate for an empty designated column.
pub fn is_column_empty(sheet: &Sheet, row: usize, col: usize) -> bool {
    sheet.cell(row, col).is_none()
}

/// Index of the first header row at or after `start`.
pub fn find_header(sheet: &Sheet, start: usize, rules: &LayoutRules) -> Result<usize, LayoutError> {
    (start..sheet.height())
        .find(|&row| is_header_row(sheet, row, rules))
        .ok_or_else(|| LayoutError::HeaderNotFound {
            sheet: sheet.name.clone(),
            min_cells: rules.min_header_cells,
        })
}

/// Scan the sheet from `start` and return the header and data rows.
pub fn scan(sheet: &Sheet, start: usize, rules: &LayoutRules) -> Result<Region, LayoutError> {
    let mut state = ScanState::SeekingHeader;
    let mut header_row = None;
    let mut data_rows = Vec::new();
    let mut end_row = None;
    // Terminal markers sit in the first column of the table.
    let mut first_col = 0;

    for row in start..sheet.height() {
        match state {
            ScanState::SeekingHeader => {
                if is_header_row(sheet, row, rules) {
                    header_row = Some(row);
                    first_col = header_columns(sheet, row).first().copied().unwrap_or(0);
                    state = ScanState::InData;
                }
            }
            ScanState::InData => {
                if let Some(col) = rules.stop_on_empty_column {
                    if is_column_empty(sheet, row, col) {
                        end_row = Some(row);
                        state = ScanState::Done;
                        continue;
                    }
                }
                if sheet.is_blank_row(row) {
                    if rules.blank_rows == BlankRows::Stop {
                        end_row = Some(row);
                        state = ScanState::Done;
                    }
                    continue;
                }
                if is_terminal_row(sheet, row, first_col, rules.terminal_markers) {
                    end_row = Some(row);
                    state = ScanState::Done;
                    continue;
                }
                data_rows.push(row);
            }
            ScanState::Done => break,
        }
    }

    let header_row = header_row.ok_or_else(|| LayoutError::HeaderNotFound {
        sheet: sheet.name.clone(),
        min_cells: rules.min_header_cells,
    })?;

    Ok(Region {
        header_row,
        data_rows,
        end_row,
    })
}

/// Absolute columns holding a non-empty header cell, in order.
pub fn header_columns(sheet: &Sheet, header_row: usize) -> Vec<usize> {
    (0..sheet.row(header_row).len())
        .filter(|&col| sheet.cell(header_row, col).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: LayoutRules = LayoutRules {
        min_header_cells: 3,
        header_terms: &[],
        blank_rows: BlankRows::Skip,
        stop_on_empty_column: None,
        terminal_markers: &["total"],
    };

    #[test]
    fn test_rows_strictly_between_header_and_total() {
        let sheet = Sheet::from_strs(
            "GEM_2010.csv",
            &[
                &["New Listings"],
                &["Date", "Code", "Company"],
                &["2010-01-05", "8001", "Alpha"],
                &["2010-02-05", "8002", "Beta"],
                &["TOTAL", "", ""],
                &["2010-03-05", "8003", "After"],
            ],
        );
        let region = scan(&sheet, 0, &RULES).unwrap();
        assert_eq!(region.header_row, 1);
        assert_eq!(region.data_rows, vec![2, 3]);
        assert_eq!(region.end_row, Some(4));
    }

    #[test]
    fn test_header_not_found() {
        let sheet = Sheet::from_strs("x.csv", &[&["a", "b"], &["c"]]);
        assert!(matches!(
            scan(&sheet, 0, &RULES),
            Err(LayoutError::HeaderNotFound { min_cells: 3, .. })
        ));
    }

    #[test]
    fn test_header_terms_required() {
        let rules = LayoutRules {
            header_terms: &["company", "code"],
            ..RULES
        };
        let sheet = Sheet::from_strs(
            "Main_2000.csv",
            &[
                &["Listing", "Report", "2000"],
                &["Date", "Stock Code", "Company Name"],
            ],
        );
        assert!(!is_header_row(&sheet, 0, &rules));
        assert_eq!(find_header(&sheet, 0, &rules).unwrap(), 1);
    }

    #[test]
    fn test_blank_row_policies() {
        let sheet = Sheet::from_strs(
            "s.csv",
            &[&["a", "b", "c"], &["1", "2", "3"], &[], &["4", "5", "6"]],
        );
        let skip = scan(&sheet, 0, &RULES).unwrap();
        assert_eq!(skip.data_rows, vec![1, 3]);

        let stop_rules = LayoutRules {
            blank_rows: BlankRows::Stop,
            ..RULES
        };
        let stop = scan(&sheet, 0, &stop_rules).unwrap();
        assert_eq!(stop.data_rows, vec![1]);
        assert_eq!(stop.end_row, Some(2));
    }

    #[test]
    fn test_stop_on_empty_key_column() {
        let rules = LayoutRules {
            stop_on_empty_column: Some(0),
            terminal_markers: &[],
            ..RULES
        };
        let sheet = Sheet::from_strs(
            "isino.csv",
            &[
                &["Name", "ISIN", "Code"],
                &["A", "HK0001", "1"],
                &["", "HK0002", "2"],
                &["C", "HK0003", "3"],
            ],
        );
        let region = scan(&sheet, 0, &rules).unwrap();
        assert_eq!(region.data_rows, vec![1]);
        assert_eq!(region.end_row, Some(2));
    }

    #[test]
    fn test_terminal_marker_with_punctuation() {
        let sheet = Sheet::from_strs(
            "m.csv",
            &[&["Remarks:"], &["Totally new"], &["Total Energy Ltd"], &["", "Total"]],
        );
        let markers = ["total", "remarks"];
        assert!(is_terminal_row(&sheet, 0, 0, &markers));
        assert!(!is_terminal_row(&sheet, 1, 0, &markers));
        assert!(!is_terminal_row(&sheet, 2, 0, &markers));
        assert!(!is_terminal_row(&sheet, 3, 0, &markers));
        assert!(is_terminal_row(&sheet, 3, 1, &markers));
    }

    #[test]
    fn test_company_named_total_does_not_end_region() {
        let sheet = Sheet::from_strs(
            "GEM_2010.csv",
            &[
                &["Date", "Code", "Company"],
                &["2010-01-05", "1", "Alpha"],
                &["", "", "Total Energy Ltd"],
                &["2010-02-05", "2", "Beta"],
                &["Total"],
            ],
        );
        let region = scan(&sheet, 0, &RULES).unwrap();
        assert_eq!(region.data_rows, vec![1, 2, 3]);
        assert_eq!(region.end_row, Some(4));
    }

    #[test]
    fn test_terminal_marker_in_first_header_column() {
        let sheet = Sheet::from_strs(
            "Main_2010.csv",
            &[
                &["", "Date", "Code", "Company"],
                &["", "2010-01-05", "1", "Total Holdings"],
                &["", "Total", "", ""],
                &["", "2010-03-05", "3", "After"],
            ],
        );
        let region = scan(&sheet, 0, &RULES).unwrap();
        assert_eq!(region.data_rows, vec![1]);
        assert_eq!(region.end_row, Some(2));
    }

    #[test]
    fn test_header_columns_skip_empty_cells() {
        let sheet = Sheet::from_strs("h.csv", &[&["", "Date", "", "Code", "Name"]]);
        assert_eq!(header_columns(&sheet, 0), vec![1, 3, 4]);
    }
}
