//! Offer-tranche reshape for Main Board listings.
//!
//! `(b)` (international) and `(c)` (Singapore) rows carry their own
//! `funds_raised`. Each is folded onto the nearest prior row with the same
//! stock code that is not itself a tranche row, then dropped.

use crate::bronze::continuation::{MARKER_B, MARKER_C};
use crate::models::{Cell, Table, TableError};

pub const FUNDS_HK: &str = "funds_raised_hk";
pub const FUNDS_INTL: &str = "funds_raised_intl";
pub const FUNDS_SG: &str = "funds_raised_sg";

/// A tranche row matched across rows with a different stock code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousMatch {
    pub row: usize,
    pub target: usize,
    pub stock_code: String,
}

/// A tranche row with no prior row to fold into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanTranche {
    pub row: usize,
    pub stock_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrancheReport {
    pub merged: usize,
    pub ambiguous: Vec<AmbiguousMatch>,
    pub orphaned: Vec<OrphanTranche>,
}

fn is_tranche(marker: Option<&str>) -> bool {
    matches!(marker.map(str::trim), Some(MARKER_B) | Some(MARKER_C))
}

/// Fold tranche rows into wide funds columns.
///
/// The output keeps the input columns minus `funds_raised` and
/// `offer_location`, followed by `funds_raised_hk`, `funds_raised_intl` and
/// `funds_raised_sg`.
pub fn reshape_tranches(table: &Table) -> Result<(Table, TrancheReport), TableError> {
    let key_col = table.require_column("stock_code")?;
    let funds_col = table.require_column("funds_raised")?;
    let marker_col = table.require_column("offer_location")?;

    let n = table.len();
    let mut funds: Vec<[Cell; 3]> = vec![[None, None, None]; n];
    let mut dropped = vec![false; n];
    let mut report = TrancheReport::default();

    for i in 0..n {
        let marker = table.get(i, marker_col).map(str::trim);
        let amount = table.get(i, funds_col).map(str::to_string);

        if !is_tranche(marker) {
            funds[i][0] = amount;
            continue;
        }

        let key = table.get(i, key_col);
        let target = key.and_then(|k| {
            (0..i).rev().find(|&j| {
                table.get(j, key_col) == Some(k) && !is_tranche(table.get(j, marker_col))
            })
        });

        match (target, key) {
            (Some(j), Some(k)) => {
                let slot = if marker == Some(MARKER_B) { 1 } else { 2 };
                funds[j][slot] = amount;
                dropped[i] = true;
                report.merged += 1;

                let separated = (j + 1..i).any(|m| table.get(m, key_col) != Some(k));
                if separated {
                    tracing::warn!(
                        "Tranche row {} for stock {} matched non-adjacent row {}",
                        i,
                        k,
                        j
                    );
                    report.ambiguous.push(AmbiguousMatch {
                        row: i,
                        target: j,
                        stock_code: k.to_string(),
                    });
                }
            }
            _ => {
                tracing::warn!("Tranche row {} has no matching primary row", i);
                report.orphaned.push(OrphanTranche {
                    row: i,
                    stock_code: key.map(str::to_string),
                });
            }
        }
    }

    let keep_cols: Vec<usize> = (0..table.width())
        .filter(|&c| c != funds_col && c != marker_col)
        .collect();
    let mut columns: Vec<String> = keep_cols
        .iter()
        .map(|&c| table.columns()[c].clone())
        .collect();
    columns.extend([FUNDS_HK, FUNDS_INTL, FUNDS_SG].map(String::from));

    let mut out = Table::new(columns);
    for (i, row) in table.rows().iter().enumerate() {
        if dropped[i] {
            continue;
        }
        let mut new_row: Vec<Cell> = keep_cols.iter().map(|&c| row[c].clone()).collect();
        new_row.extend(std::mem::take(&mut funds[i]));
        out.push_row(new_row);
    }

    Ok((out, report))
}
