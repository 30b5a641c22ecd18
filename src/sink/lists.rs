//! Plain-text key lists.
//!
//! Export lists are sorted and unique (see [`super::export`]). Pending and
//! ignore lists keep insertion order and are managed here.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::config::OutputFormat;

use super::export::{export_sql_file, write_lines};
use super::SinkError;

/// Prefix of per-id press-release CSV files.
pub const PRESS_CSV_PREFIX: &str = "press_releases_";

/// ISIN key list written by the ISIN export and read by the WRDS loaders.
pub const ISIN_LIST_FILE: &str = "isin_list.txt";

pub const STOCK_CODE_LIST_FILE: &str = "stock_code_list.txt";
pub const STOCK_ID_LIST_FILE: &str = "stock_ids.txt";
pub const IGNORE_LIST_FILE: &str = "ignore_ids.txt";
pub const PENDING_LIST_FILE: &str = "pending_ids.txt";

/// Counts from a pending-list build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryListStats {
    pub full: usize,
    pub ignored: usize,
    pub existing: usize,
    pub pending: usize,
}

/// Read one id per line, trimmed, blank lines dropped. A missing file is empty.
pub fn read_list(path: &Path) -> Result<Vec<String>, SinkError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Ids that already have a `press_releases_<id>.csv` in `press_dir`.
pub fn existing_press_ids(press_dir: &Path) -> Result<HashSet<String>, SinkError> {
    let mut ids = HashSet::new();
    if !press_dir.is_dir() {
        return Ok(ids);
    }
    for entry in fs::read_dir(press_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(id) = stem.strip_prefix(PRESS_CSV_PREFIX) {
            if !id.is_empty() {
                ids.insert(id.to_string());
            }
        }
    }
    Ok(ids)
}

/// Pending ids: the full list minus ignored ids minus ids already downloaded,
/// in the full list's order.
pub fn build_query_list(
    full_path: &Path,
    ignore_path: &Path,
    press_dir: &Path,
    output_path: &Path,
) -> Result<QueryListStats, SinkError> {
    let full = read_list(full_path)?;
    let ignore: HashSet<String> = read_list(ignore_path)?.into_iter().collect();
    let existing = existing_press_ids(press_dir)?;

    let pending: Vec<String> = full
        .iter()
        .filter(|id| !ignore.contains(*id) && !existing.contains(*id))
        .cloned()
        .collect();
    write_lines(output_path, &pending)?;

    Ok(QueryListStats {
        full: full.len(),
        ignored: ignore.len(),
        existing: existing.len(),
        pending: pending.len(),
    })
}

/// Append ids with status `saved` in the summary CSV to the ignore list,
/// keeping first-appearance order. Returns the number of ids added.
pub fn update_ignore_list(ignore_path: &Path, summary_path: &Path) -> Result<usize, SinkError> {
    if !summary_path.exists() {
        return Ok(0);
    }
    let mut ids = read_list(ignore_path)?;
    let mut seen: HashSet<String> = ids.iter().cloned().collect();

    let summary = super::csv::read_table(summary_path)?;
    let id_col = summary
        .column_index("stock_id")
        .ok_or_else(|| SinkError::InvalidResult("summary has no stock_id column".into()))?;
    let status_col = summary
        .column_index("status")
        .ok_or_else(|| SinkError::InvalidResult("summary has no status column".into()))?;

    let mut added = 0;
    for row in 0..summary.len() {
        let id = summary.get(row, id_col).map(str::trim).unwrap_or("");
        let status = summary.get(row, status_col).map(str::trim).unwrap_or("");
        if !id.is_empty() && status == "saved" && seen.insert(id.to_string()) {
            ids.push(id.to_string());
            added += 1;
        }
    }

    if added > 0 {
        write_lines(ignore_path, &ids)?;
    }
    Ok(added)
}

/// Export a sorted unique key list from a single-column query script.
pub fn export_key_list(db_path: &Path, sql_path: &Path, output_path: &Path) -> Result<usize, SinkError> {
    let dir = output_path.parent().unwrap_or_else(|| Path::new("."));
    let files = export_sql_file(db_path, sql_path, OutputFormat::Txt, dir, Some(output_path))?;
    Ok(files.iter().map(|f| f.rows).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_list_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join("stock_ids.txt");
        let ignore = dir.path().join("ignore_ids.txt");
        let press = dir.path().join("press");
        let out = dir.path().join("pending_ids.txt");

        fs::write(&full, "30\n10\n\n20\n40\n").unwrap();
        fs::write(&ignore, "20\n").unwrap();
        fs::create_dir_all(&press).unwrap();
        fs::write(press.join("press_releases_40.csv"), "a\n").unwrap();
        fs::write(press.join("press_releases_40.json"), "{}").unwrap();

        let stats = build_query_list(&full, &ignore, &press, &out).unwrap();
        assert_eq!(
            stats,
            QueryListStats {
                full: 4,
                ignored: 1,
                existing: 1,
                pending: 2
            }
        );
        assert_eq!(fs::read_to_string(&out).unwrap(), "30\n10\n");
    }

    #[test]
    fn test_update_ignore_list_appends_saved_ids() {
        let dir = tempfile::tempdir().unwrap();
        let ignore = dir.path().join("ignore_ids.txt");
        let summary = dir.path().join("press_summary.csv");
        fs::write(&ignore, "5\n").unwrap();
        fs::write(
            &summary,
            "stock_id,status,rows\n9,saved,3\n5,saved,1\n7,empty,0\n8,failed,0\n9,saved,3\n2,saved,4\n",
        )
        .unwrap();

        assert_eq!(update_ignore_list(&ignore, &summary).unwrap(), 2);
        assert_eq!(fs::read_to_string(&ignore).unwrap(), "5\n9\n2\n");
        assert_eq!(update_ignore_list(&ignore, &summary).unwrap(), 0);
    }
}
