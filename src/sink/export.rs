//! Query exports to CSV, Excel or plain-text lists.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;

use crate::config::OutputFormat;
use crate::models::Table;

use super::csv::{write_atomic, write_table};
use super::sqlite::query_table;
use super::SinkError;

/// One file produced by an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub path: PathBuf,
    /// Rows written (unique values for text lists).
    pub rows: usize,
}

/// Split a script into statements on `;`, dropping empty ones.
pub fn split_statements(script: &str) -> Vec<String> {
    script
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Output base name: the script stem without a leading `select_`.
pub fn output_base(sql_path: &Path) -> String {
    let stem = sql_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());
    stem.strip_prefix("select_").map(str::to_string).unwrap_or(stem)
}

/// Sorted, deduplicated values of a single-column table. Values are trimmed;
/// nulls and blanks are dropped.
pub fn unique_values(table: &Table) -> Result<Vec<String>, SinkError> {
    if table.width() != 1 {
        return Err(SinkError::InvalidResult(format!(
            "text export needs exactly one column, query returned {}",
            table.width()
        )));
    }
    let values: BTreeSet<&str> = table
        .column_values(0)
        .flatten()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    Ok(values.into_iter().map(str::to_string).collect())
}

/// Write one value per line, each newline-terminated.
pub fn write_lines(path: &Path, values: &[String]) -> Result<(), SinkError> {
    write_atomic(path, |tmp| {
        for value in values {
            writeln!(tmp, "{}", value)?;
        }
        Ok(())
    })
}

/// Write a table as a single-sheet workbook. Numeric text is written as numbers.
pub fn write_xlsx(path: &Path, table: &Table) -> Result<(), SinkError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, name) in table.columns().iter().enumerate() {
        sheet.write_string(0, col as u16, name)?;
    }
    for (r, row) in table.rows().iter().enumerate() {
        let excel_row = (r + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let Some(value) = cell.as_deref() else {
                continue;
            };
            match value.parse::<f64>() {
                Ok(n) if n.is_finite() => sheet.write_number(excel_row, col as u16, n)?,
                _ => sheet.write_string(excel_row, col as u16, value)?,
            };
        }
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    workbook.save(path)?;
    Ok(())
}

/// Write `table` in the requested format, returning the row count written.
pub fn write_result(path: &Path, table: &Table, format: OutputFormat) -> Result<usize, SinkError> {
    match format {
        OutputFormat::Csv => {
            write_table(path, table)?;
            Ok(table.len())
        }
        OutputFormat::Xlsx => {
            write_xlsx(path, table)?;
            Ok(table.len())
        }
        OutputFormat::Txt => {
            let values = unique_values(table)?;
            write_lines(path, &values)?;
            Ok(values.len())
        }
    }
}

/// Run every statement of `sql_path` and export each result.
///
/// A single statement writes `<base>.<ext>`; several write
/// `<base>_query_<i>.<ext>`. `output_file` overrides the path of a single
/// result; with several results its stem is used as the base.
pub fn export_sql_file(
    db_path: &Path,
    sql_path: &Path,
    format: OutputFormat,
    output_dir: &Path,
    output_file: Option<&Path>,
) -> Result<Vec<ExportedFile>, SinkError> {
    if !sql_path.exists() {
        return Err(SinkError::InputMissing(sql_path.to_path_buf()));
    }
    if !db_path.exists() {
        return Err(SinkError::InputMissing(db_path.to_path_buf()));
    }

    let statements = split_statements(&fs::read_to_string(sql_path)?);
    if statements.is_empty() {
        return Err(SinkError::EmptyScript(sql_path.to_path_buf()));
    }

    let (dir, base) = match output_file {
        Some(file) => (
            file.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| output_dir.to_path_buf()),
            output_base(file),
        ),
        None => (output_dir.to_path_buf(), output_base(sql_path)),
    };

    let conn = rusqlite::Connection::open(db_path)?;
    let mut exported = Vec::with_capacity(statements.len());

    for (i, statement) in statements.iter().enumerate() {
        let path = match (output_file, statements.len()) {
            (Some(file), 1) => file.to_path_buf(),
            (_, 1) => dir.join(format!("{}.{}", base, format.extension())),
            _ => dir.join(format!("{}_query_{}.{}", base, i + 1, format.extension())),
        };
        let table = query_table(&conn, statement)?;
        let rows = write_result(&path, &table, format)?;
        tracing::info!("Exported {} rows to {}", rows, path.display());
        exported.push(ExportedFile { path, rows });
    }

    Ok(exported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_statements() {
        let stmts = split_statements("SELECT 1;\n\n SELECT 2 ;  ;\n");
        assert_eq!(stmts, vec!["SELECT 1".to_string(), "SELECT 2".to_string()]);
    }

    #[test]
    fn test_output_base_strips_select_prefix() {
        assert_eq!(output_base(Path::new("q/select_hkex_dataset.sql")), "hkex_dataset");
        assert_eq!(output_base(Path::new("isin_export.sql")), "isin_export");
    }

    #[test]
    fn test_txt_export_sorted_unique_newline_terminated() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = Table::with_columns(&["isin"]);
        for v in [Some("KY2"), None, Some("HK1"), Some("KY2"), Some("BM3")] {
            table.push_row(vec![v.map(str::to_string)]);
        }
        let path = dir.path().join("isin_list.txt");
        let rows = write_result(&path, &table, OutputFormat::Txt).unwrap();

        assert_eq!(rows, 3);
        assert_eq!(fs::read_to_string(&path).unwrap(), "BM3\nHK1\nKY2\n");
    }

    #[test]
    fn test_txt_export_skips_blank_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = Table::with_columns(&["isin"]);
        for v in [Some("HK1"), Some(""), Some("  "), None, Some(" HK2 ")] {
            table.push_row(vec![v.map(str::to_string)]);
        }
        assert_eq!(unique_values(&table).unwrap(), vec!["HK1", "HK2"]);

        let path = dir.path().join("isin_list.txt");
        let rows = write_result(&path, &table, OutputFormat::Txt).unwrap();
        assert_eq!(rows, 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "HK1\nHK2\n");
    }

    #[test]
    fn test_txt_export_rejects_multiple_columns() {
        let table = Table::with_columns(&["a", "b"]);
        assert!(matches!(unique_values(&table), Err(SinkError::InvalidResult(_))));
    }

    #[test]
    fn test_export_multiple_statements_naming() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("t.db");
        let conn = rusqlite::Connection::open(&db).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1), (2);")
            .unwrap();
        drop(conn);

        let sql = dir.path().join("select_counts.sql");
        fs::write(&sql, "SELECT x FROM t; SELECT COUNT(*) AS n FROM t;").unwrap();

        let out = dir.path().join("out");
        let files = export_sql_file(&db, &sql, OutputFormat::Csv, &out, None).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, out.join("counts_query_1.csv"));
        assert_eq!(files[0].rows, 2);
        assert_eq!(fs::read_to_string(&files[1].path).unwrap(), "n\n2\n");
    }
}
