//! Delimited table files with atomic full replace.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::models::{Cell, Table};

use super::SinkError;

/// Write `contents` to a temp file beside `path`, then rename it over `path`.
pub fn write_atomic<F>(path: &Path, contents: F) -> Result<(), SinkError>
where
    F: FnOnce(&mut NamedTempFile) -> Result<(), SinkError>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    contents(&mut tmp)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| SinkError::Io(e.error))?;
    Ok(())
}

fn encode(cell: &Cell) -> &str {
    cell.as_deref().unwrap_or("")
}

/// Write raw records (no header row).
pub fn write_records(path: &Path, records: &[Vec<Cell>]) -> Result<(), SinkError> {
    write_atomic(path, |tmp| {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(tmp);
        for record in records {
            writer.write_record(record.iter().map(encode))?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Write a table with a header row, fully replacing any existing file.
pub fn write_table(path: &Path, table: &Table) -> Result<(), SinkError> {
    write_atomic(path, |tmp| {
        let mut writer = csv::Writer::from_writer(tmp);
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(row.iter().map(encode))?;
        }
        writer.flush()?;
        Ok(())
    })
}

fn decode(field: &str) -> Cell {
    (!field.is_empty()).then(|| field.to_string())
}

/// Read raw records (no header row). Empty fields become nulls.
pub fn read_records(path: &Path) -> Result<Vec<Vec<Cell>>, SinkError> {
    if !path.exists() {
        return Err(SinkError::InputMissing(path.to_path_buf()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record?.iter().map(decode).collect());
    }
    Ok(records)
}

/// Read a table with a header row.
pub fn read_table(path: &Path) -> Result<Table, SinkError> {
    if !path.exists() {
        return Err(SinkError::InputMissing(path.to_path_buf()));
    }
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = Table::new(columns);
    for record in reader.records() {
        table.push_row(record?.iter().map(decode).collect());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_roundtrip_preserves_nulls_and_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");

        let mut table = Table::with_columns(&["a", "b"]);
        table.push_row(vec![Some("x, y".into()), None]);
        table.push_row(vec![None, Some("line\nbreak".into())]);
        write_table(&path, &table).unwrap();

        let back = read_table(&path).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        fs::write(&path, "stale,content\n1,2\n3,4\n").unwrap();

        let mut table = Table::with_columns(&["k"]);
        table.push_row(vec![Some("1".into())]);
        write_table(&path, &table).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "k\n1\n");
        // No stray temp files left beside the target.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_table(&dir.path().join("none.csv")),
            Err(SinkError::InputMissing(_))
        ));
    }
}
