//! SQLite store: full-replace table loads, script execution and queries.
//!
//! Every entry point opens its own connection and closes it on return; no
//! connection or transaction spans stages.

use std::fs;
use std::path::Path;

use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};

use crate::models::{Cell, Table};

use super::csv::read_table;
use super::SinkError;

/// Column type chosen for a loaded table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Text,
}

impl Affinity {
    fn sql(&self) -> &'static str {
        match self {
            Affinity::Integer => "INTEGER",
            Affinity::Real => "REAL",
            Affinity::Text => "TEXT",
        }
    }

    fn bind(&self, cell: &Cell) -> Value {
        let Some(text) = cell.as_deref() else {
            return Value::Null;
        };
        match self {
            Affinity::Integer => text
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(text.to_string())),
            Affinity::Real => text
                .trim()
                .parse::<f64>()
                .map(Value::Real)
                .unwrap_or_else(|_| Value::Text(text.to_string())),
            Affinity::Text => Value::Text(text.to_string()),
        }
    }
}

/// INTEGER when every non-null value is an integer, REAL when every one is
/// numeric, TEXT otherwise. All-null columns are TEXT.
pub fn infer_affinity<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Affinity {
    let mut seen = false;
    let mut all_int = true;
    let mut all_num = true;
    for value in values.flatten() {
        let v = value.trim();
        seen = true;
        if v.parse::<i64>().is_err() {
            all_int = false;
            if v.parse::<f64>().map_or(true, |f| !f.is_finite()) {
                all_num = false;
                break;
            }
        }
    }
    match (seen, all_int, all_num) {
        (false, _, _) => Affinity::Text,
        (true, true, _) => Affinity::Integer,
        (true, false, true) => Affinity::Real,
        _ => Affinity::Text,
    }
}

/// Quote an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Open (creating if needed) the database file.
pub fn open(db_path: &Path) -> Result<Connection, SinkError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(Connection::open(db_path)?)
}

/// Replace `table_name` with the contents of `table` in one transaction.
/// Returns the number of rows inserted.
pub fn load_table(conn: &mut Connection, table_name: &str, table: &Table) -> Result<usize, SinkError> {
    let affinities: Vec<Affinity> = (0..table.width())
        .map(|col| infer_affinity(table.column_values(col)))
        .collect();

    let column_defs = table
        .columns()
        .iter()
        .zip(&affinities)
        .map(|(name, aff)| format!("{} {}", quote_ident(name), aff.sql()))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; table.width()].join(", ");
    let ident = quote_ident(table_name);

    let tx = conn.transaction()?;
    tx.execute(&format!("DROP TABLE IF EXISTS {}", ident), [])?;
    tx.execute(&format!("CREATE TABLE {} ({})", ident, column_defs), [])?;
    {
        let mut stmt = tx.prepare(&format!("INSERT INTO {} VALUES ({})", ident, placeholders))?;
        for row in table.rows() {
            let values = row.iter().zip(&affinities).map(|(cell, aff)| aff.bind(cell));
            stmt.execute(params_from_iter(values))?;
        }
    }
    tx.commit()?;

    tracing::info!("Loaded {} rows into {}", table.len(), table_name);
    Ok(table.len())
}

/// Load a CSV file into `table_name` (full replace).
pub fn load_csv(db_path: &Path, csv_path: &Path, table_name: &str) -> Result<usize, SinkError> {
    let table = read_table(csv_path)?;
    let mut conn = open(db_path)?;
    load_table(&mut conn, table_name, &table)
}

/// Execute a multi-statement SQL script against an existing database.
pub fn run_sql_file(db_path: &Path, sql_path: &Path) -> Result<(), SinkError> {
    if !sql_path.exists() {
        return Err(SinkError::InputMissing(sql_path.to_path_buf()));
    }
    if !db_path.exists() {
        return Err(SinkError::InputMissing(db_path.to_path_buf()));
    }
    let script = fs::read_to_string(sql_path)?;
    if script.trim().is_empty() {
        return Err(SinkError::EmptyScript(sql_path.to_path_buf()));
    }

    let conn = Connection::open(db_path)?;
    conn.execute_batch(&script)?;
    tracing::info!("Executed {}", sql_path.display());
    Ok(())
}

fn render_value(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

/// Run one query and collect its result as a text table.
pub fn query_table(conn: &Connection, sql: &str) -> Result<Table, SinkError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();
    let mut table = Table::new(columns);

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut out = Vec::with_capacity(width);
        for col in 0..width {
            out.push(render_value(row.get_ref(col)?));
        }
        table.push_row(out);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_affinity() {
        let ints = [Some("1"), None, Some("700")];
        assert_eq!(infer_affinity(ints.into_iter()), Affinity::Integer);
        let reals = [Some("1"), Some("2.5")];
        assert_eq!(infer_affinity(reals.into_iter()), Affinity::Real);
        let text = [Some("1"), Some("abc")];
        assert_eq!(infer_affinity(text.into_iter()), Affinity::Text);
        let nulls: [Option<&str>; 2] = [None, None];
        assert_eq!(infer_affinity(nulls.into_iter()), Affinity::Text);
    }

    #[test]
    fn test_load_table_replaces_contents() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut first = Table::with_columns(&["stock_code", "company"]);
        first.push_row(vec![Some("1".into()), Some("A".into())]);
        first.push_row(vec![Some("2".into()), Some("B".into())]);
        assert_eq!(load_table(&mut conn, "hkex_main", &first).unwrap(), 2);

        let mut second = Table::with_columns(&["stock_code", "price"]);
        second.push_row(vec![Some("3".into()), Some("1.5".into())]);
        load_table(&mut conn, "hkex_main", &second).unwrap();

        let result = query_table(&conn, "SELECT stock_code, price, typeof(price) FROM hkex_main").unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.get(0, 0), Some("3"));
        assert_eq!(result.get(0, 1), Some("1.5"));
        assert_eq!(result.get(0, 2), Some("real"));
    }

    #[test]
    fn test_run_sql_file_requires_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("t.db");
        let sql = dir.path().join("v.sql");

        assert!(matches!(run_sql_file(&db, &sql), Err(SinkError::InputMissing(_))));
        fs::write(&sql, "  \n").unwrap();
        assert!(matches!(run_sql_file(&db, &sql), Err(SinkError::InputMissing(_))));

        Connection::open(&db)
            .unwrap()
            .execute_batch("CREATE TABLE seed (x INTEGER);")
            .unwrap();
        assert!(matches!(run_sql_file(&db, &sql), Err(SinkError::EmptyScript(_))));

        fs::write(&sql, "CREATE TABLE a (x INTEGER); INSERT INTO a VALUES (1);").unwrap();
        run_sql_file(&db, &sql).unwrap();
        let conn = Connection::open(&db).unwrap();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM a", [], |r| r.get(0)).unwrap();
        assert_eq!(n, 1);
    }
}
