//! Persistence sinks: CSV table files, the SQLite store, query exports and
//! plain-text key lists.

pub mod csv;
pub mod export;
pub mod lists;
pub mod sqlite;

use std::path::PathBuf;

use thiserror::Error;

pub use export::{export_sql_file, ExportedFile};
pub use sqlite::{load_csv, load_table, run_sql_file};

/// Errors raised while writing or reading persisted tables.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Input not found: {0}")]
    InputMissing(PathBuf),

    #[error("SQL script is empty: {0}")]
    EmptyScript(PathBuf),

    #[error("Invalid query result: {0}")]
    InvalidResult(String),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Excel export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
