//! WRDS (Wharton Research Data Services) loaders.
//!
//! Each loader runs one SQL template against the WRDS PostgreSQL service,
//! optionally restricted to an ISIN list in batches, and replaces a SQLite
//! table with the concatenated result. Remote execution needs the `wrds`
//! cargo feature.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{Settings, WrdsCredentials};
use crate::models::Table;
use crate::sink::lists::ISIN_LIST_FILE;
use crate::sink::{sqlite, SinkError};

pub const WRDS_HOST: &str = "wrds-pgdata.wharton.upenn.edu";
pub const WRDS_PORT: u16 = 9737;
pub const WRDS_DB: &str = "wrds";

/// ISINs per remote query.
pub const BATCH_SIZE: usize = 1000;

#[derive(Debug, Error)]
pub enum WrdsError {
    #[error("WRDS credentials not configured (set WRDS_USER and WRDS_PASS)")]
    MissingCredentials,

    #[error("WRDS support not compiled in (rebuild with --features wrds)")]
    FeatureDisabled,

    #[error("SQL file not found: {0}")]
    SqlMissing(PathBuf),

    #[error("ISIN list not found: {0}")]
    ListMissing(PathBuf),

    #[error("ISIN list is empty: {0}")]
    EmptyList(PathBuf),

    #[error("Query returned 0 rows for {0}")]
    NoRows(String),

    #[error("Result columns differ between batches")]
    ColumnMismatch,

    #[cfg(feature = "wrds")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One SQL template loaded into one SQLite table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrdsLoader {
    pub sql_file: PathBuf,
    pub table: String,
    pub isin_list: Option<PathBuf>,
}

impl WrdsLoader {
    pub fn new(sql_file: PathBuf, table: &str) -> Self {
        Self {
            sql_file,
            table: table.to_string(),
            isin_list: None,
        }
    }

    pub fn with_isin_list(mut self, path: PathBuf) -> Self {
        self.isin_list = Some(path);
        self
    }
}

/// The four fundamentals loaders, in run order.
pub fn default_loaders(settings: &Settings) -> Vec<WrdsLoader> {
    let isin_list = settings.lists_dir().join(ISIN_LIST_FILE);
    vec![
        WrdsLoader::new(settings.sql_file("dl_funda_a_170.sql"), "funda_a_170"),
        WrdsLoader::new(settings.sql_file("dl_funda_q_170.sql"), "funda_q_170"),
        WrdsLoader::new(settings.sql_file("dl_funda_a_isin.sql"), "funda_a_isin")
            .with_isin_list(isin_list.clone()),
        WrdsLoader::new(settings.sql_file("dl_funda_q_isin.sql"), "funda_q_isin")
            .with_isin_list(isin_list),
    ]
}

/// Read a query template with trailing whitespace and semicolons removed.
pub fn load_template(path: &Path) -> Result<String, WrdsError> {
    if !path.exists() {
        return Err(WrdsError::SqlMissing(path.to_path_buf()));
    }
    let sql = std::fs::read_to_string(path)?;
    Ok(sql.trim_end().trim_end_matches(';').to_string())
}

/// Non-blank ISINs, one per line.
pub fn read_isin_list(path: &Path) -> Result<Vec<String>, WrdsError> {
    if !path.exists() {
        return Err(WrdsError::ListMissing(path.to_path_buf()));
    }
    let isins: Vec<String> = std::fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if isins.is_empty() {
        return Err(WrdsError::EmptyList(path.to_path_buf()));
    }
    Ok(isins)
}

/// Queries to run for `template`: the template itself without ISINs,
/// otherwise one query per batch with an `isin IN (...)` filter.
pub fn batch_queries(template: &str, isins: &[String], batch_size: usize) -> Vec<String> {
    if isins.is_empty() {
        return vec![template.to_string()];
    }
    let joiner = if template.to_ascii_uppercase().contains("WHERE") {
        "AND"
    } else {
        "WHERE"
    };
    isins
        .chunks(batch_size.max(1))
        .map(|batch| {
            let list = batch
                .iter()
                .map(|isin| format!("'{}'", isin.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(",");
            format!("{} {} isin IN ({})", template, joiner, list)
        })
        .collect()
}

/// Concatenate batch results. Batches without rows carry no columns and are
/// ignored.
pub fn concat_results(tables: Vec<Table>) -> Result<Table, WrdsError> {
    let mut combined: Option<Table> = None;
    for table in tables {
        if table.is_empty() {
            continue;
        }
        match combined.as_mut() {
            None => combined = Some(table),
            Some(acc) => acc.append(table).map_err(|_| WrdsError::ColumnMismatch)?,
        }
    }
    Ok(combined.unwrap_or_default())
}

#[cfg(feature = "wrds")]
mod remote {
    use rustls::ClientConfig;
    use tokio_postgres::config::SslMode;
    use tokio_postgres::SimpleQueryMessage;
    use tokio_postgres_rustls::MakeRustlsConnect;

    use super::*;

    fn build_rustls_config() -> ClientConfig {
        let mut root_store = rustls::RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        for e in &native.errors {
            tracing::warn!("Skipping native certificate: {}", e);
        }
        for cert in native.certs {
            root_store.add(cert).ok();
        }

        ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    }

    /// Connect over TLS and spawn the connection task.
    pub(super) async fn connect(
        credentials: &WrdsCredentials,
    ) -> Result<tokio_postgres::Client, tokio_postgres::Error> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(WRDS_HOST)
            .port(WRDS_PORT)
            .dbname(WRDS_DB)
            .user(&credentials.user)
            .password(&credentials.password)
            .ssl_mode(SslMode::Require);

        let tls = MakeRustlsConnect::new(build_rustls_config());
        let (client, connection) = config.connect(tls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("WRDS connection error: {}", e);
            }
        });
        Ok(client)
    }

    /// Run one query through the simple protocol so every value arrives as
    /// text.
    pub(super) async fn query_table(
        client: &tokio_postgres::Client,
        sql: &str,
    ) -> Result<Table, tokio_postgres::Error> {
        let mut table = Table::default();
        for message in client.simple_query(sql).await? {
            if let SimpleQueryMessage::Row(row) = message {
                if table.width() == 0 {
                    table = Table::new(row.columns().iter().map(|c| c.name().to_string()).collect());
                }
                table.push_row((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
            }
        }
        Ok(table)
    }
}

#[cfg(feature = "wrds")]
async fn run_queries(credentials: &WrdsCredentials, queries: &[String]) -> Result<Vec<Table>, WrdsError> {
    let client = remote::connect(credentials).await?;
    let mut tables = Vec::with_capacity(queries.len());
    for (idx, sql) in queries.iter().enumerate() {
        let table = remote::query_table(&client, sql).await?;
        tracing::info!("Queried batch {}/{}: {} rows", idx + 1, queries.len(), table.len());
        tables.push(table);
    }
    Ok(tables)
}

#[cfg(not(feature = "wrds"))]
async fn run_queries(_credentials: &WrdsCredentials, _queries: &[String]) -> Result<Vec<Table>, WrdsError> {
    Err(WrdsError::FeatureDisabled)
}

/// Run `loader` and replace its SQLite table. Returns the rows loaded.
pub async fn run_loader(
    db_path: &Path,
    credentials: Option<&WrdsCredentials>,
    loader: &WrdsLoader,
) -> Result<usize, WrdsError> {
    let template = load_template(&loader.sql_file)?;
    let isins = match &loader.isin_list {
        Some(path) => {
            let isins = read_isin_list(path)?;
            tracing::info!("Loaded {} ISINs from {}", isins.len(), path.display());
            isins
        }
        None => Vec::new(),
    };
    let credentials = credentials.ok_or(WrdsError::MissingCredentials)?;

    let queries = batch_queries(&template, &isins, BATCH_SIZE);
    let table = concat_results(run_queries(credentials, &queries).await?)?;
    if table.is_empty() {
        return Err(WrdsError::NoRows(loader.sql_file.display().to_string()));
    }

    let mut conn = sqlite::open(db_path)?;
    Ok(sqlite::load_table(&mut conn, &loader.table, &table)?)
}
