//! Configuration management for the HKEX pipeline.
//!
//! Settings are resolved from defaults, then environment variables (a `.env`
//! file is loaded by the binary before this runs), then CLI overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default SQLite database filename inside the data directory.
pub const DEFAULT_DATABASE_FILENAME: &str = "hongkong.db";

/// Default directory holding the `.sql` scripts used by loaders and exports.
pub const DEFAULT_SQL_DIR: &str = "models/db_init";

/// Default number of parallel download workers.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Upper bound on parallel download workers.
pub const MAX_WORKERS_LIMIT: usize = 10;

/// Output format for query exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Xlsx,
    Txt,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Txt => "txt",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "xlsx" => Ok(OutputFormat::Xlsx),
            "txt" => Ok(OutputFormat::Txt),
            other => Err(format!(
                "Unsupported output format '{}'. Use csv, xlsx or txt",
                other
            )),
        }
    }
}

/// WRDS credential pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrdsCredentials {
    pub user: String,
    pub password: String,
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// SQLite database path.
    pub database_path: PathBuf,
    /// Directory holding SQL scripts.
    pub sql_dir: PathBuf,
    /// Default export format.
    pub output_format: OutputFormat,
    /// Parallel download workers (1..=10).
    pub max_workers: usize,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay between requests in milliseconds.
    pub request_delay_ms: u64,
    /// Session cookie forwarded to the HKEXnews search APIs.
    pub cookie: Option<String>,
    /// WRDS credentials, when both halves are configured.
    pub wrds: Option<WrdsCredentials>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_data_dir(PathBuf::from(DEFAULT_DATA_DIR))
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join(DEFAULT_DATABASE_FILENAME),
            data_dir,
            sql_dir: PathBuf::from(DEFAULT_SQL_DIR),
            output_format: OutputFormat::Csv,
            max_workers: DEFAULT_MAX_WORKERS,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) hkex-etl/0.4 (academic research)"
                .to_string(),
            request_timeout: 30,
            request_delay_ms: 0,
            cookie: None,
            wrds: None,
        }
    }

    /// Raw downloads (`data/raw`).
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn auditor_pdf_dir(&self) -> PathBuf {
        self.raw_dir().join("auditor_pdfs")
    }

    pub fn press_dir(&self) -> PathBuf {
        self.raw_dir().join("press")
    }

    pub fn auditor_text_dir(&self) -> PathBuf {
        self.raw_dir().join("auditor_reports_txt")
    }

    pub fn auditor_sliced_dir(&self) -> PathBuf {
        self.raw_dir().join("auditor_reports_sliced")
    }

    pub fn normalized_dir(&self) -> PathBuf {
        self.data_dir.join("normalized")
    }

    pub fn bronze_dir(&self) -> PathBuf {
        self.data_dir.join("bronze")
    }

    pub fn silver_dir(&self) -> PathBuf {
        self.data_dir.join("silver")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    pub fn lists_dir(&self) -> PathBuf {
        self.data_dir.join("lists")
    }

    /// Path of a SQL script inside the configured SQL directory.
    pub fn sql_file(&self, name: &str) -> PathBuf {
        self.sql_dir.join(name)
    }

    /// Ensure all data directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        let dirs = [
            self.data_dir.clone(),
            self.raw_dir(),
            self.auditor_pdf_dir(),
            self.press_dir(),
            self.auditor_text_dir(),
            self.auditor_sliced_dir(),
            self.normalized_dir(),
            self.bronze_dir(),
            self.silver_dir(),
            self.processed_dir(),
            self.lists_dir(),
        ];
        for dir in &dirs {
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", dir.display(), e),
                )
            })?;
        }
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// CLI-level overrides applied on top of environment settings.
#[derive(Debug, Default, Clone)]
pub struct LoadOptions {
    pub data_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub sql_dir: Option<PathBuf>,
    pub workers: Option<usize>,
}

/// Clamp a worker count into the supported range.
pub fn clamp_workers(workers: usize) -> usize {
    workers.clamp(1, MAX_WORKERS_LIMIT)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_var(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {}", name, raw);
            None
        }
    }
}

/// Load settings from the environment, then apply CLI overrides.
pub fn load_settings(options: &LoadOptions) -> Settings {
    let data_dir = options
        .data_dir
        .clone()
        .or_else(|| env_var("HKEX_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    let mut settings = Settings::with_data_dir(data_dir);

    if let Some(db) = options
        .database_path
        .clone()
        .or_else(|| env_var("DB_PATH").map(PathBuf::from))
    {
        tracing::debug!("Using database path {}", db.display());
        settings.database_path = db;
    }

    if let Some(sql_dir) = options
        .sql_dir
        .clone()
        .or_else(|| env_var("HKEX_SQL_DIR").map(PathBuf::from))
    {
        settings.sql_dir = sql_dir;
    }

    if let Some(raw) = env_var("OUTPUT_FORMAT") {
        match raw.parse::<OutputFormat>() {
            Ok(format) => settings.output_format = format,
            Err(e) => tracing::warn!("{}; falling back to csv", e),
        }
    }

    if let Some(workers) = options
        .workers
        .or_else(|| env_parse::<usize>("HKEX_MAX_WORKERS"))
    {
        settings.max_workers = clamp_workers(workers);
    }

    if let Some(timeout) = env_parse::<u64>("HKEX_REQUEST_TIMEOUT") {
        settings.request_timeout = timeout;
    }
    if let Some(delay) = env_parse::<u64>("HKEX_REQUEST_DELAY_MS") {
        settings.request_delay_ms = delay;
    }

    settings.cookie = env_var("HKEX_COOKIE");

    settings.wrds = match (env_var("WRDS_USER"), env_var("WRDS_PASS")) {
        (Some(user), Some(password)) => Some(WrdsCredentials { user, password }),
        _ => None,
    };

    settings
}

/// Resolve a user-supplied path relative to the data directory when it is not
/// absolute and does not exist relative to the working directory.
pub fn resolve_in_data_dir(settings: &Settings, path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        path.to_path_buf()
    } else {
        settings.data_dir.join(path)
    }
}
