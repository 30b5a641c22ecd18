//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod auditor;
mod db;
mod fetch;
mod lists;
mod run;
mod transform;
mod wrds;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{load_settings, LoadOptions, OutputFormat};

#[derive(Parser)]
#[command(name = "hkex")]
#[command(about = "HKEX listing, ISIN and auditor report ETL")]
#[command(version)]
pub struct Cli {
    /// Data directory (raw, normalized, bronze, silver, processed, lists)
    #[arg(long, global = true, env = "HKEX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// SQLite database path (default: <data-dir>/hongkong.db)
    #[arg(long = "db", global = true, env = "DB_PATH")]
    database: Option<PathBuf>,

    /// Directory holding the loader and export SQL scripts
    #[arg(long, global = true, env = "HKEX_SQL_DIR")]
    sql_dir: Option<PathBuf>,

    /// Parallel download workers (1-10)
    #[arg(short, long, global = true, env = "HKEX_MAX_WORKERS")]
    workers: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Which listing board(s) a command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BoardArg {
    Main,
    Gem,
    All,
}

impl BoardArg {
    fn boards(self) -> Vec<crate::bronze::Board> {
        use crate::bronze::Board;
        match self {
            BoardArg::Main => vec![Board::Main],
            BoardArg::Gem => vec![Board::Gem],
            BoardArg::All => vec![Board::Main, Board::Gem],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BronzeTarget {
    Main,
    Gem,
    Isin,
    StockTypes,
    NationalAgencies,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyList {
    Isin,
    StockCode,
    StockId,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory layout
    Init,

    /// Run the full pipeline and print a stage summary
    Run {
        /// Skip every stage that needs the network
        #[arg(long)]
        offline: bool,
        /// Skip the WRDS loaders
        #[arg(long)]
        skip_wrds: bool,
    },

    /// Download source files
    Fetch {
        #[command(subcommand)]
        command: FetchCommands,
    },

    /// Normalize raw spreadsheets into value-only CSV grids
    Normalize {
        /// Re-normalize files that already have an output
        #[arg(long)]
        force: bool,
    },

    /// Extract bronze tables from normalized sheets
    Bronze {
        #[arg(value_enum, default_value = "all")]
        target: BronzeTarget,
    },

    /// Build silver tables (tranche reshape and ISIN join)
    Silver {
        #[arg(value_enum, default_value = "all")]
        board: BoardArg,
    },

    /// Load files into the SQLite database
    Load {
        #[command(subcommand)]
        command: LoadCommands,
    },

    /// Run SQL scripts against the database
    Sql {
        #[command(subcommand)]
        command: SqlCommands,
    },

    /// Export every query of a SQL file
    Export {
        /// SQL file (resolved against the SQL directory when not found)
        file: PathBuf,
        /// Output format (default: OUTPUT_FORMAT or csv)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
        /// Output directory (default: <data-dir>/processed)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Output file for a single query
        #[arg(long)]
        output_file: Option<PathBuf>,
    },

    /// Manage plain-text key lists
    Lists {
        #[command(subcommand)]
        command: ListCommands,
    },

    /// Auditor report text processing
    Auditor {
        #[command(subcommand)]
        command: AuditorCommands,
    },

    /// Load WRDS query results into the database
    Wrds {
        /// Only run the loader for this table
        #[arg(long)]
        table: Option<String>,
    },
}

#[derive(Subcommand)]
enum FetchCommands {
    /// New listing reports (Main Board and GEM)
    Listings {
        #[arg(long, value_enum, default_value = "all")]
        board: BoardArg,
    },
    /// ISIN registry workbooks (conditional GET)
    Isin,
    /// Auditor report index
    Auditor,
    /// Auditor report PDFs linked from the index
    Pdfs,
    /// Map stock codes to HKEXnews stock ids
    StockIds {
        /// Stock codes, one per line (default: <data-dir>/lists/stock_code_list.txt)
        #[arg(long)]
        codes: Option<PathBuf>,
    },
    /// Press releases per stock id
    Press {
        /// Stock ids, one per line (default: <data-dir>/lists/pending_ids.txt)
        #[arg(long)]
        ids: Option<PathBuf>,
        /// First day of the search window (YYYYMMDD)
        #[arg(long)]
        from: Option<String>,
        /// Last day of the search window (YYYYMMDD, default: today)
        #[arg(long)]
        to: Option<String>,
        /// Maximum rows per search
        #[arg(long)]
        row_range: Option<u32>,
    },
}

#[derive(Subcommand)]
enum LoadCommands {
    /// Replace a table with the contents of a CSV file
    Csv {
        file: PathBuf,
        table: String,
    },
}

#[derive(Subcommand)]
enum SqlCommands {
    /// Execute a multi-statement SQL script
    Run { file: PathBuf },
}

#[derive(Subcommand)]
enum ListCommands {
    /// Build the pending press-release id list
    Build,
    /// Add ids saved in the last press run to the ignore list
    UpdateIgnore,
    /// Export a sorted unique key list from the database
    Export {
        #[arg(value_enum)]
        list: KeyList,
    },
}

#[derive(Subcommand)]
enum AuditorCommands {
    /// Convert auditor report PDFs to text with pdftotext
    ExtractText {
        /// Restrict to stock codes listed in this file
        #[arg(long)]
        codes_file: Option<PathBuf>,
    },
    /// Slice extracted text down to the opinion sections
    Slice,
    /// Scan extracted text for modified-opinion wording
    Flags {
        /// Restrict to stock codes listed in this file
        #[arg(long)]
        codes_file: Option<PathBuf>,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let options = LoadOptions {
        data_dir: cli.data_dir,
        database_path: cli.database,
        sql_dir: cli.sql_dir,
        workers: cli.workers,
    };
    let settings = load_settings(&options);

    match cli.command {
        Commands::Init => transform::cmd_init(&settings).map(|_| ExitCode::SUCCESS),
        Commands::Run { offline, skip_wrds } => run::cmd_run(&settings, offline, skip_wrds).await,
        Commands::Fetch { command } => {
            match command {
                FetchCommands::Listings { board } => fetch::cmd_listings(&settings, board).await,
                FetchCommands::Isin => fetch::cmd_isin(&settings).await,
                FetchCommands::Auditor => fetch::cmd_auditor_index(&settings).await,
                FetchCommands::Pdfs => fetch::cmd_pdfs(&settings).await,
                FetchCommands::StockIds { codes } => {
                    fetch::cmd_stock_ids(&settings, codes.as_deref()).await
                }
                FetchCommands::Press {
                    ids,
                    from,
                    to,
                    row_range,
                } => fetch::cmd_press(&settings, ids.as_deref(), from, to, row_range).await,
            }
        }
        Commands::Normalize { force } => {
            transform::cmd_normalize(&settings, force).map(|_| ExitCode::SUCCESS)
        }
        Commands::Bronze { target } => {
            transform::cmd_bronze(&settings, target).map(|_| ExitCode::SUCCESS)
        }
        Commands::Silver { board } => {
            transform::cmd_silver(&settings, board).map(|_| ExitCode::SUCCESS)
        }
        Commands::Load {
            command: LoadCommands::Csv { file, table },
        } => db::cmd_load_csv(&settings, &file, &table).map(|_| ExitCode::SUCCESS),
        Commands::Sql {
            command: SqlCommands::Run { file },
        } => db::cmd_sql_run(&settings, &file).map(|_| ExitCode::SUCCESS),
        Commands::Export {
            file,
            format,
            output_dir,
            output_file,
        } => db::cmd_export(
            &settings,
            &file,
            format,
            output_dir.as_deref(),
            output_file.as_deref(),
        )
        .map(|_| ExitCode::SUCCESS),
        Commands::Lists { command } => match command {
            ListCommands::Build => lists::cmd_build(&settings),
            ListCommands::UpdateIgnore => lists::cmd_update_ignore(&settings),
            ListCommands::Export { list } => lists::cmd_export(&settings, list),
        }
        .map(|_| ExitCode::SUCCESS),
        Commands::Auditor { command } => match command {
            AuditorCommands::ExtractText { codes_file } => {
                auditor::cmd_extract_text(&settings, codes_file.as_deref())
            }
            AuditorCommands::Slice => auditor::cmd_slice(&settings),
            AuditorCommands::Flags { codes_file } => {
                auditor::cmd_flags(&settings, codes_file.as_deref())
            }
        },
        Commands::Wrds { table } => wrds::cmd_wrds(&settings, table.as_deref()).await,
    }
}
