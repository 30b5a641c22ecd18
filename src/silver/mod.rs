//! Silver stage: tranche reshape and ISIN enrichment of the bronze listings.

pub mod join;
pub mod tranche;

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::bronze::{Board, ISIN_BRONZE};
use crate::models::Table;
use crate::sink::csv::{read_table, write_table};

pub use join::{inner_join, left_join, JoinKind, JoinReport};
pub use tranche::{reshape_tranches, TrancheReport};

pub const MAIN_SILVER: &str = "main_silver.csv";
pub const GEM_SILVER: &str = "gem_silver.csv";

/// Suffix for registry columns whose name clashes with a listing column.
pub const ISIN_SUFFIX: &str = "_isino";

/// Outcome of one silver build.
#[derive(Debug, Default)]
pub struct SilverReport {
    pub input_rows: usize,
    pub rows: usize,
    pub join: JoinReport,
    pub tranche: Option<TrancheReport>,
    pub output: PathBuf,
}

fn read_bronze(path: &Path) -> anyhow::Result<Table> {
    read_table(path).with_context(|| format!("Failed to read bronze table {}", path.display()))
}

impl Board {
    pub fn silver_file(&self) -> &'static str {
        match self {
            Board::Main => MAIN_SILVER,
            Board::Gem => GEM_SILVER,
        }
    }
}

/// Build the silver table for `board` from its bronze table and the ISIN
/// registry. Main listings are reshaped before the join.
pub fn build_silver(bronze_dir: &Path, silver_dir: &Path, board: Board) -> anyhow::Result<SilverReport> {
    let listings = read_bronze(&bronze_dir.join(board.bronze_file()))?;
    let registry = read_bronze(&bronze_dir.join(ISIN_BRONZE))?;

    let mut report = SilverReport {
        input_rows: listings.len(),
        ..SilverReport::default()
    };

    let listings = match board {
        Board::Main => {
            let (reshaped, tranche) = reshape_tranches(&listings)?;
            tracing::info!(
                "Merged {} tranche rows ({} ambiguous, {} orphaned)",
                tranche.merged,
                tranche.ambiguous.len(),
                tranche.orphaned.len()
            );
            report.tranche = Some(tranche);
            reshaped
        }
        Board::Gem => listings,
    };

    let (joined, join) = inner_join(&listings, &registry, "stock_code", ISIN_SUFFIX)?;
    if join.excluded > 0 {
        tracing::warn!(
            "{} of {} listing rows had no ISIN match",
            join.excluded,
            join.left_rows
        );
    }
    if joined.is_empty() {
        tracing::warn!("Join produced zero rows for {}", board.silver_file());
    }

    report.join = join;
    report.rows = joined.len();
    report.output = silver_dir.join(board.silver_file());
    write_table(&report.output, &joined)
        .with_context(|| format!("Failed to write {}", report.output.display()))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_bronze_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_silver(dir.path(), dir.path(), Board::Gem).unwrap_err();
        assert!(err.to_string().contains("gem_bronze.csv"));
        assert!(!dir.path().join(GEM_SILVER).exists());
    }

    #[test]
    fn test_gem_silver_join() {
        let dir = tempfile::tempdir().unwrap();
        let bronze = dir.path().join("bronze");
        let silver = dir.path().join("silver");
        fs::create_dir_all(&bronze).unwrap();
        fs::write(
            bronze.join(crate::bronze::GEM_BRONZE),
            "source_file,stock_code,company\nGEM_2001.csv,8001,Alpha\nGEM_2001.csv,8002,Beta\n",
        )
        .unwrap();
        fs::write(
            bronze.join(ISIN_BRONZE),
            "source_file,company,isin_code,stock_code\nisino.csv,ALPHA,KYG1,8001\n",
        )
        .unwrap();

        let report = build_silver(&bronze, &silver, Board::Gem).unwrap();
        assert_eq!(report.input_rows, 2);
        assert_eq!(report.rows, 1);
        assert_eq!(report.join.excluded, 1);
        assert!(report.tranche.is_none());

        let out = fs::read_to_string(silver.join(GEM_SILVER)).unwrap();
        assert_eq!(
            out,
            "source_file,stock_code,company,source_file_isino,company_isino,isin_code\n\
             GEM_2001.csv,8001,Alpha,isino.csv,ALPHA,KYG1\n"
        );
    }
}
