//! End-to-end bronze and silver builds over normalized CSV grids.

use std::fs;
use std::path::Path;

use hkex_etl::bronze::{self, Board, GEM_BRONZE, ISIN_BRONZE, MAIN_BRONZE};
use hkex_etl::silver::{self, GEM_SILVER, MAIN_SILVER};
use hkex_etl::sink::csv::read_table;

const MAIN_2010: &str = "\
New Listing Report 2010,,,,,,,,,,,,,,,
,,,,,,,,,,,,,,,
,Date of Listing,Stock Code,Company Name,Offer Price,Subscription,Funds Raised,Shares,Market Cap,Industry,Place of Inc,Method,Sponsors,Accountant,,Location
,2010-01-04,700,\"Alpha
Holdings\",1.5,10,100,1000,2000,Tech,Cayman,Offer,S1,A1,,(a)
,,,,,,20,,,,,,,,,(b)
,,,,,,5,,,,,,,,,(c)
,2010-02-01,1234.0,Beta,,,50,,,,,,,,,
,Total,,,,,175,,,,,,,,,
,2010-12-01,999,After total,,,,,,,,,,,,
";

const GEM_2005: &str = "\
GEM New Listings,,,
Date,Code,Company,Price
,(HK$),,
2005-01-03,8001,Gamma,0.5
note,,,
2005-02-03,8002.5,Beta,0.6
total,,,
";

const ISINO: &str = "\
ISINs assigned by other numbering agencies,,,,,
Name,ISIN,Stock Code,Type,Place,Agency
\"ALPHA   HOLDINGS
LTD\",KYG000000001,700,ORD,KY,ANNA
BETA LTD,BMG000000002,1234,ORD,BM,ANNA
GAMMA LTD,KYG000000003,8001,ORD,KY,ANNA
,,,,,
";

fn write_fixtures(normalized: &Path) {
    fs::create_dir_all(normalized).unwrap();
    fs::write(normalized.join("Main_2010.csv"), MAIN_2010).unwrap();
    fs::write(normalized.join("GEM_2005.csv"), GEM_2005).unwrap();
    fs::write(normalized.join("isino.csv"), ISINO).unwrap();
}

fn build_all(normalized: &Path, bronze_dir: &Path, silver_dir: &Path) {
    bronze::build_isin(normalized, bronze_dir).unwrap();
    bronze::build_listings(normalized, bronze_dir, Board::Main).unwrap();
    bronze::build_listings(normalized, bronze_dir, Board::Gem).unwrap();
    silver::build_silver(bronze_dir, silver_dir, Board::Main).unwrap();
    silver::build_silver(bronze_dir, silver_dir, Board::Gem).unwrap();
}

#[test]
fn test_bronze_to_silver() {
    let dir = tempfile::tempdir().unwrap();
    let normalized = dir.path().join("normalized");
    let bronze_dir = dir.path().join("bronze");
    let silver_dir = dir.path().join("silver");
    write_fixtures(&normalized);

    let isin = bronze::build_isin(&normalized, &bronze_dir).unwrap();
    assert_eq!(isin.rows, 3);
    assert_eq!(isin.files_skipped, vec!["isinsehk.csv", "secstkorder.csv"]);

    let main = bronze::build_listings(&normalized, &bronze_dir, Board::Main).unwrap();
    assert_eq!(main.files_processed, 1);
    assert_eq!(main.rows, 4);

    let gem = bronze::build_listings(&normalized, &bronze_dir, Board::Gem).unwrap();
    assert_eq!(gem.rows, 1);
    assert_eq!(gem.rejected.len(), 2);

    let main_bronze = read_table(&bronze_dir.join(MAIN_BRONZE)).unwrap();
    assert_eq!(main_bronze.get_by_name(3, "stock_code"), Some("1234"));
    assert!(bronze_dir.join(GEM_BRONZE).exists());
    assert!(bronze_dir.join(ISIN_BRONZE).exists());

    let report = silver::build_silver(&bronze_dir, &silver_dir, Board::Main).unwrap();
    assert_eq!(report.input_rows, 4);
    assert_eq!(report.rows, 2);
    let tranche = report.tranche.unwrap();
    assert_eq!(tranche.merged, 2);
    assert!(tranche.ambiguous.is_empty());
    assert!(tranche.orphaned.is_empty());

    let main_silver = read_table(&silver_dir.join(MAIN_SILVER)).unwrap();
    assert_eq!(main_silver.get_by_name(0, "company"), Some("Alpha Holdings"));
    assert_eq!(main_silver.get_by_name(0, "isin_code"), Some("KYG000000001"));
    assert_eq!(main_silver.get_by_name(0, "funds_raised_hk"), Some("100"));
    assert_eq!(main_silver.get_by_name(0, "funds_raised_intl"), Some("20"));
    assert_eq!(main_silver.get_by_name(0, "funds_raised_sg"), Some("5"));
    assert_eq!(main_silver.get_by_name(1, "isin_code"), Some("BMG000000002"));
    assert!(main_silver.column_index("offer_location").is_none());

    let report = silver::build_silver(&bronze_dir, &silver_dir, Board::Gem).unwrap();
    assert_eq!(report.rows, 1);
    let gem_silver = read_table(&silver_dir.join(GEM_SILVER)).unwrap();
    assert_eq!(gem_silver.get_by_name(0, "stock_code"), Some("8001"));
    assert_eq!(gem_silver.get_by_name(0, "isin_code"), Some("KYG000000003"));
}

#[test]
fn test_rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let normalized = dir.path().join("normalized");
    let bronze_dir = dir.path().join("bronze");
    let silver_dir = dir.path().join("silver");
    write_fixtures(&normalized);

    build_all(&normalized, &bronze_dir, &silver_dir);
    let outputs = [
        bronze_dir.join(MAIN_BRONZE),
        bronze_dir.join(GEM_BRONZE),
        bronze_dir.join(ISIN_BRONZE),
        silver_dir.join(MAIN_SILVER),
        silver_dir.join(GEM_SILVER),
    ];
    let first: Vec<Vec<u8>> = outputs.iter().map(|p| fs::read(p).unwrap()).collect();

    build_all(&normalized, &bronze_dir, &silver_dir);
    let second: Vec<Vec<u8>> = outputs.iter().map(|p| fs::read(p).unwrap()).collect();
    assert_eq!(first, second);
}

#[test]
fn test_missing_isino_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let normalized = dir.path().join("normalized");
    fs::create_dir_all(&normalized).unwrap();
    let bronze_dir = dir.path().join("bronze");

    assert!(bronze::build_isin(&normalized, &bronze_dir).is_err());
    assert!(!bronze_dir.join(ISIN_BRONZE).exists());
}
