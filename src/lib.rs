//! hkex-etl - HKEX listing, ISIN registry and auditor report ETL.
//!
//! Downloads HKEX source files, normalizes the spreadsheets, extracts bronze
//! tables, builds ISIN-enriched silver tables and loads them into SQLite.

pub mod auditor;
pub mod bronze;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod silver;
pub mod sink;
pub mod wrds;
