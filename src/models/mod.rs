//! Data models for the HKEX pipeline.

mod schema;
mod sheet;
mod table;

pub use schema::{
    GEM_COLUMNS, ISIN_COLUMNS, MAIN_COLUMNS, NATIONAL_AGENCY_COLUMNS, SEC_NAME_COLUMNS,
    STOCK_TYPE_COLUMNS,
};
pub use sheet::Sheet;
pub use table::{Cell, Row, Table, TableError};
