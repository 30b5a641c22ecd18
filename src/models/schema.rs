//! Fixed column names for each bronze category.

/// GEM listing report columns.
pub const GEM_COLUMNS: &[&str] = &[
    "source_file",
    "listing_date",
    "stock_code",
    "company",
    "offer_price",
    "subscription_ratio",
    "funds_raised",
    "shrout_at_listing",
    "mcap_at_listing",
    "industry",
    "place_of_incorporation",
    "listing_method",
    "sponsors",
    "reporting_accountant",
];

/// Main Board listing report columns. Same as GEM plus the trailing
/// offer-location marker (`(a)`, `(b)`, `(c)`).
pub const MAIN_COLUMNS: &[&str] = &[
    "source_file",
    "listing_date",
    "stock_code",
    "company",
    "offer_price",
    "subscription_ratio",
    "funds_raised",
    "shrout_at_listing",
    "mcap_at_listing",
    "industry",
    "place_of_incorporation",
    "listing_method",
    "sponsors",
    "reporting_accountant",
    "offer_location",
];

/// ISIN registry columns (after enrichment with security names).
pub const ISIN_COLUMNS: &[&str] = &[
    "source_file",
    "company",
    "isin_code",
    "stock_code",
    "stock_type",
    "place_of_incorporation",
    "national_agency",
    "hkex_co_name",
];

/// Security-name table columns.
pub const SEC_NAME_COLUMNS: &[&str] = &["stock_code", "hkex_co_name"];

pub const STOCK_TYPE_COLUMNS: &[&str] = &["stock_type", "description"];

pub const NATIONAL_AGENCY_COLUMNS: &[&str] = &["national_agency", "description"];
