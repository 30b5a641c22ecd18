//! Press release downloads from the HKEXnews title search.
//!
//! The search endpoint answers with a JSON object whose `result` field is
//! itself a JSON-encoded array of announcement records.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::models::Table;
use crate::sink::csv::{write_atomic, write_table};
use crate::sink::lists::PRESS_CSV_PREFIX;

use super::client::SEARCH_REFERER;
use super::retry::RetryPolicy;
use super::{FetchError, HttpClient};

pub const TITLE_SEARCH_URL: &str = "https://www1.hkexnews.hk/search/titleSearchServlet.do";

pub const PRESS_SUMMARY_FILE: &str = "press_summary.csv";

/// Search window and page size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressQuery {
    /// `YYYYMMDD`
    pub from_date: String,
    /// `YYYYMMDD`
    pub to_date: String,
    pub row_range: u32,
}

impl Default for PressQuery {
    fn default() -> Self {
        Self {
            from_date: "19990401".to_string(),
            to_date: chrono::Local::now().format("%Y%m%d").to_string(),
            row_range: 10000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressStatus {
    Saved,
    Empty,
    Failed,
}

impl fmt::Display for PressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PressStatus::Saved => "saved",
            PressStatus::Empty => "empty",
            PressStatus::Failed => "failed",
        })
    }
}

/// Per-id summary line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressOutcome {
    pub stock_id: String,
    pub status: PressStatus,
    pub rows: usize,
}

pub type Record = Map<String, Value>;

/// Decode the double-encoded `result` field.
pub fn parse_result(body: &str) -> Result<Vec<Record>, FetchError> {
    let envelope: Value = serde_json::from_str(body)?;
    let result = match envelope.get("result") {
        Some(Value::String(s)) => s.as_str(),
        Some(Value::Null) | None => {
            return Err(FetchError::InvalidResponse {
                url: TITLE_SEARCH_URL.to_string(),
                detail: "response has no result field".to_string(),
            })
        }
        Some(other) => {
            return Err(FetchError::InvalidResponse {
                url: TITLE_SEARCH_URL.to_string(),
                detail: format!("unexpected result type: {}", other),
            })
        }
    };

    if result.trim().is_empty() || result.trim() == "null" {
        return Ok(Vec::new());
    }
    let records: Vec<Value> = serde_json::from_str(result)?;
    Ok(records
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Flatten records into a table whose columns are the union of keys in
/// first-seen order.
pub fn records_to_table(records: &[Record]) -> Table {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let mut table = Table::new(columns.clone());
    for record in records {
        table.push_row(
            columns
                .iter()
                .map(|c| record.get(c).and_then(value_text))
                .collect(),
        );
    }
    table
}

pub fn press_paths(press_dir: &Path, stock_id: &str) -> (PathBuf, PathBuf) {
    (
        press_dir.join(format!("{}{}.json", PRESS_CSV_PREFIX, stock_id)),
        press_dir.join(format!("{}{}.csv", PRESS_CSV_PREFIX, stock_id)),
    )
}

/// Save the raw records and their CSV flattening for one stock id.
pub fn save_records(press_dir: &Path, stock_id: &str, records: &[Record]) -> Result<(), FetchError> {
    let (json_path, csv_path) = press_paths(press_dir, stock_id);
    let json = serde_json::to_string_pretty(records)?;
    write_atomic(&json_path, |tmp| {
        tmp.write_all(json.as_bytes())?;
        Ok(())
    })?;
    write_table(&csv_path, &records_to_table(records))?;
    Ok(())
}

async fn search(client: &HttpClient, policy: &RetryPolicy, query: &PressQuery, stock_id: &str) -> Result<String, FetchError> {
    let row_range = query.row_range.to_string();
    let params = [
        ("sortDir", "0"),
        ("sortByOptions", "DateTime"),
        ("category", "0"),
        ("market", "SEHK"),
        ("stockId", stock_id),
        ("documentType", "-1"),
        ("fromDate", query.from_date.as_str()),
        ("toDate", query.to_date.as_str()),
        ("title", ""),
        ("searchType", "0"),
        ("t1code", "-2"),
        ("t2Gcode", "-2"),
        ("t2code", "-2"),
        ("rowRange", row_range.as_str()),
        ("lang", "E"),
    ];

    policy
        .run(&format!("press search {}", stock_id), || async {
            let response = client.get_api(TITLE_SEARCH_URL, &params).await?;
            if !response.is_success() {
                return Err(FetchError::Status {
                    url: TITLE_SEARCH_URL.to_string(),
                    status: response.status.as_u16(),
                });
            }
            Ok(response.text().await?)
        })
        .await
}

/// Fetch and save press releases for one stock id.
pub async fn fetch_press_for_id(
    client: &HttpClient,
    query: &PressQuery,
    stock_id: &str,
    press_dir: &Path,
) -> PressOutcome {
    let policy = RetryPolicy::default();
    let result = match search(client, &policy, query, stock_id).await {
        Ok(body) => parse_result(&body),
        Err(e) => Err(e),
    };

    let (status, rows) = match result {
        Ok(records) if records.is_empty() => (PressStatus::Empty, 0),
        Ok(records) => match save_records(press_dir, stock_id, &records) {
            Ok(()) => {
                tracing::info!("Saved {} press releases for stock id {}", records.len(), stock_id);
                (PressStatus::Saved, records.len())
            }
            Err(e) => {
                tracing::warn!("Failed to save press releases for {}: {}", stock_id, e);
                (PressStatus::Failed, 0)
            }
        },
        Err(e) => {
            tracing::warn!("No press releases for stock id {}: {}", stock_id, e);
            (PressStatus::Failed, 0)
        }
    };

    PressOutcome {
        stock_id: stock_id.to_string(),
        status,
        rows,
    }
}

pub fn summary_table(outcomes: &[PressOutcome]) -> Table {
    let mut table = Table::with_columns(&["stock_id", "status", "rows"]);
    for o in outcomes {
        table.push_row(vec![
            Some(o.stock_id.clone()),
            Some(o.status.to_string()),
            Some(o.rows.to_string()),
        ]);
    }
    table
}

/// Fetch press releases for every id in order and write the run summary.
pub async fn fetch_press_releases(
    client: &HttpClient,
    stock_ids: &[String],
    press_dir: &Path,
    query: &PressQuery,
    summary_path: &Path,
) -> Result<Vec<PressOutcome>, FetchError> {
    let client = client.clone().with_referer(SEARCH_REFERER);
    let mut outcomes = Vec::with_capacity(stock_ids.len());
    for stock_id in stock_ids {
        outcomes.push(fetch_press_for_id(&client, query, stock_id, press_dir).await);
    }
    write_table(summary_path, &summary_table(&outcomes))?;
    Ok(outcomes)
}
