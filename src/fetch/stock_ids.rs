//! Stock code to HKEXnews stock id mapping via the JSONP prefix search.
//!
//! The prefix search returns every security whose code starts with the query,
//! so one response usually covers several codes. Codes seen in any response
//! are not queried again.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::models::Table;
use crate::sink::csv::write_table;

use super::client::SEARCH_REFERER;
use super::retry::RetryPolicy;
use super::{FetchError, HttpClient};

pub const PREFIX_API_URL: &str = "https://www1.hkexnews.hk/search/prefix.do";

pub const MAPPING_FILE: &str = "stock_mapping_filtered.csv";
pub const PARTIAL_MAPPING_FILE: &str = "stock_mapping_partial.csv";

pub const STOCK_ID_COLUMNS: &[&str] = &["stock_code", "stock_id", "name", "market"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct PrefixResponse {
    #[serde(rename = "stockInfo", default)]
    stock_info: Vec<StockInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StockInfo {
    #[serde(rename = "stockId")]
    pub stock_id: Value,
    pub code: Value,
    #[serde(default)]
    pub name: Option<String>,
}

impl StockInfo {
    /// Numeric stock code; the API sends it zero-padded as a string.
    pub fn code(&self) -> Option<u32> {
        match &self.code {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn stock_id(&self) -> Option<String> {
        match &self.stock_id {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }
}

/// One output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockIdRow {
    pub stock_code: u32,
    pub stock_id: String,
    pub name: Option<String>,
    pub market: &'static str,
}

/// Strip a `callback(...)` wrapper and parse the payload.
pub fn parse_jsonp(raw: &str) -> Option<Value> {
    let body = raw.trim().strip_prefix("callback(")?;
    let body = body
        .strip_suffix(");")
        .or_else(|| body.strip_suffix(')'))
        .unwrap_or(body);
    serde_json::from_str(body).ok()
}

/// Stock entries in a prefix search response. Malformed responses are empty.
pub fn parse_stock_info(raw: &str) -> Vec<StockInfo> {
    parse_jsonp(raw)
        .and_then(|v| serde_json::from_value::<PrefixResponse>(v).ok())
        .map(|r| r.stock_info)
        .unwrap_or_default()
}

pub fn classify_market(code: u32) -> &'static str {
    if (8000..=8999).contains(&code) {
        "GEM"
    } else {
        "SEHK"
    }
}

/// Shared state of one mapping run.
#[derive(Debug, Default)]
pub struct FetchContext {
    results: Mutex<Vec<StockIdRow>>,
    seen_codes: Mutex<HashSet<u32>>,
    seen_stock_ids: Mutex<HashSet<String>>,
}

impl FetchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `code` as queried. Returns false when it was already seen.
    pub async fn claim_code(&self, code: u32) -> bool {
        self.seen_codes.lock().await.insert(code)
    }

    /// Record a response: its codes become seen and unseen stock ids are
    /// appended. Returns the number of rows added.
    pub async fn record(&self, infos: &[StockInfo]) -> usize {
        {
            let mut codes = self.seen_codes.lock().await;
            codes.extend(infos.iter().filter_map(StockInfo::code));
        }

        let mut added = Vec::new();
        {
            let mut ids = self.seen_stock_ids.lock().await;
            for info in infos {
                let (Some(code), Some(stock_id)) = (info.code(), info.stock_id()) else {
                    continue;
                };
                if !ids.insert(stock_id.clone()) {
                    continue;
                }
                added.push(StockIdRow {
                    stock_code: code,
                    stock_id,
                    name: info.name.clone(),
                    market: classify_market(code),
                });
            }
        }

        let count = added.len();
        self.results.lock().await.extend(added);
        count
    }

    pub async fn rows(&self) -> Vec<StockIdRow> {
        self.results.lock().await.clone()
    }
}

pub fn rows_to_table(rows: &[StockIdRow]) -> Table {
    let mut table = Table::with_columns(STOCK_ID_COLUMNS);
    for row in rows {
        table.push_row(vec![
            Some(row.stock_code.to_string()),
            Some(row.stock_id.clone()),
            row.name.clone(),
            Some(row.market.to_string()),
        ]);
    }
    table
}

/// Read stock codes, one per line, dropping duplicates and unparseable lines.
pub fn read_codes(path: &Path) -> Result<Vec<u32>, FetchError> {
    if !path.exists() {
        return Err(FetchError::Sink(crate::sink::SinkError::InputMissing(path.to_path_buf())));
    }
    let text = std::fs::read_to_string(path)?;
    let mut seen = HashSet::new();
    let mut codes = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.parse::<u32>() {
            Ok(code) if seen.insert(code) => codes.push(code),
            Ok(_) => {}
            Err(_) => tracing::warn!("Skipping invalid stock code {:?}", line),
        }
    }
    Ok(codes)
}

async fn query_code(client: &HttpClient, policy: &RetryPolicy, code: u32) -> Result<Vec<StockInfo>, FetchError> {
    let name = code.to_string();
    let params = [
        ("callback", "callback"),
        ("lang", "EN"),
        ("type", "A"),
        ("name", name.as_str()),
        ("market", "SEHK"),
    ];
    let text = policy
        .run(&format!("stock id lookup {}", code), || async {
            let response = client.get_api(PREFIX_API_URL, &params).await?;
            if !response.is_success() {
                return Err(FetchError::Status {
                    url: PREFIX_API_URL.to_string(),
                    status: response.status.as_u16(),
                });
            }
            Ok(response.text().await?)
        })
        .await?;
    Ok(parse_stock_info(&text))
}

/// Where a mapping run ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockIdOutcome {
    pub path: PathBuf,
    pub rows: usize,
    pub interrupted: bool,
    pub failed: usize,
}

/// Map `codes` to stock ids with `workers` concurrent lookups.
///
/// Results go to `full_path` when the run completes. On Ctrl-C the workers
/// are stopped and whatever was collected goes to `partial_path`.
pub async fn fetch_stock_ids(
    client: &HttpClient,
    codes: Vec<u32>,
    workers: usize,
    full_path: &Path,
    partial_path: &Path,
) -> Result<StockIdOutcome, FetchError> {
    let client = client.clone().with_referer(SEARCH_REFERER);
    let context = Arc::new(FetchContext::new());
    let total = codes.len();
    let queue = Arc::new(Mutex::new(VecDeque::from(codes)));
    let completed = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    tracing::info!("Looking up stock ids for {} codes", total);

    let mut set = JoinSet::new();
    for _ in 0..workers.max(1) {
        let client = client.clone();
        let context = context.clone();
        let queue = queue.clone();
        let completed = completed.clone();
        let failed = failed.clone();

        set.spawn(async move {
            let policy = RetryPolicy::default();
            loop {
                let Some(code) = queue.lock().await.pop_front() else {
                    break;
                };

                if context.claim_code(code).await {
                    match query_code(&client, &policy, code).await {
                        Ok(infos) => {
                            context.record(&infos).await;
                        }
                        Err(e) => {
                            tracing::warn!("Lookup failed for code {}: {}", code, e);
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                } else {
                    tracing::debug!("Skipping lookup for {}", code);
                }

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % 100 == 0 || done == total {
                    tracing::info!("Progress: {}/{}", done, total);
                }
            }
        });
    }

    let interrupted = tokio::select! {
        _ = async { while set.join_next().await.is_some() {} } => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        tracing::warn!("Interrupted, saving partial results");
        set.abort_all();
    }

    let rows = context.rows().await;
    let path = if interrupted { partial_path } else { full_path };
    write_table(path, &rows_to_table(&rows))?;

    Ok(StockIdOutcome {
        path: path.to_path_buf(),
        rows: rows.len(),
        interrupted,
        failed: failed.load(Ordering::Relaxed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"callback({"more":"0","stockInfo":[
        {"stockId":7609,"code":"00700","name":"TENCENT"},
        {"stockId":"1000123","code":"07000","name":"SOME ETF"},
        {"stockId":7609,"code":"00700","name":"TENCENT DUP"}
    ]});"#;

    #[test]
    fn test_parse_jsonp() {
        assert!(parse_jsonp("callback({\"a\":1})").is_some());
        assert!(parse_jsonp("callback({\"a\":1});").is_some());
        assert!(parse_jsonp("{\"a\":1}").is_none());
        assert!(parse_jsonp("callback(<html>)").is_none());
    }

    #[test]
    fn test_parse_stock_info() {
        let infos = parse_stock_info(RESPONSE);
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[0].code(), Some(700));
        assert_eq!(infos[0].stock_id(), Some("7609".to_string()));
        assert_eq!(infos[1].stock_id(), Some("1000123".to_string()));
        assert!(parse_stock_info("callback(null)").is_empty());
    }

    #[test]
    fn test_classify_market() {
        assert_eq!(classify_market(8001), "GEM");
        assert_eq!(classify_market(8999), "GEM");
        assert_eq!(classify_market(7999), "SEHK");
        assert_eq!(classify_market(9000), "SEHK");
    }

    #[tokio::test]
    async fn test_context_dedups_codes_and_ids() {
        let context = FetchContext::new();
        assert!(context.claim_code(700).await);
        assert!(!context.claim_code(700).await);

        let added = context.record(&parse_stock_info(RESPONSE)).await;
        assert_eq!(added, 2);
        // Codes returned by a response are not queried again.
        assert!(!context.claim_code(7000).await);

        let rows = context.rows().await;
        assert_eq!(rows[0].name.as_deref(), Some("TENCENT"));
        assert_eq!(rows[1].market, "SEHK");
    }

    #[test]
    fn test_read_codes_dedups_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock_code_list.txt");
        std::fs::write(&path, "700\n5\n\n700\nabc\n8001\n").unwrap();
        assert_eq!(read_codes(&path).unwrap(), vec![700, 5, 8001]);
    }
}
