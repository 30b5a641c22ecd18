//! Auditor report index scraping.

use std::path::Path;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::Table;
use crate::sink::csv::write_table;

use super::{FetchError, HttpClient};

pub const AUDITOR_REPORTS_URL: &str =
    "https://www3.hkexnews.hk/reports/auditorreport/ncms/auditorreport_anntdate_des.htm";

pub const AUDITOR_INDEX_FILE: &str = "auditor_reports.csv";

pub const AUDITOR_INDEX_COLUMNS: &[&str] = &[
    "stock_code",
    "listed_company_name",
    "announcement_date",
    "hyperlink",
    "pdf_path",
    "document_name",
];

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// One row of the auditor report index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditorReportRow {
    pub stock_code: String,
    pub listed_company_name: String,
    pub announcement_date: String,
    pub hyperlink: String,
    pub pdf_path: String,
    pub document_name: String,
}

/// Cell text with each text node trimmed and concatenated.
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().map(str::trim).collect()
}

/// Last path segment of a link, without query string.
pub fn file_name_from_link(link: &str) -> Option<String> {
    let path = link.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    (!name.is_empty()).then(|| name.to_string())
}

fn first_table<'a>(document: &'a Html, page: &str) -> Result<ElementRef<'a>, FetchError> {
    document
        .select(&TABLE)
        .next()
        .ok_or_else(|| FetchError::InvalidResponse {
            url: page.to_string(),
            detail: "no table found".to_string(),
        })
}

/// Parse the index table. The first row is the header; rows with fewer than
/// three cells are skipped. `pdf_dir` prefixes the local PDF path.
pub fn parse_index(html: &str, page: &str, pdf_dir: &Path) -> Result<Vec<AuditorReportRow>, FetchError> {
    let document = Html::parse_document(html);
    let table = first_table(&document, page)?;

    let mut rows = Vec::new();
    for tr in table.select(&ROW).skip(1) {
        let cols: Vec<String> = tr.select(&CELL).map(cell_text).collect();
        if cols.len() < 3 {
            continue;
        }

        let hyperlink = tr
            .select(&LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default()
            .to_string();
        let file_name = file_name_from_link(&hyperlink);
        let document_name = file_name
            .as_deref()
            .map(|n| Path::new(n).file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default())
            .unwrap_or_default();
        let pdf_path = file_name
            .map(|n| pdf_dir.join(n).to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();

        rows.push(AuditorReportRow {
            stock_code: cols[0].clone(),
            listed_company_name: cols[1].clone(),
            announcement_date: cols[2].clone(),
            hyperlink,
            pdf_path,
            document_name,
        });
    }
    Ok(rows)
}

/// Every `.pdf` link in the index table, resolved against the page URL.
pub fn pdf_links(html: &str, page: &str) -> Result<Vec<Url>, FetchError> {
    let base = Url::parse(page)?;
    let document = Html::parse_document(html);
    let table = first_table(&document, page)?;

    let mut links = Vec::new();
    for a in table.select(&LINK) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        if !href.to_ascii_lowercase().ends_with(".pdf") {
            continue;
        }
        match base.join(href) {
            Ok(url) => links.push(url),
            Err(e) => tracing::debug!("Skipping bad link {}: {}", href, e),
        }
    }
    Ok(links)
}

pub fn rows_to_table(rows: &[AuditorReportRow]) -> Table {
    let mut table = Table::with_columns(AUDITOR_INDEX_COLUMNS);
    for r in rows {
        table.push_row(
            [
                &r.stock_code,
                &r.listed_company_name,
                &r.announcement_date,
                &r.hyperlink,
                &r.pdf_path,
                &r.document_name,
            ]
            .into_iter()
            .map(|v| (!v.is_empty()).then(|| v.clone()))
            .collect(),
        );
    }
    table
}

/// Scrape the index into `raw/auditor_reports.csv`. Returns the row count.
pub async fn fetch_index(client: &HttpClient, raw_dir: &Path, pdf_dir: &Path) -> Result<usize, FetchError> {
    let html = client.get_text(AUDITOR_REPORTS_URL).await?;
    let rows = parse_index(&html, AUDITOR_REPORTS_URL, pdf_dir)?;
    let path = raw_dir.join(AUDITOR_INDEX_FILE);
    write_table(&path, &rows_to_table(&rows))?;
    tracing::info!("Saved {} rows to {}", rows.len(), path.display());
    Ok(rows.len())
}
