//! Cell cleaning applied to every extracted value.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::Cell;

static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\r\n]+").unwrap());
static QUOTES_ONLY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"^"+$"#).unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Flatten line breaks, trim, and null out empty or quote-only cells.
pub fn normalize_cell(raw: Option<&str>) -> Cell {
    let raw = raw?;
    let flattened = LINE_BREAKS.replace_all(raw, " ");
    let trimmed = flattened.trim();
    if trimmed.is_empty() || QUOTES_ONLY.is_match(trimmed) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Collapse interior whitespace runs to a single space.
pub fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RUN.replace_all(value.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_breaks_flattened() {
        assert_eq!(
            normalize_cell(Some("Company\r\nName\n\nat listing")),
            Some("Company Name at listing".to_string())
        );
    }

    #[test]
    fn test_quote_only_is_null() {
        assert_eq!(normalize_cell(Some("\"\"")), None);
        assert_eq!(normalize_cell(Some(" \" ")), None);
        assert_eq!(normalize_cell(Some("   ")), None);
        assert_eq!(normalize_cell(None), None);
        assert_eq!(
            normalize_cell(Some("\"Quoted\"")),
            Some("\"Quoted\"".to_string())
        );
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  ABC   Holdings \t Ltd "), "ABC Holdings Ltd");
    }
}
