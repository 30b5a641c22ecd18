//! Stock-code coercion.
//!
//! A key is accepted when it is integer text, or float text with a zero
//! fractional part, and strictly positive. Everything else is rejected with a
//! reason; rejected rows leave the table but stay observable.

use std::fmt;

use crate::models::Table;

/// Why a key cell could not be coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRejection {
    Empty,
    NotNumeric(String),
    Fractional(String),
    NonPositive(String),
}

impl fmt::Display for KeyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRejection::Empty => write!(f, "empty key"),
            KeyRejection::NotNumeric(v) => write!(f, "not numeric: {:?}", v),
            KeyRejection::Fractional(v) => write!(f, "fractional: {}", v),
            KeyRejection::NonPositive(v) => write!(f, "non-positive: {}", v),
        }
    }
}

/// A row removed during key coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub source_file: String,
    /// Row position in the extracted table before removal.
    pub row: usize,
    pub reason: KeyRejection,
}

/// Parse a key cell into a positive integer.
pub fn coerce_key(value: Option<&str>) -> Result<u64, KeyRejection> {
    let text = match value.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return Err(KeyRejection::Empty),
    };

    if let Ok(n) = text.parse::<i64>() {
        return if n > 0 {
            Ok(n as u64)
        } else {
            Err(KeyRejection::NonPositive(text.to_string()))
        };
    }

    let f: f64 = text
        .parse()
        .map_err(|_| KeyRejection::NotNumeric(text.to_string()))?;
    if !f.is_finite() {
        return Err(KeyRejection::NotNumeric(text.to_string()));
    }
    if f.fract() != 0.0 {
        return Err(KeyRejection::Fractional(text.to_string()));
    }
    if f <= 0.0 {
        return Err(KeyRejection::NonPositive(text.to_string()));
    }
    if f >= i64::MAX as f64 {
        return Err(KeyRejection::NotNumeric(text.to_string()));
    }
    Ok(f as u64)
}

/// Coerce the key column of `table` in place.
///
/// Accepted keys are rewritten in canonical integer form; rows whose key fails
/// are removed and returned.
pub fn apply_key_coercion(table: &mut Table, key_col: usize, source_file: &str) -> Vec<RejectedRow> {
    let mut rejected = Vec::new();
    let mut drop = Vec::new();

    for row in 0..table.len() {
        match coerce_key(table.get(row, key_col)) {
            Ok(key) => table.set(row, key_col, Some(key.to_string())),
            Err(reason) => {
                tracing::warn!(
                    "{}: dropping row {} ({})",
                    source_file,
                    row,
                    reason
                );
                rejected.push(RejectedRow {
                    source_file: source_file.to_string(),
                    row,
                    reason,
                });
                drop.push(row);
            }
        }
    }

    table.remove_rows(&drop);
    rejected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_accepts_integers_and_whole_floats() {
        assert_eq!(coerce_key(Some("700")), Ok(700));
        assert_eq!(coerce_key(Some(" 8001 ")), Ok(8001));
        assert_eq!(coerce_key(Some("5.0")), Ok(5));
        assert_eq!(coerce_key(Some("1e3")), Ok(1000));
    }

    #[test]
    fn test_coerce_rejections() {
        assert_eq!(coerce_key(None), Err(KeyRejection::Empty));
        assert_eq!(coerce_key(Some("  ")), Err(KeyRejection::Empty));
        assert_eq!(
            coerce_key(Some("Stock Code")),
            Err(KeyRejection::NotNumeric("Stock Code".into()))
        );
        assert_eq!(
            coerce_key(Some("12.5")),
            Err(KeyRejection::Fractional("12.5".into()))
        );
        assert_eq!(coerce_key(Some("0")), Err(KeyRejection::NonPositive("0".into())));
        assert_eq!(
            coerce_key(Some("-3.0")),
            Err(KeyRejection::NonPositive("-3.0".into()))
        );
        assert!(matches!(coerce_key(Some("NaN")), Err(KeyRejection::NotNumeric(_))));
        assert_eq!(
            coerce_key(Some("1e30")),
            Err(KeyRejection::NotNumeric("1e30".into()))
        );
    }

    #[test]
    fn test_apply_key_coercion_removes_and_reports() {
        let mut table = Table::with_columns(&["stock_code", "company"]);
        table.push_row(vec![Some("700.0".into()), Some("Tencent".into())]);
        table.push_row(vec![Some("(HK$)".into()), None]);
        table.push_row(vec![Some("5".into()), Some("HSBC".into())]);

        let rejected = apply_key_coercion(&mut table, 0, "Main_2004.csv");

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, 0), Some("700"));
        assert_eq!(table.get(1, 0), Some("5"));
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].row, 1);
        assert_eq!(rejected[0].source_file, "Main_2004.csv");
    }
}
