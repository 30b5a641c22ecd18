//! Freshness sidecars for conditionally fetched files.
//!
//! `raw/isino.xls` keeps its validators in `raw/isino.xls.metadata`, a JSON
//! object with optional `ETag` and `Last-Modified` keys.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sink::csv::write_atomic;
use crate::sink::SinkError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freshness {
    #[serde(rename = "ETag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(rename = "Last-Modified", default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl Freshness {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

pub fn sidecar_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".metadata");
    PathBuf::from(name)
}

/// Load the validators for `file`. A missing or unreadable sidecar yields
/// empty validators.
pub fn load(file: &Path) -> Freshness {
    let path = sidecar_path(file);
    let Ok(text) = std::fs::read_to_string(&path) else {
        return Freshness::default();
    };
    serde_json::from_str(&text).unwrap_or_else(|e| {
        tracing::debug!("Ignoring unreadable sidecar {}: {}", path.display(), e);
        Freshness::default()
    })
}

pub fn save(file: &Path, freshness: &Freshness) -> Result<(), SinkError> {
    let json = serde_json::to_string(freshness)
        .map_err(|e| SinkError::InvalidResult(e.to_string()))?;
    write_atomic(&sidecar_path(file), |tmp| {
        tmp.write_all(json.as_bytes())?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("data/raw/isino.xls")),
            PathBuf::from("data/raw/isino.xls.metadata")
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("isino.xls");
        let freshness = Freshness {
            etag: Some("\"abc\"".into()),
            last_modified: None,
        };
        save(&file, &freshness).unwrap();

        let raw = std::fs::read_to_string(sidecar_path(&file)).unwrap();
        assert_eq!(raw, r#"{"ETag":"\"abc\""}"#);
        assert_eq!(load(&file), freshness);
    }

    #[test]
    fn test_corrupt_sidecar_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("isinsehk.xls");
        std::fs::write(sidecar_path(&file), "{not json").unwrap();
        assert!(load(&file).is_empty());
        assert!(load(&dir.path().join("missing.xls")).is_empty());
    }
}
