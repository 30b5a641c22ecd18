//! Opinion-section slicing of extracted auditor report text.
//!
//! Bilingual reports are reduced to their ASCII column first. Blocks that open
//! with a financial statement heading are then dropped up to the next
//! audit/opinion heading, and every kept opinion region runs for at least
//! [`MIN_EXTRACT_CHARS`] characters.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::ExtractionError;

/// Smallest region kept after an opinion heading.
pub const MIN_EXTRACT_CHARS: usize = 2000;

pub const START_KEYWORDS: &[&str] = &[
    "audit",
    "opinion",
    "management",
    "material uncertainty",
    "going concern",
    "emphasis of matter",
];

pub const STOP_KEYWORDS: &[&str] = &[
    "financial",
    "statements",
    "consolidated",
    "balance",
    "income",
    "notes",
    "appendix",
    "schedule",
    "result",
    "assets",
    "liabilities",
    "profit",
];

fn keyword_regex(keywords: &[&str]) -> Regex {
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).unwrap()
}

static START: LazyLock<Regex> = LazyLock::new(|| keyword_regex(START_KEYWORDS));
static STOP: LazyLock<Regex> = LazyLock::new(|| keyword_regex(STOP_KEYWORDS));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9 \-'(),.]+$").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn is_start(line: &str) -> bool {
    START.is_match(line)
}

/// A stop line that does not also open an opinion section.
fn is_stop(line: &str) -> bool {
    STOP.is_match(line) && !is_start(line)
}

/// Keep 7-bit ASCII only. Works on raw bytes, so invalid UTF-8 is harmless.
pub fn remove_non_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect()
}

/// Treat every vertical break pdftotext can emit as a newline.
fn unify_breaks(text: &str) -> String {
    text.replace("\r\n", "\n").replace(['\r', '\x0b', '\x0c'], "\n")
}

/// Trimmed non-blank lines, minus table rows (over 30% digits and longer
/// than 20 characters).
pub fn remove_table_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| {
            let len = s.chars().count();
            let digits = s.chars().filter(char::is_ascii_digit).count();
            !(len > 20 && digits as f64 / len as f64 > 0.3)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop every block from a stop line to the next start line. The region
/// after each start line is kept for at least [`MIN_EXTRACT_CHARS`]
/// characters before scanning resumes. A stop line with no later start line
/// drops the rest of the text.
pub fn remove_stop_blocks(text: &str) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < lines.len() {
        if !is_stop(lines[i]) {
            out.push_str(lines[i]);
            i += 1;
            continue;
        }

        let Some(start) = (i + 1..lines.len()).find(|&j| is_start(lines[j])) else {
            break;
        };
        let mut kept = 0;
        let mut k = start;
        while k < lines.len() && kept < MIN_EXTRACT_CHARS {
            out.push_str(lines[k]);
            kept += lines[k].len();
            k += 1;
        }
        i = k;
    }
    out
}

/// Section from the first start heading to the next stop line or all-caps
/// heading, widened to [`MIN_EXTRACT_CHARS`]. Without a start heading the
/// table-cleaned text is returned whole.
pub fn extract_section_by_heading(text: &str) -> String {
    let cleaned = remove_table_lines(text);
    let lines: Vec<&str> = cleaned.split('\n').collect();

    let Some(start_idx) = lines.iter().position(|l| is_start(l)) else {
        return cleaned;
    };

    let end_idx = (start_idx + 1..lines.len())
        .find(|&j| {
            let line = lines[j].trim();
            is_stop(line) || (line.len() >= 3 && HEADING.is_match(line))
        })
        .unwrap_or(lines.len());

    // offsets[i] is where line i begins; every line is followed by one '\n'.
    let mut offsets = Vec::with_capacity(lines.len() + 1);
    offsets.push(0usize);
    for line in &lines {
        offsets.push(offsets[offsets.len() - 1] + line.len() + 1);
    }

    let start_char = offsets[start_idx];
    let mut end_char = offsets[end_idx];
    if end_char - start_char < MIN_EXTRACT_CHARS {
        let desired = start_char + MIN_EXTRACT_CHARS;
        if desired <= cleaned.len() {
            let mut k = start_idx;
            while k < lines.len() && offsets[k + 1] < desired {
                k += 1;
            }
            end_char = offsets[(k + 1).min(lines.len())];
        } else {
            end_char = cleaned.len();
        }
    }

    let end_char = end_char.min(cleaned.len());
    cleaned[start_char..end_char].trim().to_string()
}

/// Collapse whitespace inside lines and runs of blank lines.
pub fn normalize_lines(section: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut blank = false;
    for line in section.lines() {
        let line = WHITESPACE.replace_all(line, " ").trim_end().to_string();
        if line.is_empty() {
            if !blank {
                out.push(String::new());
            }
            blank = true;
        } else {
            out.push(line);
            blank = false;
        }
    }
    out.join("\n").trim().to_string()
}

/// Slice one report's raw bytes into its opinion text.
pub fn slice_text(raw: &[u8]) -> String {
    let ascii = unify_breaks(&remove_non_ascii(raw));
    let kept = remove_stop_blocks(&ascii);
    let section = if kept.is_empty() {
        extract_section_by_heading(&ascii)
    } else {
        kept
    };
    normalize_lines(&section)
}

/// Slice every `.txt` file in `src_dir` into `out_dir`, keeping file names.
/// Returns the number of files written.
pub fn slice_all(src_dir: &Path, out_dir: &Path) -> Result<usize, ExtractionError> {
    if !src_dir.is_dir() {
        return Err(ExtractionError::SourceMissing(src_dir.to_path_buf()));
    }
    let mut files: Vec<_> = fs::read_dir(src_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("txt"))
        .collect();
    if files.is_empty() {
        return Err(ExtractionError::NoInput(src_dir.to_path_buf()));
    }
    files.sort();
    fs::create_dir_all(out_dir)?;

    for (i, path) in files.iter().enumerate() {
        let raw = fs::read(path)?;
        let Some(name) = path.file_name() else {
            continue;
        };
        fs::write(out_dir.join(name), slice_text(&raw))?;
        if (i + 1) % 200 == 0 {
            tracing::info!("Sliced {}/{} files", i + 1, files.len());
        }
    }

    tracing::info!("Wrote {} sliced files to {}", files.len(), out_dir.display());
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_match_whole_words() {
        assert!(is_start("KEY AUDIT MATTERS"));
        assert!(!is_start("INDEPENDENT AUDITOR'S REPORT"));
        assert!(!is_start("auditors"));
        assert!(is_start("Basis for Opinion"));
        assert!(is_stop("Consolidated Statement of Profit or Loss"));
        assert!(!is_stop("Opinion on the consolidated financial statements"));
        assert!(!is_stop("Profitability"));
    }

    #[test]
    fn test_remove_non_ascii() {
        assert_eq!(remove_non_ascii("Opinion 意見\n".as_bytes()), "Opinion \n");
        assert_eq!(remove_non_ascii(&[b'a', 0xff, b'b']), "ab");
    }

    #[test]
    fn test_remove_table_lines() {
        let text = "  Opinion  \n\nRevenue 1,234,567 2,345,678 3,456,789\n2024\n";
        assert_eq!(remove_table_lines(text), "Opinion\n2024");
    }

    #[test]
    fn test_remove_stop_blocks_skips_to_next_start() {
        let text = "Independent auditor's report\nWe have audited.\nConsolidated balance sheet\n\
                    Cash 100\nBasis for opinion\nWe conducted our audit.\n";
        let kept = remove_stop_blocks(text);
        assert_eq!(
            kept,
            "Independent auditor's report\nWe have audited.\nBasis for opinion\nWe conducted our audit.\n"
        );
    }

    #[test]
    fn test_remove_stop_blocks_keeps_minimum_after_start() {
        let filler = "The statements are fine.\n".repeat(100);
        let text = format!("Notes to accounts\nOpinion\n{}Tail\n", filler);
        let kept = remove_stop_blocks(&text);
        // Stop lines inside the minimum region are kept.
        assert!(kept.starts_with("Opinion\nThe statements are fine.\n"));
        assert!(kept.len() >= MIN_EXTRACT_CHARS);
        assert!(!kept.contains("Notes to accounts"));
    }

    #[test]
    fn test_remove_stop_blocks_without_start_drops_rest() {
        let text = "Report text\nIncome statement\nRevenue\n";
        assert_eq!(remove_stop_blocks(text), "Report text\n");
    }

    #[test]
    fn test_heading_fallback() {
        let text = "Notes\nAUDITOR OPINION\nQualified wording here.\nMORE TEXT\nIgnored\n";
        let section = extract_section_by_heading(text);
        assert!(section.starts_with("AUDITOR OPINION\nQualified wording here."));

        let no_heading = "Balance\nRevenue 1\n";
        assert_eq!(extract_section_by_heading(no_heading), "Balance\nRevenue 1");
    }

    #[test]
    fn test_slice_text_falls_back_when_nothing_kept() {
        let raw = b"Consolidated income statement\nRevenue    100\n";
        assert_eq!(
            slice_text(raw),
            "Consolidated income statement\nRevenue 100"
        );
    }

    #[test]
    fn test_normalize_lines() {
        let section = "  a   b  \n\n\n\nc\t\td\n\n";
        assert_eq!(normalize_lines(section), "a b\n\nc d");
    }

    #[test]
    fn test_slice_all() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("txt");
        let out = dir.path().join("sliced");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("2024032000123.txt"),
            "Independent auditor's report\nOpinion\x0cNotes to the financial statements\n1. General\n",
        )
        .unwrap();
        fs::write(src.join("ignored.pdf"), b"%PDF").unwrap();

        assert_eq!(slice_all(&src, &out).unwrap(), 1);
        assert_eq!(
            fs::read_to_string(out.join("2024032000123.txt")).unwrap(),
            "Independent auditor's report\nOpinion"
        );
    }

    #[test]
    fn test_slice_all_without_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            slice_all(&dir.path().join("none"), dir.path()),
            Err(ExtractionError::SourceMissing(_))
        ));
        assert!(matches!(
            slice_all(dir.path(), &dir.path().join("out")),
            Err(ExtractionError::NoInput(_))
        ));
    }
}
