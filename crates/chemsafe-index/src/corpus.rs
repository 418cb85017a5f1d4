//! Rule corpus: JSONL loading and one-shot import.
//!
//! The loader is a pure parse step — no dedup, no embedding. Dedup by
//! content prefix belongs to the importer, which turns a free-form source
//! file (JSON arrays embedded in surrounding prose) into the normalized
//! corpus.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Number of leading characters of `content` that form the dedup key
/// during import. Near-duplicate long rules sharing this prefix collide;
/// accepted for a hand-curated corpus.
pub const DEDUP_PREFIX_CHARS: usize = 80;

/// Category tag for records that carry none.
pub const UNTAGGED: &str = "未分类";

#[derive(Debug, Clone, thiserror::Error)]
pub enum CorpusError {
    #[error("failed to read corpus {path}: {message}")]
    Io { path: String, message: String },
    #[error("corpus {path} line {line}: invalid record: {message}")]
    BadRecord { path: String, line: usize, message: String },
}

/// One knowledge-base entry, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleUnit {
    /// Free-text category tag, e.g. "硝化反应".
    pub tag: String,
    pub content: String,
    /// 1-based line number in the source corpus file.
    pub line: usize,
    /// Provenance pointer, e.g. `safety_knowledge.jsonl:line_12`.
    pub source: String,
}

impl RuleUnit {
    /// Retrievable text: the tag as a bracketed prefix to the content.
    pub fn text(&self) -> String {
        format!("[{}] {}", self.tag, self.content)
    }
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    content: String,
}

/// Parse a line-delimited rule corpus. Blank lines are skipped; every
/// other line must be a JSON object with `content` (and usually `tag`).
pub fn load_jsonl(path: &Path) -> Result<Vec<RuleUnit>, CorpusError> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|e| CorpusError::Io {
        path: display.clone(),
        message: e.to_string(),
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| display.clone());

    let mut units = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: RawRecord =
            serde_json::from_str(trimmed).map_err(|e| CorpusError::BadRecord {
                path: display.clone(),
                line: line_no,
                message: e.to_string(),
            })?;
        units.push(RuleUnit {
            tag: record.tag.unwrap_or_else(|| UNTAGGED.to_string()),
            content: record.content,
            line: line_no,
            source: format!("{file_name}:line_{line_no}"),
        });
    }
    Ok(units)
}

/// A record as it appears in the raw import source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRule {
    pub tag: String,
    pub content: String,
}

/// Extract rule records from a free-form source file containing JSON
/// arrays of `{tag, content}` objects amid other text. Records whose
/// content shares its first [`DEDUP_PREFIX_CHARS`] characters with an
/// earlier record are dropped. Arrays that fail to parse are logged and
/// skipped.
pub fn import_raw(text: &str) -> Vec<RawRule> {
    let array_re = regex::Regex::new(r"(?s)\[\s*\{.*?\}\s*\]").expect("static regex");
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut records = Vec::new();

    for m in array_re.find_iter(text) {
        let parsed: Result<Vec<serde_json::Value>, _> = serde_json::from_str(m.as_str());
        let items = match parsed {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparseable rule array in import source");
                continue;
            }
        };
        for item in items {
            let (Some(tag), Some(content)) = (
                item.get("tag").and_then(|v| v.as_str()),
                item.get("content").and_then(|v| v.as_str()),
            ) else {
                continue;
            };
            let key: String = content.chars().take(DEDUP_PREFIX_CHARS).collect();
            if seen.insert(key) {
                records.push(RawRule {
                    tag: tag.to_string(),
                    content: content.to_string(),
                });
            }
        }
    }
    records
}

/// Write imported records as normalized JSONL, one object per line.
pub fn write_jsonl(records: &[RawRule], path: &Path) -> Result<(), CorpusError> {
    let mut out = String::new();
    for record in records {
        let line = serde_json::to_string(record).map_err(|e| CorpusError::BadRecord {
            path: path.display().to_string(),
            line: 0,
            message: e.to_string(),
        })?;
        out.push_str(&line);
        out.push('\n');
    }
    fs::write(path, out).map_err(|e| CorpusError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_skips_blank_lines_and_numbers_from_one() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"tag": "硝化反应", "content": "严禁在密闭容器中进行硝化"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"content": "无标签规则"}}"#).unwrap();

        let units = load_jsonl(file.path()).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].tag, "硝化反应");
        assert_eq!(units[0].line, 1);
        assert!(units[0].source.ends_with(":line_1"));
        assert_eq!(units[0].text(), "[硝化反应] 严禁在密闭容器中进行硝化");
        // Blank line consumed a line number but produced no unit.
        assert_eq!(units[1].line, 3);
        assert_eq!(units[1].tag, UNTAGGED);
    }

    #[test]
    fn load_rejects_malformed_record() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        assert!(matches!(
            load_jsonl(file.path()),
            Err(CorpusError::BadRecord { line: 1, .. })
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        assert!(matches!(
            load_jsonl(Path::new("/nonexistent/rules.jsonl")),
            Err(CorpusError::Io { .. })
        ));
    }

    #[test]
    fn import_extracts_arrays_and_dedups_by_prefix() {
        let long = "长".repeat(DEDUP_PREFIX_CHARS);
        let text = format!(
            r#"
            前言文字
            [{{"tag": "过氧化物", "content": "过氧化物需避光保存"}}]
            中间说明
            [{{"tag": "过氧化物", "content": "过氧化物需避光保存"}},
             {{"tag": "硝化反应", "content": "{long}尾部A"}},
             {{"tag": "硝化反应", "content": "{long}尾部B"}},
             {{"no_tag": true}}]
            "#
        );
        let records = import_raw(&text);
        // Exact duplicate dropped; the two long rules share an 80-char
        // prefix, so only the first survives.
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content, "过氧化物需避光保存");
        assert!(records[1].content.ends_with("尾部A"));
    }

    #[test]
    fn import_skips_broken_arrays() {
        let text = r#"[{"tag": "a", "content": }] [{"tag": "b", "content": "ok"}]"#;
        let records = import_raw(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag, "b");
    }

    #[test]
    fn import_round_trips_through_jsonl() {
        let records = vec![RawRule { tag: "硝化反应".into(), content: "规则内容".into() }];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.jsonl");
        write_jsonl(&records, &path).unwrap();
        let units = load_jsonl(&path).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].tag, "硝化反应");
        assert_eq!(units[0].content, "规则内容");
    }
}
