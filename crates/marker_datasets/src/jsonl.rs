use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use marker_types::DatasetItem;
use tracing::debug;

use crate::error::DatasetError;
use crate::validate::validate_items;
use crate::Dataset;

/// Load a dataset from a line-delimited JSON file.
///
/// Each non-blank line is one record with fields
/// `{id, input, output?, expected?, tags?, metadata?}`. Malformed lines fail
/// the load with their line number; blank lines are skipped.
pub fn load_jsonl_dataset(path: impl AsRef<Path>) -> Result<Dataset, DatasetError> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let mut items = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item: DatasetItem = serde_json::from_str(trimmed)
            .map_err(|source| DatasetError::MalformedRecord {
                line: idx + 1,
                source,
            })?;
        items.push(item);
    }

    validate_items(&items)?;
    debug!("Loaded {} items from {}", items.len(), path.display());

    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Dataset::new(id, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_jsonl(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".jsonl").unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_jsonl() {
        let file = write_jsonl(concat!(
            r#"{"id":"t1","input":{"prompt":"p1"},"expected":"x"}"#,
            "\n\n",
            r#"{"id":"t2","input":{"prompt":"p2"},"output":"pre","tags":["offline"]}"#,
            "\n",
        ));

        let dataset = load_jsonl_dataset(file.path()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.items[0].id, "t1");
        assert_eq!(dataset.items[1].output, Some(serde_json::json!("pre")));
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let file = write_jsonl(concat!(
            r#"{"id":"t1","input":{}}"#,
            "\n",
            "not json\n",
        ));

        let err = load_jsonl_dataset(file.path()).unwrap_err();
        match err {
            DatasetError::MalformedRecord { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let file = write_jsonl(concat!(
            r#"{"id":"t1","input":{}}"#,
            "\n",
            r#"{"id":"t1","input":{}}"#,
            "\n",
        ));

        let err = load_jsonl_dataset(file.path()).unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateId(id) if id == "t1"));
    }
}
