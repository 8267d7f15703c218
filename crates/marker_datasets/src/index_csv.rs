use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use marker_types::DatasetItem;
use serde_json::{json, Map};
use tracing::debug;

use crate::error::DatasetError;
use crate::validate::validate_items;
use crate::Dataset;

const REQUIRED_COLUMNS: [&str; 5] = [
    "test_id",
    "entity_type",
    "operation_type",
    "prompt_file",
    "expected_file",
];

/// Options for the indexed-CSV loader.
#[derive(Debug, Clone)]
pub struct IndexCsvOptions {
    /// Directory that file columns are resolved against.
    pub base_dir: PathBuf,
    pub entity_type: Option<String>,
    pub operation_type: Option<String>,
    pub test_ids: Option<Vec<String>>,
    /// Suffix probed for pre-computed outputs next to `expected_file`
    /// (`<stem>_<suffix>.<ext>`). When such a file exists its content is
    /// loaded into `output` so the item can be scored without an adapter.
    pub actual_suffix: String,
}

impl IndexCsvOptions {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            entity_type: None,
            operation_type: None,
            test_ids: None,
            actual_suffix: "actual".to_string(),
        }
    }
}

/// Load a dataset from an index CSV with one row per test case.
///
/// The header must contain at least `test_id, entity_type, operation_type,
/// prompt_file, expected_file`; other columns are carried into item
/// metadata. A missing referenced file fails the load.
pub fn load_index_csv_dataset(
    path: impl AsRef<Path>,
    options: &IndexCsvOptions,
) -> Result<Dataset, DatasetError> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(DatasetError::MissingColumn(column.to_string()));
        }
    }

    let mut items = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: HashMap<&str, &str> = headers
            .iter()
            .map(String::as_str)
            .zip(record.iter().map(str::trim))
            .collect();

        if !row_matches(&row, options) {
            continue;
        }

        items.push(build_item(&row, &headers, options)?);
    }

    validate_items(&items)?;
    debug!(
        "Loaded {} items from index {}",
        items.len(),
        path.display()
    );

    let id = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Dataset::new(id, items))
}

fn row_matches(row: &HashMap<&str, &str>, options: &IndexCsvOptions) -> bool {
    if let Some(entity) = &options.entity_type {
        if row.get("entity_type").copied() != Some(entity.as_str()) {
            return false;
        }
    }
    if let Some(operation) = &options.operation_type {
        if row.get("operation_type").copied() != Some(operation.as_str()) {
            return false;
        }
    }
    if let Some(ids) = &options.test_ids {
        let test_id = row.get("test_id").copied().unwrap_or_default();
        if !ids.iter().any(|id| id == test_id) {
            return false;
        }
    }
    true
}

fn build_item(
    row: &HashMap<&str, &str>,
    headers: &[String],
    options: &IndexCsvOptions,
) -> Result<DatasetItem, DatasetError> {
    let test_id = row.get("test_id").copied().unwrap_or_default();
    let entity_type = row.get("entity_type").copied().unwrap_or_default();
    let operation_type = row.get("operation_type").copied().unwrap_or_default();

    let prompt_path = resolve(row.get("prompt_file").copied(), options)?;
    let expected_path = resolve(row.get("expected_file").copied(), options)?;

    let mut input = Map::new();
    input.insert("prompt".to_string(), json!(read_file(&prompt_path)?));
    input.insert("entity_type".to_string(), json!(entity_type));
    input.insert("operation_type".to_string(), json!(operation_type));

    if let Some(old_state) = row.get("old_state_file").copied().filter(|v| !v.is_empty()) {
        let old_state_path = resolve(Some(old_state), options)?;
        input.insert("old_state".to_string(), json!(read_file(&old_state_path)?));
    }

    let mut metadata = Map::new();
    metadata.insert("entity_type".to_string(), json!(entity_type));
    metadata.insert("operation_type".to_string(), json!(operation_type));
    for header in headers {
        if REQUIRED_COLUMNS.contains(&header.as_str()) || header == "old_state_file" {
            continue;
        }
        if let Some(value) = row.get(header.as_str()).copied().filter(|v| !v.is_empty()) {
            metadata.insert(header.clone(), json!(value));
        }
    }

    let mut item = DatasetItem::new(test_id, input)
        .with_expected(json!(read_file(&expected_path)?));
    item.metadata = metadata;

    // Offline mode: a sibling <stem>_<suffix>.<ext> holds a pre-computed
    // output for scoring without an adapter call.
    if let Some(actual_path) = actual_sibling(&expected_path, &options.actual_suffix) {
        item.output = Some(json!(read_file(&actual_path)?));
    }

    Ok(item)
}

fn resolve(value: Option<&str>, options: &IndexCsvOptions) -> Result<PathBuf, DatasetError> {
    let value = value.unwrap_or_default();
    let path = options.base_dir.join(value);
    if !path.exists() {
        return Err(DatasetError::MissingFile(path));
    }
    Ok(path)
}

fn read_file(path: &Path) -> Result<String, DatasetError> {
    fs::read_to_string(path).map_err(DatasetError::from)
}

fn actual_sibling(expected_path: &Path, suffix: &str) -> Option<PathBuf> {
    let stem = expected_path.file_stem()?.to_string_lossy();
    let ext = expected_path.extension()?.to_string_lossy();
    let candidate =
        expected_path.with_file_name(format!("{stem}_{suffix}.{ext}"));
    candidate.exists().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn seed_case(dir: &TempDir, test_id: &str, with_actual: bool) {
        fs::write(dir.path().join(format!("{test_id}_prompt.txt")), "prompt").unwrap();
        fs::write(dir.path().join(format!("{test_id}_expected.yaml")), "a: 1").unwrap();
        if with_actual {
            fs::write(
                dir.path().join(format!("{test_id}_expected_actual.yaml")),
                "a: 2",
            )
            .unwrap();
        }
    }

    fn write_index(dir: &TempDir, rows: &[(&str, &str, &str)]) -> PathBuf {
        let mut content =
            String::from("test_id,entity_type,operation_type,prompt_file,expected_file\n");
        for (test_id, entity, operation) in rows {
            content.push_str(&format!(
                "{test_id},{entity},{operation},{test_id}_prompt.txt,{test_id}_expected.yaml\n"
            ));
        }
        let path = dir.path().join("index.csv");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_index_csv() {
        let dir = TempDir::new().unwrap();
        seed_case(&dir, "t1", false);
        seed_case(&dir, "t2", false);
        let index = write_index(&dir, &[("t1", "dashboard", "create"), ("t2", "alert", "update")]);

        let dataset =
            load_index_csv_dataset(&index, &IndexCsvOptions::new(dir.path())).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.items[0].id, "t1");
        assert_eq!(
            dataset.items[0].input.get("prompt"),
            Some(&json!("prompt"))
        );
        assert_eq!(dataset.items[0].expected, Some(json!("a: 1")));
        assert!(dataset.items[0].output.is_none());
    }

    #[test]
    fn test_entity_filter() {
        let dir = TempDir::new().unwrap();
        seed_case(&dir, "t1", false);
        seed_case(&dir, "t2", false);
        let index = write_index(&dir, &[("t1", "dashboard", "create"), ("t2", "alert", "update")]);

        let mut options = IndexCsvOptions::new(dir.path());
        options.entity_type = Some("alert".to_string());

        let dataset = load_index_csv_dataset(&index, &options).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.items[0].id, "t2");
    }

    #[test]
    fn test_offline_mode_populates_output() {
        let dir = TempDir::new().unwrap();
        seed_case(&dir, "t1", true);
        let index = write_index(&dir, &[("t1", "dashboard", "create")]);

        let dataset =
            load_index_csv_dataset(&index, &IndexCsvOptions::new(dir.path())).unwrap();
        assert_eq!(dataset.items[0].output, Some(json!("a: 2")));
    }

    #[test]
    fn test_missing_referenced_file_fails() {
        let dir = TempDir::new().unwrap();
        seed_case(&dir, "t1", false);
        fs::remove_file(dir.path().join("t1_expected.yaml")).unwrap();
        let index = write_index(&dir, &[("t1", "dashboard", "create")]);

        let err =
            load_index_csv_dataset(&index, &IndexCsvOptions::new(dir.path())).unwrap_err();
        assert!(matches!(err, DatasetError::MissingFile(_)));
    }

    #[test]
    fn test_missing_header_column_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.csv");
        fs::write(&path, "test_id,prompt_file\n").unwrap();

        let err =
            load_index_csv_dataset(&path, &IndexCsvOptions::new(dir.path())).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(_)));
    }
}
