use marker_types::DatasetItem;

use crate::error::DatasetError;
use crate::validate::validate_items;
use crate::Dataset;

/// Build a dataset from a caller-supplied generator.
///
/// The generator returns the full item list; any error it reports surfaces
/// to the caller unchanged.
pub fn load_fn_dataset<F>(id: impl Into<String>, generator: F) -> Result<Dataset, DatasetError>
where
    F: FnOnce() -> Result<Vec<DatasetItem>, String>,
{
    let items = generator().map_err(DatasetError::GeneratorError)?;
    validate_items(&items)?;
    Ok(Dataset::new(id, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn test_generator_dataset() {
        let dataset = load_fn_dataset("generated", || {
            Ok(vec![
                DatasetItem::new("g1", Map::new()),
                DatasetItem::new("g2", Map::new()),
            ])
        })
        .unwrap();

        assert_eq!(dataset.id, "generated");
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_generator_error_surfaces() {
        let err = load_fn_dataset("generated", || Err("backend unavailable".to_string()))
            .unwrap_err();
        assert!(matches!(err, DatasetError::GeneratorError(msg) if msg == "backend unavailable"));
    }

    #[test]
    fn test_generator_duplicate_ids_rejected() {
        let err = load_fn_dataset("generated", || {
            Ok(vec![
                DatasetItem::new("g1", Map::new()),
                DatasetItem::new("g1", Map::new()),
            ])
        })
        .unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateId(_)));
    }
}
