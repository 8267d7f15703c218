use std::collections::HashSet;

use marker_types::DatasetItem;

use crate::error::DatasetError;

/// Item ids must be unique within a dataset and non-empty.
pub(crate) fn validate_items(items: &[DatasetItem]) -> Result<(), DatasetError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(items.len());

    for (idx, item) in items.iter().enumerate() {
        if item.id.trim().is_empty() {
            return Err(DatasetError::EmptyId { line: idx + 1 });
        }
        if !seen.insert(item.id.as_str()) {
            return Err(DatasetError::DuplicateId(item.id.clone()));
        }
    }

    Ok(())
}
