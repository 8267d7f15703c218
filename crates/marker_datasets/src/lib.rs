pub mod error;
pub mod function;
pub mod index_csv;
pub mod jsonl;
mod validate;

pub use error::DatasetError;
pub use function::load_fn_dataset;
pub use index_csv::{load_index_csv_dataset, IndexCsvOptions};
pub use jsonl::load_jsonl_dataset;

use marker_types::DatasetItem;

/// A finite, restartable sequence of dataset items with a stable identity.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Identifies the dataset for eval-id derivation and result records.
    pub id: String,
    pub items: Vec<DatasetItem>,
}

impl Dataset {
    pub fn new(id: impl Into<String>, items: Vec<DatasetItem>) -> Self {
        Self {
            id: id.into(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
