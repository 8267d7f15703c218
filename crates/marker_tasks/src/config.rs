use std::sync::Arc;

use marker_adapters::Adapter;
use marker_datasets::{
    load_index_csv_dataset, load_jsonl_dataset, Dataset, IndexCsvOptions,
};
use marker_registry::{adapter_registry, scorer_registry, sink_registry};
use marker_scorers::Scorer;
use marker_sinks::Sink;
use marker_types::DatasetItem;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TaskError;

/// One named component with its factory config, e.g.
/// `{"type": "csv", "path": "out.csv"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(flatten)]
    pub config: Map<String, Value>,
}

/// Dataset source selection inside a task config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatasetConfig {
    Jsonl {
        path: String,
    },
    IndexCsv {
        path: String,
        base_dir: String,
        #[serde(default)]
        entity_type: Option<String>,
        #[serde(default)]
        operation_type: Option<String>,
        #[serde(default)]
        test_ids: Option<Vec<String>>,
    },
    /// Items carried inline in the config payload.
    Inline {
        id: String,
        items: Vec<DatasetItem>,
    },
}

impl DatasetConfig {
    pub fn load(&self) -> Result<Dataset, TaskError> {
        match self {
            DatasetConfig::Jsonl { path } => Ok(load_jsonl_dataset(path)?),
            DatasetConfig::IndexCsv {
                path,
                base_dir,
                entity_type,
                operation_type,
                test_ids,
            } => {
                let mut options = IndexCsvOptions::new(base_dir);
                options.entity_type = entity_type.clone();
                options.operation_type = operation_type.clone();
                options.test_ids = test_ids.clone();
                Ok(load_index_csv_dataset(path, &options)?)
            }
            DatasetConfig::Inline { id, items } => Ok(Dataset::new(id.clone(), items.clone())),
        }
    }
}

/// Build scorers from component configs through the process-wide registry.
pub fn build_scorers(components: &[ComponentConfig]) -> Result<Vec<Arc<dyn Scorer>>, TaskError> {
    components
        .iter()
        .map(|component| {
            let scorer = scorer_registry().create(&component.kind, &component.config)?;
            Ok(Arc::from(scorer))
        })
        .collect()
}

pub fn build_adapter(component: &ComponentConfig) -> Result<Arc<dyn Adapter>, TaskError> {
    let adapter = adapter_registry().create(&component.kind, &component.config)?;
    Ok(Arc::from(adapter))
}

pub fn build_sinks(components: &[ComponentConfig]) -> Result<Vec<Box<dyn Sink>>, TaskError> {
    components
        .iter()
        .map(|component| {
            sink_registry()
                .create(&component.kind, &component.config)
                .map_err(TaskError::from)
        })
        .collect()
}

/// Serialised eval configuration stored on a task row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub dataset: DatasetConfig,

    pub scorers: Vec<ComponentConfig>,

    #[serde(default)]
    pub adapter: Option<ComponentConfig>,

    #[serde(default)]
    pub sinks: Vec<ComponentConfig>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub concurrency_limit: Option<usize>,
}

impl TaskConfig {
    pub fn from_value(value: &Value) -> Result<Self, TaskError> {
        serde_json::from_value(value.clone())
            .map_err(|e| TaskError::InvalidConfig(e.to_string()))
    }

    pub fn build_dataset(&self) -> Result<Dataset, TaskError> {
        self.dataset.load()
    }

    pub fn build_scorers(&self) -> Result<Vec<Arc<dyn Scorer>>, TaskError> {
        build_scorers(&self.scorers)
    }

    pub fn build_adapter(&self) -> Result<Option<Arc<dyn Adapter>>, TaskError> {
        self.adapter.as_ref().map(build_adapter).transpose()
    }

    pub fn build_sinks(&self) -> Result<Vec<Box<dyn Sink>>, TaskError> {
        build_sinks(&self.sinks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inline_config() -> Value {
        json!({
            "dataset": {
                "type": "inline",
                "id": "smoke",
                "items": [
                    {"id": "t1", "input": {"prompt": "p"}, "output": "x", "expected": "x"}
                ]
            },
            "scorers": [{"type": "exact_match"}],
            "sinks": [{"type": "console"}],
            "concurrency_limit": 2
        })
    }

    #[test]
    fn test_parse_inline_config() {
        let config = TaskConfig::from_value(&inline_config()).unwrap();
        assert!(config.adapter.is_none());
        assert_eq!(config.concurrency_limit, Some(2));

        let dataset = config.build_dataset().unwrap();
        assert_eq!(dataset.id, "smoke");
        assert_eq!(dataset.len(), 1);

        let scorers = config.build_scorers().unwrap();
        assert_eq!(scorers.len(), 1);
        assert_eq!(scorers[0].name(), "exact");

        let sinks = config.build_sinks().unwrap();
        assert_eq!(sinks.len(), 1);
    }

    #[test]
    fn test_unknown_scorer_type_fails() {
        let mut value = inline_config();
        value["scorers"] = json!([{"type": "mind_reader"}]);
        let config = TaskConfig::from_value(&value).unwrap();
        assert!(config.build_scorers().is_err());
    }

    #[test]
    fn test_missing_dataset_is_invalid() {
        let err = TaskConfig::from_value(&json!({"scorers": []})).unwrap_err();
        assert!(matches!(err, TaskError::InvalidConfig(_)));
    }

    #[test]
    fn test_adapter_config_roundtrip() {
        let value = json!({
            "dataset": {"type": "inline", "id": "d", "items": []},
            "scorers": [],
            "adapter": {"type": "http", "endpoint": "http://localhost:9"},
            "model": "gpt-4o"
        });
        let config = TaskConfig::from_value(&value).unwrap();
        let adapter = config.build_adapter().unwrap();
        assert!(adapter.is_some());
        assert_eq!(config.model.as_deref(), Some("gpt-4o"));
    }
}
