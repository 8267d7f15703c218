use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Single item in an evaluation dataset. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetItem {
    pub id: String,

    pub input: Map<String, Value>,

    /// Pre-computed output for offline scoring. When present the engine
    /// skips the adapter for this item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Ground truth to score against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl DatasetItem {
    pub fn new(id: impl Into<String>, input: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            input,
            output: None,
            expected: None,
            tags: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_expected(mut self, expected: Value) -> Self {
        self.expected = Some(expected);
        self
    }
}
