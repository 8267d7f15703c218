use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::RegistryError;

type Factory<T> = Arc<dyn Fn(&Map<String, Value>) -> Result<T, RegistryError> + Send + Sync>;

/// Name-based factory map. The contract is plugin-style: given a name and a
/// config document, produce an instance. Registration is process-wide and
/// usually happens at startup; registering an existing name replaces the
/// previous factory so plugins can shadow built-ins.
pub struct Registry<T> {
    factories: DashMap<String, Factory<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Map<String, Value>) -> Result<T, RegistryError> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering factory '{name}'");
        self.factories.insert(name, Arc::new(factory));
    }

    pub fn create(&self, name: &str, config: &Map<String, Value>) -> Result<T, RegistryError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))?;
        factory(config)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }
}
