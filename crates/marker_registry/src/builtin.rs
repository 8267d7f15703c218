use std::sync::OnceLock;

use marker_adapters::{Adapter, HttpAdapter, SseAdapter};
use marker_scorers::{
    ContainsScorer, ExactMatchScorer, HallucinationScorer, KeywordScorer, PiiScorer,
    PromptInjectionScorer, RegexMatchScorer, RegexRuleScorer, Scorer, SensitiveDataScorer,
    ToxicityScorer,
};
use marker_sinks::{
    ConsoleSink, CsvSink, HtmlSink, JUnitSink, JsonSink, ObservabilitySink, Sink,
};
use serde_json::{Map, Value};

use crate::error::RegistryError;
use crate::registry::Registry;

fn invalid(name: &str, cause: impl Into<String>) -> RegistryError {
    RegistryError::InvalidConfig {
        name: name.to_string(),
        cause: cause.into(),
    }
}

fn required_str<'a>(
    config: &'a Map<String, Value>,
    key: &str,
    name: &str,
) -> Result<&'a str, RegistryError> {
    config
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(name, format!("missing '{key}'")))
}

fn string_list(config: &Map<String, Value>, key: &str) -> Vec<String> {
    config
        .get(key)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Process-wide adapter registry, pre-populated with the built-in adapter
/// types. The trace-reading adapter needs a backend instance and is
/// constructed directly rather than by name.
pub fn adapter_registry() -> &'static Registry<Box<dyn Adapter>> {
    static REGISTRY: OnceLock<Registry<Box<dyn Adapter>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry: Registry<Box<dyn Adapter>> = Registry::new();

        registry.register("http", |config| {
            let endpoint = required_str(config, "endpoint", "http")?;
            let adapter = HttpAdapter::new(endpoint)
                .map_err(|e| invalid("http", e.to_string()))?;
            let adapter = match config.get("bearer_token").and_then(Value::as_str) {
                Some(token) => adapter.with_bearer_token(token),
                None => adapter,
            };
            Ok(Box::new(adapter) as Box<dyn Adapter>)
        });

        registry.register("sse", |config| {
            let endpoint = required_str(config, "endpoint", "sse")?;
            let adapter =
                SseAdapter::new(endpoint).map_err(|e| invalid("sse", e.to_string()))?;
            Ok(Box::new(adapter) as Box<dyn Adapter>)
        });

        registry
    })
}

/// Process-wide scorer registry, pre-populated with the assertion and
/// guardrail scorers.
pub fn scorer_registry() -> &'static Registry<Box<dyn Scorer>> {
    static REGISTRY: OnceLock<Registry<Box<dyn Scorer>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry: Registry<Box<dyn Scorer>> = Registry::new();

        registry.register("exact_match", |config| {
            let name = config
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("exact");
            Ok(Box::new(ExactMatchScorer::new(name)) as Box<dyn Scorer>)
        });

        registry.register("contains", |config| {
            let case_sensitive = config
                .get("case_sensitive")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(Box::new(ContainsScorer::new("contains", case_sensitive)) as Box<dyn Scorer>)
        });

        registry.register("regex_match", |config| {
            let pattern = required_str(config, "pattern", "regex_match")?;
            let scorer = RegexMatchScorer::new("regex_match", pattern)
                .map_err(|e| invalid("regex_match", e.to_string()))?;
            Ok(Box::new(scorer) as Box<dyn Scorer>)
        });

        registry.register("keyword", |config| {
            let keywords = string_list(config, "keywords");
            let case_sensitive = config
                .get("case_sensitive")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(Box::new(KeywordScorer::new(keywords, case_sensitive)) as Box<dyn Scorer>)
        });

        registry.register("regex", |config| {
            let patterns = string_list(config, "patterns");
            let scorer = RegexRuleScorer::new(&patterns)
                .map_err(|e| invalid("regex", e.to_string()))?;
            Ok(Box::new(scorer) as Box<dyn Scorer>)
        });

        registry.register("toxicity", |_| Ok(Box::new(ToxicityScorer::new()) as Box<dyn Scorer>));
        registry.register("pii", |_| Ok(Box::new(PiiScorer::new()) as Box<dyn Scorer>));
        registry.register("sensitive_data", |_| {
            Ok(Box::new(SensitiveDataScorer::new()) as Box<dyn Scorer>)
        });
        registry.register("prompt_injection", |_| {
            Ok(Box::new(PromptInjectionScorer::new()) as Box<dyn Scorer>)
        });
        registry.register("hallucination", |_| {
            Ok(Box::new(HallucinationScorer::new()) as Box<dyn Scorer>)
        });

        registry
    })
}

/// Process-wide sink registry, pre-populated with the built-in sinks.
pub fn sink_registry() -> &'static Registry<Box<dyn Sink>> {
    static REGISTRY: OnceLock<Registry<Box<dyn Sink>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let registry: Registry<Box<dyn Sink>> = Registry::new();

        registry.register("console", |config| {
            let verbose = config
                .get("verbose")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(Box::new(ConsoleSink::new(verbose)) as Box<dyn Sink>)
        });

        registry.register("csv", |config| {
            let path = required_str(config, "path", "csv")?;
            Ok(Box::new(CsvSink::new(path)) as Box<dyn Sink>)
        });

        registry.register("json", |config| {
            let path = required_str(config, "path", "json")?;
            Ok(Box::new(JsonSink::new(path)) as Box<dyn Sink>)
        });

        registry.register("junit", |config| {
            let path = required_str(config, "path", "junit")?;
            let suite = config
                .get("suite")
                .and_then(Value::as_str)
                .unwrap_or("marker");
            Ok(Box::new(JUnitSink::new(path, suite)) as Box<dyn Sink>)
        });

        registry.register("html", |config| {
            let path = required_str(config, "path", "html")?;
            Ok(Box::new(HtmlSink::new(path)) as Box<dyn Sink>)
        });

        registry.register("observability", |config| {
            let endpoint = required_str(config, "endpoint", "observability")?;
            let sink = ObservabilitySink::new(endpoint);
            let sink = match config.get("api_key").and_then(Value::as_str) {
                Some(api_key) => sink.with_api_key(api_key),
                None => sink,
            };
            Ok(Box::new(sink) as Box<dyn Sink>)
        });

        registry
    })
}
