use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use marker_types::{EvalResult, Score, GENERATION_ERROR};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::SinkError;
use crate::traits::Sink;

/// Writes a JUnit-style XML file so CI can publish eval results: one
/// `<testcase>` per `test_id`, failed when the item carries a
/// `generation_error` score or any score is false/zero.
#[derive(Debug)]
pub struct JUnitSink {
    path: PathBuf,
    suite_name: String,
    runs: Vec<EvalResult>,
}

impl JUnitSink {
    pub fn new(path: impl Into<PathBuf>, suite_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            suite_name: suite_name.into(),
            runs: Vec::new(),
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn scores_by_test_id(run: &EvalResult) -> BTreeMap<String, Vec<&Score>> {
    let mut by_id: BTreeMap<String, Vec<&Score>> = BTreeMap::new();
    for score in &run.scores {
        let test_id = score
            .metadata
            .get("test_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        by_id.entry(test_id).or_default().push(score);
    }
    by_id
}

fn case_outcome(scores: &[&Score]) -> (bool, String) {
    for score in scores {
        if score.name == GENERATION_ERROR {
            let message = score
                .comment
                .clone()
                .unwrap_or_else(|| "Generation error".to_string());
            return (false, message);
        }
    }
    for score in scores {
        if !score.value.is_pass() {
            let message = score.comment.clone().unwrap_or_else(|| {
                format!("{}={}", score.name, score.value.as_f64())
            });
            return (false, message);
        }
    }
    (true, String::new())
}

#[async_trait]
impl Sink for JUnitSink {
    async fn emit(&mut self, _score: &Score) -> Result<(), SinkError> {
        Ok(())
    }

    async fn emit_run(&mut self, run: &EvalResult) -> Result<(), SinkError> {
        self.runs.push(run.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        let Some(run) = self.runs.last() else {
            warn!("No runs to write to {}", self.path.display());
            return Ok(());
        };

        let by_test = scores_by_test_id(run);
        let tests = by_test.len();
        let failures = by_test
            .values()
            .filter(|scores| !case_outcome(scores).0)
            .count();

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<testsuites>\n");
        xml.push_str(&format!(
            "  <testsuite name=\"{}\" tests=\"{tests}\" failures=\"{failures}\" errors=\"0\" time=\"0\">\n",
            escape(&self.suite_name)
        ));
        for (test_id, scores) in &by_test {
            let (passed, message) = case_outcome(scores);
            if passed {
                xml.push_str(&format!(
                    "    <testcase name=\"{}\" classname=\"{}\"/>\n",
                    escape(test_id),
                    escape(&self.suite_name)
                ));
            } else {
                xml.push_str(&format!(
                    "    <testcase name=\"{}\" classname=\"{}\">\n      <failure message=\"{}\">{}</failure>\n    </testcase>\n",
                    escape(test_id),
                    escape(&self.suite_name),
                    escape(&message.chars().take(200).collect::<String>()),
                    escape(&message)
                ));
            }
        }
        xml.push_str("  </testsuite>\n</testsuites>\n");

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, xml)?;

        info!(
            "Wrote JUnit XML to {} ({tests} tests, {failures} failures)",
            self.path.display()
        );
        self.runs.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::{json, Map};
    use tempfile::TempDir;

    fn score(name: &str, pass: bool, test_id: &str) -> Score {
        let mut score = Score::new(name, pass, format!("{name}.v1"));
        score.metadata.insert("test_id".to_string(), json!(test_id));
        score
    }

    fn run(scores: Vec<Score>) -> EvalResult {
        EvalResult {
            eval_id: "e".to_string(),
            run_id: "r".to_string(),
            dataset_id: "d".to_string(),
            scores,
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_generation_error_marks_case_failed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junit.xml");
        let mut sink = JUnitSink::new(&path, "marker");

        let mut error_score = score(GENERATION_ERROR, false, "t1");
        error_score.comment = Some("connection refused".to_string());
        sink.emit_run(&run(vec![error_score, score("exact", true, "t2")]))
            .await
            .unwrap();
        sink.flush().await.unwrap();

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains("tests=\"2\" failures=\"1\""));
        assert!(xml.contains("<testcase name=\"t1\""));
        assert!(xml.contains("connection refused"));
        assert!(xml.contains("<testcase name=\"t2\" classname=\"marker\"/>"));
    }

    #[tokio::test]
    async fn test_zero_score_fails_case() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junit.xml");
        let mut sink = JUnitSink::new(&path, "marker");

        sink.emit_run(&run(vec![score("exact", false, "t1")]))
            .await
            .unwrap();
        sink.flush().await.unwrap();

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains("failures=\"1\""));
        assert!(xml.contains("<failure"));
    }

    #[tokio::test]
    async fn test_xml_escaping() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junit.xml");
        let mut sink = JUnitSink::new(&path, "marker");

        let mut bad = score("exact", false, "t<1>");
        bad.comment = Some("expected <a> & got \"b\"".to_string());
        sink.emit_run(&run(vec![bad])).await.unwrap();
        sink.flush().await.unwrap();

        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains("t&lt;1&gt;"));
        assert!(xml.contains("&amp;"));
        assert!(!xml.contains("<a>"));
    }
}
