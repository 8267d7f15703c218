use std::path::PathBuf;

use async_trait::async_trait;
use marker_types::{EvalResult, Score};
use tracing::{info, warn};

use crate::error::SinkError;
use crate::traits::Sink;

/// Renders a self-contained HTML report: a per-score summary table and a
/// per-item rows table.
#[derive(Debug)]
pub struct HtmlSink {
    path: PathBuf,
    runs: Vec<EvalResult>,
}

impl HtmlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            runs: Vec::new(),
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn render(run: &EvalResult) -> String {
    let (groups, failed) = run.score_groups();

    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Eval report</title>\n\
         <style>body{font-family:sans-serif;margin:2rem}table{border-collapse:collapse}\
         td,th{border:1px solid #ccc;padding:4px 10px;text-align:left}\
         .fail{color:#b00}</style>\n</head>\n<body>\n",
    );
    html.push_str(&format!(
        "<h1>{}</h1>\n<p>run <code>{}</code> · dataset <code>{}</code> · {} scores · {}</p>\n",
        escape(&run.eval_id),
        escape(&run.run_id),
        escape(&run.dataset_id),
        run.scores.len(),
        run.created_at.to_rfc3339(),
    ));

    html.push_str("<h2>Summary</h2>\n<table>\n<tr><th>Score</th><th>n</th><th>Mean</th><th>Pass rate</th><th>Failed</th></tr>\n");
    for (name, values) in &groups {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let pass_rate =
            values.iter().filter(|v| **v > 0.0).count() as f64 / values.len() as f64;
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{mean:.3}</td><td>{:.0}%</td><td>{}</td></tr>\n",
            escape(name),
            values.len(),
            pass_rate * 100.0,
            failed.get(name).copied().unwrap_or(0),
        ));
    }
    html.push_str("</table>\n");

    html.push_str("<h2>Scores</h2>\n<table>\n<tr><th>Item</th><th>Score</th><th>Value</th><th>Comment</th></tr>\n");
    let mut scores: Vec<&Score> = run.scores.iter().collect();
    scores.sort_by(|a, b| a.dataset_item_id().cmp(b.dataset_item_id()));
    for score in scores {
        let class = if score.value.is_pass() { "" } else { " class=\"fail\"" };
        html.push_str(&format!(
            "<tr{class}><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(score.dataset_item_id()),
            escape(&score.name),
            score.value.as_f64(),
            escape(score.comment.as_deref().unwrap_or("")),
        ));
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

#[async_trait]
impl Sink for HtmlSink {
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

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, render(run))?;
        info!("Wrote HTML report to {}", self.path.display());
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

    #[tokio::test]
    async fn test_html_report_contains_summary_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.html");
        let mut sink = HtmlSink::new(&path);

        let mut score = Score::new("exact", true, "exact_match.v1");
        score
            .metadata
            .insert("dataset_item_id".to_string(), json!("t1"));

        let run = EvalResult {
            eval_id: "my_eval-abc".to_string(),
            run_id: "r1".to_string(),
            dataset_id: "ds".to_string(),
            scores: vec![score],
            metadata: Map::new(),
            created_at: Utc::now(),
        };

        sink.emit_run(&run).await.unwrap();
        sink.flush().await.unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.contains("<h1>my_eval-abc</h1>"));
        assert!(html.contains("<td>exact</td>"));
        assert!(html.contains("<td>t1</td>"));
        assert!(html.contains("100%"));
    }
}
