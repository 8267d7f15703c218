use std::collections::{BTreeMap, BTreeSet, HashMap};

use marker_types::EvalResult;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::debug;

const DEFAULT_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeClass {
    Improved,
    Regressed,
    Unchanged,
}

/// Per-item, per-score change between two runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemChange {
    pub item_id: String,
    pub score_name: String,
    pub baseline_value: f64,
    pub candidate_value: f64,
    pub change: f64,
    pub class: ChangeClass,
}

/// Diff of two runs: per-score counters, per-item change records and the
/// aggregated value maps of both runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunComparison {
    pub baseline_run_id: String,
    pub candidate_run_id: String,
    pub baseline_scores: BTreeMap<String, Vec<f64>>,
    pub candidate_scores: BTreeMap<String, Vec<f64>>,
    pub improvements: BTreeMap<String, usize>,
    pub regressions: BTreeMap<String, usize>,
    pub unchanged: BTreeMap<String, usize>,
    pub item_level_changes: Vec<ItemChange>,
}

impl RunComparison {
    pub fn total_items(&self) -> usize {
        self.item_level_changes.len()
    }

    pub fn has_regressions(&self) -> bool {
        self.regressions.values().any(|count| *count > 0)
    }
}

type ItemScores = HashMap<String, BTreeMap<String, f64>>;

/// Group score values by item id then score name, booleans coerced. When a
/// score appears several times for one (item, name) pair the last value
/// wins.
fn scores_by_item(run: &EvalResult) -> ItemScores {
    let mut by_item: ItemScores = HashMap::new();
    for score in &run.scores {
        by_item
            .entry(score.dataset_item_id().to_string())
            .or_default()
            .insert(score.name.clone(), score.value.as_f64());
    }
    by_item
}

fn aggregate(by_item: &ItemScores) -> BTreeMap<String, Vec<f64>> {
    let mut aggregated: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for item_scores in by_item.values() {
        for (name, value) in item_scores {
            aggregated.entry(name.clone()).or_default().push(*value);
        }
    }
    aggregated
}

/// Compare two runs per (item, score) and classify each common pair as
/// improved, regressed or unchanged against the significance threshold.
///
/// Scores present in only one run are ignored for classification but still
/// appear in the aggregated value maps. Items missing a `dataset_item_id`
/// group under `"unknown"`.
pub fn compare_runs(
    baseline: &EvalResult,
    candidate: &EvalResult,
    threshold: Option<f64>,
) -> RunComparison {
    let threshold = threshold.unwrap_or(DEFAULT_THRESHOLD);
    let baseline_by_item = scores_by_item(baseline);
    let candidate_by_item = scores_by_item(candidate);

    let baseline_scores = aggregate(&baseline_by_item);
    let candidate_scores = aggregate(&candidate_by_item);

    let score_names: BTreeSet<&String> = baseline_scores
        .keys()
        .chain(candidate_scores.keys())
        .collect();
    let common_items: BTreeSet<&String> = baseline_by_item
        .keys()
        .filter(|item_id| candidate_by_item.contains_key(*item_id))
        .collect();

    let mut improvements: BTreeMap<String, usize> = BTreeMap::new();
    let mut regressions: BTreeMap<String, usize> = BTreeMap::new();
    let mut unchanged: BTreeMap<String, usize> = BTreeMap::new();
    let mut item_level_changes = Vec::new();

    for score_name in score_names {
        improvements.insert(score_name.clone(), 0);
        regressions.insert(score_name.clone(), 0);
        unchanged.insert(score_name.clone(), 0);

        for item_id in &common_items {
            let baseline_value = baseline_by_item[*item_id].get(score_name);
            let candidate_value = candidate_by_item[*item_id].get(score_name);
            let (Some(&baseline_value), Some(&candidate_value)) =
                (baseline_value, candidate_value)
            else {
                continue;
            };

            let change = candidate_value - baseline_value;
            let class = if change.abs() < threshold {
                *unchanged.get_mut(score_name.as_str()).unwrap() += 1;
                ChangeClass::Unchanged
            } else if change > 0.0 {
                *improvements.get_mut(score_name.as_str()).unwrap() += 1;
                ChangeClass::Improved
            } else {
                *regressions.get_mut(score_name.as_str()).unwrap() += 1;
                ChangeClass::Regressed
            };

            item_level_changes.push(ItemChange {
                item_id: (*item_id).clone(),
                score_name: score_name.clone(),
                baseline_value,
                candidate_value,
                change,
                class,
            });
        }
    }

    debug!(
        "Compared runs {} and {}: {} change records",
        baseline.run_id,
        candidate.run_id,
        item_level_changes.len()
    );

    RunComparison {
        baseline_run_id: baseline.run_id.clone(),
        candidate_run_id: candidate.run_id.clone(),
        baseline_scores,
        candidate_scores,
        improvements,
        regressions,
        unchanged,
        item_level_changes,
    }
}

/// Compare each candidate run against the first run (the baseline).
pub fn compare_multiple_runs(runs: &[EvalResult], threshold: Option<f64>) -> Vec<RunComparison> {
    let Some((baseline, candidates)) = runs.split_first() else {
        return Vec::new();
    };
    candidates
        .iter()
        .map(|candidate| compare_runs(baseline, candidate, threshold))
        .collect()
}

/// Score names whose regression count meets `min_regressions`. This is the
/// deployment-gate signal for CI consumers.
pub fn get_regressions(
    comparison: &RunComparison,
    min_regressions: Option<usize>,
) -> BTreeMap<String, usize> {
    let min_regressions = min_regressions.unwrap_or(1);
    comparison
        .regressions
        .iter()
        .filter(|(_, count)| **count >= min_regressions)
        .map(|(name, count)| (name.clone(), *count))
        .collect()
}
