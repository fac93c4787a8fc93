//! Chunked, concurrent evaluation of a corpus against patient labs.
//!
//! One task per chunk of at most ten trials; the merge waits for every
//! chunk of a code before emitting its partitions, because the
//! filtered/excluded split is only correct over the complete set.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::task::JoinSet;

use super::expression;
use super::extractor::EligibilityExtractor;
use crate::models::{CodePartition, ConditionDecision, LabValues, MatchOutcome, Trial};
use crate::services::EntityDetector;

/// Upper bound on trials evaluated by a single concurrent task.
pub const MAX_TRIALS_PER_CHUNK: usize = 10;

/// Owns the extractor (and through it the bounded detection client) for the
/// duration of the orchestration.
pub struct FilterOrchestrator<D: EntityDetector> {
    extractor: Arc<EligibilityExtractor<D>>,
}

impl<D: EntityDetector + 'static> FilterOrchestrator<D> {
    pub fn new(detector: Arc<D>) -> Self {
        Self {
            extractor: Arc::new(EligibilityExtractor::new(detector)),
        }
    }

    /// Partition a code-grouped corpus into filtered and excluded trials.
    ///
    /// Codes with zero trials are omitted; every other code appears in both
    /// partitions, possibly with an empty trial list on one side.
    pub async fn partition(
        &self,
        corpus: HashMap<String, Vec<Trial>>,
        labs: &LabValues,
    ) -> MatchOutcome {
        let labs = Arc::new(labs.clone());
        let mut pending = JoinSet::new();

        for (code, trials) in corpus {
            if trials.is_empty() {
                continue;
            }
            tracing::debug!(
                code = %code,
                trials = trials.len(),
                chunks = chunk_count(trials.len()),
                "Dispatching filter chunks"
            );
            for chunk in trials.chunks(MAX_TRIALS_PER_CHUNK) {
                let extractor = self.extractor.clone();
                let labs = labs.clone();
                let code = code.clone();
                let chunk = chunk.to_vec();
                pending.spawn(async move {
                    let (filtered, excluded) = filter_chunk(&extractor, chunk, &labs).await;
                    (code, filtered, excluded)
                });
            }
        }

        // Fan-in: every chunk task must land before the merge is complete.
        let mut merged: BTreeMap<String, (Vec<Trial>, Vec<Trial>)> = BTreeMap::new();
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((code, filtered, excluded)) => {
                    let entry = merged.entry(code).or_default();
                    entry.0.extend(filtered);
                    entry.1.extend(excluded);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Filter chunk task failed");
                }
            }
        }

        let mut outcome = MatchOutcome::default();
        for (code, (filtered, excluded)) in merged {
            outcome.filtered.push(CodePartition {
                ncit_code: code.clone(),
                trials: filtered,
            });
            outcome.excluded.push(CodePartition {
                ncit_code: code,
                trials: excluded,
            });
        }
        outcome
    }
}

pub(crate) fn chunk_count(trials: usize) -> usize {
    trials.div_ceil(MAX_TRIALS_PER_CHUNK)
}

/// Group a fetched corpus by disease code. A trial annotated with several
/// codes lands in each of their groups; trials with no matching code are
/// dropped here (already logged at fetch time).
pub fn group_by_code(trials: Vec<Trial>) -> HashMap<String, Vec<Trial>> {
    let mut groups: HashMap<String, Vec<Trial>> = HashMap::new();
    for trial in trials {
        for code in &trial.ncit_codes {
            groups.entry(code.clone()).or_default().push(trial.clone());
        }
    }
    groups
}

/// Evaluate one chunk: extract conditions per trial, judge each against the
/// labs, and classify. A trial with no conditions is filtered-in; a missing
/// lab value passes its condition.
async fn filter_chunk<D: EntityDetector>(
    extractor: &EligibilityExtractor<D>,
    trials: Vec<Trial>,
    labs: &LabValues,
) -> (Vec<Trial>, Vec<Trial>) {
    let mut filtered = Vec::new();
    let mut excluded = Vec::new();

    for mut trial in trials {
        let conditions = extractor.extract(&trial.inclusion_criteria).await;

        let mut conditions: Vec<_> = conditions.into_values().collect();
        conditions.sort_by_key(|c| c.cell_type.as_str());

        let mut include = true;
        for condition in &conditions {
            let passed = match labs.get(condition.cell_type) {
                Some(lab) => expression::evaluate_condition(lab.value, condition),
                None => true,
            };
            if !passed {
                include = false;
            }
            trial.decisions.push(ConditionDecision {
                condition: condition.clone(),
                passed,
            });
        }
        trial.conditions = conditions;

        if include {
            filtered.push(trial);
        } else {
            excluded.push(trial);
        }
    }

    (filtered, excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};

    use crate::models::{CellType, LabResult};
    use crate::services::detection::MockEntityDetector;

    fn trial(id: &str, code: &str, criteria: &[&str]) -> Trial {
        let mut t = Trial::new(id, BTreeSet::from([code.to_string()]));
        t.inclusion_criteria = criteria.iter().map(|s| s.to_string()).collect();
        t
    }

    fn labs(values: &[(CellType, f64)]) -> LabValues {
        let mut labs = LabValues::new();
        for (cell_type, value) in values {
            labs.record(LabResult {
                cell_type: *cell_type,
                value: *value,
                unit: String::new(),
                observed_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            });
        }
        labs
    }

    fn orchestrator() -> FilterOrchestrator<MockEntityDetector> {
        FilterOrchestrator::new(Arc::new(MockEntityDetector::new(vec![])))
    }

    #[test]
    fn chunk_count_is_ceiling_division() {
        assert_eq!(chunk_count(1), 1);
        assert_eq!(chunk_count(10), 1);
        assert_eq!(chunk_count(11), 2);
        assert_eq!(chunk_count(25), 3);
    }

    #[test]
    fn grouping_clones_multi_code_trials_into_each_group() {
        let mut t = Trial::new("NCT001", BTreeSet::from(["C1".to_string(), "C2".to_string()]));
        t.inclusion_criteria = vec!["text".into()];
        let groups = group_by_code(vec![t, trial("NCT002", "C1", &[])]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups["C1"].len(), 2);
        assert_eq!(groups["C2"].len(), 1);
    }

    #[test]
    fn grouping_drops_codeless_trials() {
        let groups = group_by_code(vec![Trial::new("NCT003", BTreeSet::new())]);
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn trial_without_criteria_is_filtered_in() {
        let corpus = HashMap::from([("C123".to_string(), vec![trial("NCT001", "C123", &[])])]);
        let outcome = orchestrator().partition(corpus, &labs(&[])).await;

        assert_eq!(outcome.filtered.len(), 1);
        assert_eq!(outcome.filtered[0].ncit_code, "C123");
        assert_eq!(outcome.filtered[0].trials.len(), 1);
        assert!(outcome.filtered[0].trials[0].decisions.is_empty());
        assert!(outcome.excluded[0].trials.is_empty());
    }

    #[tokio::test]
    async fn failing_condition_excludes_trial() {
        let corpus = HashMap::from([(
            "C123".to_string(),
            vec![trial(
                "NCT001",
                "C123",
                &["Platelets >= 100,000/ul, leukocytes >= 3000/mcl, hemoglobin >= 8 g/dl"],
            )],
        )]);
        let patient_labs = labs(&[
            (CellType::Platelets, 90_000.0),
            (CellType::Leukocytes, 4_000.0),
            (CellType::Hemoglobin, 10.0),
        ]);
        let outcome = orchestrator().partition(corpus, &patient_labs).await;

        assert!(outcome.filtered[0].trials.is_empty());
        let excluded = &outcome.excluded[0].trials;
        assert_eq!(excluded.len(), 1);
        let failed: Vec<_> = excluded[0]
            .decisions
            .iter()
            .filter(|d| !d.passed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].condition.cell_type, CellType::Platelets);
    }

    #[tokio::test]
    async fn missing_lab_value_never_excludes() {
        let corpus = HashMap::from([(
            "C123".to_string(),
            vec![trial(
                "NCT001",
                "C123",
                &["Platelets >= 100,000/ul, leukocytes >= 3000/mcl, hemoglobin >= 8 g/dl"],
            )],
        )]);
        // No platelet observation at all; the other two pass.
        let patient_labs = labs(&[
            (CellType::Leukocytes, 4_000.0),
            (CellType::Hemoglobin, 10.0),
        ]);
        let outcome = orchestrator().partition(corpus, &patient_labs).await;

        assert_eq!(outcome.filtered[0].trials.len(), 1);
        assert_eq!(outcome.filtered[0].trials[0].decisions.len(), 3);
        assert!(outcome.filtered[0].trials[0].decisions.iter().all(|d| d.passed));
    }

    #[tokio::test]
    async fn chunked_counts_sum_to_input() {
        let trials: Vec<Trial> = (0..25)
            .map(|i| {
                let criteria: &[&str] = if i % 2 == 0 {
                    &["Platelets >= 100,000/ul, leukocytes >= 3000/mcl, hemoglobin >= 8 g/dl"]
                } else {
                    &[]
                };
                trial(&format!("NCT{i:03}"), "C123", criteria)
            })
            .collect();
        assert_eq!(chunk_count(trials.len()), 3);

        let corpus = HashMap::from([("C123".to_string(), trials)]);
        let patient_labs = labs(&[
            (CellType::Platelets, 200_000.0),
            (CellType::Leukocytes, 2_000.0),
            (CellType::Hemoglobin, 10.0),
        ]);
        let outcome = orchestrator().partition(corpus, &patient_labs).await;

        let filtered = outcome.filtered[0].trials.len();
        let excluded = outcome.excluded[0].trials.len();
        assert_eq!(filtered + excluded, 25);
        // Even-indexed trials fail on leukocytes, odd ones have no criteria.
        assert_eq!(excluded, 13);
    }

    #[tokio::test]
    async fn codes_with_zero_trials_are_omitted() {
        let corpus = HashMap::from([
            ("C123".to_string(), vec![trial("NCT001", "C123", &[])]),
            ("C999".to_string(), vec![]),
        ]);
        let outcome = orchestrator().partition(corpus, &labs(&[])).await;

        assert_eq!(outcome.filtered.len(), 1);
        assert_eq!(outcome.excluded.len(), 1);
        assert_eq!(outcome.filtered[0].ncit_code, "C123");
    }
}
