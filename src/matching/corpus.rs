//! Paginated, concurrent retrieval of the trials corpus.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::models::Trial;
use crate::services::registry::TrialRecord;
use crate::services::{ServiceError, TrialRegistry, TrialSearch};

pub struct TrialCorpusFetcher<R: TrialRegistry> {
    registry: Arc<R>,
}

impl<R: TrialRegistry + 'static> TrialCorpusFetcher<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }

    /// Fetch the full corpus for a search: page 1 first to learn the total,
    /// then all remaining pages concurrently. Order of trials is whatever
    /// order pages complete in. A failed non-first page is logged and its
    /// range skipped; page 1 failure is fatal since the total is unknown.
    pub async fn fetch(&self, search: &TrialSearch) -> Result<Vec<Trial>, ServiceError> {
        tracing::info!(from = 1, "Trial query");
        let first_page = self.registry.fetch_page(search, 1).await?;
        tracing::info!(from = 1, total = first_page.total, "Received trials");

        let mut trials: Vec<Trial> = first_page
            .trials
            .into_iter()
            .map(|record| annotate(record, &search.ncit_codes))
            .collect();

        let size = search.page_size as u64;
        if first_page.total <= size {
            return Ok(trials);
        }

        let mut pending = JoinSet::new();
        let mut start_from = 1 + size;
        while start_from <= first_page.total {
            tracing::info!(from = start_from, "Trial query");
            let registry = self.registry.clone();
            let search = search.clone();
            pending.spawn(async move {
                (start_from, registry.fetch_page(&search, start_from).await)
            });
            start_from += size;
        }

        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((from, Ok(page))) => {
                    tracing::info!(from, count = page.trials.len(), "Received trials");
                    trials.extend(
                        page.trials
                            .into_iter()
                            .map(|record| annotate(record, &search.ncit_codes)),
                    );
                }
                Ok((from, Err(e))) => {
                    tracing::warn!(from, error = %e, "Trial page fetch failed, skipping range");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Trial page task failed");
                }
            }
        }

        Ok(trials)
    }
}

/// Convert a registry record into a corpus trial, annotated with the
/// intersection of requested codes actually present on the trial. An empty
/// intersection is logged but the trial is still emitted.
fn annotate(record: TrialRecord, requested: &BTreeSet<String>) -> Trial {
    let codes: BTreeSet<String> = record
        .diseases
        .iter()
        .filter_map(|d| d.nci_thesaurus_concept_id.clone())
        .filter(|code| requested.contains(code))
        .collect();
    if codes.is_empty() {
        tracing::warn!(trial = %record.nci_id, "Cannot find source ncit code for trial");
    }

    let mut trial = Trial::new(record.nci_id, codes);
    trial.inclusion_criteria = record
        .eligibility
        .unstructured
        .into_iter()
        .filter(|c| c.inclusion_indicator)
        .filter_map(|c| c.description)
        .collect();
    trial
}
