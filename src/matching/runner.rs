//! End-to-end match run: resolve codes, fetch the corpus, partition it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::corpus::TrialCorpusFetcher;
use super::crosswalk::CodeCrosswalkResolver;
use super::orchestrator::{group_by_code, FilterOrchestrator};
use crate::models::{LabValues, MatchOutcome, SourceCoding};
use crate::services::{EntityDetector, ServiceError, TerminologyService, TrialRegistry, TrialSearch};

/// The already-parsed patient inputs the match runs against.
#[derive(Debug, Clone)]
pub struct PatientProfile {
    pub age: u32,
    pub gender: String,
    pub labs: LabValues,
}

/// Run a full match for one patient: crosswalk the source diagnosis codes,
/// fetch the trials corpus for the resolved NCIt codes, then partition it
/// against the patient's lab values. Unresolved codes are dropped with a
/// log line; an empty resolved set short-circuits to an empty outcome.
pub async fn run_match<T, R, D>(
    terminology: Arc<T>,
    registry: Arc<R>,
    detector: Arc<D>,
    profile: &PatientProfile,
    sources: &HashMap<String, SourceCoding>,
) -> Result<MatchOutcome, ServiceError>
where
    T: TerminologyService + 'static,
    R: TrialRegistry + 'static,
    D: EntityDetector + 'static,
{
    let resolver = CodeCrosswalkResolver::new(terminology);
    let matches = resolver.resolve(sources).await?;

    let ncit_codes: BTreeSet<String> = matches
        .iter()
        .filter_map(|(source_code, resolved)| match resolved {
            Some(m) => Some(m.target_code.clone()),
            None => {
                tracing::info!(code = %source_code, "Dropping unresolved source code");
                None
            }
        })
        .collect();

    if ncit_codes.is_empty() {
        tracing::info!("No source code resolved to an NCIt concept");
        return Ok(MatchOutcome::default());
    }

    let search = TrialSearch::new(profile.age, &profile.gender, ncit_codes);
    let fetcher = TrialCorpusFetcher::new(registry);
    let trials = fetcher.fetch(&search).await?;
    tracing::info!(trials = trials.len(), "Corpus fetched");

    let orchestrator = FilterOrchestrator::new(detector);
    Ok(orchestrator.partition(group_by_code(trials), &profile.labs).await)
}
