//! Concurrent crosswalk of source vocabulary codes to NCIt concepts.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::models::{CodeMatch, SourceCoding};
use crate::services::{ServiceError, TerminologyService};

/// Concept identifiers that are never acceptable crosswalk targets
/// (dataset tags, not disease concepts).
const EXCLUDED_CONCEPTS: &[&str] = &["TCGA", "OMFAQ", "MPN-SAF"];

pub struct CodeCrosswalkResolver<T: TerminologyService> {
    service: Arc<T>,
}

impl<T: TerminologyService + 'static> CodeCrosswalkResolver<T> {
    pub fn new(service: Arc<T>) -> Self {
        Self { service }
    }

    /// Resolve every source code concurrently, collecting results as each
    /// request completes. A per-code failure or non-success degrades to
    /// `None`; only ticket acquisition is fatal to the batch.
    pub async fn resolve(
        &self,
        sources: &HashMap<String, SourceCoding>,
    ) -> Result<HashMap<String, Option<CodeMatch>>, ServiceError> {
        let ticket: Arc<str> = self.service.service_ticket().await?.into();

        let mut pending = JoinSet::new();
        for (source_code, coding) in sources {
            tracing::info!(
                codeset = %coding.codeset,
                code = %source_code,
                description = %coding.description,
                "Requesting crosswalk"
            );
            let service = self.service.clone();
            let ticket = ticket.clone();
            let source_code = source_code.clone();
            let codeset = coding.codeset.clone();
            pending.spawn(async move {
                let resolved = match service.crosswalk(&codeset, &source_code, &ticket).await {
                    Ok(candidates) => first_acceptable(candidates),
                    Err(e) => {
                        tracing::warn!(code = %source_code, error = %e, "Crosswalk request failed");
                        None
                    }
                };
                (source_code, resolved)
            });
        }

        let mut matches = HashMap::new();
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok((source_code, Some(found))) => {
                    tracing::info!(code = %source_code, ncit = %found.target_code, "Crosswalk match");
                    matches.insert(source_code, Some(found));
                }
                Ok((source_code, None)) => {
                    tracing::info!(code = %source_code, "No crosswalk match");
                    matches.insert(source_code, None);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Crosswalk task failed");
                }
            }
        }
        Ok(matches)
    }
}

/// First candidate whose concept is not on the exclusion list.
fn first_acceptable(
    candidates: Vec<crate::services::CrosswalkCandidate>,
) -> Option<CodeMatch> {
    candidates
        .into_iter()
        .find(|c| !EXCLUDED_CONCEPTS.contains(&c.concept_id.as_str()))
        .map(|c| CodeMatch {
            target_code: c.concept_id,
            description: c.description,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::terminology::MockTerminologyService;
    use crate::services::CrosswalkCandidate;

    fn candidate(concept_id: &str, description: &str) -> CrosswalkCandidate {
        CrosswalkCandidate {
            concept_id: concept_id.into(),
            description: description.into(),
        }
    }

    fn coding(codeset: &str, description: &str) -> SourceCoding {
        SourceCoding {
            codeset: codeset.into(),
            description: description.into(),
        }
    }

    #[tokio::test]
    async fn resolves_codes_concurrently() {
        let service = MockTerminologyService::new()
            .with_candidates("203.00", vec![candidate("C3242", "Multiple Myeloma")])
            .with_candidates("205.10", vec![candidate("C3174", "CML")]);
        let resolver = CodeCrosswalkResolver::new(Arc::new(service));

        let sources = HashMap::from([
            ("203.00".to_string(), coding("ICD9CM", "Multiple myeloma")),
            ("205.10".to_string(), coding("ICD9CM", "CML")),
        ]);
        let matches = resolver.resolve(&sources).await.unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(
            matches["203.00"].as_ref().unwrap().target_code,
            "C3242"
        );
        assert_eq!(matches["205.10"].as_ref().unwrap().target_code, "C3174");
    }

    #[tokio::test]
    async fn excluded_concepts_are_skipped() {
        let service = MockTerminologyService::new().with_candidates(
            "203.00",
            vec![
                candidate("TCGA", "Cancer Genome Atlas"),
                candidate("MPN-SAF", "Symptom form"),
                candidate("C3242", "Multiple Myeloma"),
            ],
        );
        let resolver = CodeCrosswalkResolver::new(Arc::new(service));

        let sources = HashMap::from([("203.00".to_string(), coding("ICD9CM", "MM"))]);
        let matches = resolver.resolve(&sources).await.unwrap();

        assert_eq!(matches["203.00"].as_ref().unwrap().target_code, "C3242");
    }

    #[tokio::test]
    async fn only_excluded_candidates_resolve_to_none() {
        let service = MockTerminologyService::new()
            .with_candidates("203.00", vec![candidate("OMFAQ", "Questionnaire")]);
        let resolver = CodeCrosswalkResolver::new(Arc::new(service));

        let sources = HashMap::from([("203.00".to_string(), coding("ICD9CM", "MM"))]);
        let matches = resolver.resolve(&sources).await.unwrap();

        assert!(matches["203.00"].is_none());
    }

    #[tokio::test]
    async fn single_failure_does_not_abort_batch() {
        let service = MockTerminologyService::new()
            .with_candidates("203.00", vec![candidate("C3242", "Multiple Myeloma")])
            .with_failing_code("999.99");
        let resolver = CodeCrosswalkResolver::new(Arc::new(service));

        let sources = HashMap::from([
            ("203.00".to_string(), coding("ICD9CM", "MM")),
            ("999.99".to_string(), coding("ICD9CM", "Unknown")),
        ]);
        let matches = resolver.resolve(&sources).await.unwrap();

        assert_eq!(matches.len(), 2);
        assert!(matches["203.00"].is_some());
        assert!(matches["999.99"].is_none());
    }

    #[tokio::test]
    async fn unknown_code_resolves_to_none() {
        let service = MockTerminologyService::new();
        let resolver = CodeCrosswalkResolver::new(Arc::new(service));

        let sources = HashMap::from([("000.00".to_string(), coding("ICD9CM", "Nothing"))]);
        let matches = resolver.resolve(&sources).await.unwrap();

        assert!(matches["000.00"].is_none());
    }
}
