use std::collections::BTreeSet;
use std::future::Future;

use serde::Deserialize;

use super::{classify_request_error, ServiceError};

/// Patient-scoped search parameters for the trials corpus.
#[derive(Debug, Clone)]
pub struct TrialSearch {
    pub age: u32,
    pub gender: String,
    pub ncit_codes: BTreeSet<String>,
    pub page_size: usize,
}

impl TrialSearch {
    pub fn new(age: u32, gender: &str, ncit_codes: BTreeSet<String>) -> Self {
        Self {
            age,
            gender: gender.to_string(),
            ncit_codes,
            page_size: crate::config::DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of the trials corpus.
#[derive(Debug, Clone, Deserialize)]
pub struct TrialsPage {
    pub total: u64,
    pub trials: Vec<TrialRecord>,
}

/// A trial as the registry returns it. Only the fields the matcher reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrialRecord {
    pub nci_id: String,
    #[serde(default)]
    pub diseases: Vec<DiseaseEntry>,
    #[serde(default)]
    pub eligibility: Eligibility,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiseaseEntry {
    pub nci_thesaurus_concept_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Eligibility {
    #[serde(default)]
    pub unstructured: Vec<UnstructuredCriterion>,
}

/// One free-text eligibility entry; only inclusion entries feed extraction.
#[derive(Debug, Clone, Deserialize)]
pub struct UnstructuredCriterion {
    #[serde(default)]
    pub inclusion_indicator: bool,
    pub description: Option<String>,
}

/// Paginated clinical-trials corpus search.
pub trait TrialRegistry: Send + Sync {
    /// Fetch one page starting at record `start_from` (1-based).
    fn fetch_page(
        &self,
        search: &TrialSearch,
        start_from: u64,
    ) -> impl Future<Output = Result<TrialsPage, ServiceError>> + Send;
}

/// NCI clinical-trials API client.
///
/// The gender filter always includes the `BOTH` wildcard, and the age filter
/// is the inclusive min/max window equal to the patient's age.
pub struct NciRegistryClient {
    base_url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl NciRegistryClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    pub fn default_endpoint() -> Self {
        Self::new(
            crate::config::DEFAULT_TRIALS_URL,
            crate::config::DEFAULT_REQUEST_TIMEOUT_SECS,
        )
    }
}

impl TrialRegistry for NciRegistryClient {
    async fn fetch_page(
        &self,
        search: &TrialSearch,
        start_from: u64,
    ) -> Result<TrialsPage, ServiceError> {
        let mut query: Vec<(&str, String)> = vec![
            ("size", search.page_size.to_string()),
            ("from", start_from.to_string()),
        ];
        for code in &search.ncit_codes {
            query.push(("diseases.nci_thesaurus_concept_id", code.clone()));
        }
        query.push(("eligibility.structured.gender", search.gender.clone()));
        query.push(("eligibility.structured.gender", "BOTH".to_string()));
        query.push((
            "eligibility.structured.max_age_in_years_gte",
            search.age.to_string(),
        ));
        query.push((
            "eligibility.structured.min_age_in_years_lte",
            search.age.to_string(),
        ));

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| classify_request_error(e, &self.base_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::ResponseParsing(e.to_string()))
    }
}

/// Mock registry for tests — canned pages keyed by `start_from`, plus a set
/// of page offsets that fail with a connection error.
pub struct MockTrialRegistry {
    pages: std::collections::HashMap<u64, TrialsPage>,
    failing_pages: std::collections::HashSet<u64>,
}

impl MockTrialRegistry {
    pub fn new() -> Self {
        Self {
            pages: Default::default(),
            failing_pages: Default::default(),
        }
    }

    pub fn with_page(mut self, start_from: u64, page: TrialsPage) -> Self {
        self.pages.insert(start_from, page);
        self
    }

    pub fn with_failing_page(mut self, start_from: u64) -> Self {
        self.failing_pages.insert(start_from);
        self
    }
}

impl Default for MockTrialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TrialRegistry for MockTrialRegistry {
    async fn fetch_page(
        &self,
        _search: &TrialSearch,
        start_from: u64,
    ) -> Result<TrialsPage, ServiceError> {
        if self.failing_pages.contains(&start_from) {
            return Err(ServiceError::Connection("mock registry".into()));
        }
        self.pages
            .get(&start_from)
            .cloned()
            .ok_or_else(|| ServiceError::Http {
                status: 404,
                body: format!("no page at {start_from}"),
            })
    }
}
