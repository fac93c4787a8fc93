use std::future::Future;

use serde::Deserialize;

use super::{classify_request_error, ServiceError};

/// Vocabulary crosswalk service: maps a source-vocabulary code to candidate
/// NCI Thesaurus concepts.
pub trait TerminologyService: Send + Sync {
    /// Obtain one short-lived session ticket. The resolver fetches this once
    /// per batch and shares it read-only across all crosswalk requests.
    fn service_ticket(&self) -> impl Future<Output = Result<String, ServiceError>> + Send;

    /// All crosswalk candidates for `code` in `codeset`, in service order.
    fn crosswalk(
        &self,
        codeset: &str,
        code: &str,
        ticket: &str,
    ) -> impl Future<Output = Result<Vec<CrosswalkCandidate>, ServiceError>> + Send;
}

/// One candidate concept from a crosswalk response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CrosswalkCandidate {
    /// Concept identifier (`ui` on the wire).
    #[serde(rename = "ui")]
    pub concept_id: String,
    #[serde(rename = "name")]
    pub description: String,
}

/// Response body for a crosswalk lookup.
#[derive(Deserialize)]
struct CrosswalkResponse {
    result: Vec<CrosswalkCandidate>,
}

/// UMLS terminology client.
///
/// Crosswalk lookups are `GET {base}/{codeset}/{code}?targetSource=NCI&ticket=T`;
/// tickets come from a POST to the auth endpoint with the API key.
pub struct UmlsClient {
    base_url: String,
    auth_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl UmlsClient {
    pub fn new(base_url: &str, auth_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_url: auth_url.to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        }
    }

    pub fn default_endpoint(api_key: &str) -> Self {
        Self::new(
            crate::config::DEFAULT_UMLS_CROSSWALK_URL,
            crate::config::DEFAULT_UMLS_AUTH_URL,
            api_key,
            crate::config::DEFAULT_REQUEST_TIMEOUT_SECS,
        )
    }
}

impl TerminologyService for UmlsClient {
    async fn service_ticket(&self) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(&self.auth_url)
            .form(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| classify_request_error(e, &self.auth_url, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .text()
            .await
            .map(|t| t.trim().to_string())
            .map_err(|e| ServiceError::ResponseParsing(e.to_string()))
    }

    async fn crosswalk(
        &self,
        codeset: &str,
        code: &str,
        ticket: &str,
    ) -> Result<Vec<CrosswalkCandidate>, ServiceError> {
        let url = format!("{}/{}/{}", self.base_url, codeset, code);

        let response = self
            .client
            .get(&url)
            .query(&[("targetSource", "NCI"), ("ticket", ticket)])
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

        let parsed: CrosswalkResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ResponseParsing(e.to_string()))?;

        Ok(parsed.result)
    }
}

/// Mock terminology service for tests — canned candidates per source code.
pub struct MockTerminologyService {
    ticket: String,
    candidates: std::collections::HashMap<String, Vec<CrosswalkCandidate>>,
    failing_codes: std::collections::HashSet<String>,
}

impl MockTerminologyService {
    pub fn new() -> Self {
        Self {
            ticket: "ST-mock".into(),
            candidates: Default::default(),
            failing_codes: Default::default(),
        }
    }

    pub fn with_candidates(mut self, code: &str, candidates: Vec<CrosswalkCandidate>) -> Self {
        self.candidates.insert(code.to_string(), candidates);
        self
    }

    /// Make lookups for `code` fail with a connection error.
    pub fn with_failing_code(mut self, code: &str) -> Self {
        self.failing_codes.insert(code.to_string());
        self
    }
}

impl Default for MockTerminologyService {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminologyService for MockTerminologyService {
    async fn service_ticket(&self) -> Result<String, ServiceError> {
        Ok(self.ticket.clone())
    }

    async fn crosswalk(
        &self,
        _codeset: &str,
        code: &str,
        _ticket: &str,
    ) -> Result<Vec<CrosswalkCandidate>, ServiceError> {
        if self.failing_codes.contains(code) {
            return Err(ServiceError::Connection("mock terminology".into()));
        }
        Ok(self.candidates.get(code).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn umls_client_trims_trailing_slash() {
        let client = UmlsClient::new(
            "https://uts-ws.nlm.nih.gov/rest/crosswalk/current/source/",
            "https://utslogin.nlm.nih.gov/cas/v1/api-key",
            "key",
            30,
        );
        assert!(!client.base_url.ends_with('/'));
        assert_eq!(client.timeout_secs, 30);
    }

    #[test]
    fn crosswalk_response_parses_wire_shape() {
        let body = r#"{"result": [
            {"ui": "TCGA", "name": "Cancer Genome Atlas term"},
            {"ui": "C3242", "name": "Multiple Myeloma"}
        ]}"#;
        let parsed: CrosswalkResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.result.len(), 2);
        assert_eq!(parsed.result[1].concept_id, "C3242");
        assert_eq!(parsed.result[1].description, "Multiple Myeloma");
    }

    #[tokio::test]
    async fn mock_returns_canned_candidates() {
        let mock = MockTerminologyService::new().with_candidates(
            "203.00",
            vec![CrosswalkCandidate {
                concept_id: "C3242".into(),
                description: "Multiple Myeloma".into(),
            }],
        );
        let ticket = mock.service_ticket().await.unwrap();
        let candidates = mock.crosswalk("ICD9CM", "203.00", &ticket).await.unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[tokio::test]
    async fn mock_failing_code_errors() {
        let mock = MockTerminologyService::new().with_failing_code("999");
        let result = mock.crosswalk("ICD9CM", "999", "ST-mock").await;
        assert!(matches!(result, Err(ServiceError::Connection(_))));
    }
}
