use std::future::Future;

use serde::{Deserialize, Serialize};

use super::{classify_request_error, ServiceError};

/// Hard payload ceiling the detection service enforces per request.
pub const DETECTION_PAYLOAD_LIMIT: usize = 19_999;

/// Connection-pool ceiling for the detection client.
pub const DETECTION_POOL_SIZE: usize = 40;

/// Medical entity detection over free text.
///
/// The fallback extraction path sends chunks of eligibility text here when
/// the regex pass could not account for all three tracked cell types.
pub trait EntityDetector: Send + Sync {
    fn detect_entities(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<DetectedEntity>, ServiceError>> + Send;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedEntity {
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "Attributes", default)]
    pub attributes: Vec<EntityAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityAttribute {
    #[serde(rename = "Text")]
    pub text: String,
}

#[derive(Serialize)]
struct DetectionRequest<'a> {
    #[serde(rename = "Text")]
    text: &'a str,
}

#[derive(Deserialize)]
struct DetectionResponse {
    #[serde(rename = "Entities", default)]
    entities: Vec<DetectedEntity>,
}

/// HTTP entity-detection client with a bounded connection pool.
///
/// Construct one per orchestration and inject it; the pool ceiling keeps the
/// chunked fan-out from opening an unbounded number of connections to the
/// rate-limited service.
pub struct HttpEntityDetector {
    endpoint: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpEntityDetector {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(DETECTION_POOL_SIZE)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint: endpoint.to_string(),
            client,
            timeout_secs,
        }
    }
}

impl EntityDetector for HttpEntityDetector {
    async fn detect_entities(&self, text: &str) -> Result<Vec<DetectedEntity>, ServiceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&DetectionRequest { text })
            .send()
            .await
            .map_err(|e| classify_request_error(e, &self.endpoint, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DetectionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ResponseParsing(e.to_string()))?;

        Ok(parsed.entities)
    }
}

/// Mock detector for tests — returns canned entities and records every
/// payload it receives, so tests can assert what the fallback actually sent.
pub struct MockEntityDetector {
    entities: Vec<DetectedEntity>,
    fail: bool,
    received: std::sync::Mutex<Vec<String>>,
}

impl MockEntityDetector {
    pub fn new(entities: Vec<DetectedEntity>) -> Self {
        Self {
            entities,
            fail: false,
            received: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            entities: Vec::new(),
            fail: true,
            received: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Payloads received so far, in call order.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl EntityDetector for MockEntityDetector {
    async fn detect_entities(&self, text: &str) -> Result<Vec<DetectedEntity>, ServiceError> {
        self.received.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(ServiceError::Connection("mock detector".into()));
        }
        Ok(self.entities.clone())
    }
}
